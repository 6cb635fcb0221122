//! Turns a raw request body into a [`Submission`] bound to its form.

use crate::error::{FormError, FormResult};
use crate::models::{FORM_NAME_FIELD, FieldValue, Submission};
use crate::parsers;
use crate::registry::FormRegistry;
use mime::Mime;
use tracing::{debug, instrument};

impl FormRegistry {
    /// Parse `body` according to `content_type` and bind it to the form named
    /// by its `_form_name` field.
    ///
    /// Ignored fields are removed from the order but kept in the values so
    /// pre-checks such as reCAPTCHA can still read them.
    #[instrument(skip(self, body), fields(body_len = body.len()))]
    pub async fn resolve(&self, content_type: &str, body: &[u8]) -> FormResult<Submission> {
        let mime: Mime = content_type
            .parse()
            .map_err(|_| FormError::InvalidContentType(content_type.to_string()))?;

        let mut data = match mime.essence_str().to_ascii_lowercase().as_str() {
            "application/json" => parsers::json::parse(body)?,
            "application/x-www-form-urlencoded" => parsers::urlencoded::parse(body)?,
            "multipart/form-data" => {
                let boundary = mime.get_param(mime::BOUNDARY).ok_or_else(|| {
                    FormError::BodyParse("multipart body without boundary".to_string())
                })?;
                parsers::multipart::parse(boundary.as_str(), body).await?
            }
            other => return Err(FormError::InvalidContentType(other.to_string())),
        };

        let form_name = data
            .values
            .get(FORM_NAME_FIELD)
            .and_then(FieldValue::as_scalar)
            .filter(|name| !name.is_empty())
            .ok_or(FormError::MissingFormIdentifier)?;

        let form = self
            .lookup(form_name)
            .ok_or_else(|| FormError::UnknownForm(form_name.to_lowercase()))?;

        data.remove_ignored(form.ignored());

        debug!(
            form = %form.key(),
            fields = data.order.len(),
            attachments = data.attachments.len(),
            "Resolved submission"
        );

        Ok(Submission::new(form, data))
    }
}
