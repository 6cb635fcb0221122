use std::sync::Arc;
use tracing::{debug, info};

use crate::captcha::CaptchaVerifier;
use crate::dispatcher::Dispatcher;
use crate::error::{FormError, FormResult};
use crate::models::{FieldValue, RECAPTCHA_FIELD, Submission};
use crate::providers::MailTransport;
use crate::registry::FormRegistry;

/// Result of a handled submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitOutcome {
    /// Display name of the form that received the submission.
    pub form: String,
    /// Number of emails sent.
    pub sent: usize,
    /// Where to send the browser, if the form has a redirect.
    pub redirect: Option<String>,
}

/// Service layer tying resolution, reCAPTCHA and dispatch together
pub struct FormsService<T: MailTransport> {
    registry: Arc<FormRegistry>,
    dispatcher: Dispatcher<T>,
    captcha: Option<Arc<dyn CaptchaVerifier>>,
}

impl<T: MailTransport> FormsService<T> {
    pub fn new(registry: FormRegistry, dispatcher: Dispatcher<T>) -> Self {
        Self {
            registry: Arc::new(registry),
            dispatcher,
            captcha: None,
        }
    }

    pub fn with_captcha(mut self, verifier: impl CaptchaVerifier + 'static) -> Self {
        self.captcha = Some(Arc::new(verifier));
        self
    }

    pub fn registry(&self) -> &FormRegistry {
        &self.registry
    }

    pub fn dispatcher(&self) -> &Dispatcher<T> {
        &self.dispatcher
    }

    /// Resolve, verify and dispatch one submission
    pub async fn submit(&self, content_type: &str, body: &[u8]) -> FormResult<SubmitOutcome> {
        let mut submission = self.registry.resolve(content_type, body).await?;

        if submission.form().recaptcha {
            self.verify_captcha(&mut submission).await?;
        }

        let sent = self.dispatcher.send(&submission).await?;
        let form = submission.form();

        info!(
            form = %form.key(),
            sent,
            "sent {} emails from {} form",
            sent,
            form.display_name()
        );

        Ok(SubmitOutcome {
            form: form.display_name().to_string(),
            sent,
            redirect: form.redirect.clone().filter(|r| !r.is_empty()),
        })
    }

    /// Check the token and drop it from the submission once consumed.
    async fn verify_captcha(&self, submission: &mut Submission) -> FormResult<()> {
        let verifier = self.captcha.as_ref().ok_or_else(|| {
            FormError::Captcha(format!(
                "form {} requires reCAPTCHA but no secret is configured",
                submission.form().key()
            ))
        })?;

        let token = submission
            .value(RECAPTCHA_FIELD)
            .and_then(FieldValue::as_scalar)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| FormError::CaptchaRejected(format!("missing {} field", RECAPTCHA_FIELD)))?;

        if !verifier.verify(token).await? {
            return Err(FormError::CaptchaRejected("token was not accepted".to_string()));
        }

        debug!(form = %submission.form().key(), "reCAPTCHA verified");
        submission.take_value(RECAPTCHA_FIELD);
        Ok(())
    }
}

impl<T: MailTransport> Clone for FormsService<T> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            dispatcher: self.dispatcher.clone(),
            captcha: self.captcha.clone(),
        }
    }
}
