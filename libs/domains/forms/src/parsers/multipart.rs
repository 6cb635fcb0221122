//! `multipart/form-data` submissions.

use crate::error::FormResult;
use crate::models::{Attachment, FORM_NAME_FIELD, FieldValue, FormData, RECAPTCHA_FIELD};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use std::convert::Infallible;
use tracing::debug;

const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// Parse a multipart body delimited by `boundary`.
///
/// Gateways may deliver the body base64-encoded; decoding is attempted first
/// and the raw bytes are used when it fails.
pub async fn parse(boundary: &str, body: &[u8]) -> FormResult<FormData> {
    let mut payload = decode_transport(body);
    // Some encoders omit the newline after the closing delimiter.
    payload.push(b'\n');

    let stream = futures::stream::once(async move { Ok::<_, Infallible>(Bytes::from(payload)) });
    let mut multipart = multer::Multipart::new(stream, boundary);

    let mut data = FormData::new();
    while let Some(field) = multipart.next_field().await? {
        let Some(name) = field.name().map(str::to_string) else {
            debug!("Skipping multipart part without a field name");
            continue;
        };
        let filename = field
            .file_name()
            .filter(|filename| !filename.is_empty())
            .map(str::to_string);
        let mime_type = field
            .content_type()
            .map(|mime| mime.to_string())
            .unwrap_or_else(|| DEFAULT_MIME_TYPE.to_string());

        let content = field.bytes().await?;

        match filename {
            Some(filename) => {
                debug!(field = %name, filename = %filename, size = content.len(), "Extracted attachment");
                data.attach(Attachment {
                    field: name,
                    filename,
                    mime_type,
                    data: content.to_vec(),
                });
            }
            None => {
                let value = String::from_utf8_lossy(&content).into_owned();
                if name == FORM_NAME_FIELD || name == RECAPTCHA_FIELD {
                    if !data.values.contains_key(&name) {
                        data.insert(&name, FieldValue::Scalar(value));
                    }
                } else {
                    data.append(&name, value);
                }
            }
        }
    }

    Ok(data)
}

/// Base64-decode the body if it decodes cleanly, otherwise return it unchanged.
fn decode_transport(body: &[u8]) -> Vec<u8> {
    let compact: Vec<u8> = body
        .iter()
        .copied()
        .filter(|byte| *byte != b'\r' && *byte != b'\n')
        .collect();

    match STANDARD.decode(&compact) {
        Ok(decoded) => decoded,
        Err(_) => body.to_vec(),
    }
}
