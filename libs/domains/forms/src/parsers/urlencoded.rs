//! `application/x-www-form-urlencoded` submissions.

use crate::error::{FormError, FormResult};
use crate::models::{FORM_NAME_FIELD, FieldValue, FormData, RECAPTCHA_FIELD};
use std::collections::HashMap;

/// Parse `key=value&...` pairs.
///
/// Repeated keys collect into a list, except the routing and reCAPTCHA
/// fields which keep their first value as a plain string.
pub fn parse(body: &[u8]) -> FormResult<FormData> {
    let mut data = FormData::new();
    let mut offsets: HashMap<String, usize> = HashMap::new();

    let mut offset = 0;
    for pair in body.split(|byte| *byte == b'&') {
        let start = offset;
        offset += pair.len() + 1;
        if pair.is_empty() {
            continue;
        }

        let (raw_key, raw_value) = match pair.iter().position(|byte| *byte == b'=') {
            Some(split) => (&pair[..split], &pair[split + 1..]),
            None => (pair, &pair[pair.len()..]),
        };
        let key = decode(raw_key)?;
        let value = decode(raw_value)?;

        offsets.entry(key.clone()).or_insert(start);
        if is_single_valued(&key) {
            if !data.values.contains_key(&key) {
                data.insert(&key, FieldValue::Scalar(value));
            }
        } else {
            data.append(&key, value);
        }
    }

    data.sort_order_by_offset(|key| offsets.get(key).copied());
    Ok(data)
}

fn is_single_valued(key: &str) -> bool {
    key == FORM_NAME_FIELD || key == RECAPTCHA_FIELD
}

fn decode(raw: &[u8]) -> FormResult<String> {
    let raw = std::str::from_utf8(raw)
        .map_err(|e| FormError::BodyParse(format!("invalid URL-encoded body: {}", e)))?;
    let spaced = raw.replace('+', " ");
    let decoded = urlencoding::decode(&spaced)
        .map_err(|e| FormError::BodyParse(format!("invalid URL-encoded body: {}", e)))?;
    Ok(decoded.into_owned())
}
