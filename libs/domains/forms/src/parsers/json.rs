//! `application/json` submissions.

use crate::error::{FormError, FormResult};
use crate::models::{FieldValue, FormData};
use serde_json::Value;
use std::collections::HashMap;

/// Parse a flat JSON object.
///
/// The decoded map carries no order, so each key's position is recovered by
/// walking the raw body and recording where every top-level key starts.
pub fn parse(body: &[u8]) -> FormResult<FormData> {
    let object: HashMap<String, Value> = serde_json::from_slice(body)
        .map_err(|e| FormError::BodyParse(format!("invalid JSON object: {}", e)))?;

    let mut data = FormData::new();
    for (key, value) in object {
        data.insert(&key, to_field_value(value));
    }
    let offsets = key_offsets(body);
    data.sort_order_by_offset(|key| offsets.get(key).copied());

    Ok(data)
}

fn to_field_value(value: Value) -> FieldValue {
    match value {
        Value::Array(items) => FieldValue::List(items.into_iter().map(to_text).collect()),
        other => FieldValue::Scalar(to_text(other)),
    }
}

fn to_text(value: Value) -> String {
    match value {
        Value::String(text) => text,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Byte offset of each decoded top-level key in a JSON object.
///
/// Keys are unescaped before lookup, so `"caf\u00e9"` in the body is found
/// under `café`. Strings nested in values or sub-objects are skipped.
fn key_offsets(body: &[u8]) -> HashMap<String, usize> {
    let mut offsets = HashMap::new();
    let mut depth = 0usize;
    let mut expect_key = false;
    let mut i = 0;

    while i < body.len() {
        match body[i] {
            b'"' => {
                let Some(end) = string_end(body, i) else {
                    break;
                };
                if depth == 1 && expect_key {
                    if let Ok(key) = serde_json::from_slice::<String>(&body[i..=end]) {
                        offsets.entry(key).or_insert(i);
                    }
                    expect_key = false;
                }
                i = end + 1;
                continue;
            }
            b'{' => {
                depth += 1;
                expect_key = depth == 1;
            }
            b'[' => depth += 1,
            b'}' | b']' => depth = depth.saturating_sub(1),
            b',' if depth == 1 => expect_key = true,
            _ => {}
        }
        i += 1;
    }

    offsets
}

/// Index of the closing quote of the string opening at `start`.
fn string_end(body: &[u8], start: usize) -> Option<usize> {
    let mut i = start + 1;
    while i < body.len() {
        match body[i] {
            b'\\' => i += 2,
            b'"' => return Some(i),
            _ => i += 1,
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_recovers_order() {
        let body = br#"{"_form_name":"contact","name":["Daniel","Atwood"],"message":"This is my message","urlencoded":["message="],"multipart":["name=\"message\""],"json":["\"message\":"]}"#;

        let data = parse(body).unwrap();
        assert_eq!(
            data.order,
            vec!["_form_name", "name", "message", "urlencoded", "multipart", "json"]
        );
        assert_eq!(data.values["_form_name"], FieldValue::from("contact"));
        assert_eq!(
            data.values["name"],
            FieldValue::List(vec!["Daniel".into(), "Atwood".into()])
        );
    }

    #[test]
    fn test_parse_tolerates_whitespace_before_colon() {
        let body = b"{\n  \"zeta\" : \"1\",\n  \"alpha\"\t:\"2\"\n}";
        let data = parse(body).unwrap();
        assert_eq!(data.order, vec!["zeta", "alpha"]);
    }

    #[test]
    fn test_parse_skips_key_text_inside_values() {
        let body = br#"{"note":"name","name":"Daniel"}"#;
        let data = parse(body).unwrap();
        assert_eq!(data.order, vec!["note", "name"]);
    }

    #[test]
    fn test_parse_orders_unicode_escaped_keys() {
        let body = br#"{"_form_name":"contact","caf\u00e9":"x","a":"y"}"#;
        let data = parse(body).unwrap();

        assert_eq!(data.order, vec!["_form_name", "café", "a"]);
        assert_eq!(data.values["café"], FieldValue::from("x"));
    }

    #[test]
    fn test_parse_ignores_keys_of_nested_objects() {
        let body = br#"{"z":{"a":"1"},"a":"2","m":"[\"a\":"}"#;
        let data = parse(body).unwrap();
        assert_eq!(data.order, vec!["z", "a", "m"]);
    }

    #[test]
    fn test_parse_stringifies_non_string_scalars() {
        let body = br#"{"age":42,"subscribe":true,"nickname":null,"tags":[1,"two"]}"#;
        let data = parse(body).unwrap();

        assert_eq!(data.values["age"], FieldValue::from("42"));
        assert_eq!(data.values["subscribe"], FieldValue::from("true"));
        assert_eq!(data.values["nickname"], FieldValue::from(""));
        assert_eq!(
            data.values["tags"],
            FieldValue::List(vec!["1".into(), "two".into()])
        );
    }

    #[test]
    fn test_parse_rejects_non_object() {
        assert!(matches!(parse(b"[1,2,3]"), Err(FormError::BodyParse(_))));
        assert!(matches!(parse(b"{\"a\":"), Err(FormError::BodyParse(_))));
    }

    #[test]
    fn test_parse_is_stable_across_runs() {
        let body = br#"{"c":"3","a":"1","b":"2","d":"4"}"#;
        let first = parse(body).unwrap();
        for _ in 0..10 {
            assert_eq!(parse(body).unwrap().order, first.order);
        }
        assert_eq!(first.order, vec!["c", "a", "b", "d"]);
    }
}
