//! Value model for parsed submissions.

use crate::form::Form;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

/// Field that routes a submission to its [`Form`].
pub const FORM_NAME_FIELD: &str = "_form_name";

/// Field carrying the reCAPTCHA response token.
pub const RECAPTCHA_FIELD: &str = "g-recaptcha-response";

/// A submitted field value.
///
/// Repeated keys in URL-encoded and multipart bodies collapse into a `List`;
/// everything else is a `Scalar`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Scalar(String),
    List(Vec<String>),
}

impl FieldValue {
    pub fn is_list(&self) -> bool {
        matches!(self, FieldValue::List(_))
    }

    /// The value as a single string, or `None` for lists.
    pub fn as_scalar(&self) -> Option<&str> {
        match self {
            FieldValue::Scalar(value) => Some(value),
            FieldValue::List(_) => None,
        }
    }

    /// All values in submission order.
    pub fn values(&self) -> Vec<&str> {
        match self {
            FieldValue::Scalar(value) => vec![value.as_str()],
            FieldValue::List(values) => values.iter().map(String::as_str).collect(),
        }
    }

    /// Append another value, promoting a scalar to a list.
    pub fn push(&mut self, value: String) {
        match self {
            FieldValue::Scalar(first) => {
                let first = std::mem::take(first);
                *self = FieldValue::List(vec![first, value]);
            }
            FieldValue::List(values) => values.push(value),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Scalar(value) => f.write_str(value),
            FieldValue::List(values) => f.write_str(&values.join(", ")),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Scalar(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Scalar(value)
    }
}

impl From<Vec<String>> for FieldValue {
    fn from(values: Vec<String>) -> Self {
        FieldValue::List(values)
    }
}

/// A file uploaded with a multipart submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    /// Form field the file was submitted under.
    pub field: String,
    pub filename: String,
    pub mime_type: String,
    pub data: Vec<u8>,
}

/// Parsed body before it is bound to a form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormData {
    /// Field names in original submission order, without duplicates.
    pub order: Vec<String>,
    pub values: HashMap<String, FieldValue>,
    pub attachments: Vec<Attachment>,
}

impl FormData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field, replacing any previous value.
    pub fn insert(&mut self, name: &str, value: FieldValue) {
        self.track(name);
        self.values.insert(name.to_string(), value);
    }

    /// Add a value to a field, turning repeated keys into a list.
    pub fn append(&mut self, name: &str, value: String) {
        self.track(name);
        match self.values.get_mut(name) {
            Some(existing) => existing.push(value),
            None => {
                self.values.insert(name.to_string(), FieldValue::Scalar(value));
            }
        }
    }

    /// Store an uploaded file; the field's value becomes its filename.
    pub fn attach(&mut self, attachment: Attachment) {
        self.append(&attachment.field, attachment.filename.clone());
        self.attachments.push(attachment);
    }

    /// Reorder fields by the raw body offset of their first occurrence.
    ///
    /// Fields without an offset sort last, ties break by name so repeated
    /// parses of the same body always agree.
    pub fn sort_order_by_offset<F>(&mut self, offset_of: F)
    where
        F: Fn(&str) -> Option<usize>,
    {
        self.order.sort_by_cached_key(|name| {
            (offset_of(name).unwrap_or(usize::MAX), name.clone())
        });
    }

    /// Drop ignored fields from the order. Their values are kept.
    pub fn remove_ignored(&mut self, ignored: &HashSet<String>) {
        self.order.retain(|name| !ignored.contains(name));
    }

    fn track(&mut self, name: &str) {
        if !self.values.contains_key(name) {
            self.order.push(name.to_string());
        }
    }
}

/// One normalized submission bound to its form.
#[derive(Debug, Clone)]
pub struct Submission {
    form: Arc<Form>,
    data: FormData,
}

impl Submission {
    pub fn new(form: Arc<Form>, data: FormData) -> Self {
        Self { form, data }
    }

    pub fn form(&self) -> &Form {
        &self.form
    }

    pub fn order(&self) -> &[String] {
        &self.data.order
    }

    pub fn values(&self) -> &HashMap<String, FieldValue> {
        &self.data.values
    }

    pub fn value(&self, name: &str) -> Option<&FieldValue> {
        self.data.values.get(name)
    }

    pub fn attachments(&self) -> &[Attachment] {
        &self.data.attachments
    }

    /// Fields in submission order paired with their values.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.data
            .order
            .iter()
            .filter_map(|name| self.data.values.get(name).map(|value| (name.as_str(), value)))
    }

    /// Remove a value once a pre-check (e.g. CAPTCHA) has consumed it.
    pub fn take_value(&mut self, name: &str) -> Option<FieldValue> {
        self.data.order.retain(|field| field != name);
        self.data.values.remove(name)
    }
}
