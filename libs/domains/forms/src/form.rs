//! Form and email definitions.

use crate::models::{FORM_NAME_FIELD, RECAPTCHA_FIELD};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashSet;

/// Settings applied per submission: routing identity, outgoing emails,
/// redirect and reCAPTCHA requirement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Form {
    /// Case-insensitive identifier matched against `_form_name`.
    /// Falls back to `name` when empty.
    #[serde(default)]
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Emails sent for every submission, in order.
    #[serde(default)]
    pub emails: Vec<Email>,
    /// Where the browser is sent with `303 See Other` after a successful submission.
    #[serde(default)]
    pub redirect: Option<String>,
    /// Require a valid `g-recaptcha-response` field.
    #[serde(default)]
    pub recaptcha: bool,
    /// Extra fields left out of the rendered order. The routing and
    /// reCAPTCHA fields are always included.
    #[serde(default = "default_ignored", deserialize_with = "deserialize_ignored")]
    ignore: HashSet<String>,
}

fn default_ignored() -> HashSet<String> {
    HashSet::from([FORM_NAME_FIELD.to_string(), RECAPTCHA_FIELD.to_string()])
}

fn deserialize_ignored<'de, D>(deserializer: D) -> Result<HashSet<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let mut ignored = default_ignored();
    ignored.extend(Vec::<String>::deserialize(deserializer)?);
    Ok(ignored)
}

impl Form {
    /// Create a form that ignores the routing and reCAPTCHA fields.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            emails: Vec::new(),
            redirect: None,
            recaptcha: false,
            ignore: default_ignored(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_redirect(mut self, redirect: impl Into<String>) -> Self {
        self.redirect = Some(redirect.into());
        self
    }

    pub fn with_recaptcha(mut self, recaptcha: bool) -> Self {
        self.recaptcha = recaptcha;
        self
    }

    pub fn with_email(mut self, email: Email) -> Self {
        self.emails.push(email);
        self
    }

    pub fn add_email(&mut self, emails: impl IntoIterator<Item = Email>) {
        self.emails.extend(emails);
    }

    /// Exclude fields from the rendered order.
    pub fn ignore<I, S>(&mut self, fields: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignore.extend(fields.into_iter().map(Into::into));
    }

    pub fn ignored(&self) -> &HashSet<String> {
        &self.ignore
    }

    pub fn is_ignored(&self, field: &str) -> bool {
        self.ignore.contains(field)
    }

    /// Registry key: lowercased `id`, or `name` when `id` is empty.
    pub fn key(&self) -> String {
        let id = if self.id.is_empty() { &self.name } else { &self.id };
        id.to_lowercase()
    }

    /// Name shown in rendered emails.
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() { &self.id } else { &self.name }
    }
}

/// One outgoing message definition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Email {
    /// Used to look up `SMTP_<ID>_*` settings.
    #[serde(default)]
    pub id: String,
    /// Comma-separated recipient list.
    pub to: String,
    pub from: String,
    #[serde(default)]
    pub cc: Vec<String>,
    #[serde(default)]
    pub bcc: Vec<String>,
    #[serde(default)]
    pub reply_to: Option<String>,
    #[serde(default)]
    pub subject: String,
    /// Handlebars template overriding the built-in one.
    #[serde(default)]
    pub template: Option<String>,
}

impl Email {
    pub fn new(
        id: impl Into<String>,
        to: impl Into<String>,
        from: impl Into<String>,
        subject: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            to: to.into(),
            from: from.into(),
            subject: subject.into(),
            ..Default::default()
        }
    }

    pub fn with_cc(mut self, cc: impl Into<String>) -> Self {
        self.cc.push(cc.into());
        self
    }

    pub fn with_bcc(mut self, bcc: impl Into<String>) -> Self {
        self.bcc.push(bcc.into());
        self
    }

    pub fn with_reply_to(mut self, reply_to: impl Into<String>) -> Self {
        self.reply_to = Some(reply_to.into());
        self
    }

    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = Some(template.into());
        self
    }

    /// The override template, if one is set and non-empty.
    pub fn custom_template(&self) -> Option<&str> {
        self.template.as_deref().filter(|template| !template.is_empty())
    }
}
