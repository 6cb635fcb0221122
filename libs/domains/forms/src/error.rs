//! Error types for the forms domain.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;
use thiserror::Error;

/// Result type for form operations.
pub type FormResult<T> = Result<T, FormError>;

/// SMTP connection parameter that failed to resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmtpParam {
    Host,
    Port,
    User,
    Pass,
    Security,
}

impl SmtpParam {
    /// Environment key suffix for this parameter.
    pub fn key(&self) -> &'static str {
        match self {
            SmtpParam::Host => "HOST",
            SmtpParam::Port => "PORT",
            SmtpParam::User => "USER",
            SmtpParam::Pass => "PASS",
            SmtpParam::Security => "SECURITY",
        }
    }
}

impl fmt::Display for SmtpParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SmtpParam::Host => write!(f, "host"),
            SmtpParam::Port => write!(f, "port"),
            SmtpParam::User => write!(f, "user"),
            SmtpParam::Pass => write!(f, "pass"),
            SmtpParam::Security => write!(f, "security"),
        }
    }
}

/// Errors that can occur while resolving and dispatching a submission.
#[derive(Debug, Error)]
pub enum FormError {
    /// Content type is missing, unparsable, or not one of the supported body formats.
    #[error("Invalid content type: {0}")]
    InvalidContentType(String),

    /// Body could not be decoded in the declared format.
    #[error("Failed to parse body: {0}")]
    BodyParse(String),

    /// The `_form_name` field is absent or not a non-empty string.
    #[error("Missing _form_name field in submitted form data")]
    MissingFormIdentifier,

    /// No form is registered under the submitted identifier.
    #[error("Missing form config for form {0}")]
    UnknownForm(String),

    /// SMTP settings for an email could not be resolved.
    #[error("Incomplete SMTP configuration for email '{email}': {parameter} {reason}")]
    SmtpConfig {
        email: String,
        parameter: SmtpParam,
        reason: String,
    },

    /// Template rendering or CSS inlining failed.
    #[error("Template rendering error: {0}")]
    TemplateRender(String),

    /// A configured address could not be parsed.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// The transport failed to connect or transmit.
    #[error("Failed to send email: {0}")]
    Send(String),

    /// The reCAPTCHA token is missing or was rejected.
    #[error("reCAPTCHA verification failed: {0}")]
    CaptchaRejected(String),

    /// CAPTCHA verification could not be performed.
    #[error("Failed to verify reCAPTCHA: {0}")]
    Captcha(String),

    /// Form configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl FormError {
    /// Whether the error was caused by the submitted request rather than the server.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            FormError::InvalidContentType(_)
                | FormError::BodyParse(_)
                | FormError::MissingFormIdentifier
                | FormError::UnknownForm(_)
                | FormError::CaptchaRejected(_)
        )
    }

    /// HTTP status code reported by the platform adapter.
    pub fn status_code(&self) -> StatusCode {
        if self.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl From<handlebars::RenderError> for FormError {
    fn from(err: handlebars::RenderError) -> Self {
        FormError::TemplateRender(err.to_string())
    }
}

impl From<css_inline::InlineError> for FormError {
    fn from(err: css_inline::InlineError) -> Self {
        FormError::TemplateRender(format!("CSS inlining failed: {}", err))
    }
}

impl From<multer::Error> for FormError {
    fn from(err: multer::Error) -> Self {
        FormError::BodyParse(err.to_string())
    }
}

impl From<lettre::transport::smtp::Error> for FormError {
    fn from(err: lettre::transport::smtp::Error) -> Self {
        FormError::Send(err.to_string())
    }
}

impl From<reqwest::Error> for FormError {
    fn from(err: reqwest::Error) -> Self {
        FormError::Captcha(err.to_string())
    }
}

impl IntoResponse for FormError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Submission failed");
        } else {
            tracing::warn!(error = %self, "Submission rejected");
        }

        (status, Json(json!({ "ok": false, "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_errors_map_to_bad_request() {
        assert_eq!(
            FormError::InvalidContentType("text/plain".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(FormError::MissingFormIdentifier.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            FormError::UnknownForm("contact".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            FormError::CaptchaRejected("missing token".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_server_errors_map_to_internal_error() {
        let err = FormError::SmtpConfig {
            email: "contact".into(),
            parameter: SmtpParam::Pass,
            reason: "is missing".into(),
        };
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            FormError::Send("connection refused".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            FormError::Captcha("timeout".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_smtp_config_message_names_parameter() {
        let err = FormError::SmtpConfig {
            email: "contact".into(),
            parameter: SmtpParam::Port,
            reason: "'abc' is not a valid port".into(),
        };
        let message = err.to_string();
        assert!(message.contains("contact"));
        assert!(message.contains("port"));
        assert!(message.contains("abc"));
    }
}
