//! Forms Domain
//!
//! Receives HTML form submissions, normalizes them and emails them to the
//! recipients configured for the form.
//!
//! # Features
//!
//! - JSON, URL-encoded and multipart bodies (optionally base64-encoded)
//! - Field order recovered from the raw body
//! - File uploads forwarded as attachments
//! - Handlebars templates with CSS inlining
//! - Per-email SMTP credentials from the environment
//! - Optional reCAPTCHA verification
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │   API Handler   │  ← POST /, 200 or 303 redirect
//! └────────┬────────┘
//!          │
//! ┌────────▼────────┐
//! │  FormRegistry   │  ← Parses the body, binds it to a Form
//! └────────┬────────┘
//!          │
//! ┌────────▼────────┐
//! │   Dispatcher    │  ← Renders and composes one message per Email
//! └────────┬────────┘
//!          │
//! ┌────────▼────────┐
//! │  MailTransport  │  ← SMTP via lettre, or the recording mock
//! └─────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use domain_forms::{Dispatcher, FormRegistry, FormsService, SmtpMailer, TemplateEngine};
//!
//! let registry = FormRegistry::from_file("forms.json")?;
//! let dispatcher = Dispatcher::new(SmtpMailer::new(), TemplateEngine::new()?);
//! let app = domain_forms::handlers::router(FormsService::new(registry, dispatcher));
//! ```

pub mod captcha;
pub mod dispatcher;
pub mod error;
pub mod form;
pub mod handlers;
pub mod models;
pub mod parsers;
pub mod providers;
pub mod registry;
pub mod resolver;
pub mod service;
pub mod templates;

// Re-export commonly used types
pub use captcha::{CaptchaVerifier, RecaptchaVerifier};
pub use dispatcher::Dispatcher;
pub use error::{FormError, FormResult, SmtpParam};
pub use form::{Email, Form};
pub use models::{Attachment, FORM_NAME_FIELD, FieldValue, FormData, RECAPTCHA_FIELD, Submission};
pub use providers::{
    MailTransport, MockTransport, ProcessEnv, SettingsSource, SmtpMailer, SmtpSecurity, SmtpServer,
};
pub use registry::FormRegistry;
pub use service::{FormsService, SubmitOutcome};
pub use templates::{TemplateEngine, replace_dynamic};
