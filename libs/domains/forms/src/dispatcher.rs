//! Composes and sends the emails configured for a submission.

use crate::error::{FormError, FormResult};
use crate::form::Email;
use crate::models::Submission;
use crate::providers::{MailTransport, ProcessEnv, SettingsSource, SmtpServer};
use crate::templates::{TemplateEngine, replace_dynamic};
use data_encoding::BASE32_NOPAD;
use lettre::{
    Message,
    message::{Attachment, Mailbox, Mailboxes, MultiPart, SinglePart, header::ContentType},
};
use std::sync::Arc;
use tracing::{debug, info, instrument};

const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// Sends every email of a submission's form, in order.
///
/// Sending stops at the first failure. Emails already handed to the
/// transport are not recalled.
pub struct Dispatcher<T: MailTransport> {
    transport: Arc<T>,
    templates: TemplateEngine,
    settings: Arc<dyn SettingsSource>,
}

impl<T: MailTransport> Dispatcher<T> {
    /// Create a dispatcher reading SMTP settings from the process environment.
    pub fn new(transport: T, templates: TemplateEngine) -> Self {
        Self {
            transport: Arc::new(transport),
            templates,
            settings: Arc::new(ProcessEnv),
        }
    }

    pub fn with_settings(mut self, settings: impl SettingsSource + 'static) -> Self {
        self.settings = Arc::new(settings);
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Send all emails for `submission`, returning how many were sent.
    #[instrument(skip_all, fields(form = %submission.form().key(), transport = self.transport.name()))]
    pub async fn send(&self, submission: &Submission) -> FormResult<usize> {
        let mut sent = 0;

        for email in &submission.form().emails {
            let message = self.compose(email, submission)?;
            let server = SmtpServer::resolve(&email.id, self.settings.as_ref())?;

            let result = self.transport.send(&server, message).await?;
            sent += 1;

            info!(
                email = %email.id,
                to = %email.to,
                response = ?result.response,
                "Sent submission email"
            );
        }

        Ok(sent)
    }

    /// Build the message for one email.
    pub fn compose(&self, email: &Email, submission: &Submission) -> FormResult<Message> {
        let body = self.templates.render(email, submission)?;

        let from: Mailbox = parse_address("from", &email.from)?;
        let to: Mailboxes = parse_address("to", &email.to)?;
        if to.iter().next().is_none() {
            return Err(FormError::InvalidAddress(format!(
                "email '{}' has no recipients",
                email.id
            )));
        }

        let mut builder = Message::builder()
            .message_id(Some(message_id(&from)))
            .subject(replace_dynamic(&email.subject, submission))
            .from(from);

        for mailbox in to {
            builder = builder.to(mailbox);
        }

        for cc in &email.cc {
            builder = builder.cc(parse_address("cc", cc)?);
        }

        for bcc in &email.bcc {
            builder = builder.bcc(parse_address("bcc", bcc)?);
        }

        if let Some(reply_to) = email.reply_to.as_deref().filter(|r| !r.is_empty()) {
            let reply_to = replace_dynamic(reply_to, submission);
            // A placeholder the visitor left empty leaves nothing to reply to.
            if reply_to.contains("{{") {
                debug!(email = %email.id, "Skipping unresolved Reply-To");
            } else {
                builder = builder.reply_to(parse_address("reply-to", &reply_to)?);
            }
        }

        let html = SinglePart::html(body);
        let message = if submission.attachments().is_empty() {
            builder.singlepart(html)
        } else {
            let mut parts = MultiPart::mixed().singlepart(html);
            for attachment in submission.attachments() {
                let content_type = ContentType::parse(&attachment.mime_type)
                    .or_else(|_| ContentType::parse(FALLBACK_CONTENT_TYPE))
                    .map_err(|e| FormError::Send(format!("Invalid attachment type: {}", e)))?;

                debug!(
                    filename = %attachment.filename,
                    size = attachment.data.len(),
                    "Attaching file"
                );
                parts = parts.singlepart(
                    Attachment::new(attachment.filename.clone())
                        .body(attachment.data.clone(), content_type),
                );
            }
            builder.multipart(parts)
        };

        message.map_err(|e| {
            FormError::InvalidAddress(format!("Failed to build email '{}': {}", email.id, e))
        })
    }
}

impl<T: MailTransport> Clone for Dispatcher<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            templates: self.templates.clone(),
            settings: Arc::clone(&self.settings),
        }
    }
}

fn parse_address<A>(kind: &str, value: &str) -> FormResult<A>
where
    A: std::str::FromStr,
    A::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e| FormError::InvalidAddress(format!("Invalid {} address '{}': {}", kind, value, e)))
}

/// `<TOKEN@domain>` where TOKEN is 32 random bytes in base32.
fn message_id(from: &Mailbox) -> String {
    let token: [u8; 32] = rand::random();
    format!("<{}@{}>", BASE32_NOPAD.encode(&token), from.email.domain())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SmtpParam;
    use crate::form::Form;
    use crate::models::{Attachment as Upload, FormData};
    use crate::providers::MockTransport;
    use std::collections::HashMap;

    fn settings() -> HashMap<String, String> {
        [
            ("SMTP_HOST", "mail.example.com"),
            ("SMTP_PORT", "587"),
            ("SMTP_USER", "shared@example.com"),
            ("SMTP_PASS", "shared"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    fn dispatcher(transport: MockTransport) -> Dispatcher<MockTransport> {
        Dispatcher::new(transport, TemplateEngine::new().unwrap()).with_settings(settings())
    }

    fn email() -> Email {
        Email::new(
            "contact",
            "owner@example.com, sales@example.com",
            "forms@example.com",
            "New message from {{name}}",
        )
    }

    fn submission(form: Form) -> Submission {
        let mut data = FormData::new();
        data.insert("name", "Daniel".into());
        data.insert("message", "Hello".into());
        Submission::new(Arc::new(form), data)
    }

    #[test]
    fn test_compose_sets_headers() {
        let dispatcher = dispatcher(MockTransport::new());
        let email = email()
            .with_cc("cc@example.com")
            .with_bcc("audit@example.com")
            .with_reply_to("visitor@example.com");
        let message = dispatcher
            .compose(&email, &submission(Form::new("contact")))
            .unwrap();

        let headers = message.headers();
        let message_id = headers.get_raw("Message-ID").unwrap();
        assert!(message_id.starts_with('<'));
        assert!(message_id.ends_with("@example.com>"));
        // 32 bytes in unpadded base32
        assert_eq!(message_id.len(), 1 + 52 + "@example.com>".len());

        assert_eq!(headers.get_raw("Subject"), Some("New message from Daniel"));
        assert!(headers.get_raw("Cc").unwrap().contains("cc@example.com"));
        assert!(headers.get_raw("Reply-To").unwrap().contains("visitor@example.com"));

        let recipients: Vec<String> = message
            .envelope()
            .to()
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(recipients.len(), 4);
        for address in [
            "owner@example.com",
            "sales@example.com",
            "cc@example.com",
            "audit@example.com",
        ] {
            assert!(recipients.iter().any(|r| r == address), "missing {address}");
        }
    }

    #[test]
    fn test_compose_reply_to_from_submission() {
        let dispatcher = dispatcher(MockTransport::new());
        let email = email().with_reply_to("{{email}}");

        let mut data = FormData::new();
        data.insert("name", "Daniel".into());
        data.insert("email", "daniel@example.com".into());
        let with_email = Submission::new(Arc::new(Form::new("contact")), data);
        let message = dispatcher.compose(&email, &with_email).unwrap();
        assert!(
            message
                .headers()
                .get_raw("Reply-To")
                .unwrap()
                .contains("daniel@example.com")
        );

        // No email field submitted: the header is left out
        let message = dispatcher
            .compose(&email, &submission(Form::new("contact")))
            .unwrap();
        assert!(message.headers().get_raw("Reply-To").is_none());
    }

    #[test]
    fn test_compose_message_ids_are_unique() {
        let dispatcher = dispatcher(MockTransport::new());
        let submission = submission(Form::new("contact"));
        let first = dispatcher.compose(&email(), &submission).unwrap();
        let second = dispatcher.compose(&email(), &submission).unwrap();

        assert_ne!(
            first.headers().get_raw("Message-ID"),
            second.headers().get_raw("Message-ID")
        );
    }

    #[test]
    fn test_compose_attaches_uploads() {
        let dispatcher = dispatcher(MockTransport::new());
        let mut data = FormData::new();
        data.insert("name", "Daniel".into());
        data.attach(Upload {
            field: "resume".into(),
            filename: "cv.txt".into(),
            mime_type: "text/plain".into(),
            data: b"ten years of Rust".to_vec(),
        });
        let submission = Submission::new(Arc::new(Form::new("contact")), data);

        let message = dispatcher.compose(&email(), &submission).unwrap();
        let raw = String::from_utf8_lossy(&message.formatted()).into_owned();

        assert!(raw.contains("multipart/mixed"));
        assert!(raw.contains("cv.txt"));
        assert!(raw.contains("text/html"));
    }

    #[test]
    fn test_compose_without_attachments_is_single_part() {
        let dispatcher = dispatcher(MockTransport::new());
        let message = dispatcher
            .compose(&email(), &submission(Form::new("contact")))
            .unwrap();
        let raw = String::from_utf8_lossy(&message.formatted()).into_owned();

        assert!(!raw.contains("multipart/mixed"));
        assert!(raw.contains("text/html"));
    }

    #[test]
    fn test_compose_rejects_invalid_address() {
        let dispatcher = dispatcher(MockTransport::new());
        let email = Email::new("contact", "not an address", "forms@example.com", "Hi");

        let err = dispatcher
            .compose(&email, &submission(Form::new("contact")))
            .unwrap_err();
        assert!(matches!(err, FormError::InvalidAddress(_)));
    }

    #[tokio::test]
    async fn test_send_all_emails_in_order() {
        let form = Form::new("contact")
            .with_email(email())
            .with_email(Email::new(
                "autoreply",
                "visitor@example.com",
                "forms@example.com",
                "Thanks",
            ));
        let dispatcher = dispatcher(MockTransport::new());

        let sent = dispatcher.send(&submission(form)).await.unwrap();
        assert_eq!(sent, 2);

        let recorded = dispatcher.transport().sent().await;
        assert_eq!(recorded.len(), 2);
        assert_eq!(recorded[1].recipients(), vec!["visitor@example.com"]);
        assert_eq!(recorded[0].server.host, "mail.example.com");
    }

    #[tokio::test]
    async fn test_send_stops_at_missing_credentials() {
        let form = Form::new("contact")
            .with_email(email())
            .with_email(Email::new(
                "autoreply",
                "visitor@example.com",
                "forms@example.com",
                "Thanks",
            ));

        let mut settings = settings();
        settings.remove("SMTP_PASS");
        settings.insert("SMTP_CONTACT_PASS".into(), "secret".into());
        let dispatcher = Dispatcher::new(MockTransport::new(), TemplateEngine::new().unwrap())
            .with_settings(settings);

        let err = dispatcher.send(&submission(form)).await.unwrap_err();
        match err {
            FormError::SmtpConfig { email, parameter, .. } => {
                assert_eq!(email, "autoreply");
                assert_eq!(parameter, SmtpParam::Pass);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(dispatcher.transport().sent_count().await, 1);
    }

    #[tokio::test]
    async fn test_send_stops_at_transport_failure() {
        let form = Form::new("contact")
            .with_email(email())
            .with_email(email())
            .with_email(email());
        let dispatcher = dispatcher(MockTransport::failing_after(1, "connection reset"));

        let err = dispatcher.send(&submission(form)).await.unwrap_err();
        assert!(matches!(err, FormError::Send(_)));
        assert_eq!(dispatcher.transport().sent_count().await, 1);
    }

    #[tokio::test]
    async fn test_send_form_without_emails() {
        let dispatcher = dispatcher(MockTransport::new());
        let sent = dispatcher.send(&submission(Form::new("contact"))).await.unwrap();
        assert_eq!(sent, 0);
    }
}
