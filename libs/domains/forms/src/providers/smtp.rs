//! SMTP settings resolution and the lettre-backed transport.
//!
//! Settings are looked up per email: `SMTP_<ID>_HOST` wins over `SMTP_HOST`,
//! and likewise for `PORT`, `USER`, `PASS` and `SECURITY`.

use super::{MailTransport, SentEmail};
use crate::error::{FormError, FormResult, SmtpParam};
use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    transport::smtp::authentication::{Credentials, Mechanism},
};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, error, info};

/// Timeout for establishing each SMTP connection.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeout for delivering one message, generous enough for slow servers.
pub const SEND_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Source of environment-style settings.
pub trait SettingsSource: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
}

/// Reads settings from the process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl SettingsSource for ProcessEnv {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl SettingsSource for HashMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        HashMap::get(self, key).cloned()
    }
}

/// Connection security.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SmtpSecurity {
    /// Plain connection upgraded with STARTTLS (required).
    #[default]
    StartTls,
    /// TLS from the first byte.
    Tls,
    /// No encryption, for local relays such as Mailpit.
    None,
}

impl FromStr for SmtpSecurity {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "starttls" => Ok(SmtpSecurity::StartTls),
            "tls" | "ssl" | "implicit" => Ok(SmtpSecurity::Tls),
            "none" | "plain" => Ok(SmtpSecurity::None),
            other => Err(format!("'{}' is not one of starttls, tls, none", other)),
        }
    }
}

impl fmt::Display for SmtpSecurity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SmtpSecurity::StartTls => write!(f, "starttls"),
            SmtpSecurity::Tls => write!(f, "tls"),
            SmtpSecurity::None => write!(f, "none"),
        }
    }
}

/// Resolved connection parameters for one email.
#[derive(Clone, PartialEq, Eq)]
pub struct SmtpServer {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub security: SmtpSecurity,
    pub connect_timeout: Duration,
    pub send_timeout: Duration,
}

impl fmt::Debug for SmtpServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpServer")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("security", &self.security)
            .finish()
    }
}

impl SmtpServer {
    /// Resolve the server for the email identified by `email_id`.
    pub fn resolve(email_id: &str, settings: &dyn SettingsSource) -> FormResult<Self> {
        let lookup = SettingsLookup { email_id, settings };

        let host = lookup.required(SmtpParam::Host)?;
        let port = lookup.required(SmtpParam::Port)?;
        let port = port.trim().parse::<u16>().map_err(|_| {
            lookup.error(SmtpParam::Port, format!("'{}' is not a valid port", port))
        })?;
        let username = lookup.required(SmtpParam::User)?;
        let password = lookup.required(SmtpParam::Pass)?;
        let security = match lookup.optional(SmtpParam::Security) {
            Some(value) => value
                .parse()
                .map_err(|reason| lookup.error(SmtpParam::Security, reason))?,
            None => SmtpSecurity::default(),
        };

        Ok(Self {
            host,
            port,
            username,
            password,
            security,
            connect_timeout: CONNECT_TIMEOUT,
            send_timeout: SEND_TIMEOUT,
        })
    }
}

/// Email-specific prefix for settings keys: `SMTP_<ID>_`.
pub fn settings_prefix(email_id: &str) -> String {
    let id: String = email_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
        .collect();
    format!("SMTP_{}_", id)
}

struct SettingsLookup<'a> {
    email_id: &'a str,
    settings: &'a dyn SettingsSource,
}

impl SettingsLookup<'_> {
    fn specific_key(&self, param: SmtpParam) -> Option<String> {
        (!self.email_id.is_empty())
            .then(|| format!("{}{}", settings_prefix(self.email_id), param.key()))
    }

    fn shared_key(param: SmtpParam) -> String {
        format!("SMTP_{}", param.key())
    }

    fn optional(&self, param: SmtpParam) -> Option<String> {
        let non_empty = |key: String| self.settings.get(&key).filter(|v| !v.trim().is_empty());

        self.specific_key(param)
            .and_then(non_empty)
            .or_else(|| non_empty(Self::shared_key(param)))
    }

    fn required(&self, param: SmtpParam) -> FormResult<String> {
        self.optional(param).ok_or_else(|| {
            let keys = match self.specific_key(param) {
                Some(specific) => format!("{} or {}", specific, Self::shared_key(param)),
                None => Self::shared_key(param),
            };
            self.error(param, format!("is missing (set {})", keys))
        })
    }

    fn error(&self, parameter: SmtpParam, reason: String) -> FormError {
        FormError::SmtpConfig {
            email: self.email_id.to_string(),
            parameter,
            reason,
        }
    }
}

/// Sends each message over its own SMTP connection.
#[derive(Debug, Clone, Copy, Default)]
pub struct SmtpMailer;

impl SmtpMailer {
    pub fn new() -> Self {
        Self
    }

    fn build_transport(server: &SmtpServer) -> FormResult<AsyncSmtpTransport<Tokio1Executor>> {
        let builder = match server.security {
            SmtpSecurity::StartTls => {
                AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&server.host)?
            }
            SmtpSecurity::Tls => AsyncSmtpTransport::<Tokio1Executor>::relay(&server.host)?,
            SmtpSecurity::None => {
                AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&server.host)
            }
        };

        Ok(builder
            .port(server.port)
            .credentials(Credentials::new(
                server.username.clone(),
                server.password.clone(),
            ))
            .authentication(vec![Mechanism::Plain, Mechanism::Login])
            .timeout(Some(server.connect_timeout))
            .build())
    }
}

#[async_trait]
impl MailTransport for SmtpMailer {
    async fn send(&self, server: &SmtpServer, message: Message) -> FormResult<SentEmail> {
        debug!(
            host = %server.host,
            port = server.port,
            security = %server.security,
            recipients = message.envelope().to().len(),
            "Sending email via SMTP"
        );

        // Built per message without pooling: the connection closes when the
        // transport is dropped at the end of this call.
        let transport = Self::build_transport(server)?;

        let response = tokio::time::timeout(server.send_timeout, transport.send(message))
            .await
            .map_err(|_| {
                FormError::Send(format!(
                    "timed out after {}s sending via {}",
                    server.send_timeout.as_secs(),
                    server.host
                ))
            })?
            .map_err(|e| {
                error!(host = %server.host, error = %e, "Failed to send email via SMTP");
                FormError::from(e)
            })?;

        let response = response.message().last().map(str::to_string);
        info!(host = %server.host, response = ?response, "Email sent successfully via SMTP");

        Ok(SentEmail { response })
    }

    fn name(&self) -> &'static str {
        "SMTP"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_resolve_prefers_email_specific_settings() {
        let settings = settings(&[
            ("SMTP_HOST", "mail.example.com"),
            ("SMTP_PORT", "587"),
            ("SMTP_USER", "shared@example.com"),
            ("SMTP_PASS", "shared"),
            ("SMTP_CONTACT_USER", "username@example.com"),
            ("SMTP_CONTACT_PASS", "mysupersecretpassword"),
        ]);

        let server = SmtpServer::resolve("Contact", &settings).unwrap();
        assert_eq!(server.host, "mail.example.com");
        assert_eq!(server.port, 587);
        assert_eq!(server.username, "username@example.com");
        assert_eq!(server.password, "mysupersecretpassword");
        assert_eq!(server.security, SmtpSecurity::StartTls);
        assert_eq!(server.connect_timeout, CONNECT_TIMEOUT);
        assert_eq!(server.send_timeout, SEND_TIMEOUT);
    }

    #[test]
    fn test_resolve_falls_back_to_shared_settings() {
        let settings = settings(&[
            ("SMTP_HOST", "mail.example.com"),
            ("SMTP_PORT", "465"),
            ("SMTP_USER", "shared@example.com"),
            ("SMTP_PASS", "shared"),
            ("SMTP_SECURITY", "tls"),
            ("SMTP_CONTACT_HOST", ""),
        ]);

        let server = SmtpServer::resolve("contact", &settings).unwrap();
        assert_eq!(server.host, "mail.example.com");
        assert_eq!(server.username, "shared@example.com");
        assert_eq!(server.security, SmtpSecurity::Tls);
    }

    #[test]
    fn test_resolve_names_missing_parameter() {
        let settings = settings(&[
            ("SMTP_HOST", "mail.example.com"),
            ("SMTP_PORT", "587"),
            ("SMTP_USER", "shared@example.com"),
        ]);

        let err = SmtpServer::resolve("contact", &settings).unwrap_err();
        match err {
            FormError::SmtpConfig { email, parameter, reason } => {
                assert_eq!(email, "contact");
                assert_eq!(parameter, SmtpParam::Pass);
                assert!(reason.contains("SMTP_CONTACT_PASS"));
                assert!(reason.contains("SMTP_PASS"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_resolve_rejects_invalid_port() {
        let settings = settings(&[
            ("SMTP_HOST", "mail.example.com"),
            ("SMTP_PORT", "not_a_number"),
            ("SMTP_USER", "user"),
            ("SMTP_PASS", "pass"),
        ]);

        let err = SmtpServer::resolve("contact", &settings).unwrap_err();
        assert!(matches!(
            err,
            FormError::SmtpConfig { parameter: SmtpParam::Port, .. }
        ));
        assert!(err.to_string().contains("not_a_number"));
    }

    #[test]
    fn test_resolve_rejects_unknown_security() {
        let settings = settings(&[
            ("SMTP_HOST", "mail.example.com"),
            ("SMTP_PORT", "25"),
            ("SMTP_USER", "user"),
            ("SMTP_PASS", "pass"),
            ("SMTP_SECURITY", "quantum"),
        ]);

        let err = SmtpServer::resolve("contact", &settings).unwrap_err();
        assert!(matches!(
            err,
            FormError::SmtpConfig { parameter: SmtpParam::Security, .. }
        ));
    }

    #[test]
    fn test_resolve_from_process_env() {
        temp_env::with_vars(
            [
                ("SMTP_HOST", Some("mail.example.com")),
                ("SMTP_PORT", Some("587")),
                ("SMTP_USER", None),
                ("SMTP_PASS", None),
                ("SMTP_CONTACT_USER", Some("username@example.com")),
                ("SMTP_CONTACT_PASS", Some("mysupersecretpassword")),
                ("SMTP_CONTACT_SECURITY", None),
                ("SMTP_SECURITY", None),
            ],
            || {
                let server = SmtpServer::resolve("Contact", &ProcessEnv).unwrap();
                assert_eq!(server.username, "username@example.com");

                let err = SmtpServer::resolve("newsletter", &ProcessEnv).unwrap_err();
                assert!(matches!(
                    err,
                    FormError::SmtpConfig { parameter: SmtpParam::User, .. }
                ));
            },
        );
    }

    #[test]
    fn test_settings_prefix_normalizes_id() {
        assert_eq!(settings_prefix("contact"), "SMTP_CONTACT_");
        assert_eq!(settings_prefix("quote-request"), "SMTP_QUOTE_REQUEST_");
    }

    #[test]
    fn test_debug_redacts_password() {
        let server = SmtpServer {
            host: "mail.example.com".into(),
            port: 587,
            username: "user".into(),
            password: "hunter2".into(),
            security: SmtpSecurity::StartTls,
            connect_timeout: CONNECT_TIMEOUT,
            send_timeout: SEND_TIMEOUT,
        };
        assert!(!format!("{server:?}").contains("hunter2"));
    }
}
