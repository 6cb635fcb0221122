//! Mail transport implementations.
//!
//! This module contains the `MailTransport` trait, the lettre-backed SMTP
//! transport and a recording mock for tests.

pub mod mock;
pub mod smtp;

pub use mock::MockTransport;
pub use smtp::{ProcessEnv, SettingsSource, SmtpMailer, SmtpSecurity, SmtpServer};

use crate::error::FormResult;
use async_trait::async_trait;
use lettre::Message;

/// Outcome of handing one message to the transport.
#[derive(Debug, Clone)]
pub struct SentEmail {
    /// Last response line reported by the server, if any.
    pub response: Option<String>,
}

/// Delivers composed messages to an SMTP server.
#[async_trait]
pub trait MailTransport: Send + Sync {
    /// Connect to `server`, send `message` and release the connection.
    async fn send(&self, server: &SmtpServer, message: Message) -> FormResult<SentEmail>;

    /// Get the transport name for logging.
    fn name(&self) -> &'static str;
}
