//! Mock transport for testing

use super::{MailTransport, SentEmail, SmtpServer};
use crate::error::{FormError, FormResult};
use async_trait::async_trait;
use lettre::Message;
use std::sync::Arc;
use tokio::sync::Mutex;

/// A message captured by [`MockTransport`].
#[derive(Debug, Clone)]
pub struct RecordedMessage {
    pub server: SmtpServer,
    pub message: Message,
}

impl RecordedMessage {
    /// Envelope recipients (To, Cc and Bcc).
    pub fn recipients(&self) -> Vec<String> {
        self.message
            .envelope()
            .to()
            .iter()
            .map(ToString::to_string)
            .collect()
    }

    /// The full RFC 5322 message as text.
    pub fn raw(&self) -> String {
        String::from_utf8_lossy(&self.message.formatted()).into_owned()
    }
}

/// Transport that records messages instead of sending them
#[derive(Clone, Default)]
pub struct MockTransport {
    sent: Arc<Mutex<Vec<RecordedMessage>>>,
    /// Fail every send once this many messages have been recorded.
    fail_after: Option<usize>,
    failure_message: Option<String>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a transport that always fails
    pub fn failing(message: impl Into<String>) -> Self {
        Self::failing_after(0, message)
    }

    /// Create a transport that accepts `count` messages, then fails
    pub fn failing_after(count: usize, message: impl Into<String>) -> Self {
        Self {
            sent: Arc::default(),
            fail_after: Some(count),
            failure_message: Some(message.into()),
        }
    }

    pub async fn sent(&self) -> Vec<RecordedMessage> {
        self.sent.lock().await.clone()
    }

    pub async fn sent_count(&self) -> usize {
        self.sent.lock().await.len()
    }

    pub async fn clear(&self) {
        self.sent.lock().await.clear();
    }
}

#[async_trait]
impl MailTransport for MockTransport {
    async fn send(&self, server: &SmtpServer, message: Message) -> FormResult<SentEmail> {
        let mut sent = self.sent.lock().await;

        if self.fail_after.is_some_and(|limit| sent.len() >= limit) {
            let message = self
                .failure_message
                .clone()
                .unwrap_or_else(|| "Mock failure".to_string());
            return Err(FormError::Send(message));
        }

        sent.push(RecordedMessage {
            server: server.clone(),
            message,
        });

        Ok(SentEmail {
            response: Some(format!("2.0.0 Ok: queued as mock-{}", sent.len())),
        })
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::SmtpSecurity;
    use crate::providers::smtp::{CONNECT_TIMEOUT, SEND_TIMEOUT};

    fn server() -> SmtpServer {
        SmtpServer {
            host: "localhost".into(),
            port: 1025,
            username: "user".into(),
            password: "pass".into(),
            security: SmtpSecurity::None,
            connect_timeout: CONNECT_TIMEOUT,
            send_timeout: SEND_TIMEOUT,
        }
    }

    fn message() -> Message {
        Message::builder()
            .from("forms@example.com".parse().unwrap())
            .to("owner@example.com".parse().unwrap())
            .subject("Test Subject")
            .body(String::from("Test body"))
            .unwrap()
    }

    #[tokio::test]
    async fn test_mock_transport_records_message() {
        let transport = MockTransport::new();

        let result = transport.send(&server(), message()).await;
        assert!(result.is_ok());

        let sent = transport.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].recipients(), vec!["owner@example.com"]);
        assert!(sent[0].raw().contains("Subject: Test Subject"));
    }

    #[tokio::test]
    async fn test_mock_transport_fails() {
        let transport = MockTransport::failing("Simulated failure");

        let err = transport.send(&server(), message()).await.unwrap_err();
        assert!(matches!(err, FormError::Send(ref m) if m == "Simulated failure"));
        assert_eq!(transport.sent_count().await, 0);
    }

    #[tokio::test]
    async fn test_mock_transport_fails_after_limit() {
        let transport = MockTransport::failing_after(1, "Second send fails");

        assert!(transport.send(&server(), message()).await.is_ok());
        assert!(transport.send(&server(), message()).await.is_err());
        assert_eq!(transport.sent_count().await, 1);

        transport.clear().await;
        assert!(transport.send(&server(), message()).await.is_ok());
    }
}
