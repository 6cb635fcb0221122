//! reCAPTCHA verification.

use crate::error::FormResult;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

/// Google's token verification endpoint.
pub const RECAPTCHA_VERIFY_URL: &str = "https://www.google.com/recaptcha/api/siteverify";

/// Checks a CAPTCHA response token.
#[async_trait]
pub trait CaptchaVerifier: Send + Sync {
    /// `Ok(false)` when the token is rejected, `Err` when it could not be checked.
    async fn verify(&self, token: &str) -> FormResult<bool>;
}

#[derive(Debug, Deserialize)]
struct SiteVerifyResponse {
    success: bool,
    #[serde(default, rename = "error-codes")]
    error_codes: Vec<String>,
}

/// Verifies tokens against the reCAPTCHA siteverify API.
#[derive(Clone)]
pub struct RecaptchaVerifier {
    client: reqwest::Client,
    secret: String,
    endpoint: String,
}

impl RecaptchaVerifier {
    pub fn new(secret: impl Into<String>) -> FormResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            secret: secret.into(),
            endpoint: RECAPTCHA_VERIFY_URL.to_string(),
        })
    }

    /// Point the verifier at a different siteverify-compatible endpoint.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl CaptchaVerifier for RecaptchaVerifier {
    async fn verify(&self, token: &str) -> FormResult<bool> {
        let response: SiteVerifyResponse = self
            .client
            .post(&self.endpoint)
            .form(&[("secret", self.secret.as_str()), ("response", token)])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if response.success {
            debug!("reCAPTCHA token accepted");
        } else {
            warn!(errors = ?response.error_codes, "reCAPTCHA token rejected");
        }

        Ok(response.success)
    }
}
