use core_config::{FromEnv, env_optional, env_or_default, env_parse, server::ServerConfig};
use std::path::PathBuf;

pub use core_config::Environment;

const DEFAULT_FORMS_CONFIG: &str = "forms.json";
const DEFAULT_MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Application-specific configuration
#[derive(Clone, Debug)]
pub struct Config {
    pub server: ServerConfig,
    pub environment: Environment,
    /// JSON array of form definitions (`FORMS_CONFIG`).
    pub forms_path: PathBuf,
    /// Enables reCAPTCHA verification when set (`RECAPTCHA_SECRET`).
    pub recaptcha_secret: Option<String>,
    /// Request body limit, uploads included (`MAX_BODY_BYTES`).
    pub max_body_bytes: usize,
}

impl Config {
    pub fn from_env() -> eyre::Result<Self> {
        let environment = Environment::from_env();
        let server = ServerConfig::from_env()?; // HOST=0.0.0.0, PORT=8080 by default

        Ok(Self {
            server,
            environment,
            forms_path: env_or_default("FORMS_CONFIG", DEFAULT_FORMS_CONFIG).into(),
            recaptcha_secret: env_optional("RECAPTCHA_SECRET"),
            max_body_bytes: env_parse("MAX_BODY_BYTES", DEFAULT_MAX_BODY_BYTES)?,
        })
    }
}
