use core_config::tracing::{init_tracing, install_color_eyre};
use domain_forms::{Dispatcher, FormRegistry, FormsService, RecaptchaVerifier, SmtpMailer, TemplateEngine};
use eyre::WrapErr;
use tracing::{info, warn};

mod config;
mod server;

use config::Config;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    // Install color-eyre first for colored error output (before any fallible operations)
    install_color_eyre();

    let config = Config::from_env()?;
    init_tracing(&config.environment);

    let registry = FormRegistry::from_file(&config.forms_path)
        .wrap_err_with(|| format!("Failed to load forms from {}", config.forms_path.display()))?;
    if registry.is_empty() {
        warn!(path = %config.forms_path.display(), "No forms defined; every submission will be rejected");
    }

    let dispatcher = Dispatcher::new(SmtpMailer::new(), TemplateEngine::new()?);
    let mut service = FormsService::new(registry, dispatcher);

    match &config.recaptcha_secret {
        Some(secret) => {
            info!("reCAPTCHA verification enabled");
            service = service.with_captcha(RecaptchaVerifier::new(secret.clone())?);
        }
        None => {
            let protected: Vec<String> = service
                .registry()
                .forms()
                .filter(|form| form.recaptcha)
                .map(|form| form.key())
                .collect();
            if !protected.is_empty() {
                warn!(
                    forms = ?protected,
                    "RECAPTCHA_SECRET is not set; submissions to these forms will fail"
                );
            }
        }
    }

    let router = server::router(service, config.max_body_bytes);
    server::serve(router, &config.server).await?;

    info!("Server shut down");
    Ok(())
}
