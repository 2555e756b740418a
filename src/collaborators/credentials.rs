use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};

use crate::config::credentials::resolve_credential;
use crate::config::CredentialsConfig;
use crate::errors::AltscoutError;
use super::{CredentialSource, Credentials};

/// Credentials from the config file (or `$ENV` references in it), falling
/// back to terminal prompts for anything missing and after a rejected attempt.
pub struct ConfigCredentialSource {
    email: Option<String>,
    username: Option<String>,
    password: Option<String>,
    configured_tried: AtomicBool,
}

impl ConfigCredentialSource {
    pub fn new(config: &CredentialsConfig) -> Self {
        Self {
            email: config.email.as_deref().and_then(resolve_credential),
            username: config.username.as_deref().and_then(resolve_credential),
            password: config.password.as_deref().and_then(resolve_credential),
            configured_tried: AtomicBool::new(false),
        }
    }

    /// Credentials taken entirely from configuration, if complete.
    fn configured(&self) -> Option<Credentials> {
        let email = self.email.clone()?;
        let secret = self.password.clone()?;
        Some(Credentials {
            identity: self.username.clone().unwrap_or_else(|| username_from_email(&email)),
            secret,
            address: email,
        })
    }

    async fn prompt(&self) -> Result<Credentials, AltscoutError> {
        let default_email = self.email.clone();
        let username = self.username.clone();
        tokio::task::spawn_blocking(move || {
            let mut input = dialoguer::Input::<String>::new().with_prompt("email address");
            if let Some(email) = default_email {
                input = input.default(email);
            }
            let email = input.interact_text().map_err(prompt_error)?;
            let secret = dialoguer::Password::new()
                .with_prompt("password")
                .interact()
                .map_err(prompt_error)?;
            Ok(Credentials {
                identity: username.unwrap_or_else(|| username_from_email(&email)),
                secret,
                address: email,
            })
        })
        .await
        .map_err(|e| AltscoutError::Internal(format!("Credential prompt task failed: {}", e)))?
    }
}

fn prompt_error(e: dialoguer::Error) -> AltscoutError {
    AltscoutError::Authentication(format!("Could not read credentials from the terminal: {}", e))
}

/// The part of an address before `@`, which is the wiki username by convention.
pub fn username_from_email(email: &str) -> String {
    email.split('@').next().unwrap_or(email).trim().to_string()
}

#[async_trait]
impl CredentialSource for ConfigCredentialSource {
    async fn obtain(&self) -> Result<Credentials, AltscoutError> {
        if !self.configured_tried.swap(true, Ordering::SeqCst) {
            if let Some(creds) = self.configured() {
                debug!(identity = %creds.identity, "Using configured credentials");
                return Ok(creds);
            }
        }
        info!("Prompting for wiki credentials");
        self.prompt().await
    }
}
