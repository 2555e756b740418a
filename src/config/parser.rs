use std::path::Path;
use crate::errors::AltscoutError;
use super::types::AltscoutConfig;
use super::schema::CONFIG_SCHEMA;
use tracing::warn;

pub async fn load_config(path: &Path) -> Result<AltscoutConfig, AltscoutError> {
    if !path.exists() {
        return Err(AltscoutError::Config(format!("Config file not found: {}", path.display())));
    }

    let metadata = tokio::fs::metadata(path).await?;
    if metadata.len() > 1_048_576 {
        return Err(AltscoutError::Config("Config file exceeds 1MB limit".into()));
    }

    let content = tokio::fs::read_to_string(path).await?;
    parse_config(&content)
}

/// Parse and validate configuration text.
pub fn parse_config(content: &str) -> Result<AltscoutConfig, AltscoutError> {
    let yaml: serde_yaml::Value = serde_yaml::from_str(content)?;

    for msg in validate_schema(&yaml)? {
        warn!(validation_error = %msg, "Config schema warning");
    }

    let config: AltscoutConfig = serde_yaml::from_value(yaml)?;
    validate_conflicts(&config)?;

    Ok(config)
}

/// Check the raw document against the JSON schema. Violations are returned
/// as messages rather than errors; the typed parse that follows is authoritative.
pub fn validate_schema(yaml: &serde_yaml::Value) -> Result<Vec<String>, AltscoutError> {
    let json_value = serde_json::to_value(yaml)
        .map_err(|e| AltscoutError::Config(format!("Config conversion error: {}", e)))?;

    let compiled = jsonschema::JSONSchema::compile(&CONFIG_SCHEMA)
        .map_err(|e| AltscoutError::Config(format!("Schema compilation error: {}", e)))?;

    let messages = match compiled.validate(&json_value) {
        Ok(()) => Vec::new(),
        Err(errors) => errors
            .map(|e| format!("{} at {}", e, e.instance_path))
            .collect(),
    };
    Ok(messages)
}

/// Semantic checks the schema cannot express.
pub fn validate_conflicts(config: &AltscoutConfig) -> Result<(), AltscoutError> {
    if config.wiki.server.trim().is_empty() {
        return Err(AltscoutError::Config("wiki.server must not be empty".into()));
    }
    if !config.wiki.server.starts_with("http://") && !config.wiki.server.starts_with("https://") {
        return Err(AltscoutError::Config(format!(
            "wiki.server must be an http(s) address, got '{}'",
            config.wiki.server
        )));
    }
    if config.vip.department_directory_url.trim().is_empty() {
        return Err(AltscoutError::Config("vip.department_directory_url must not be empty".into()));
    }
    if config.vip.other_vips_sheet_url.trim().is_empty() {
        return Err(AltscoutError::Config("vip.other_vips_sheet_url must not be empty".into()));
    }

    if config.coordinators.is_empty() {
        return Err(AltscoutError::Config(
            "At least one coordinator is required to take over unassigned pages".into(),
        ));
    }
    for coordinator in &config.coordinators {
        if !coordinator.email.contains('@') {
            return Err(AltscoutError::Config(format!(
                "Coordinator '{}' has an invalid email '{}'",
                coordinator.username, coordinator.email
            )));
        }
    }
    let mut usernames: Vec<&str> = config.coordinators.iter().map(|c| c.username.as_str()).collect();
    usernames.sort_unstable();
    if usernames.windows(2).any(|w| w[0] == w[1]) {
        return Err(AltscoutError::Config("Coordinator usernames must be unique".into()));
    }

    if let Some(redirect) = &config.notify.redirect_to {
        if !redirect.contains('@') {
            return Err(AltscoutError::Config(format!(
                "notify.redirect_to must be an email address, got '{}'",
                redirect
            )));
        }
        warn!(redirect_to = %redirect, "All notifications will be redirected");
    }

    if config.notify.sendmail_command.is_empty() {
        return Err(AltscoutError::Config("notify.sendmail_command must name a program".into()));
    }

    if config.credentials.max_attempts == 0 {
        return Err(AltscoutError::Config("credentials.max_attempts must be at least 1".into()));
    }

    Ok(())
}
