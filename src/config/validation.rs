use std::collections::HashSet;

use super::{BridgeConfig, ConfigError, ModelDefaults, ProviderConfig};

/// Validate the full bridge config, returning an error if any rule is violated.
///
/// # Errors
///
/// Returns [`ConfigError::Validation`] when any configuration invariant is violated.
pub fn validate_config(config: &BridgeConfig) -> Result<(), ConfigError> {
    validate_log_level(config)?;
    validate_memory(config)?;
    validate_providers(config)?;
    Ok(())
}

fn validation_err(msg: impl Into<String>) -> ConfigError {
    ConfigError::Validation(msg.into())
}

const VALID_LOG_LEVELS: &[&str] = &[
    "DEBUG", "INFO", "WARNING", "WARN", "ERROR", "CRITICAL", "DISABLED",
];

fn validate_log_level(config: &BridgeConfig) -> Result<(), ConfigError> {
    if !VALID_LOG_LEVELS.contains(&config.log_level.to_uppercase().as_str()) {
        return Err(validation_err(format!(
            "log_level must be one of {VALID_LOG_LEVELS:?}"
        )));
    }
    Ok(())
}

fn validate_memory(config: &BridgeConfig) -> Result<(), ConfigError> {
    if config.memory.limit <= 0 {
        return Err(validation_err(format!(
            "memory.limit must be greater than 0, got {}",
            config.memory.limit
        )));
    }
    Ok(())
}

fn validate_providers(config: &BridgeConfig) -> Result<(), ConfigError> {
    if config.providers.is_empty() {
        return Err(validation_err("providers cannot be empty"));
    }

    let mut names = HashSet::new();
    for provider in &config.providers {
        if provider.name.trim().is_empty() {
            return Err(validation_err("provider name cannot be empty"));
        }
        if !names.insert(provider.name.as_str()) {
            return Err(validation_err(format!(
                "duplicate provider name '{}'",
                provider.name
            )));
        }
        if provider.api_key.trim().is_empty() {
            return Err(validation_err(format!(
                "Provider '{}': api_key cannot be empty",
                provider.name
            )));
        }
        validate_base_url(provider)?;
        if let Some(defaults) = &provider.defaults {
            validate_defaults(&provider.name, defaults)?;
        }
    }
    Ok(())
}

fn validate_base_url(provider: &ProviderConfig) -> Result<(), ConfigError> {
    let Some(base_url) = provider.base_url.as_deref().map(str::trim) else {
        return Ok(());
    };
    let parsed = url::Url::parse(base_url).map_err(|err| {
        validation_err(format!(
            "Provider '{}': base_url is not a valid URL: {err}",
            provider.name
        ))
    })?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(validation_err(format!(
            "Provider '{}': base_url must use http:// or https://",
            provider.name
        )));
    }
    Ok(())
}

fn validate_defaults(name: &str, defaults: &ModelDefaults) -> Result<(), ConfigError> {
    if defaults.model.trim().is_empty() {
        return Err(validation_err(format!(
            "Provider '{name}': defaults.model cannot be empty"
        )));
    }
    let generation = &defaults.generation;
    if generation.max_tokens == Some(0) {
        return Err(validation_err(format!(
            "Provider '{name}': defaults.max_tokens must be greater than 0 when set"
        )));
    }
    if let Some(temperature) = generation.temperature {
        if !(0.0..=2.0).contains(&temperature) {
            return Err(validation_err(format!(
                "Provider '{name}': defaults.temperature must be within 0.0..=2.0"
            )));
        }
    }
    if let Some(top_p) = generation.top_p {
        if !(0.0..=1.0).contains(&top_p) {
            return Err(validation_err(format!(
                "Provider '{name}': defaults.top_p must be within 0.0..=1.0"
            )));
        }
    }
    Ok(())
}
