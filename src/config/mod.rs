pub mod validation;

use serde::{Deserialize, Serialize};

use self::validation::validate_config;
use crate::protocol::canonical::{ModelConfig, ProviderKind};

/// Error type for configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Adapter-level defaults: model names plus generation knobs that a request
/// may override.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDefaults {
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embed_model: Option<String>,
    #[serde(flatten)]
    pub generation: ModelConfig,
}

fn base_generation() -> ModelConfig {
    ModelConfig {
        max_tokens: Some(500),
        temperature: Some(0.0),
        top_p: Some(0.9),
        top_k: Some(40),
        stop_sequences: None,
        stream: Some(false),
    }
}

impl ModelDefaults {
    #[must_use]
    pub fn for_provider(kind: ProviderKind) -> Self {
        match kind {
            ProviderKind::Anthropic => Self {
                model: "claude-3-haiku-20240307".to_string(),
                embed_model: None,
                generation: base_generation(),
            },
            ProviderKind::Gemini => Self {
                model: "gemini-1.5-pro".to_string(),
                embed_model: Some("embedding-001".to_string()),
                generation: base_generation(),
            },
            ProviderKind::OpenAi => Self {
                model: "gpt-3.5-turbo".to_string(),
                embed_model: Some("text-embedding-ada-002".to_string()),
                // OpenAI has no top_k.
                generation: ModelConfig {
                    top_k: None,
                    ..base_generation()
                },
            },
        }
    }
}

/// Gemini harm category/threshold pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetySetting {
    pub category: String,
    pub threshold: String,
}

/// Gemini default: do not block any of the four configurable harm categories.
#[must_use]
pub fn default_safety_settings() -> Vec<SafetySetting> {
    [
        "HARM_CATEGORY_HARASSMENT",
        "HARM_CATEGORY_HATE_SPEECH",
        "HARM_CATEGORY_SEXUALLY_EXPLICIT",
        "HARM_CATEGORY_DANGEROUS_CONTENT",
    ]
    .into_iter()
    .map(|category| SafetySetting {
        category: category.to_string(),
        threshold: "BLOCK_NONE".to_string(),
    })
    .collect()
}

/// One configured backend. Credentials and URLs arrive already resolved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub name: String,
    pub provider: ProviderKind,
    pub api_key: String,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub defaults: Option<ModelDefaults>,
    #[serde(default)]
    pub safety_settings: Option<Vec<SafetySetting>>,
}

impl ProviderConfig {
    #[must_use]
    pub fn resolved_defaults(&self) -> ModelDefaults {
        self.defaults
            .clone()
            .unwrap_or_else(|| ModelDefaults::for_provider(self.provider))
    }
}

/// Session memory settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    #[serde(default = "default_memory_limit")]
    pub limit: i64,
}

fn default_memory_limit() -> i64 {
    50
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            limit: default_memory_limit(),
        }
    }
}

fn default_log_level() -> String {
    "INFO".to_string()
}

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub memory: MemoryConfig,
    pub providers: Vec<ProviderConfig>,
}

impl BridgeConfig {
    #[must_use]
    pub fn provider(&self, name: &str) -> Option<&ProviderConfig> {
        self.providers.iter().find(|p| p.name == name)
    }
}

/// Load configuration from a YAML file and validate it.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] when reading the file fails, [`ConfigError::Yaml`]
/// when parsing fails, or [`ConfigError::Validation`] when semantic validation fails.
pub fn load_config(path: &str) -> Result<BridgeConfig, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    parse_config(&contents)
}

/// Parse and validate configuration from YAML text.
///
/// # Errors
///
/// Returns [`ConfigError::Yaml`] when parsing fails or
/// [`ConfigError::Validation`] when semantic validation fails.
pub fn parse_config(contents: &str) -> Result<BridgeConfig, ConfigError> {
    let config: BridgeConfig = serde_yaml::from_str(contents)?;
    validate_config(&config)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_example_config() {
        let config = load_config("config.example.yaml");
        assert!(
            config.is_ok(),
            "Failed to load example config: {:?}",
            config.err()
        );
        let config = config.unwrap();
        assert_eq!(config.providers.len(), 3);
        assert_eq!(config.memory.limit, 50);
        let gemini = config.provider("gemini").unwrap();
        assert_eq!(gemini.provider, ProviderKind::Gemini);
        assert_eq!(gemini.resolved_defaults().model, "gemini-1.5-flash");
        assert_eq!(
            gemini.resolved_defaults().generation.max_tokens,
            Some(1024)
        );
    }

    #[test]
    fn test_provider_kind_serde() {
        let json = serde_json::to_string(&ProviderKind::OpenAi).unwrap();
        assert_eq!(json, "\"openai\"");
        let kind: ProviderKind = serde_json::from_str("\"anthropic\"").unwrap();
        assert_eq!(kind, ProviderKind::Anthropic);
    }

    #[test]
    fn test_defaults_without_explicit_block() {
        let config = parse_config(
            r"
providers:
  - name: main
    provider: openai
    api_key: sk-test
",
        )
        .unwrap();
        assert_eq!(config.log_level, "INFO");
        let defaults = config.providers[0].resolved_defaults();
        assert_eq!(defaults.model, "gpt-3.5-turbo");
        assert_eq!(defaults.generation.top_k, None);
        assert_eq!(defaults.generation.stream, Some(false));
    }

    #[test]
    fn test_default_safety_settings_block_none() {
        let settings = default_safety_settings();
        assert_eq!(settings.len(), 4);
        assert!(settings.iter().all(|s| s.threshold == "BLOCK_NONE"));
    }
}
