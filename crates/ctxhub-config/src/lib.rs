#![deny(unsafe_code)]

//! Configuration loading and validation for ctxhub.
//!
//! Loads TOML configuration files and validates them against expected schemas.
//! Provides the [`AppConfig`] type as the central configuration structure.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    Validation(String),
}

/// Top-level application configuration.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Context provider enablement and time budget.
    #[serde(default)]
    pub context_providers: ContextProvidersConfig,

    /// Runtime mode flags.
    #[serde(default)]
    pub runtime: RuntimeConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Context provider settings.
///
/// ## TOML Example
///
/// ```toml
/// [context_providers]
/// enabled = ["typescript-imports", "open-tabs"]
/// time_budget_ms = 200
/// ```
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextProvidersConfig {
    /// Provider ids to enable. `"*"` enables every registered provider.
    #[serde(default)]
    pub enabled: Vec<String>,

    /// Time budget override in milliseconds (0 = no deadline).
    /// When unset, the experiment-provided budget applies.
    #[serde(default)]
    pub time_budget_ms: Option<u64>,
}

impl ContextProvidersConfig {
    /// Whether the allow-list names this provider (directly or via `"*"`).
    pub fn allows(&self, provider_id: &str) -> bool {
        self.enabled.iter().any(|id| id == "*" || id == provider_id)
    }
}

/// Runtime mode flags.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Debug mode enables every registered provider.
    #[serde(default)]
    pub debug: bool,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g. "info", "debug", "trace").
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl AppConfig {
    /// Load configuration from a TOML file at the given path using async I/O.
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        debug!(path = %path.display(), "Loading configuration");
        let content = tokio::fs::read_to_string(path).await?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (i, id) in self.context_providers.enabled.iter().enumerate() {
            if id.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "context_providers.enabled[{i}] must not be empty"
                )));
            }
            if id.contains(',') {
                return Err(ConfigError::Validation(format!(
                    "context_providers.enabled[{i}] must not contain ',', got {id:?}"
                )));
            }
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::Validation(format!(
                "logging.level must be one of {:?}, got {:?}",
                valid_levels, self.logging.level
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert!(config.context_providers.enabled.is_empty());
        assert_eq!(config.context_providers.time_budget_ms, None);
        assert!(!config.runtime.debug);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_parse_minimal_toml() {
        let config = AppConfig::parse("").unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_parse_full_toml() {
        let toml = r#"
            [context_providers]
            enabled = ["traitProvider", "snippets"]
            time_budget_ms = 0

            [runtime]
            debug = true

            [logging]
            level = "debug"
        "#;
        let config = AppConfig::parse(toml).unwrap();
        assert_eq!(
            config.context_providers.enabled,
            vec!["traitProvider".to_string(), "snippets".to_string()]
        );
        assert_eq!(config.context_providers.time_budget_ms, Some(0));
        assert!(config.runtime.debug);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_allows() {
        let config = ContextProvidersConfig {
            enabled: vec!["a".to_string()],
            time_budget_ms: None,
        };
        assert!(config.allows("a"));
        assert!(!config.allows("b"));

        let wildcard = ContextProvidersConfig {
            enabled: vec!["*".to_string()],
            time_budget_ms: None,
        };
        assert!(wildcard.allows("anything"));
    }

    #[test]
    fn test_validation_rejects_comma_in_enabled_id() {
        let toml = r#"
            [context_providers]
            enabled = ["in,valid"]
        "#;
        let result = AppConfig::parse(toml);
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_validation_rejects_empty_enabled_id() {
        let toml = r#"
            [context_providers]
            enabled = [""]
        "#;
        assert!(AppConfig::parse(toml).is_err());
    }

    #[test]
    fn test_validation_rejects_bad_log_level() {
        let toml = r#"
            [logging]
            level = "loud"
        "#;
        assert!(AppConfig::parse(toml).is_err());
    }

    #[test]
    fn test_parse_rejects_negative_budget() {
        let toml = r#"
            [context_providers]
            time_budget_ms = -5
        "#;
        assert!(matches!(
            AppConfig::parse(toml),
            Err(ConfigError::Parse(_))
        ));
    }

    // ── Async file-based loading ──────────────────────────────────────

    #[tokio::test]
    async fn test_load_from_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("ctxhub.toml");
        tokio::fs::write(
            &path,
            b"[context_providers]\nenabled = [\"*\"]\ntime_budget_ms = 75\n",
        )
        .await
        .unwrap();

        let config = AppConfig::load(&path).await.unwrap();
        assert_eq!(config.context_providers.enabled, vec!["*".to_string()]);
        assert_eq!(config.context_providers.time_budget_ms, Some(75));
    }

    #[tokio::test]
    async fn test_load_nonexistent_file() {
        let result = AppConfig::load(Path::new("/nonexistent/file.toml")).await;
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[tokio::test]
    async fn test_load_invalid_toml_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("bad.toml");
        tokio::fs::write(&path, b"not valid toml [[[")
            .await
            .unwrap();

        let result = AppConfig::load(&path).await;
        assert!(result.is_err());
    }

    // ── Error display ─────────────────────────────────────────────────

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::Validation("bad value".to_string());
        assert_eq!(err.to_string(), "validation error: bad value");
    }
}
