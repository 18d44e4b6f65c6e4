//! Configuration builders for tests.
//!
//! Use [`TestConfigBuilder`] to create customised [`AppConfig`] values without
//! repeating boilerplate across crate boundaries, and [`TestConfigFile`] when
//! the code under test loads configuration from disk.

use std::path::{Path, PathBuf};

use ctxhub_config::{AppConfig, ConfigError};
use tempfile::TempDir;

/// Fluent builder for [`AppConfig`] in tests.
///
/// # Example
///
/// ```ignore
/// let config = TestConfigBuilder::new()
///     .enable("open-tabs")
///     .time_budget_ms(50)
///     .build();
/// ```
pub struct TestConfigBuilder {
    config: AppConfig,
}

impl TestConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: AppConfig::default(),
        }
    }

    /// Add a provider id (or `"*"`) to the enabled list.
    pub fn enable(mut self, provider_id: &str) -> Self {
        self.config
            .context_providers
            .enabled
            .push(provider_id.to_string());
        self
    }

    pub fn time_budget_ms(mut self, budget_ms: u64) -> Self {
        self.config.context_providers.time_budget_ms = Some(budget_ms);
        self
    }

    pub fn debug(mut self, debug: bool) -> Self {
        self.config.runtime.debug = debug;
        self
    }

    pub fn log_level(mut self, level: &str) -> Self {
        self.config.logging.level = level.to_string();
        self
    }

    pub fn build(self) -> AppConfig {
        self.config
    }
}

impl Default for TestConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A TOML configuration file in a temporary directory.
///
/// The directory is removed when the value is dropped.
pub struct TestConfigFile {
    _dir: TempDir,
    path: PathBuf,
}

impl TestConfigFile {
    /// Write raw TOML to `ctxhub.toml` in a fresh temporary directory.
    pub fn with_contents(contents: &str) -> std::io::Result<Self> {
        let dir = TempDir::new()?;
        let path = dir.path().join("ctxhub.toml");
        std::fs::write(&path, contents)?;
        Ok(Self { _dir: dir, path })
    }

    /// Serialize `config` and write it to a temporary file.
    pub fn from_config(config: &AppConfig) -> std::io::Result<Self> {
        let contents = toml::to_string(config)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        Self::with_contents(&contents)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the file back through [`AppConfig::load`].
    pub async fn load(&self) -> Result<AppConfig, ConfigError> {
        AppConfig::load(&self.path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_sets_provider_fields() {
        let config = TestConfigBuilder::new()
            .enable("a")
            .enable("*")
            .time_budget_ms(0)
            .debug(true)
            .build();

        assert_eq!(config.context_providers.enabled, vec!["a", "*"]);
        assert_eq!(config.context_providers.time_budget_ms, Some(0));
        assert!(config.runtime.debug);
    }

    #[tokio::test]
    async fn test_config_file_round_trips_through_load() {
        let config = TestConfigBuilder::new()
            .enable("open-tabs")
            .time_budget_ms(75)
            .build();
        let file = TestConfigFile::from_config(&config).unwrap();

        assert_eq!(file.load().await.unwrap(), config);
    }

    #[tokio::test]
    async fn test_invalid_contents_fail_to_load() {
        let file = TestConfigFile::with_contents("[context_providers]\nenabled = [\"a,b\"]\n").unwrap();
        assert!(matches!(file.load().await, Err(ConfigError::Validation(_))));
    }
}
