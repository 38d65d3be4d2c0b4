//! Configuration manager
//!
//! Layers built-in defaults, an optional configuration file and environment
//! variables (prefix `LLM_MANAGER_`, nested keys separated by `__`, e.g.
//! `LLM_MANAGER_REAPER__INTERVAL_SECS=60`).

use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use common::error::{Error, Result};

use crate::schema::ManagerConfig;
use crate::validation;

/// Environment variable prefix
pub const ENV_PREFIX: &str = "LLM_MANAGER";

/// Loaded, validated configuration shared by all components
#[derive(Debug, Clone)]
pub struct ConfigManager {
    /// Effective configuration
    settings: Arc<ManagerConfig>,
}

impl ConfigManager {
    /// Loads configuration from defaults, `path` (if given) and the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            info!("Loading configuration from {:?}", path);
            builder = builder.add_source(config::File::from(path).required(true));
        }

        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );

        let settings: ManagerConfig = builder
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| Error::Config(e.to_string()))?;

        Self::from_settings(settings)
    }

    /// Wraps an already-built configuration after validating it
    pub fn from_settings(settings: ManagerConfig) -> Result<Self> {
        validation::validate(&settings)?;

        debug!("Effective configuration: {:?}", settings);

        Ok(Self {
            settings: Arc::new(settings),
        })
    }

    /// Effective configuration
    pub fn settings(&self) -> &ManagerConfig {
        &self.settings
    }

    /// Renders the effective configuration as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self.settings.as_ref()).map_err(|e| Error::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{LogFormat, StorageBackend};
    use std::io::Write;

    #[test]
    fn test_defaults_without_file() {
        let manager = ConfigManager::from_settings(ManagerConfig::default()).unwrap();
        let settings = manager.settings();
        assert_eq!(settings.naming.resource_prefix, "LLManager");
        assert_eq!(settings.reaper.interval_secs, 300);
        assert_eq!(settings.provisioning.registration_retry.max_attempts, 5);
        assert_eq!(settings.timeouts.idle_timeout_minutes, 300);
        assert_eq!(settings.timeouts.utilization_threshold, 0.05);
    }

    #[test]
    fn test_load_partial_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[reaper]
interval_secs = 60
sample_period_secs = 300

[storage]
backend = "file"
path = "/tmp/policies.json"

[logging]
format = "json"
"#
        )
        .unwrap();

        let manager = ConfigManager::load(Some(file.path())).unwrap();
        let settings = manager.settings();
        assert_eq!(settings.reaper.interval_secs, 60);
        assert_eq!(settings.reaper.sample_period_secs, 300);
        assert_eq!(settings.reaper.metric_name, "GPUUtilization");
        assert_eq!(settings.storage.backend, StorageBackend::File);
        assert_eq!(settings.logging.format, LogFormat::Json);
        assert_eq!(settings.naming.variant_name, "dev");
    }

    #[test]
    fn test_invalid_file_is_rejected() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[reaper]\ninterval_secs = 0").unwrap();

        let err = ConfigManager::load(Some(file.path())).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let err = ConfigManager::load(Some(Path::new("/nonexistent/llm-manager.toml"))).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_to_toml_contains_sections() {
        let manager = ConfigManager::from_settings(ManagerConfig::default()).unwrap();
        let rendered = manager.to_toml().unwrap();
        assert!(rendered.contains("[reaper]"));
        assert!(rendered.contains("resource_prefix = \"LLManager\""));
    }
}
