//! Configuration Loader
//!
//! Environment-aware loading with the `config` crate. Sources are merged in
//! order, later sources overriding earlier ones:
//!
//! 1. `{config_dir}/fleet-sync.toml` (required)
//! 2. `{config_dir}/fleet-sync.{environment}.toml` (optional)
//! 3. `FLEET_SYNC__SECTION__FIELD` environment variables
//!
//! e.g. `FLEET_SYNC__TELEMETRY_PROVIDER__POLL_INTERVAL_MS=5000`.

use config::{Config, Environment, File, FileFormat};
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use super::error::{ConfigResult, ConfigurationError};
use super::FleetSyncConfig;

const BASE_FILE: &str = "fleet-sync.toml";
const ENV_PREFIX: &str = "FLEET_SYNC";
const ENV_SEPARATOR: &str = "__";

#[derive(Debug, Clone)]
pub struct ConfigManager {
    config: FleetSyncConfig,
    environment: String,
    config_directory: PathBuf,
}

impl ConfigManager {
    /// Load with environment and directory auto-detection
    pub fn load() -> ConfigResult<Arc<ConfigManager>> {
        Self::load_from_directory(None)
    }

    pub fn load_from_directory(config_dir: Option<PathBuf>) -> ConfigResult<Arc<ConfigManager>> {
        let environment = Self::detect_environment();
        Self::load_from_directory_with_env(config_dir, &environment)
    }

    /// Load from a directory with an explicit environment name
    pub fn load_from_directory_with_env(
        config_dir: Option<PathBuf>,
        environment: &str,
    ) -> ConfigResult<Arc<ConfigManager>> {
        Self::load_with_overrides(config_dir, environment, None)
    }

    /// Load with an explicit variable map standing in for the process environment
    pub fn load_with_overrides(
        config_dir: Option<PathBuf>,
        environment: &str,
        variables: Option<HashMap<String, String>>,
    ) -> ConfigResult<Arc<ConfigManager>> {
        let config_directory = config_dir.unwrap_or_else(Self::default_config_directory);

        debug!(
            "Loading configuration for environment '{}' from directory: {}",
            environment,
            config_directory.display()
        );

        let config = Self::load_and_merge_config(&config_directory, environment, variables)?;
        config.validate()?;

        info!(
            environment = %environment,
            telemetry_provider = %config.telemetry_provider.name,
            assignment_provider = %config.assignment_provider.name,
            "Configuration loaded successfully"
        );

        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory,
        }))
    }

    /// Wrap an already-built configuration, validating it first
    pub fn from_config(config: FleetSyncConfig, environment: impl Into<String>) -> ConfigResult<Self> {
        config.validate()?;
        Ok(ConfigManager {
            config,
            environment: environment.into(),
            config_directory: Self::default_config_directory(),
        })
    }

    pub fn config(&self) -> &FleetSyncConfig {
        &self.config
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn config_directory(&self) -> &Path {
        &self.config_directory
    }

    /// JSON view of the merged configuration for logs and diagnostics
    pub fn debug_config(&self) -> serde_json::Value {
        serde_json::to_value(&self.config).unwrap_or(serde_json::Value::Null)
    }

    fn load_and_merge_config(
        config_directory: &Path,
        environment: &str,
        variables: Option<HashMap<String, String>>,
    ) -> ConfigResult<FleetSyncConfig> {
        let base_path = config_directory.join(BASE_FILE);
        if !base_path.is_file() {
            return Err(ConfigurationError::ConfigFileNotFound { path: base_path });
        }

        let environment_path = config_directory.join(format!("fleet-sync.{environment}.toml"));
        if environment_path.is_file() {
            debug!("Applying environment overrides from {}", environment_path.display());
        }

        let settings = Config::builder()
            .add_source(File::from(base_path).format(FileFormat::Toml).required(true))
            .add_source(
                File::from(environment_path)
                    .format(FileFormat::Toml)
                    .required(false),
            )
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator(ENV_SEPARATOR)
                    .separator(ENV_SEPARATOR)
                    .try_parsing(true)
                    .source(variables),
            )
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// `FLEET_SYNC_ENV`, then `APP_ENV`, defaulting to development
    pub fn detect_environment() -> String {
        env::var("FLEET_SYNC_ENV")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string())
            .to_lowercase()
    }

    fn default_config_directory() -> PathBuf {
        env::var("FLEET_SYNC_CONFIG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config"))
    }
}
