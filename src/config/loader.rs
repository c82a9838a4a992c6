//! Configuration Loader
//!
//! Environment-aware configuration loading. Sources are layered in order, later
//! sources overriding earlier ones:
//!
//! 1. `config/importer.toml` (optional)
//! 2. `config/importer.{environment}.toml` (optional)
//! 3. `IMPORTER__SECTION__KEY` environment variables

use super::error::{ConfigResult, ConfigurationError};
use super::ImporterConfig;
use config::{Config, Environment, File};
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

const BASE_FILE_STEM: &str = "importer";
const ENV_PREFIX: &str = "IMPORTER";

/// Loaded, validated configuration plus where it came from
#[derive(Debug)]
pub struct ConfigManager {
    config: ImporterConfig,
    environment: String,
    config_directory: PathBuf,
}

impl ConfigManager {
    /// Load configuration with environment auto-detection
    pub fn load() -> ConfigResult<Arc<ConfigManager>> {
        Self::load_from_directory(None)
    }

    /// Load configuration from a specific directory
    pub fn load_from_directory(config_dir: Option<PathBuf>) -> ConfigResult<Arc<ConfigManager>> {
        let environment = Self::detect_environment();
        Self::load_from_directory_with_env(config_dir, &environment)
    }

    /// Load configuration from a specific directory with explicit environment.
    /// Useful for tests that should not touch process environment variables.
    pub fn load_from_directory_with_env(
        config_dir: Option<PathBuf>,
        environment: &str,
    ) -> ConfigResult<Arc<ConfigManager>> {
        let config_directory = config_dir.unwrap_or_else(|| PathBuf::from("config"));

        debug!(
            environment = %environment,
            directory = %config_directory.display(),
            "Loading importer configuration"
        );

        let settings = Config::builder()
            .add_source(File::from(Self::file_path(&config_directory, None)).required(false))
            .add_source(
                File::from(Self::file_path(&config_directory, Some(environment))).required(false),
            )
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override("environment", environment)?
            .build()?;

        let config: ImporterConfig =
            settings
                .try_deserialize()
                .map_err(|e| ConfigurationError::LoadFailed {
                    source_name: config_directory.display().to_string(),
                    reason: e.to_string(),
                })?;

        config.validate()?;

        info!(
            environment = %environment,
            max_attempts = config.retry.max_attempts,
            health_cache_ttl_ms = config.health.cache_ttl_ms,
            worker_concurrency = config.workers.concurrency,
            max_concurrent_files = config.ingestion.max_concurrent_files,
            "⚙️ Configuration loaded"
        );

        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory,
        }))
    }

    /// Wrap an already-built configuration, validating it first
    pub fn from_config(config: ImporterConfig) -> ConfigResult<Arc<ConfigManager>> {
        config.validate()?;
        let environment = if config.environment.is_empty() {
            Self::detect_environment()
        } else {
            config.environment.clone()
        };
        Ok(Arc::new(ConfigManager {
            config,
            environment,
            config_directory: PathBuf::from("config"),
        }))
    }

    pub fn config(&self) -> &ImporterConfig {
        &self.config
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn config_directory(&self) -> &Path {
        &self.config_directory
    }

    /// Detect current environment from environment variables
    pub fn detect_environment() -> String {
        env::var("IMPORTER_ENV")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string())
            .to_lowercase()
    }

    fn file_path(directory: &Path, environment: Option<&str>) -> PathBuf {
        match environment {
            Some(env) => directory.join(format!("{BASE_FILE_STEM}.{env}.toml")),
            None => directory.join(format!("{BASE_FILE_STEM}.toml")),
        }
    }
}
