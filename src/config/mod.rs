//! Configuration management for the record server.
//!
//! Provides hierarchical configuration loading and validation with:
//! - Default values as code base
//! - Configuration file support
//! - Environment variable overrides
//! - Component-wise validation
mod monitoring;
mod registry;
mod worker;
pub use monitoring::*;
pub use registry::*;
pub use worker::*;


use std::env;
use std::fmt::Debug;

use config::Config;
use config::Environment;
use config::File;
use serde::Deserialize;
use serde::Serialize;

use crate::constants::CONFIG_ENV_PREFIX;
use crate::constants::CONFIG_PATH_ENV;
use crate::Result;

/// Main configuration container for the record server
///
/// Combines all subsystem configurations with hierarchical override support:
/// 1. Default values from code implementation
/// 2. Configuration file specified by `CONFIG_PATH`
/// 3. Environment variables with `PVA__` prefix (highest priority)
#[derive(Serialize, Deserialize, Clone, Default)]
pub struct ServerConfig {
    /// Deferred callback worker timing
    #[serde(default)]
    pub worker: CallbackWorkerConfig,
    /// Record registry behavior
    #[serde(default)]
    pub registry: RegistryConfig,
    /// Metrics exposure
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

impl Debug for ServerConfig {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("worker", &self.worker)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

impl ServerConfig {
    /// Loads configuration from hierarchical sources without validation.
    ///
    /// # Note
    /// Validation is deferred so that further overrides can be applied with
    /// `with_override_config()`. Callers MUST call `validate()` before use.
    ///
    /// # Examples
    /// ```ignore
    /// std::env::set_var("PVA__WORKER__SHUTDOWN_WAIT_TIME_MS", "250");
    /// let cfg = ServerConfig::new()?.validate()?;
    /// ```
    pub fn new() -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if let Ok(config_path) = env::var(CONFIG_PATH_ENV) {
            builder = builder.add_source(File::with_name(&config_path).required(true));
        }

        builder = builder.add_source(env_source());

        let config: Self = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Applies additional configuration overrides from file without validation.
    ///
    /// Merging order (later sources override earlier):
    /// 1. Current configuration values
    /// 2. New configuration file
    /// 3. Latest environment variables (highest priority)
    pub fn with_override_config(
        &self,
        path: &str,
    ) -> Result<Self> {
        let config: Self = Config::builder()
            .add_source(Config::try_from(self)?)
            .add_source(File::with_name(path))
            .add_source(env_source())
            .build()?
            .try_deserialize()?;
        Ok(config)
    }

    /// Validates configuration and returns validated instance.
    pub fn validate(self) -> Result<Self> {
        self.worker.validate()?;
        self.monitoring.validate()?;
        Ok(self)
    }
}

fn env_source() -> Environment {
    Environment::with_prefix(CONFIG_ENV_PREFIX)
        .separator("__")
        .ignore_empty(true)
        .try_parsing(true)
}
