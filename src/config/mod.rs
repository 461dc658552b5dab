//! Configuration management for the compatibility harness.
//!
//! Provides hierarchical configuration loading and validation with:
//! - Default values as code base
//! - Configuration file support
//! - Environment variable overrides
//! - Section-wise validation
mod log;
mod provision;
mod query;
mod retry;
mod scenario;
mod topology;
pub use log::*;
pub use provision::*;
pub use query::*;
pub use retry::*;
pub use scenario::*;
pub use topology::*;

use std::env;

use config::Config;
use config::Environment;
use config::File;
use serde::Deserialize;
use serde::Serialize;

use crate::Result;

/// Environment prefix; `COMPAT__QUERY__TIMEOUT_MS=5000` overrides `query.timeout_ms`
const ENV_PREFIX: &str = "COMPAT";

/// Main configuration container
///
/// Sources, later overriding earlier:
/// 1. Default values from code implementation
/// 2. Configuration file specified by `CONFIG_PATH`
/// 3. Environment variables (highest priority)
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct HarnessConfig {
    /// Container runtime and readiness settings
    #[serde(default)]
    pub provision: ProvisionConfig,
    /// Query seam settings
    #[serde(default)]
    pub query: QueryConfig,
    /// Nodes making up the cluster
    #[serde(default)]
    pub topology: TopologyConfig,
    /// Distributed aggregation check
    #[serde(default)]
    pub scenario: ScenarioConfig,
    /// Log output
    #[serde(default)]
    pub log: LogConfig,
}

impl HarnessConfig {
    /// Loads configuration from hierarchical sources without validation.
    ///
    /// Callers MUST call `validate()` once all overrides are applied.
    ///
    /// # Examples
    /// ```ignore
    /// std::env::set_var("CONFIG_PATH", "config/compat.toml");
    /// std::env::set_var("COMPAT__SCENARIO__LIMIT", "20");
    /// let cfg = HarnessConfig::new()?.validate()?;
    /// ```
    pub fn new() -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if let Ok(config_path) = env::var("CONFIG_PATH") {
            builder = builder.add_source(File::with_name(&config_path).required(true));
        }

        let config: Self = builder.add_source(env_source()).build()?.try_deserialize()?;
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

    /// Validates every section and returns the validated instance.
    pub fn validate(self) -> Result<Self> {
        self.provision.validate()?;
        self.query.validate()?;
        self.topology.validate()?;
        self.scenario.validate()?;
        Ok(self)
    }
}

fn env_source() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .separator("__")
        .ignore_empty(true)
        .try_parsing(true)
}
