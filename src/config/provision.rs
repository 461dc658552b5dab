use std::time::Duration;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use super::BackoffPolicy;
use crate::Error;
use crate::Result;

/// Container runtime settings used to bring nodes up and down
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ProvisionConfig {
    /// Container runtime CLI
    ///
    /// Default: `docker`
    #[serde(default = "default_runtime_bin")]
    pub runtime_bin: String,

    /// Server image shared by every node unless a node overrides it
    #[serde(default = "default_image")]
    pub image: String,

    /// Image tag standing in for the `current` version
    #[serde(default = "default_current_tag")]
    pub current_tag: String,

    /// HTTP query port inside the container
    #[serde(default = "default_http_port")]
    pub http_port: u16,

    /// Prefix for container and network names; a random suffix is appended per run
    #[serde(default = "default_name_prefix")]
    pub name_prefix: String,

    /// Coordination service image, started only when a node asks for it
    #[serde(default = "default_coordination_image")]
    pub coordination_image: String,

    /// Upper bound on the time a node may take to answer the readiness probe
    #[serde(default = "default_startup_timeout_ms")]
    pub startup_timeout_ms: u64,

    /// Polling policy for the readiness probe
    #[serde(default)]
    pub readiness: BackoffPolicy,

    /// `KEY=VALUE` environment passed to every server container.
    ///
    /// Default keeps network access open for the passwordless `default` user.
    #[serde(default = "default_env")]
    pub env: Vec<String>,
}

impl Default for ProvisionConfig {
    fn default() -> Self {
        Self {
            runtime_bin: default_runtime_bin(),
            image: default_image(),
            current_tag: default_current_tag(),
            http_port: default_http_port(),
            name_prefix: default_name_prefix(),
            coordination_image: default_coordination_image(),
            startup_timeout_ms: default_startup_timeout_ms(),
            readiness: BackoffPolicy::default(),
            env: default_env(),
        }
    }
}

impl ProvisionConfig {
    pub fn startup_timeout(&self) -> Duration {
        Duration::from_millis(self.startup_timeout_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.runtime_bin.trim().is_empty() {
            return Err(Error::Config(ConfigError::Message(
                "provision.runtime_bin cannot be empty".into(),
            )));
        }

        if self.image.trim().is_empty() || self.current_tag.trim().is_empty() {
            return Err(Error::Config(ConfigError::Message(
                "provision.image and provision.current_tag cannot be empty".into(),
            )));
        }

        if self.http_port == 0 {
            return Err(Error::Config(ConfigError::Message(
                "provision.http_port must be non-zero".into(),
            )));
        }

        if !self
            .name_prefix
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
            || self.name_prefix.is_empty()
        {
            return Err(Error::Config(ConfigError::Message(format!(
                "provision.name_prefix {:?} must be lowercase alphanumeric or '-'",
                self.name_prefix
            ))));
        }

        if self.startup_timeout_ms < self.readiness.timeout_ms {
            return Err(Error::Config(ConfigError::Message(format!(
                "provision.startup_timeout_ms {} is shorter than a single readiness attempt {}ms",
                self.startup_timeout_ms, self.readiness.timeout_ms
            ))));
        }

        for var in &self.env {
            if !matches!(var.split_once('='), Some((key, _)) if !key.is_empty()) {
                return Err(Error::Config(ConfigError::Message(format!(
                    "provision.env entry {var:?} must look like KEY=VALUE"
                ))));
            }
        }

        self.readiness.validate()
    }
}

fn default_runtime_bin() -> String {
    "docker".to_string()
}
fn default_image() -> String {
    "clickhouse/clickhouse-server".to_string()
}
fn default_current_tag() -> String {
    "latest".to_string()
}
fn default_http_port() -> u16 {
    8123
}
fn default_name_prefix() -> String {
    "compat".to_string()
}
fn default_coordination_image() -> String {
    "zookeeper:3.8".to_string()
}
fn default_env() -> Vec<String> {
    vec!["CLICKHOUSE_SKIP_USER_SETUP=1".to_string()]
}
fn default_startup_timeout_ms() -> u64 {
    120_000
}
