use std::collections::HashSet;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Rows inserted into one data node
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct DataLoad {
    pub node: String,
    pub rows: u64,
}

impl DataLoad {
    pub fn new(
        node: impl Into<String>,
        rows: u64,
    ) -> Self {
        Self {
            node: node.into(),
            rows,
        }
    }
}

/// Parameters of the short-strings distributed aggregation check
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ScenarioConfig {
    #[serde(default = "default_database")]
    pub database: String,

    #[serde(default = "default_table")]
    pub table: String,

    /// Node issuing the distributed query, normally the current-version node
    #[serde(default = "default_coordinator")]
    pub coordinator: String,

    /// Number of keys requested and checked
    #[serde(default = "default_limit")]
    pub limit: u64,

    /// Deliberately asymmetric volumes so small and large aggregation paths meet
    #[serde(default = "default_loads")]
    pub loads: Vec<DataLoad>,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            database: default_database(),
            table: default_table(),
            coordinator: default_coordinator(),
            limit: default_limit(),
            loads: default_loads(),
        }
    }
}

impl ScenarioConfig {
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [("database", &self.database), ("table", &self.table)] {
            if value.is_empty() || !value.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                return Err(Error::Config(ConfigError::Message(format!(
                    "scenario.{field} {value:?} must be a plain identifier"
                ))));
            }
        }

        if self.coordinator.is_empty() {
            return Err(Error::Config(ConfigError::Message(
                "scenario.coordinator cannot be empty".into(),
            )));
        }

        if self.limit == 0 {
            return Err(Error::Config(ConfigError::Message(
                "scenario.limit must be greater than 0".into(),
            )));
        }

        if self.loads.is_empty() {
            return Err(Error::Config(ConfigError::Message(
                "scenario.loads must name at least one data node".into(),
            )));
        }

        let mut seen = HashSet::new();
        for load in &self.loads {
            if !seen.insert(load.node.as_str()) {
                return Err(Error::Config(ConfigError::Message(format!(
                    "scenario.loads lists node {} twice",
                    load.node
                ))));
            }

            // Every data node must hold the whole checked key range
            if load.rows < self.limit {
                return Err(Error::Config(ConfigError::Message(format!(
                    "scenario.loads: node {} holds {} rows, fewer than limit {}",
                    load.node, load.rows, self.limit
                ))));
            }
        }

        Ok(())
    }
}

fn default_database() -> String {
    "default".to_string()
}
fn default_table() -> String {
    "tab".to_string()
}
fn default_coordinator() -> String {
    "node3".to_string()
}
fn default_limit() -> u64 {
    50
}
fn default_loads() -> Vec<DataLoad> {
    vec![DataLoad::new("node1", 50), DataLoad::new("node2", 1_000_000)]
}
