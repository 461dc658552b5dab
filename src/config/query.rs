use std::time::Duration;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Query seam parameters
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct QueryConfig {
    /// Deadline for one statement, including reading the response body
    #[serde(default = "default_query_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_query_timeout_ms(),
        }
    }
}

impl QueryConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.timeout_ms == 0 {
            return Err(Error::Config(ConfigError::Message(
                "query.timeout_ms must be greater than 0".into(),
            )));
        }
        Ok(())
    }
}

fn default_query_timeout_ms() -> u64 {
    60_000
}
