use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

/// Log output settings for the harness binary
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LogConfig {
    /// When set, logs go to `<log_dir>/compat-harness.log` instead of stderr
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// Fallback filter when `RUST_LOG` is not set
    #[serde(default = "default_filter")]
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            log_dir: None,
            filter: default_filter(),
        }
    }
}

fn default_filter() -> String {
    "info".to_string()
}
