//! Configuration loading and defaults for notebook-autostop.

use std::path::Path;
use std::path::PathBuf;

use anyhow::Context;
use chrono::TimeDelta;
use serde::Deserialize;
use serde::Serialize;

use crate::error::AutostopError;

/// Default Jupyter server port on SageMaker notebook instances.
pub const DEFAULT_PORT: u16 = 8443;

/// Where SageMaker writes the notebook instance identity.
pub const DEFAULT_METADATA_PATH: &str = "/opt/ml/metadata/resource-metadata.json";

/// File-level configuration. Every field has a default, so the file is optional.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Jupyter server port (default: 8443).
    pub port: u16,

    /// Treat connected clients as idle (default: false).
    pub ignore_connections: bool,

    /// Path to the instance metadata JSON.
    pub metadata_path: PathBuf,

    /// Path to the aws CLI binary.
    /// If unset, `aws` is resolved from PATH.
    pub aws_cli_path: Option<PathBuf>,

    /// Forwarded to aws as `--region`.
    pub aws_region: Option<String>,

    /// Forwarded to aws as `--profile`.
    pub aws_profile: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            ignore_connections: false,
            metadata_path: PathBuf::from(DEFAULT_METADATA_PATH),
            aws_cli_path: None,
            aws_region: None,
            aws_profile: None,
        }
    }
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Load configuration from the given path, the default path, or defaults.
    pub fn load_or_default(path: Option<&Path>) -> anyhow::Result<Self> {
        if let Some(p) = path {
            return Self::load(p);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let default_path = config_dir.join("notebook-autostop").join("config.toml");
            if default_path.exists() {
                return Self::load(&default_path);
            }
        }

        Ok(Self::default())
    }
}

/// Immutable policy for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolicyConfig {
    /// Inactivity after which an entity counts as idle.
    pub idle_threshold: TimeDelta,

    /// When set, connected clients do not block idleness.
    pub ignore_connections: bool,

    /// Local Jupyter API port.
    pub port: u16,
}

impl PolicyConfig {
    /// Build a policy from a threshold given in minutes.
    ///
    /// Zero minutes is rejected the same way a missing threshold is.
    pub fn from_minutes(
        minutes: u64,
        ignore_connections: bool,
        port: u16,
    ) -> Result<Self, AutostopError> {
        if minutes == 0 {
            return Err(AutostopError::Configuration(
                "idle time must be at least one minute".to_string(),
            ));
        }

        let idle_threshold = minutes
            .checked_mul(60)
            .and_then(|secs| i64::try_from(secs).ok())
            .and_then(TimeDelta::try_seconds)
            .ok_or_else(|| {
                AutostopError::Configuration(format!("idle time of {minutes} minutes is too large"))
            })?;

        Ok(Self {
            idle_threshold,
            ignore_connections,
            port,
        })
    }

    /// Threshold in whole seconds, for logging.
    pub fn threshold_seconds(&self) -> i64 {
        self.idle_threshold.num_seconds()
    }
}
