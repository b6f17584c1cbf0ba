//! Notebook instance identity from the local SageMaker metadata file.

use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use crate::error::AutostopError;
use crate::error::Result;

/// Identity of the notebook instance this process runs on.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InstanceIdentity {
    #[serde(rename = "ResourceName")]
    pub name: String,

    #[serde(rename = "ResourceArn", default)]
    pub arn: Option<String>,
}

impl InstanceIdentity {
    /// Read the identity from `path`.
    ///
    /// A missing file, unreadable JSON, or an empty `ResourceName` all mean
    /// the instance cannot be identified.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            AutostopError::NotFound(format!("cannot read {}: {e}", path.display()))
        })?;

        let identity: InstanceIdentity = serde_json::from_str(&content).map_err(|e| {
            AutostopError::NotFound(format!("invalid metadata in {}: {e}", path.display()))
        })?;

        if identity.name.trim().is_empty() {
            return Err(AutostopError::NotFound(format!(
                "empty ResourceName in {}",
                path.display()
            )));
        }

        debug!(
            "Resolved notebook instance {} (arn={})",
            identity.name,
            identity.arn.as_deref().unwrap_or("unknown")
        );

        Ok(identity)
    }
}
