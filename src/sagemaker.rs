//! SageMaker control plane via the aws CLI.
//!
//! Builds and spawns `aws sagemaker ...` commands to describe and stop the
//! notebook instance.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;
use serde_json::Value;
use tokio::process::Command;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::trace;

use crate::config::Config;
use crate::domain::InstanceState;
use crate::error::AutostopError;
use crate::error::Result;

const DESCRIBE_OPERATION: &str = "describe-notebook-instance";
const STOP_OPERATION: &str = "stop-notebook-instance";

/// Cloud-side operations on the notebook instance.
#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// Describe the instance; only `LastModifiedTime` is consumed.
    async fn describe_instance(&self, name: &str) -> Result<InstanceState>;

    /// Stop the instance. The response is not consumed.
    async fn stop_instance(&self, name: &str) -> Result<()>;
}

/// aws CLI client for the SageMaker API.
#[derive(Debug)]
pub struct SageMakerCli {
    /// Path to the aws binary.
    cli_path: PathBuf,

    /// Optional `--region`.
    region: Option<String>,

    /// Optional `--profile`.
    profile: Option<String>,
}

impl SageMakerCli {
    /// Create a client from config.
    pub fn from_config(config: &Config) -> Result<Self> {
        let cli_path = match config.aws_cli_path {
            Some(ref path) if !path.exists() => {
                return Err(AutostopError::Configuration(format!(
                    "Configured aws CLI path does not exist: {}",
                    path.display()
                )));
            }
            Some(ref path) => path.clone(),
            None => PathBuf::from("aws"),
        };
        debug!("Using aws CLI: {}", cli_path.display());

        Ok(Self {
            cli_path,
            region: config.aws_region.clone(),
            profile: config.aws_profile.clone(),
        })
    }

    /// Build command line arguments for one SageMaker operation.
    fn build_args(&self, operation: &str, instance_name: &str) -> Vec<String> {
        let mut args = vec![
            "sagemaker".to_string(),
            operation.to_string(),
            "--notebook-instance-name".to_string(),
            instance_name.to_string(),
            "--output".to_string(),
            "json".to_string(),
        ];

        if let Some(ref region) = self.region {
            args.push("--region".to_string());
            args.push(region.clone());
        }

        if let Some(ref profile) = self.profile {
            args.push("--profile".to_string());
            args.push(profile.clone());
        }

        args
    }

    /// Run one operation and return its stdout.
    async fn invoke(&self, operation: &str, instance_name: &str) -> Result<String> {
        let args = self.build_args(operation, instance_name);
        let endpoint = format!("sagemaker {operation}");

        debug!("Running: {} {}", self.cli_path.display(), args.join(" "));

        let output = Command::new(&self.cli_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| AutostopError::transport(&endpoint, format!("failed to spawn aws CLI: {e}")))?
            .wait_with_output()
            .await
            .map_err(|e| AutostopError::transport(&endpoint, format!("failed to wait for aws CLI: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            error!(
                "aws CLI failed (exit code {:?}): {}",
                output.status.code(),
                stderr.trim()
            );
            return Err(AutostopError::transport(
                endpoint,
                format!("aws CLI exited with code {:?}", output.status.code()),
            ));
        }

        trace!("aws CLI succeeded");
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl ControlPlane for SageMakerCli {
    async fn describe_instance(&self, name: &str) -> Result<InstanceState> {
        let stdout = self.invoke(DESCRIBE_OPERATION, name).await?;
        let last_modified_time = parse_last_modified(&stdout)?;
        Ok(InstanceState { last_modified_time })
    }

    async fn stop_instance(&self, name: &str) -> Result<()> {
        self.invoke(STOP_OPERATION, name).await?;
        info!("Stop requested for notebook instance {}", name);
        Ok(())
    }
}

/// Extract `LastModifiedTime` from describe output.
///
/// The aws CLI prints timestamps as ISO 8601 by default and as epoch seconds
/// when `cli_timestamp_format = none`.
fn parse_last_modified(stdout: &str) -> Result<DateTime<Utc>> {
    let endpoint = format!("sagemaker {DESCRIBE_OPERATION}");
    let response: Value = serde_json::from_str(stdout)
        .map_err(|e| AutostopError::transport(&endpoint, format!("malformed response: {e}")))?;

    match response.get("LastModifiedTime") {
        Some(Value::String(text)) => DateTime::parse_from_rfc3339(text)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|_| AutostopError::Format {
                value: text.clone(),
                expected: "RFC 3339",
            }),
        Some(Value::Number(number)) => number
            .as_f64()
            .and_then(epoch_seconds_to_utc)
            .ok_or_else(|| AutostopError::Format {
                value: number.to_string(),
                expected: "epoch seconds",
            }),
        _ => Err(AutostopError::transport(
            endpoint,
            "response has no LastModifiedTime",
        )),
    }
}

#[allow(clippy::cast_possible_truncation)]
fn epoch_seconds_to_utc(secs: f64) -> Option<DateTime<Utc>> {
    if !secs.is_finite() {
        return None;
    }
    DateTime::from_timestamp_micros((secs * 1_000_000.0).round() as i64)
}
