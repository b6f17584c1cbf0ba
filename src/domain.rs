//! Domain types for Jupyter activity signals.
//!
//! These mirror the JSON returned by the Jupyter server's `/api/sessions` and
//! `/api/terminals` endpoints. They live only for the duration of one run.

use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

/// Kernel execution state as reported by the Jupyter server.
///
/// Only `idle` counts as idle. Anything else (including states this crate does
/// not know about) counts as activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionState {
    Idle,
    Busy,
    Starting,
    Restarting,
    Dead,
    #[serde(other)]
    Unknown,
}

impl ExecutionState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Busy => "busy",
            Self::Starting => "starting",
            Self::Restarting => "restarting",
            Self::Dead => "dead",
            Self::Unknown => "unknown",
        }
    }
}

/// Kernel attached to a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Kernel {
    #[serde(default)]
    pub id: Option<String>,

    #[serde(default)]
    pub name: Option<String>,

    pub execution_state: ExecutionState,

    /// Number of connected clients (browser tabs, consoles).
    pub connections: u64,

    /// Last activity in the fixed `%Y-%m-%dT%H:%M:%S.%6fz` format.
    pub last_activity: String,
}

/// One live kernel session, backing a notebook document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    #[serde(default)]
    pub id: Option<String>,

    #[serde(default)]
    pub path: Option<String>,

    pub kernel: Kernel,
}

impl Session {
    /// Human-readable label for logs.
    pub fn label(&self) -> &str {
        self.path
            .as_deref()
            .or(self.id.as_deref())
            .or(self.kernel.id.as_deref())
            .unwrap_or("<unnamed session>")
    }
}

/// One open terminal hosted by the notebook server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Terminal {
    #[serde(default)]
    pub name: Option<String>,

    pub last_activity: String,
}

impl Terminal {
    /// Human-readable label for logs.
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or("<unnamed terminal>")
    }
}

/// Control-plane view of the instance, consulted when no sessions exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstanceState {
    pub last_modified_time: DateTime<Utc>,
}
