//! Activity collection.
//!
//! Gathers raw observations from the local Jupyter API and, when no sessions
//! exist, from the control plane.

use std::path::Path;

use tracing::info;

use crate::domain::InstanceState;
use crate::domain::Session;
use crate::domain::Terminal;
use crate::error::Result;
use crate::jupyter::KernelApi;
use crate::metadata::InstanceIdentity;
use crate::sagemaker::ControlPlane;

/// Session-level signal: either the live sessions or the instance fallback.
#[derive(Debug, Clone)]
pub enum SessionSignal {
    /// At least one session was listed.
    Sessions(Vec<Session>),

    /// No sessions were listed; the instance state stands in for them.
    Fallback(InstanceState),
}

/// Everything one run observed.
#[derive(Debug, Clone)]
pub struct Observations {
    pub sessions: SessionSignal,
    pub terminals: Vec<Terminal>,

    /// Identity read for the fallback describe, reused for the stop call.
    pub identity: Option<InstanceIdentity>,
}

/// Polls activity sources in a fixed order.
pub struct ActivityCollector<'a, K, C> {
    kernel_api: &'a K,
    control_plane: &'a C,
    metadata_path: &'a Path,
}

impl<'a, K: KernelApi, C: ControlPlane> ActivityCollector<'a, K, C> {
    pub fn new(kernel_api: &'a K, control_plane: &'a C, metadata_path: &'a Path) -> Self {
        Self {
            kernel_api,
            control_plane,
            metadata_path,
        }
    }

    /// Describe this instance on the control plane.
    pub async fn fetch_instance_state(&self, identity: &InstanceIdentity) -> Result<InstanceState> {
        self.control_plane.describe_instance(&identity.name).await
    }

    /// Collect sessions (or the fallback), then terminals.
    pub async fn collect(&self) -> Result<Observations> {
        let sessions = self.kernel_api.fetch_sessions().await?;

        let (sessions, identity) = if sessions.is_empty() {
            info!("No kernel sessions, checking notebook instance last modified time");
            let identity = InstanceIdentity::load(self.metadata_path)?;
            let state = self.fetch_instance_state(&identity).await?;
            (SessionSignal::Fallback(state), Some(identity))
        } else {
            info!("Found {} kernel session(s)", sessions.len());
            (SessionSignal::Sessions(sessions), None)
        };

        let terminals = self.kernel_api.fetch_terminals().await?;
        if !terminals.is_empty() {
            info!("Found {} terminal(s)", terminals.len());
        }

        Ok(Observations {
            sessions,
            terminals,
            identity,
        })
    }
}
