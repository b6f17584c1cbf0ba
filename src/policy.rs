//! Idle-determination policy.
//!
//! Reduces collected observations into a single [`Verdict`]:
//! - A kernel that is not `idle` is active
//! - Connected clients count as activity unless `ignore_connections` is set
//! - Otherwise an entity is idle once its last activity is older than the threshold
//!
//! With no sessions, the instance's last-modified time stands in for them.
//! Terminals are always checked.

use std::fmt;

use chrono::DateTime;
use chrono::Utc;
use tracing::info;

use crate::collector::Observations;
use crate::collector::SessionSignal;
use crate::config::PolicyConfig;
use crate::domain::ExecutionState;
use crate::domain::InstanceState;
use crate::domain::Session;
use crate::domain::Terminal;
use crate::error::Result;
use crate::timestamp::format_activity_timestamp;
use crate::timestamp::is_instant_idle;
use crate::timestamp::parse_activity_timestamp;

/// Why an entity counts as active.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Blocker {
    /// Kernel is executing or otherwise not `idle`.
    KernelNotIdle {
        session: String,
        state: ExecutionState,
    },

    /// Kernel has connected clients.
    ConnectedClients { session: String, connections: u64 },

    /// Kernel activity within the threshold.
    RecentSessionActivity {
        session: String,
        last_activity: DateTime<Utc>,
    },

    /// Instance modified within the threshold (no sessions).
    RecentInstanceModification { last_modified_time: DateTime<Utc> },

    /// Terminal activity within the threshold.
    RecentTerminalActivity {
        terminal: String,
        last_activity: DateTime<Utc>,
    },
}

impl fmt::Display for Blocker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::KernelNotIdle { session, state } => {
                write!(f, "session {session}: kernel is {}", state.as_str())
            }
            Self::ConnectedClients {
                session,
                connections,
            } => write!(f, "session {session}: {connections} connected client(s)"),
            Self::RecentSessionActivity {
                session,
                last_activity,
            } => write!(
                f,
                "session {session}: last activity {}",
                format_activity_timestamp(*last_activity)
            ),
            Self::RecentInstanceModification { last_modified_time } => write!(
                f,
                "instance: last modified {}",
                format_activity_timestamp(*last_modified_time)
            ),
            Self::RecentTerminalActivity {
                terminal,
                last_activity,
            } => write!(
                f,
                "terminal {terminal}: last activity {}",
                format_activity_timestamp(*last_activity)
            ),
        }
    }
}

/// Outcome of one evaluation.
///
/// Starts idle. Every recorded blocker makes it active, and nothing removes a
/// blocker, so the verdict never returns to idle within a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Verdict {
    blockers: Vec<Blocker>,
}

impl Verdict {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_idle(&self) -> bool {
        self.blockers.is_empty()
    }

    /// Entities that kept the instance active, in evaluation order.
    pub fn blockers(&self) -> &[Blocker] {
        &self.blockers
    }

    fn record(&mut self, blocker: Option<Blocker>) {
        if let Some(blocker) = blocker {
            info!("Not idle: {}", blocker);
            self.blockers.push(blocker);
        }
    }
}

/// Applies the idle policy to observations.
#[derive(Debug, Clone, Copy)]
pub struct IdleEvaluator {
    policy: PolicyConfig,
}

impl IdleEvaluator {
    pub fn new(policy: PolicyConfig) -> Self {
        Self { policy }
    }

    /// Check one session. `None` means idle.
    pub fn session_blocker(&self, session: &Session, now: DateTime<Utc>) -> Result<Option<Blocker>> {
        let kernel = &session.kernel;

        if kernel.execution_state != ExecutionState::Idle {
            return Ok(Some(Blocker::KernelNotIdle {
                session: session.label().to_string(),
                state: kernel.execution_state,
            }));
        }

        if !self.policy.ignore_connections && kernel.connections > 0 {
            return Ok(Some(Blocker::ConnectedClients {
                session: session.label().to_string(),
                connections: kernel.connections,
            }));
        }

        let last_activity = parse_activity_timestamp(&kernel.last_activity)?;
        if is_instant_idle(last_activity, self.policy.idle_threshold, now) {
            info!(
                "Session {} is idle, last activity {}",
                session.label(),
                kernel.last_activity
            );
            Ok(None)
        } else {
            Ok(Some(Blocker::RecentSessionActivity {
                session: session.label().to_string(),
                last_activity,
            }))
        }
    }

    /// Check the instance fallback. `None` means idle.
    pub fn instance_blocker(&self, state: &InstanceState, now: DateTime<Utc>) -> Option<Blocker> {
        if is_instant_idle(state.last_modified_time, self.policy.idle_threshold, now) {
            info!(
                "Instance is idle, last modified {}",
                format_activity_timestamp(state.last_modified_time)
            );
            None
        } else {
            Some(Blocker::RecentInstanceModification {
                last_modified_time: state.last_modified_time,
            })
        }
    }

    /// Check one terminal. `None` means idle.
    pub fn terminal_blocker(&self, terminal: &Terminal, now: DateTime<Utc>) -> Result<Option<Blocker>> {
        let last_activity = parse_activity_timestamp(&terminal.last_activity)?;
        if is_instant_idle(last_activity, self.policy.idle_threshold, now) {
            info!(
                "Terminal {} is idle, last activity {}",
                terminal.label(),
                terminal.last_activity
            );
            Ok(None)
        } else {
            Ok(Some(Blocker::RecentTerminalActivity {
                terminal: terminal.label().to_string(),
                last_activity,
            }))
        }
    }

    /// Reduce all observations into one verdict.
    pub fn evaluate(&self, observations: &Observations, now: DateTime<Utc>) -> Result<Verdict> {
        let mut verdict = Verdict::new();

        match observations.sessions {
            SessionSignal::Sessions(ref sessions) => {
                for session in sessions {
                    verdict.record(self.session_blocker(session, now)?);
                }
            }
            SessionSignal::Fallback(ref state) => {
                verdict.record(self.instance_blocker(state, now));
            }
        }

        for terminal in &observations.terminals {
            verdict.record(self.terminal_blocker(terminal, now)?);
        }

        Ok(verdict)
    }
}
