//! One idle check: collect, evaluate, act.

use std::path::Path;

use chrono::Utc;
use tracing::info;

use crate::collector::ActivityCollector;
use crate::config::PolicyConfig;
use crate::error::Result;
use crate::jupyter::KernelApi;
use crate::metadata::InstanceIdentity;
use crate::policy::IdleEvaluator;
use crate::policy::Verdict;
use crate::sagemaker::ControlPlane;

/// What a completed run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Everything was idle and a stop was requested for this instance.
    Stopped { instance: String },

    /// Something was active; nothing was done.
    Active(Verdict),
}

/// Run a single idle check and stop the instance if it is idle.
///
/// Any error aborts before the stop call is made.
pub async fn run_once<K, C>(
    policy: PolicyConfig,
    kernel_api: &K,
    control_plane: &C,
    metadata_path: &Path,
) -> Result<RunOutcome>
where
    K: KernelApi,
    C: ControlPlane,
{
    let observations = ActivityCollector::new(kernel_api, control_plane, metadata_path)
        .collect()
        .await?;

    let now = Utc::now();
    let verdict = IdleEvaluator::new(policy).evaluate(&observations, now)?;

    if !verdict.is_idle() {
        info!("Notebook is active at {}", now.to_rfc3339());
        info!(
            "Not stopping notebook: {} active signal(s)",
            verdict.blockers().len()
        );
        return Ok(RunOutcome::Active(verdict));
    }

    let identity = match observations.identity {
        Some(identity) => identity,
        None => InstanceIdentity::load(metadata_path)?,
    };
    info!(
        "Stopping idle notebook instance {}: kernels and terminals idle for more than {}s",
        identity.name,
        policy.threshold_seconds()
    );
    control_plane.stop_instance(&identity.name).await?;

    Ok(RunOutcome::Stopped {
        instance: identity.name,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::tests::FakeControlPlane;
    use crate::collector::tests::FakeKernelApi;
    use crate::collector::tests::metadata_file;
    use crate::collector::tests::session;
    use crate::collector::tests::terminal;
    use crate::domain::ExecutionState;
    use crate::error::AutostopError;
    use crate::policy::Blocker;
    use crate::timestamp::format_activity_timestamp;
    use chrono::TimeDelta;

    fn minutes_ago(minutes: i64) -> String {
        format_activity_timestamp(Utc::now() - TimeDelta::minutes(minutes))
    }

    fn policy(ignore_connections: bool) -> PolicyConfig {
        PolicyConfig::from_minutes(10, ignore_connections, 8443).unwrap()
    }

    #[tokio::test]
    async fn test_idle_session_stops_instance() {
        let api = FakeKernelApi {
            sessions: vec![session(ExecutionState::Idle, 0, &minutes_ago(20))],
            ..Default::default()
        };
        let control_plane = FakeControlPlane::new(Utc::now());
        let metadata = metadata_file("research");

        let outcome = run_once(policy(false), &api, &control_plane, metadata.path())
            .await
            .unwrap();

        assert_eq!(
            outcome,
            RunOutcome::Stopped {
                instance: "research".to_string()
            }
        );
        assert_eq!(control_plane.stopped(), vec!["research".to_string()]);
        assert_eq!(control_plane.describe_count(), 0);
    }

    #[tokio::test]
    async fn test_connected_session_keeps_running() {
        let api = FakeKernelApi {
            sessions: vec![session(ExecutionState::Idle, 2, &minutes_ago(20))],
            ..Default::default()
        };
        let control_plane = FakeControlPlane::new(Utc::now());
        let metadata = metadata_file("research");

        let outcome = run_once(policy(false), &api, &control_plane, metadata.path())
            .await
            .unwrap();

        assert!(matches!(outcome, RunOutcome::Active(_)));
        assert!(control_plane.stopped().is_empty());
    }

    #[tokio::test]
    async fn test_ignored_connections_stop_instance() {
        let api = FakeKernelApi {
            sessions: vec![session(ExecutionState::Idle, 2, &minutes_ago(20))],
            ..Default::default()
        };
        let control_plane = FakeControlPlane::new(Utc::now());
        let metadata = metadata_file("research");

        let outcome = run_once(policy(true), &api, &control_plane, metadata.path())
            .await
            .unwrap();

        assert!(matches!(outcome, RunOutcome::Stopped { .. }));
    }

    #[tokio::test]
    async fn test_recently_modified_instance_is_not_stopped() {
        let api = FakeKernelApi::default();
        let control_plane = FakeControlPlane::new(Utc::now() - TimeDelta::minutes(5));
        let metadata = metadata_file("research");

        let outcome = run_once(policy(false), &api, &control_plane, metadata.path())
            .await
            .unwrap();

        match outcome {
            RunOutcome::Active(verdict) => assert!(matches!(
                verdict.blockers(),
                [Blocker::RecentInstanceModification { .. }]
            )),
            RunOutcome::Stopped { .. } => panic!("Expected instance to stay up"),
        }
        assert_eq!(control_plane.describe_count(), 1);
        assert!(control_plane.stopped().is_empty());
    }

    #[tokio::test]
    async fn test_stale_instance_without_sessions_is_stopped() {
        let api = FakeKernelApi::default();
        let control_plane = FakeControlPlane::new(Utc::now() - TimeDelta::hours(2));
        let metadata = metadata_file("research");

        let outcome = run_once(policy(false), &api, &control_plane, metadata.path())
            .await
            .unwrap();

        assert!(matches!(outcome, RunOutcome::Stopped { .. }));
        assert_eq!(control_plane.describe_count(), 1);
    }

    #[tokio::test]
    async fn test_fallback_identity_is_reused_for_stop() {
        let api = FakeKernelApi::default();
        let metadata = metadata_file("research");
        let mut control_plane = FakeControlPlane::new(Utc::now() - TimeDelta::hours(2));
        // Metadata disappears after the fallback read; stop must not read it again
        control_plane.remove_on_describe = Some(metadata.path().to_path_buf());

        let outcome = run_once(policy(false), &api, &control_plane, metadata.path())
            .await
            .unwrap();

        assert_eq!(
            outcome,
            RunOutcome::Stopped {
                instance: "research".to_string()
            }
        );
        assert_eq!(control_plane.stopped(), vec!["research".to_string()]);
    }

    #[tokio::test]
    async fn test_recent_terminal_keeps_running() {
        let api = FakeKernelApi {
            sessions: vec![session(ExecutionState::Idle, 0, &minutes_ago(20))],
            terminals: vec![terminal(&minutes_ago(1))],
            ..Default::default()
        };
        let control_plane = FakeControlPlane::new(Utc::now());
        let metadata = metadata_file("research");

        let outcome = run_once(policy(false), &api, &control_plane, metadata.path())
            .await
            .unwrap();

        assert!(matches!(outcome, RunOutcome::Active(_)));
        assert!(control_plane.stopped().is_empty());
    }

    #[tokio::test]
    async fn test_errors_never_stop() {
        let metadata = metadata_file("research");

        // Local API down
        let api = FakeKernelApi {
            fail_sessions: true,
            ..Default::default()
        };
        let control_plane = FakeControlPlane::new(Utc::now() - TimeDelta::hours(2));
        let err = run_once(policy(false), &api, &control_plane, metadata.path())
            .await
            .unwrap_err();
        assert!(matches!(err, AutostopError::Transport { .. }));
        assert!(control_plane.stopped().is_empty());

        // Control plane describe fails
        let api = FakeKernelApi::default();
        let mut control_plane = FakeControlPlane::new(Utc::now() - TimeDelta::hours(2));
        control_plane.fail_describe = true;
        let err = run_once(policy(false), &api, &control_plane, metadata.path())
            .await
            .unwrap_err();
        assert!(matches!(err, AutostopError::Transport { .. }));
        assert!(control_plane.stopped().is_empty());

        // Malformed timestamp
        let api = FakeKernelApi {
            sessions: vec![session(ExecutionState::Idle, 0, "2024-03-01 10:00:00")],
            ..Default::default()
        };
        let control_plane = FakeControlPlane::new(Utc::now());
        let err = run_once(policy(false), &api, &control_plane, metadata.path())
            .await
            .unwrap_err();
        assert!(matches!(err, AutostopError::Format { .. }));
        assert!(control_plane.stopped().is_empty());
    }

    #[tokio::test]
    async fn test_idle_without_metadata_is_not_found() {
        let api = FakeKernelApi {
            sessions: vec![session(ExecutionState::Idle, 0, &minutes_ago(20))],
            ..Default::default()
        };
        let control_plane = FakeControlPlane::new(Utc::now());
        let dir = tempfile::tempdir().unwrap();

        let err = run_once(
            policy(false),
            &api,
            &control_plane,
            &dir.path().join("resource-metadata.json"),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, AutostopError::NotFound(_)));
        assert!(control_plane.stopped().is_empty());
    }
}
