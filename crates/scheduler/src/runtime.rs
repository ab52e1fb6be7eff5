//! The process-wide scheduler runtime boundary.
//!
//! The concrete wiring (session manager + provider orchestrator + outbound
//! target) is injected once at startup via [`configure_scheduler_runtime`];
//! tests swap it with doubles and call
//! [`reset_scheduler_runtime_for_tests`] between cases.
//!
//! Invariants enforced here rather than trusted to callers:
//! - `execute` only accepts canonical `cron:`-prefixed session keys, so a
//!   scheduled job can never run inside a user session
//! - `is_busy` reflects cron sessions only; user traffic never blocks the
//!   queue

use std::sync::Arc;

use parking_lot::RwLock;

use ar_domain::error::{Error, Result, RouteErrorCode};
use ar_domain::identity::parse_session_key;

use crate::route::CRON_KEY_PREFIX;

/// A scheduled execution request.
#[derive(Debug, Clone)]
pub struct SchedulerExecuteRequest {
    pub prompt: String,
    /// Canonical session key; must start with `cron:`.
    pub session_key: String,
    pub user_id: String,
    /// Execution context marker (`"cron"`).
    pub model_context: String,
}

/// The injected runtime surface.
#[async_trait::async_trait]
pub trait SchedulerRuntime: Send + Sync {
    /// Whether any cron session is currently running.
    fn is_busy(&self) -> bool;

    /// Run one job to completion; returns the final text.
    async fn execute(&self, request: SchedulerExecuteRequest) -> Result<String>;
}

static RUNTIME: RwLock<Option<Arc<dyn SchedulerRuntime>>> = RwLock::new(None);

/// Install the process-wide runtime. Later calls replace the earlier one.
pub fn configure_scheduler_runtime(runtime: Arc<dyn SchedulerRuntime>) {
    *RUNTIME.write() = Some(runtime);
}

/// Drop the configured runtime (test isolation).
pub fn reset_scheduler_runtime_for_tests() {
    *RUNTIME.write() = None;
}

/// Whether a cron session is busy. Unconfigured = not busy.
pub fn is_busy() -> bool {
    RUNTIME.read().as_ref().map(|r| r.is_busy()).unwrap_or(false)
}

/// Execute one scheduled job through the configured runtime.
pub async fn execute(request: SchedulerExecuteRequest) -> Result<String> {
    // Reject anything that is not a well-formed cron session key before it
    // can touch a user session.
    parse_session_key(&request.session_key)?;
    if !request.session_key.starts_with(CRON_KEY_PREFIX) {
        return Err(Error::routing(
            RouteErrorCode::Forbidden,
            format!(
                "scheduler may only execute in cron sessions, got {}",
                request.session_key
            ),
        ));
    }

    let runtime = RUNTIME
        .read()
        .clone()
        .ok_or_else(|| Error::Config("scheduler runtime is not configured".into()))?;
    runtime.execute(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    use crate::route::build_scheduler_route;

    struct RecordingRuntime {
        busy: bool,
        seen_keys: Mutex<Vec<String>>,
    }

    #[async_trait::async_trait]
    impl SchedulerRuntime for RecordingRuntime {
        fn is_busy(&self) -> bool {
            self.busy
        }

        async fn execute(&self, request: SchedulerExecuteRequest) -> Result<String> {
            self.seen_keys.lock().push(request.session_key);
            Ok("ok".into())
        }
    }

    // One test drives the whole global lifecycle; parallel tests sharing
    // the static would race.
    #[tokio::test]
    async fn boundary_lifecycle() {
        reset_scheduler_runtime_for_tests();
        assert!(!is_busy());
        assert!(execute(SchedulerExecuteRequest {
            prompt: "x".into(),
            session_key: "cron:scheduler:job".into(),
            user_id: "1".into(),
            model_context: "cron".into(),
        })
        .await
        .is_err());

        let runtime = Arc::new(RecordingRuntime {
            busy: false,
            seen_keys: Mutex::new(Vec::new()),
        });
        configure_scheduler_runtime(runtime.clone());

        let route = build_scheduler_route("Daily Summary");
        let result = execute(SchedulerExecuteRequest {
            prompt: "run now".into(),
            session_key: route.session_key.clone(),
            user_id: "1".into(),
            model_context: "cron".into(),
        })
        .await
        .unwrap();

        assert_eq!(result, "ok");
        assert_eq!(
            *runtime.seen_keys.lock(),
            vec!["cron:scheduler:daily-summary"]
        );

        // A user session key is refused outright.
        let err = execute(SchedulerExecuteRequest {
            prompt: "x".into(),
            session_key: "default:100:main".into(),
            user_id: "1".into(),
            model_context: "cron".into(),
        })
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            Error::Routing {
                code: RouteErrorCode::Forbidden,
                ..
            }
        ));

        // A malformed key is refused before prefix checks.
        assert!(execute(SchedulerExecuteRequest {
            prompt: "x".into(),
            session_key: "not-a-key".into(),
            user_id: "1".into(),
            model_context: "cron".into(),
        })
        .await
        .is_err());

        reset_scheduler_runtime_for_tests();
        assert!(!is_busy());
    }
}
