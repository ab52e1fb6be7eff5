//! Gateway wiring of the scheduler runtime boundary.
//!
//! Scheduled jobs execute through the same provider turn as channel
//! traffic, but in sessions addressed by their canonical `cron:` key, and
//! their output lands in the cron delivery store (the scheduler's own
//! outbound target) instead of a chat platform.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use ar_domain::envelope::AgentRoute;
use ar_domain::error::Result;
use ar_domain::identity::parse_session_key;
use ar_scheduler::queue::{process_queued_jobs, DrainErrorFn, DrainFn};
use ar_scheduler::runtime::{self as scheduler_boundary, SchedulerExecuteRequest, SchedulerRuntime};
use ar_scheduler::CRON_KEY_PREFIX;

use crate::runtime::turn::run_provider_turn;
use crate::state::AppState;

/// How often the schedule tick evaluates cron expressions.
const TICK_INTERVAL_SECS: u64 = 30;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Deliveries
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One completed scheduled run.
#[derive(Debug, Clone, serde::Serialize)]
pub struct CronDelivery {
    pub schedule_name: String,
    pub session_key: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// In-memory inbox of scheduled-run output.
#[derive(Default)]
pub struct CronDeliveryStore {
    deliveries: Mutex<Vec<CronDelivery>>,
}

impl CronDeliveryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, delivery: CronDelivery) {
        self.deliveries.lock().push(delivery);
    }

    pub fn list(&self) -> Vec<CronDelivery> {
        self.deliveries.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.deliveries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.deliveries.lock().is_empty()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Runtime implementation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct GatewaySchedulerRuntime {
    state: AppState,
}

impl GatewaySchedulerRuntime {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }
}

#[async_trait::async_trait]
impl SchedulerRuntime for GatewaySchedulerRuntime {
    fn is_busy(&self) -> bool {
        // Only cron sessions count; user traffic never blocks the queue.
        self.state.sessions.any_running_with_prefix(CRON_KEY_PREFIX)
    }

    async fn execute(&self, request: SchedulerExecuteRequest) -> Result<String> {
        // Fetched by canonical session key — never by user id.
        let identity = parse_session_key(&request.session_key)?;
        let (primary, _) = self.state.provider_chain.clone();
        let route = AgentRoute::new(identity, "scheduler", request.user_id.clone(), None, primary);

        let turn = run_provider_turn(&self.state, &route, request.prompt.clone(), None).await?;

        self.state.cron_deliveries.push(CronDelivery {
            schedule_name: route.identity.thread_id.clone(),
            session_key: route.session_key.clone(),
            content: turn.reply.clone(),
            created_at: Utc::now(),
        });
        Ok(turn.reply)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Process wiring
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Install this gateway as the process-wide scheduler runtime.
pub fn configure(state: &AppState) {
    scheduler_boundary::configure_scheduler_runtime(Arc::new(GatewaySchedulerRuntime::new(
        state.clone(),
    )));
}

/// Start the schedule tick task and the queue drain timer.
pub fn start(state: &AppState) {
    // Tick: evaluate cron expressions, enqueue due jobs.
    let scheduler = Arc::clone(&state.job_scheduler);
    let queue = Arc::clone(&state.queue);
    tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(std::time::Duration::from_secs(TICK_INTERVAL_SECS));
        interval.tick().await;
        loop {
            interval.tick().await;
            for job in scheduler.due_jobs(&Utc::now()) {
                queue.enqueue(job);
            }
        }
    });

    // Drain: run one queued job per firing, only when cron is idle.
    let queue = Arc::clone(&state.queue);
    let on_drain: DrainFn = Arc::new(move || {
        let queue = Arc::clone(&queue);
        Box::pin(async move {
            process_queued_jobs(
                &queue,
                scheduler_boundary::is_busy,
                |job| {
                    scheduler_boundary::execute(SchedulerExecuteRequest {
                        prompt: job.prompt,
                        session_key: job.session_key,
                        user_id: "scheduler".into(),
                        model_context: "cron".into(),
                    })
                },
                |remaining| tracing::debug!(remaining, "cron queue waiting"),
                || {},
            )
            .await
        })
    });
    let on_error: DrainErrorFn =
        Arc::new(|e| tracing::warn!(error = %e, "scheduled job failed"));

    state
        .drain_timer
        .start(state.config.scheduler.drain_interval_ms, on_drain, on_error);
}
