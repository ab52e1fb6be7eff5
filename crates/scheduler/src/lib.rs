//! Scheduler runtime boundary for AgentRelay.
//!
//! Cron-driven jobs run in sessions of their own, never in user sessions:
//! their keys live under the `cron:` tenant, and the queue only drains when
//! no cron session is busy. The concrete executor is injected through a
//! process-wide boundary with explicit configure/reset entry points.

pub mod cron;
pub mod queue;
pub mod route;
pub mod runtime;

pub use cron::{cron_matches, cron_next_tz, parse_tz};
pub use queue::{CronJob, JobQueue, JobScheduler, QueueDrainTimer};
pub use route::{build_scheduler_route, slug, CRON_KEY_PREFIX};
pub use runtime::{
    configure_scheduler_runtime, reset_scheduler_runtime_for_tests, SchedulerExecuteRequest,
    SchedulerRuntime,
};
