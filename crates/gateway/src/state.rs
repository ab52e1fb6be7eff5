use std::sync::Arc;

use ar_channels::{DedupeStore, SlackChannel, TelegramChannel};
use ar_domain::config::Config;
use ar_providers::ProviderOrchestrator;
use ar_scheduler::{JobQueue, JobScheduler, QueueDrainTimer};
use ar_sessions::{ChatCapture, SessionManager};

use crate::runtime::cancel::CancelMap;
use crate::runtime::scheduler_runtime::CronDeliveryStore;

/// Shared application state passed to all API handlers.
///
/// Fields are grouped by concern:
/// - **Core** — config, provider orchestration
/// - **Sessions** — session manager, chat capture, turn cancellation
/// - **Channels** — boundaries plus the inbound dedupe store
/// - **Scheduler** — queue, drain timer, schedule ticks, deliveries
#[derive(Clone)]
pub struct AppState {
    // ── Core ──────────────────────────────────────────────────────
    pub config: Arc<Config>,
    pub orchestrator: Arc<ProviderOrchestrator>,
    /// `(primary, fallback)` provider ids actually registered.
    pub provider_chain: (String, Option<String>),

    // ── Sessions ──────────────────────────────────────────────────
    pub sessions: Arc<SessionManager>,
    pub chats: Arc<ChatCapture>,
    pub cancel_map: Arc<CancelMap>,

    // ── Channels ──────────────────────────────────────────────────
    pub telegram: Arc<TelegramChannel>,
    pub slack: Arc<SlackChannel>,
    pub dedupe: Arc<DedupeStore>,

    // ── Scheduler ─────────────────────────────────────────────────
    pub queue: Arc<JobQueue>,
    pub drain_timer: Arc<QueueDrainTimer>,
    pub job_scheduler: Arc<JobScheduler>,
    pub cron_deliveries: Arc<CronDeliveryStore>,
}
