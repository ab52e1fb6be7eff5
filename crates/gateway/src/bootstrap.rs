//! Builds the application state from config plus injected ports.
//!
//! The agent SDK and per-channel outbound glue are ports: the binary runs
//! without them (echo provider, skeleton channels), tests inject doubles,
//! and a real deployment injects the live clients.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use ar_channels::boundary::ChannelOutboundPort;
use ar_channels::telegram::DeliveryMode;
use ar_channels::telegram_api::TelegramBotApi;
use ar_channels::{DedupeStore, SlackChannel, TelegramChannel};
use ar_domain::config::Config;
use ar_domain::error::Result;
use ar_providers::sdk::AgentSdk;
use ar_providers::{EchoProvider, ProviderOrchestrator, ProviderRegistry, SdkProvider};
use ar_scheduler::{JobQueue, JobScheduler, QueueDrainTimer};
use ar_sessions::{ChatCapture, SessionManager};

use crate::runtime::cancel::CancelMap;
use crate::runtime::scheduler_runtime::{self, CronDeliveryStore};
use crate::state::AppState;

/// How long platform event ids are remembered for idempotency.
const DEDUPE_TTL: Duration = Duration::from_secs(10 * 60);

pub struct Bootstrap {
    config: Config,
    sdk: Option<Arc<dyn AgentSdk>>,
    telegram_port: Option<Arc<dyn ChannelOutboundPort>>,
    slack_port: Option<Arc<dyn ChannelOutboundPort>>,
}

impl Bootstrap {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            sdk: None,
            telegram_port: None,
            slack_port: None,
        }
    }

    /// Inject the agent SDK backing the primary provider.
    pub fn with_sdk(mut self, sdk: Arc<dyn AgentSdk>) -> Self {
        self.sdk = Some(sdk);
        self
    }

    pub fn with_telegram_port(mut self, port: Arc<dyn ChannelOutboundPort>) -> Self {
        self.telegram_port = Some(port);
        self
    }

    pub fn with_slack_port(mut self, port: Arc<dyn ChannelOutboundPort>) -> Self {
        self.slack_port = Some(port);
        self
    }

    pub fn build(self) -> Result<AppState> {
        let config = Arc::new(self.config);

        // ── Sessions & storage ────────────────────────────────────
        let sessions = SessionManager::new(&config.storage)?;
        sessions.restore_all();
        let chats = Arc::new(ChatCapture::new(&config.storage.chats_dir));

        // ── Providers ─────────────────────────────────────────────
        let mut registry = ProviderRegistry::new();
        let mut primary_registered = false;
        if config.providers.primary.enabled {
            if let Some(sdk) = &self.sdk {
                registry.register(Arc::new(SdkProvider::new(
                    config.providers.primary.id.clone(),
                    Arc::clone(sdk),
                )));
                primary_registered = true;
            } else {
                tracing::warn!(
                    provider_id = %config.providers.primary.id,
                    "primary provider enabled but no SDK injected; running on the fallback"
                );
            }
        }
        // The fallback registers even when disabled: a query routed to it
        // then fails with INVALID_REQUEST instead of a wiring error.
        registry.register(Arc::new(EchoProvider::new(
            config.providers.fallback.id.clone(),
            config.providers.fallback.enabled,
        )));

        let provider_chain = if primary_registered {
            (
                config.providers.primary.id.clone(),
                config
                    .providers
                    .fallback
                    .enabled
                    .then(|| config.providers.fallback.id.clone()),
            )
        } else {
            (config.providers.fallback.id.clone(), None)
        };

        let mut policies = HashMap::new();
        for id in [&config.providers.primary.id, &config.providers.fallback.id] {
            policies.insert(id.clone(), config.providers.retry_policy(id));
        }
        let orchestrator = Arc::new(ProviderOrchestrator::new(Arc::new(registry), policies));

        // ── Channels ──────────────────────────────────────────────
        let telegram_port: Option<Arc<dyn ChannelOutboundPort>> =
            self.telegram_port.or_else(|| {
                let token = std::env::var(&config.channels.telegram.bot_token_env).ok()?;
                match TelegramBotApi::new(&token) {
                    Ok(api) => Some(Arc::new(api) as Arc<dyn ChannelOutboundPort>),
                    Err(e) => {
                        tracing::warn!(error = %e, "telegram bot api client failed to build");
                        None
                    }
                }
            });
        let telegram_mode = if telegram_port.is_some() {
            DeliveryMode::Live
        } else {
            DeliveryMode::Skeleton
        };
        let telegram = Arc::new(TelegramChannel::new(
            config.channels.telegram.clone(),
            telegram_mode,
            telegram_port,
        ));
        let slack = Arc::new(SlackChannel::new(
            config.channels.slack.clone(),
            self.slack_port,
        ));

        // ── Scheduler ─────────────────────────────────────────────
        let job_scheduler = Arc::new(JobScheduler::new(&config.scheduler.schedules, &Utc::now()));

        let state = AppState {
            config,
            orchestrator,
            provider_chain,
            sessions,
            chats,
            cancel_map: Arc::new(CancelMap::new()),
            telegram,
            slack,
            dedupe: Arc::new(DedupeStore::new(DEDUPE_TTL)),
            queue: Arc::new(JobQueue::new()),
            drain_timer: Arc::new(QueueDrainTimer::new()),
            job_scheduler,
            cron_deliveries: Arc::new(CronDeliveryStore::new()),
        };

        // Killing a running session aborts its in-flight turn.
        let cancel_map = Arc::clone(&state.cancel_map);
        state.sessions.set_abort_hook(Arc::new(move |session_key| {
            cancel_map.cancel(session_key);
        }));

        Ok(state)
    }
}

/// Start the long-lived background pieces: session cleanup, the scheduler
/// boundary, the cron tick, and the queue drain timer.
pub fn start_background(state: &AppState) {
    state.sessions.start_cleanup_timer();
    scheduler_runtime::configure(state);
    scheduler_runtime::start(state);
}
