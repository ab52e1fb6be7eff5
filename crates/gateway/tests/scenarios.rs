//! End-to-end scenarios over a fully wired gateway state: telegram inbound
//! through normalization, provider execution, and outbound dispatch, plus
//! scheduler isolation and chat capture layout.

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;

use ar_channels::boundary::{ChannelBoundary, ChannelOutboundPort};
use ar_channels::OutboundDispatcher;
use ar_domain::config::{Config, RetryPolicy};
use ar_domain::envelope::StatusKind;
use ar_domain::error::{ChannelErrorCode, Error, Result};
use ar_domain::event::BoxStream;
use ar_domain::identity::SessionIdentity;
use ar_gateway::bootstrap::Bootstrap;
use ar_gateway::runtime::scheduler_runtime;
use ar_gateway::runtime::turn::handle_envelope;
use ar_providers::sdk::{AgentSdk, SdkEvent, SdkQuery};
use ar_providers::CancelToken;
use ar_scheduler::runtime as scheduler_boundary;
use ar_scheduler::{build_scheduler_route, SchedulerExecuteRequest};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Doubles
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Default)]
struct RecordingPort {
    sent: Mutex<Vec<(String, String, Option<String>)>>,
}

#[async_trait::async_trait]
impl ChannelOutboundPort for RecordingPort {
    async fn send_text(
        &self,
        channel_id: &str,
        text: &str,
        thread_hint: Option<&str>,
    ) -> Result<String> {
        self.sent.lock().push((
            channel_id.to_owned(),
            text.to_owned(),
            thread_hint.map(str::to_owned),
        ));
        Ok("77".into())
    }

    async fn send_reaction(&self, _: &str, _: &str, _: &str) -> Result<()> {
        Ok(())
    }
}

/// An SDK whose streams always fail with a 429.
struct RateLimitedSdk;

#[async_trait::async_trait]
impl AgentSdk for RateLimitedSdk {
    async fn open(
        &self,
        _query: SdkQuery,
        _cancel: CancelToken,
    ) -> Result<BoxStream<'static, Result<SdkEvent>>> {
        let stream = async_stream::stream! {
            yield Err(Error::Other("429 rate limit".into()));
        };
        Ok(Box::pin(stream))
    }

    async fn can_resume(&self, _session_id: &str) -> Result<bool> {
        Ok(false)
    }
}

fn test_config(root: &Path) -> Config {
    let mut config = Config::default();
    config.storage.sessions_dir = root.join("sessions");
    config.storage.chats_dir = root.join("chats");
    config.storage.thread_workdirs_dir = root.join("workdirs");
    config.storage.base_workdir = root.join("workspace");
    // Keep retries instant in tests.
    config.providers.retry.insert(
        "claude".into(),
        RetryPolicy {
            max_retries: 0,
            base_backoff_ms: 1,
        },
    );
    config
}

fn raw_event(chat: i64, thread: Option<i64>, user: i64, text: &str, ts: i64) -> serde_json::Value {
    let mut v = serde_json::json!({
        "chat_id": chat,
        "user_id": user,
        "message_id": ts,
        "text": text,
        "ts": ts,
    });
    if let Some(t) = thread {
        v["thread_id"] = t.into();
    }
    v
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Scenarios
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn telegram_happy_path() {
    let root = tempfile::tempdir().unwrap();
    let port = Arc::new(RecordingPort::default());
    let state = Bootstrap::new(test_config(root.path()))
        .with_telegram_port(port.clone())
        .build()
        .unwrap();

    let envelope = state
        .telegram
        .normalize_inbound(&raw_event(100, Some(22), 1, "! interrupt", 1_700_000_001))
        .unwrap();
    assert_eq!(envelope.identity.session.channel_id, "100");
    assert_eq!(envelope.identity.session.thread_id, "22");
    assert_eq!(envelope.identity.user_id, "1");
    assert!(envelope.is_interrupt);

    // A working status renders as plain text through the outbound port.
    let boundary: Arc<dyn ChannelBoundary> = state.telegram.clone();
    let dispatcher = OutboundDispatcher::new(boundary);
    let route = ar_domain::envelope::AgentRoute::new(
        envelope.identity.session.clone(),
        "telegram",
        envelope.identity.user_id.clone(),
        None,
        "codex",
    );
    let receipt = dispatcher
        .send_status(&route, StatusKind::Working, "processing")
        .await
        .unwrap();

    assert_eq!(receipt.message_id, "77");
    let sent = port.sent.lock();
    assert_eq!(sent.as_slice(), &[(
        "100".to_string(),
        "processing".to_string(),
        Some("22".to_string())
    )]);
}

#[tokio::test]
async fn out_of_order_drop_and_interrupt_bypass() {
    let root = tempfile::tempdir().unwrap();
    let state = Bootstrap::new(test_config(root.path())).build().unwrap();

    state
        .telegram
        .normalize_inbound(&raw_event(100, None, 1, "first", 2000))
        .unwrap();

    let err = state
        .telegram
        .normalize_inbound(&raw_event(100, None, 1, "late", 1999))
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Channel {
            code: ChannelErrorCode::InvalidPayload,
            ..
        }
    ));

    let envelope = state
        .telegram
        .normalize_inbound(&raw_event(100, None, 1, "!stop", 1998))
        .unwrap();
    assert!(envelope.interrupt_bypass_applied);

    // Watermark is still 2000.
    assert!(state
        .telegram
        .normalize_inbound(&raw_event(100, None, 1, "still late", 1999))
        .is_err());
}

#[tokio::test]
async fn rate_limited_primary_falls_back_to_codex() {
    let root = tempfile::tempdir().unwrap();
    let port = Arc::new(RecordingPort::default());
    let state = Bootstrap::new(test_config(root.path()))
        .with_sdk(Arc::new(RateLimitedSdk))
        .with_telegram_port(port.clone())
        .build()
        .unwrap();
    assert_eq!(state.provider_chain.0, "claude");

    let envelope = state
        .telegram
        .normalize_inbound(&raw_event(100, None, 1, "fallback response", 1))
        .unwrap();
    let boundary: Arc<dyn ChannelBoundary> = state.telegram.clone();
    let outcome = handle_envelope(&state, boundary, envelope).await.unwrap();

    assert_eq!(outcome.provider_id.as_deref(), Some("codex"));
    assert_eq!(outcome.reply, "fallback response");

    // Exactly the fallback's text reached the platform.
    let texts: Vec<String> = port.sent.lock().iter().map(|(_, t, _)| t.clone()).collect();
    assert_eq!(texts, vec!["fallback response"]);
}

#[tokio::test]
async fn steering_buffers_while_running_and_injects_next_turn() {
    let root = tempfile::tempdir().unwrap();
    let state = Bootstrap::new(test_config(root.path())).build().unwrap();

    let identity = SessionIdentity::new("default", "100", "main").unwrap();
    let shared = state.sessions.get_or_create(&identity);
    shared.lock().is_running = true;

    let envelope = state
        .telegram
        .normalize_inbound(&raw_event(100, None, 1, "while busy", 10))
        .unwrap();
    let boundary: Arc<dyn ChannelBoundary> = state.telegram.clone();
    let outcome = handle_envelope(&state, boundary.clone(), envelope)
        .await
        .unwrap();
    assert!(outcome.steered);
    assert_eq!(shared.lock().steering_len(), 1);

    // Next turn folds the buffered text in front of the prompt; the echo
    // provider hands the combined prompt straight back.
    shared.lock().is_running = false;
    let envelope = state
        .telegram
        .normalize_inbound(&raw_event(100, None, 1, "now", 20))
        .unwrap();
    let outcome = handle_envelope(&state, boundary, envelope).await.unwrap();
    assert!(!outcome.steered);
    assert_eq!(outcome.reply, "while busy\n---\nnow");
    assert_eq!(shared.lock().steering_len(), 0);
}

#[test]
fn session_keys_are_canonical() {
    let identity = SessionIdentity::new("default", "55001", "77").unwrap();
    assert_eq!(identity.session_key(), "default:55001:77");
    assert_eq!(identity.storage_partition_key(), "default/55001/77");
}

#[tokio::test]
async fn scheduler_executes_in_isolated_cron_session() {
    let root = tempfile::tempdir().unwrap();
    let state = Bootstrap::new(test_config(root.path())).build().unwrap();
    scheduler_runtime::configure(&state);

    let route = build_scheduler_route("Daily Summary");
    assert_eq!(route.session_key, "cron:scheduler:daily-summary");

    // A running user session never makes the scheduler busy.
    let user = state
        .sessions
        .get_or_create(&SessionIdentity::new("default", "100", "main").unwrap());
    user.lock().is_running = true;
    assert!(!scheduler_boundary::is_busy());

    let reply = scheduler_boundary::execute(SchedulerExecuteRequest {
        prompt: "run now".into(),
        session_key: route.session_key.clone(),
        user_id: "1".into(),
        model_context: "cron".into(),
    })
    .await
    .unwrap();
    assert_eq!(reply, "run now"); // echo provider

    assert!(state.sessions.has_session("cron:scheduler:daily-summary"));
    assert_eq!(state.cron_deliveries.len(), 1);
    assert_eq!(state.cron_deliveries.list()[0].content, "run now");

    // A running cron session does.
    let cron = state
        .sessions
        .get_by_key("cron:scheduler:daily-summary")
        .unwrap();
    cron.lock().is_running = true;
    assert!(scheduler_boundary::is_busy());

    scheduler_boundary::reset_scheduler_runtime_for_tests();
}

#[tokio::test]
async fn chat_capture_lands_under_partition_path() {
    let root = tempfile::tempdir().unwrap();
    let state = Bootstrap::new(test_config(root.path())).build().unwrap();

    let envelope = state
        .telegram
        .normalize_inbound(&raw_event(99001, Some(13), 1, "hello there", 1))
        .unwrap();
    let boundary: Arc<dyn ChannelBoundary> = state.telegram.clone();
    handle_envelope(&state, boundary, envelope).await.unwrap();

    let day = Utc::now().date_naive().format("%Y-%m-%d").to_string();
    let path = root
        .path()
        .join("chats/default/99001/13")
        .join(format!("{day}.ndjson"));
    assert!(path.exists(), "expected {path:?}");

    let raw = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = raw.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].contains("\"user\""));
    assert!(lines[1].contains("\"assistant\""));
}
