//! Telegram channel boundary.
//!
//! Normalization rules for Telegram raw events:
//! - tenant defaults to `"default"` (Telegram has no workspace concept)
//! - the general-topic thread id `1` (and a missing thread) map to the
//!   canonical thread id `"main"`
//! - numeric platform ids are accepted as numbers or strings
//!
//! Delivery runs in one of two modes: `Live` requires a wired outbound port
//! and fails with `CHANNEL_UNAVAILABLE` without one; `Skeleton` returns
//! placeholder receipts for text so a dry-run deployment can exercise the
//! full pipeline without a bot token.

use std::sync::Arc;

use ar_domain::config::TelegramConfig;
use ar_domain::envelope::{
    is_interrupt_text, DeliveryReceipt, InboundEnvelope, OutboundPayload,
};
use ar_domain::error::{ChannelErrorCode, Error, Result};
use ar_domain::identity::{MessageIdentity, SessionIdentity};
use ar_domain::trace::TraceEvent;

use crate::boundary::{ChannelBoundary, ChannelCapabilities, ChannelOutboundPort};
use crate::ordering::OrderingGate;
use crate::outbound;
use crate::rate_limit::InboundRateLimiter;
use crate::split::split_reply;

/// Telegram caps messages at 4096 characters.
const MAX_TEXT_CHARS: usize = 4096;

/// Telegram's general-topic thread id in forum chats.
const GENERAL_TOPIC_THREAD: &str = "1";

/// Canonical thread id for un-threaded (or general-topic) traffic.
const MAIN_THREAD: &str = "main";

/// Whether the channel is wired to a real platform or running dry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryMode {
    Live,
    Skeleton,
}

pub struct TelegramChannel {
    config: TelegramConfig,
    mode: DeliveryMode,
    gate: OrderingGate,
    limiter: InboundRateLimiter,
    outbound: Option<Arc<dyn ChannelOutboundPort>>,
}

impl TelegramChannel {
    pub fn new(
        config: TelegramConfig,
        mode: DeliveryMode,
        outbound: Option<Arc<dyn ChannelOutboundPort>>,
    ) -> Self {
        let limiter = InboundRateLimiter::new(config.rate_limit);
        Self {
            config,
            mode,
            gate: OrderingGate::new(),
            limiter,
            outbound,
        }
    }

    /// Map the raw thread id to the canonical one.
    fn canonical_thread(raw_thread: Option<String>) -> String {
        match raw_thread {
            Some(t) if t != GENERAL_TOPIC_THREAD => t,
            _ => MAIN_THREAD.to_owned(),
        }
    }

    async fn send_text_chunks(
        &self,
        chat_id: &str,
        thread_hint: Option<&str>,
        text: &str,
    ) -> Result<DeliveryReceipt> {
        let port = match (&self.outbound, self.mode) {
            (Some(port), _) => port,
            (None, DeliveryMode::Skeleton) => {
                return Ok(DeliveryReceipt::new(format!(
                    "skeleton:{}",
                    uuid::Uuid::new_v4()
                )));
            }
            (None, DeliveryMode::Live) => {
                return Err(Error::channel(
                    ChannelErrorCode::Unavailable,
                    "live telegram channel has no outbound port",
                ));
            }
        };

        let mut last_id = String::new();
        for chunk in split_reply(text, Some(MAX_TEXT_CHARS)) {
            last_id = port.send_text(chat_id, &chunk, thread_hint).await?;
        }
        Ok(DeliveryReceipt::new(last_id))
    }
}

#[async_trait::async_trait]
impl ChannelBoundary for TelegramChannel {
    fn channel_type(&self) -> &'static str {
        "telegram"
    }

    fn capabilities(&self) -> ChannelCapabilities {
        ChannelCapabilities {
            supports_threads: true,
            supports_reactions: true,
            supports_choice_keyboard: false,
        }
    }

    fn normalize_inbound(&self, raw: &serde_json::Value) -> Result<InboundEnvelope> {
        // 1. Completeness.
        let chat_id = id_field(raw, "chat_id")?;
        let user_id = id_field(raw, "user_id")?;
        let text = str_field(raw, "text")?;
        let timestamp_ms = int_field(raw, "ts")?;
        let raw_thread = opt_id_field(raw, "thread_id");
        let message_id =
            opt_id_field(raw, "message_id").unwrap_or_else(|| timestamp_ms.to_string());

        // 2. Authorization.
        if !self.config.allowed_user_ids.is_empty()
            && !self.config.allowed_user_ids.contains(&user_id)
        {
            TraceEvent::InboundRejected {
                channel: "telegram".into(),
                code: ChannelErrorCode::Unauthorized.as_str().into(),
                message: format!("user {user_id} not in allowlist"),
            }
            .emit();
            return Err(Error::channel(
                ChannelErrorCode::Unauthorized,
                format!("user {user_id} is not allowed"),
            ));
        }

        // 3. Inbound rate limit, per chat+sender.
        self.limiter.check(&format!("telegram:{chat_id}:{user_id}"))?;

        // 4. Identity.
        let thread_id = Self::canonical_thread(raw_thread.clone());
        let session = SessionIdentity::new("default", &chat_id, &thread_id)?;

        // 5. Ordering.
        let is_interrupt = is_interrupt_text(&text);
        let admission = self
            .gate
            .admit(&session.channel_id, &session.thread_id, timestamp_ms, is_interrupt)?;

        let mut metadata = serde_json::Map::new();
        metadata.insert("platform".into(), "telegram".into());
        if let Some(t) = raw_thread {
            metadata.insert("raw_thread_id".into(), t.into());
        }

        TraceEvent::InboundAdmitted {
            channel: "telegram".into(),
            session_key: session.session_key(),
            interrupt_bypass: admission.interrupt_bypass_applied,
        }
        .emit();

        Ok(InboundEnvelope {
            identity: MessageIdentity {
                session,
                user_id,
                message_id,
                timestamp_ms,
            },
            text,
            is_interrupt,
            interrupt_bypass_applied: admission.interrupt_bypass_applied,
            metadata,
        })
    }

    async fn deliver_outbound(&self, payload: &OutboundPayload) -> Result<DeliveryReceipt> {
        let normalized = outbound::normalize(payload.clone());
        let route = normalized.route().clone();
        let thread_hint = (route.identity.thread_id != MAIN_THREAD)
            .then_some(route.identity.thread_id.as_str());

        match &normalized {
            OutboundPayload::Text { text, .. } => {
                self.send_text_chunks(&route.identity.channel_id, thread_hint, text)
                    .await
            }
            OutboundPayload::Reaction {
                target_message_id,
                reaction,
                ..
            } => {
                let port = self.outbound.as_ref().ok_or_else(|| {
                    Error::channel(
                        ChannelErrorCode::Unavailable,
                        "telegram reactions require an outbound port",
                    )
                })?;
                port.send_reaction(&route.identity.channel_id, target_message_id, reaction)
                    .await?;
                Ok(DeliveryReceipt::new(target_message_id.clone()))
            }
            OutboundPayload::Status { .. } | OutboundPayload::Choice { .. } => {
                Err(Error::Other(
                    "status/choice payloads must normalize to text before delivery".into(),
                ))
            }
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Raw field extraction
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn missing(field: &str) -> Error {
    Error::channel(
        ChannelErrorCode::InvalidPayload,
        format!("missing or invalid field: {field}"),
    )
}

fn str_field(raw: &serde_json::Value, field: &str) -> Result<String> {
    raw.get(field)
        .and_then(|v| v.as_str())
        .map(str::to_owned)
        .ok_or_else(|| missing(field))
}

/// Platform ids arrive as numbers or strings depending on the connector.
fn id_field(raw: &serde_json::Value, field: &str) -> Result<String> {
    opt_id_field(raw, field).ok_or_else(|| missing(field))
}

fn opt_id_field(raw: &serde_json::Value, field: &str) -> Option<String> {
    match raw.get(field)? {
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn int_field(raw: &serde_json::Value, field: &str) -> Result<i64> {
    raw.get(field)
        .and_then(|v| v.as_i64())
        .ok_or_else(|| missing(field))
}
