//! Slack channel boundary.
//!
//! Normalization rules for Slack raw events:
//! - the workspace (`team`) is the tenant; a non-empty allowlist gates it
//! - channel ids are prefixed with `"slack-"` so they never collide with
//!   numeric Telegram chat ids in the same session map
//! - an empty or missing `thread_ts` maps to the canonical thread `"main"`
//!
//! Connector requests are authenticated with Slack's `v0=` HMAC-SHA256
//! request signature before the event body reaches normalization.

use std::sync::Arc;

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use ar_domain::config::SlackConfig;
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

/// Slack message body limit.
const MAX_TEXT_CHARS: usize = 40_000;

/// Prefix applied to Slack channel ids in the canonical identity.
const CHANNEL_PREFIX: &str = "slack-";

const MAIN_THREAD: &str = "main";

/// Signatures older (or newer) than this are rejected.
const SIGNATURE_WINDOW_SECS: i64 = 300;

pub struct SlackChannel {
    config: SlackConfig,
    gate: OrderingGate,
    limiter: InboundRateLimiter,
    outbound: Option<Arc<dyn ChannelOutboundPort>>,
}

impl SlackChannel {
    pub fn new(config: SlackConfig, outbound: Option<Arc<dyn ChannelOutboundPort>>) -> Self {
        let limiter = InboundRateLimiter::new(config.rate_limit);
        Self {
            config,
            gate: OrderingGate::new(),
            limiter,
            outbound,
        }
    }

    async fn send_text_chunks(
        &self,
        channel_id: &str,
        thread_hint: Option<&str>,
        text: &str,
    ) -> Result<DeliveryReceipt> {
        let port = match &self.outbound {
            Some(port) => port,
            None if self.config.skeleton_enabled => {
                return Ok(DeliveryReceipt::new(format!(
                    "skeleton:{}",
                    uuid::Uuid::new_v4()
                )));
            }
            None => {
                return Err(Error::channel(
                    ChannelErrorCode::Unavailable,
                    "slack channel has no outbound port and skeleton mode is off",
                ));
            }
        };

        let mut last_id = String::new();
        for chunk in split_reply(text, Some(MAX_TEXT_CHARS)) {
            last_id = port.send_text(channel_id, &chunk, thread_hint).await?;
        }
        Ok(DeliveryReceipt::new(last_id))
    }
}

#[async_trait::async_trait]
impl ChannelBoundary for SlackChannel {
    fn channel_type(&self) -> &'static str {
        "slack"
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
        let team = str_field(raw, "team")?;
        let channel = str_field(raw, "channel")?;
        let user = str_field(raw, "user")?;
        let text = str_field(raw, "text")?;
        let timestamp_ms = parse_slack_ts(raw.get("ts").ok_or_else(|| missing("ts"))?)?;

        // 2. Tenant allowlist.
        if !self.config.allowed_tenants.is_empty()
            && !self.config.allowed_tenants.contains(&team)
        {
            TraceEvent::InboundRejected {
                channel: "slack".into(),
                code: ChannelErrorCode::Unauthorized.as_str().into(),
                message: format!("tenant {team} not in allowlist"),
            }
            .emit();
            return Err(Error::channel(
                ChannelErrorCode::Unauthorized,
                format!("tenant {team} is not allowed"),
            ));
        }

        // 3. Inbound rate limit, per channel+sender.
        self.limiter.check(&format!("slack:{channel}:{user}"))?;

        // 4. Identity.
        let thread_id = match raw.get("thread_ts").and_then(|v| v.as_str()) {
            Some(ts) if !ts.trim().is_empty() => ts.to_owned(),
            _ => MAIN_THREAD.to_owned(),
        };
        let session =
            SessionIdentity::new(&team, format!("{CHANNEL_PREFIX}{channel}"), &thread_id)?;

        // 5. Ordering.
        let is_interrupt = is_interrupt_text(&text);
        let admission = self.gate.admit(
            &session.channel_id,
            &session.thread_id,
            timestamp_ms,
            is_interrupt,
        )?;

        let message_id = raw
            .get("event_id")
            .and_then(|v| v.as_str())
            .map(str::to_owned)
            .unwrap_or_else(|| timestamp_ms.to_string());

        let mut metadata = serde_json::Map::new();
        metadata.insert("platform".into(), "slack".into());
        metadata.insert("raw_channel".into(), channel.into());

        TraceEvent::InboundAdmitted {
            channel: "slack".into(),
            session_key: session.session_key(),
            interrupt_bypass: admission.interrupt_bypass_applied,
        }
        .emit();

        Ok(InboundEnvelope {
            identity: MessageIdentity {
                session,
                user_id: user,
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
        let channel_id = route
            .identity
            .channel_id
            .strip_prefix(CHANNEL_PREFIX)
            .unwrap_or(&route.identity.channel_id)
            .to_owned();
        let thread_hint = (route.identity.thread_id != MAIN_THREAD)
            .then_some(route.identity.thread_id.as_str());

        match &normalized {
            OutboundPayload::Text { text, .. } => {
                self.send_text_chunks(&channel_id, thread_hint, text).await
            }
            OutboundPayload::Reaction {
                target_message_id,
                reaction,
                ..
            } => {
                let port = self.outbound.as_ref().ok_or_else(|| {
                    Error::channel(
                        ChannelErrorCode::Unavailable,
                        "slack reactions require an outbound port",
                    )
                })?;
                port.send_reaction(&channel_id, target_message_id, reaction)
                    .await?;
                Ok(DeliveryReceipt::new(target_message_id.clone()))
            }
            OutboundPayload::Status { .. } | OutboundPayload::Choice { .. } => Err(Error::Other(
                "status/choice payloads must normalize to text before delivery".into(),
            )),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Request signing
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Verify a Slack `v0=` request signature.
///
/// The signed base string is `v0:{timestamp}:{body}`. The timestamp must be
/// within ±5 minutes of `now_epoch_secs` to stop replays. Comparison is
/// constant-time over the decoded digest.
pub fn verify_slack_signature(
    signing_secret: &str,
    timestamp: &str,
    body: &str,
    signature: &str,
    now_epoch_secs: i64,
) -> Result<()> {
    let unauthorized = |message: &str| {
        Error::channel(ChannelErrorCode::Unauthorized, message.to_owned())
    };

    let ts: i64 = timestamp
        .parse()
        .map_err(|_| unauthorized("malformed signature timestamp"))?;
    if (now_epoch_secs - ts).abs() > SIGNATURE_WINDOW_SECS {
        return Err(unauthorized("signature timestamp outside window"));
    }

    let provided = signature
        .strip_prefix("v0=")
        .ok_or_else(|| unauthorized("malformed signature"))?;
    let provided =
        hex::decode(provided).map_err(|_| unauthorized("malformed signature hex"))?;

    let mut mac = Hmac::<Sha256>::new_from_slice(signing_secret.as_bytes())
        .map_err(|_| unauthorized("invalid signing secret"))?;
    mac.update(format!("v0:{timestamp}:{body}").as_bytes());
    let expected = mac.finalize().into_bytes();

    if expected.as_slice().ct_eq(provided.as_slice()).into() {
        Ok(())
    } else {
        Err(unauthorized("signature mismatch"))
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
    match raw.get(field).and_then(|v| v.as_str()) {
        Some(s) if !s.trim().is_empty() => Ok(s.to_owned()),
        _ => Err(missing(field)),
    }
}

/// Slack timestamps are `"{secs}.{micros}"` strings (or plain numbers from
/// simpler connectors). Both become epoch milliseconds.
fn parse_slack_ts(value: &serde_json::Value) -> Result<i64> {
    match value {
        serde_json::Value::Number(n) => n
            .as_i64()
            .map(|secs| secs * 1000)
            .or_else(|| n.as_f64().map(|f| (f * 1000.0) as i64))
            .ok_or_else(|| missing("ts")),
        serde_json::Value::String(s) => {
            let mut parts = s.splitn(2, '.');
            let secs: i64 = parts
                .next()
                .and_then(|p| p.parse().ok())
                .ok_or_else(|| missing("ts"))?;
            let micros: i64 = parts
                .next()
                .map(|p| format!("{p:0<6}"))
                .and_then(|p| p[..6].parse().ok())
                .unwrap_or(0);
            Ok(secs * 1000 + micros / 1000)
        }
        _ => Err(missing("ts")),
    }
}
