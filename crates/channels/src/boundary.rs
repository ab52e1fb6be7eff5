//! The boundary contract every channel implements.
//!
//! `normalize_inbound` is synchronous and enforces, in order: payload
//! completeness, authorization, inbound rate limit, and timestamp ordering.
//! `deliver_outbound` accepts any tagged payload; the channel folds status
//! and choice payloads to text via [`crate::outbound::normalize`] before
//! invoking its outbound port.

use ar_domain::envelope::{DeliveryReceipt, InboundEnvelope, OutboundPayload};
use ar_domain::error::Result;

/// What a channel can render natively.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelCapabilities {
    pub supports_threads: bool,
    pub supports_reactions: bool,
    pub supports_choice_keyboard: bool,
}

/// A channel boundary: one per platform (telegram, slack, …).
#[async_trait::async_trait]
pub trait ChannelBoundary: Send + Sync {
    /// Stable channel type name (`"telegram"`, `"slack"`).
    fn channel_type(&self) -> &'static str;

    fn capabilities(&self) -> ChannelCapabilities;

    /// Normalize a raw platform event into the common envelope.
    ///
    /// Raw events are channel-specific JSON posted by connectors; missing or
    /// malformed fields fail with `CHANNEL_INVALID_PAYLOAD`.
    fn normalize_inbound(&self, raw: &serde_json::Value) -> Result<InboundEnvelope>;

    /// Deliver one outbound payload, returning a platform receipt.
    async fn deliver_outbound(&self, payload: &OutboundPayload) -> Result<DeliveryReceipt>;
}

/// Per-channel outbound glue (platform SDK / HTTP API).
///
/// Implemented outside the core for each platform; the boundary only needs
/// these two calls. `send_text` returns the platform-native message id.
#[async_trait::async_trait]
pub trait ChannelOutboundPort: Send + Sync {
    async fn send_text(
        &self,
        channel_id: &str,
        text: &str,
        thread_hint: Option<&str>,
    ) -> Result<String>;

    async fn send_reaction(
        &self,
        channel_id: &str,
        target_message_id: &str,
        reaction: &str,
    ) -> Result<()>;
}
