//! The common envelope model at the channel boundary.
//!
//! Heterogeneous platform events are normalized into [`InboundEnvelope`];
//! everything going back out is one of the [`OutboundPayload`] variants.
//! Matches on the payload are exhaustive on purpose — adding a variant must
//! break every dispatch site.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::identity::{MessageIdentity, SessionIdentity};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Inbound
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A normalized inbound message, produced by a channel boundary from a raw
/// platform event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundEnvelope {
    pub identity: MessageIdentity,
    pub text: String,
    /// Message text begins with `!` — admitted past the ordering gate.
    #[serde(default)]
    pub is_interrupt: bool,
    /// Set when an out-of-order message was admitted only because it was an
    /// interrupt.
    #[serde(default)]
    pub interrupt_bypass_applied: bool,
    /// Channel-specific opaque fields (platform ids, display names, …).
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

/// Interrupt detection used by the ordering gate and the envelope builder.
pub fn is_interrupt_text(text: &str) -> bool {
    text.starts_with('!')
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// AgentRoute
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Routing context derived once per inbound and carried by every outbound
/// payload. Caches both key encodings so downstream code never re-derives
/// them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentRoute {
    pub identity: SessionIdentity,
    pub session_key: String,
    pub storage_partition_key: String,
    pub account_id: String,
    pub peer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_peer: Option<String>,
    pub provider_id: String,
}

impl AgentRoute {
    pub fn new(
        identity: SessionIdentity,
        account_id: impl Into<String>,
        peer: impl Into<String>,
        parent_peer: Option<String>,
        provider_id: impl Into<String>,
    ) -> Self {
        let session_key = identity.session_key();
        let storage_partition_key = identity.storage_partition_key();
        Self {
            identity,
            session_key,
            storage_partition_key,
            account_id: account_id.into(),
            peer: peer.into(),
            parent_peer,
            provider_id: provider_id.into(),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Outbound
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Progress state carried by a status payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusKind {
    Working,
    Done,
    Error,
}

impl StatusKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Working => "working",
            Self::Done => "done",
            Self::Error => "error",
        }
    }
}

/// One selectable option in a choice payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoiceOption {
    pub id: String,
    pub label: String,
}

/// Everything a caller can ask a channel to deliver.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OutboundPayload {
    Text {
        route: AgentRoute,
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        correlation_id: Option<String>,
    },
    Status {
        route: AgentRoute,
        status: StatusKind,
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        correlation_id: Option<String>,
    },
    Choice {
        route: AgentRoute,
        question: String,
        choices: Vec<ChoiceOption>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        correlation_id: Option<String>,
    },
    Reaction {
        route: AgentRoute,
        target_message_id: String,
        reaction: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        correlation_id: Option<String>,
    },
}

impl OutboundPayload {
    pub fn route(&self) -> &AgentRoute {
        match self {
            Self::Text { route, .. }
            | Self::Status { route, .. }
            | Self::Choice { route, .. }
            | Self::Reaction { route, .. } => route,
        }
    }

    pub fn correlation_id(&self) -> Option<&str> {
        match self {
            Self::Text { correlation_id, .. }
            | Self::Status { correlation_id, .. }
            | Self::Choice { correlation_id, .. }
            | Self::Reaction { correlation_id, .. } => correlation_id.as_deref(),
        }
    }
}

/// Returned by a channel boundary after a successful delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryReceipt {
    /// Platform-native message id of the delivered message.
    pub message_id: String,
    pub delivered_at: DateTime<Utc>,
}

impl DeliveryReceipt {
    pub fn new(message_id: impl Into<String>) -> Self {
        Self {
            message_id: message_id.into(),
            delivered_at: Utc::now(),
        }
    }
}
