//! Provider event taxonomy — the one stream shape every adapter emits.
//!
//! Provider-native frames (SDK messages, SSE chunks, simulator output) are
//! translated into [`ProviderEvent`] so the rest of the runtime never sees a
//! provider-specific type. A well-formed stream for one query ends with
//! exactly one `done` event.

use std::pin::Pin;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A boxed async stream, used for provider event streams.
pub type BoxStream<'a, T> = Pin<Box<dyn futures_core::Stream<Item = T> + Send + 'a>>;

/// The stream type every provider adapter returns.
pub type EventStream = BoxStream<'static, Result<ProviderEvent>>;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Event
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One normalized provider event. The envelope fields are stamped on every
/// event regardless of kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderEvent {
    pub provider_id: String,
    pub query_id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: ProviderEventKind,
}

impl ProviderEvent {
    pub fn new(
        provider_id: impl Into<String>,
        query_id: impl Into<String>,
        kind: ProviderEventKind,
    ) -> Self {
        Self {
            provider_id: provider_id.into(),
            query_id: query_id.into(),
            timestamp: Utc::now(),
            kind,
        }
    }

    /// Whether this is the terminal event of a stream.
    pub fn is_done(&self) -> bool {
        matches!(self.kind, ProviderEventKind::Done { .. })
    }
}

/// Phase of a streamed tool invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolPhase {
    Start,
    Delta,
    End,
}

/// Why a stream terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DoneReason {
    Completed,
    Aborted,
    Failed,
}

/// Events emitted during provider streaming (provider-agnostic).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderEventKind {
    /// The provider opened (or resumed) a provider-side session.
    Session { provider_session_id: String },

    /// A text chunk.
    Text { delta: String },

    /// A tool invocation phase.
    Tool {
        name: String,
        phase: ToolPhase,
        payload: serde_json::Value,
    },

    /// Additive token usage. Adapters only emit this when at least one
    /// counter is positive.
    Usage {
        input_tokens: u64,
        output_tokens: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cache_read_input_tokens: Option<u64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cache_creation_input_tokens: Option<u64>,
    },

    /// Context window occupancy.
    Context { used_tokens: u64, max_tokens: u64 },

    /// The provider reported throttling. Emitted before the failure `done`.
    RateLimit {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        retry_after_ms: Option<u64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        status_code: Option<u16>,
    },

    /// Terminal event; exactly one per query stream.
    Done {
        reason: DoneReason,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error_message: Option<String>,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Query handle & resume
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Handle returned by `start_query`, identifying the in-flight query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderQueryHandle {
    pub query_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_session_id: Option<String>,
}

impl ProviderQueryHandle {
    pub fn new() -> Self {
        Self {
            query_id: uuid::Uuid::new_v4().to_string(),
            provider_session_id: None,
        }
    }

    pub fn with_session(provider_session_id: impl Into<String>) -> Self {
        Self {
            query_id: uuid::Uuid::new_v4().to_string(),
            provider_session_id: Some(provider_session_id.into()),
        }
    }
}

impl Default for ProviderQueryHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of a `resume_session` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumeResult {
    pub provider_session_id: String,
    pub resumed: bool,
}
