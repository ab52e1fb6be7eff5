//! The SDK port the primary adapter drives.
//!
//! The concrete LLM client (HTTP/SDK) lives outside the core; this is the
//! narrow surface it implements. Native frames are deliberately close to
//! what agent SDKs emit so the adapter's translation stays mechanical.

use std::path::PathBuf;

use ar_domain::error::Result;
use ar_domain::event::BoxStream;

use crate::active::CancelToken;

/// One provider-native frame.
#[derive(Debug, Clone)]
pub enum SdkEvent {
    /// The SDK opened (or resumed) a provider-side session.
    SessionStarted { session_id: String },

    /// A text content delta.
    TextDelta { text: String },

    /// A tool-use block appeared in the stream.
    ToolUseStarted {
        name: String,
        input: serde_json::Value,
    },

    /// A tool-use block finished.
    ToolUseFinished {
        name: String,
        output: serde_json::Value,
    },

    /// A usage-bearing frame. Counters may all be zero; the adapter filters.
    Usage {
        input_tokens: u64,
        output_tokens: u64,
        cache_read_input_tokens: Option<u64>,
        cache_creation_input_tokens: Option<u64>,
    },

    /// Context window occupancy.
    ContextWindow { used_tokens: u64, max_tokens: u64 },

    /// Normal end of the response.
    Completed,
}

/// Query parameters handed to the SDK.
#[derive(Debug, Clone, Default)]
pub struct SdkQuery {
    pub prompt: String,
    pub resume_session_id: Option<String>,
    pub working_dir: Option<PathBuf>,
}

/// The LLM client surface consumed by the primary adapter.
///
/// `open` returns the native frame stream; the SDK observes `cancel` and
/// terminates the stream when it fires. Errors surface as `Err` items with
/// whatever message/status the client has.
#[async_trait::async_trait]
pub trait AgentSdk: Send + Sync {
    async fn open(
        &self,
        query: SdkQuery,
        cancel: CancelToken,
    ) -> Result<BoxStream<'static, Result<SdkEvent>>>;

    /// Whether a provider-side session can be resumed.
    async fn can_resume(&self, session_id: &str) -> Result<bool>;
}
