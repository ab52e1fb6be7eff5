use std::path::PathBuf;

use ar_domain::error::Result;
use ar_domain::event::{EventStream, ProviderQueryHandle, ResumeResult};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Request types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A provider-agnostic query.
#[derive(Debug, Clone, Default)]
pub struct ProviderQueryInput {
    /// The user prompt (steering buffer already folded in by the caller).
    pub prompt: String,
    /// Canonical session key the query belongs to.
    pub session_key: String,
    /// Provider-side session to resume, when the adapter supports it.
    pub provider_session_id: Option<String>,
    /// Working directory the provider executes in, when applicable.
    pub working_dir: Option<PathBuf>,
}

/// What an adapter can do beyond plain text streaming.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderCapabilities {
    pub supports_resume: bool,
    pub supports_mid_stream_injection: bool,
    pub supports_tool_streaming: bool,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Core adapter trait
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Trait every provider adapter implements.
///
/// The event stream returned by [`ProviderAdapter::stream_events`] carries
/// the shared taxonomy: an `Ok` item is a normalized event, an `Err` item is
/// the normalized terminal failure (emitted after the adapter's own
/// `rate_limit` and `done{failed}` events). A well-formed stream yields
/// exactly one `done` event, last among the `Ok` items.
#[async_trait::async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Stable provider id (`"claude"`, `"codex"`).
    fn provider_id(&self) -> &str;

    fn capabilities(&self) -> ProviderCapabilities;

    /// Register the query in the adapter's active set and return a handle.
    async fn start_query(&self, input: &ProviderQueryInput) -> Result<ProviderQueryHandle>;

    /// Open the normalized event stream for a started query. The query is
    /// removed from the active set when the stream finishes, error or not.
    async fn stream_events(&self, handle: &ProviderQueryHandle) -> Result<EventStream>;

    /// Abort a running query. Idempotent; aborting an unknown or finished
    /// query is a no-op.
    async fn abort_query(&self, handle: &ProviderQueryHandle) -> Result<()>;

    /// Resolve (or mint) the provider-side session for this input.
    async fn resume_session(&self, input: &ProviderQueryInput) -> Result<ResumeResult>;
}

impl std::fmt::Debug for dyn ProviderAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderAdapter")
            .field("provider_id", &self.provider_id())
            .finish()
    }
}
