//! Primary provider adapter — drives the injected agent SDK.
//!
//! Translates native SDK frames into the shared taxonomy. The adapter owns
//! an abort token per active query; `abort_query` fires it and the SDK
//! stream terminates, after which the adapter still emits a terminal
//! `done{aborted}` when anything was streamed.

use std::sync::Arc;

use futures_util::StreamExt;

use ar_domain::error::{
    normalize_provider_error, Error, ProviderErrorCode, Result,
};
use ar_domain::event::{
    DoneReason, EventStream, ProviderEvent, ProviderEventKind, ProviderQueryHandle,
    ResumeResult, ToolPhase,
};

use crate::active::ActiveQueryMap;
use crate::sdk::{AgentSdk, SdkEvent, SdkQuery};
use crate::traits::{ProviderAdapter, ProviderCapabilities, ProviderQueryInput};

pub struct SdkProvider {
    provider_id: String,
    sdk: Arc<dyn AgentSdk>,
    active: Arc<ActiveQueryMap>,
}

impl SdkProvider {
    pub fn new(provider_id: impl Into<String>, sdk: Arc<dyn AgentSdk>) -> Self {
        Self {
            provider_id: provider_id.into(),
            sdk,
            active: Arc::new(ActiveQueryMap::new()),
        }
    }

    /// In-flight query count (monitoring).
    pub fn active_queries(&self) -> usize {
        self.active.len()
    }
}

/// Translate one non-terminal SDK frame. Returns `None` for frames that are
/// filtered out (all-zero usage).
fn translate(frame: SdkEvent) -> Option<ProviderEventKind> {
    match frame {
        SdkEvent::SessionStarted { session_id } => Some(ProviderEventKind::Session {
            provider_session_id: session_id,
        }),
        SdkEvent::TextDelta { text } => Some(ProviderEventKind::Text { delta: text }),
        SdkEvent::ToolUseStarted { name, input } => Some(ProviderEventKind::Tool {
            name,
            phase: ToolPhase::Start,
            payload: input,
        }),
        SdkEvent::ToolUseFinished { name, output } => Some(ProviderEventKind::Tool {
            name,
            phase: ToolPhase::End,
            payload: output,
        }),
        SdkEvent::Usage {
            input_tokens,
            output_tokens,
            cache_read_input_tokens,
            cache_creation_input_tokens,
        } => {
            let cached = cache_read_input_tokens.unwrap_or(0)
                + cache_creation_input_tokens.unwrap_or(0);
            // Usage frames with nothing in them are noise.
            if input_tokens == 0 && output_tokens == 0 && cached == 0 {
                return None;
            }
            Some(ProviderEventKind::Usage {
                input_tokens,
                output_tokens,
                cache_read_input_tokens,
                cache_creation_input_tokens,
            })
        }
        SdkEvent::ContextWindow {
            used_tokens,
            max_tokens,
        } => Some(ProviderEventKind::Context {
            used_tokens,
            max_tokens,
        }),
        // Terminal frames are handled by the stream loop.
        SdkEvent::Completed => None,
    }
}

#[async_trait::async_trait]
impl ProviderAdapter for SdkProvider {
    fn provider_id(&self) -> &str {
        &self.provider_id
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            supports_resume: true,
            supports_mid_stream_injection: true,
            supports_tool_streaming: true,
        }
    }

    async fn start_query(&self, input: &ProviderQueryInput) -> Result<ProviderQueryHandle> {
        let handle = match &input.provider_session_id {
            Some(sid) => ProviderQueryHandle::with_session(sid.clone()),
            None => ProviderQueryHandle::new(),
        };
        self.active.register(&handle.query_id, input.clone());
        tracing::debug!(
            provider_id = %self.provider_id,
            query_id = %handle.query_id,
            "query registered"
        );
        Ok(handle)
    }

    async fn stream_events(&self, handle: &ProviderQueryHandle) -> Result<EventStream> {
        let input = self.active.input(&handle.query_id).ok_or_else(|| {
            Error::provider(
                &self.provider_id,
                ProviderErrorCode::Internal,
                format!("query {} was not started", handle.query_id),
            )
        })?;
        let token = self.active.token(&handle.query_id).ok_or_else(|| {
            Error::provider(
                &self.provider_id,
                ProviderErrorCode::Internal,
                format!("query {} has no cancel token", handle.query_id),
            )
        })?;

        let guard = self.active.release_guard(&handle.query_id);
        let sdk = Arc::clone(&self.sdk);
        let provider_id = self.provider_id.clone();
        let query_id = handle.query_id.clone();
        let query = SdkQuery {
            prompt: input.prompt,
            resume_session_id: input.provider_session_id,
            working_dir: input.working_dir,
        };

        let stream = async_stream::stream! {
            // Held until the stream is fully consumed or dropped.
            let _guard = guard;
            let event = |kind| ProviderEvent::new(provider_id.clone(), query_id.clone(), kind);

            let mut frames = match sdk.open(query, token.clone()).await {
                Ok(frames) => frames,
                Err(raw) => {
                    let ne = normalize_provider_error(&provider_id, raw);
                    for item in failure_events(&provider_id, &query_id, ne) {
                        yield item;
                    }
                    return;
                }
            };

            let mut streamed_any = false;
            let mut completed = false;

            loop {
                match frames.next().await {
                    Some(Ok(SdkEvent::Completed)) => {
                        completed = true;
                        break;
                    }
                    Some(Ok(frame)) => {
                        streamed_any = true;
                        if let Some(kind) = translate(frame) {
                            yield Ok(event(kind));
                        }
                    }
                    Some(Err(raw)) => {
                        let ne = normalize_provider_error(&provider_id, raw);
                        for item in failure_events(&provider_id, &query_id, ne) {
                            yield item;
                        }
                        return;
                    }
                    None => break,
                }
            }

            let reason = if completed {
                DoneReason::Completed
            } else if token.is_cancelled() && streamed_any {
                DoneReason::Aborted
            } else {
                DoneReason::Completed
            };
            yield Ok(event(ProviderEventKind::Done {
                reason,
                error_message: None,
            }));
        };

        Ok(Box::pin(stream))
    }

    async fn abort_query(&self, handle: &ProviderQueryHandle) -> Result<()> {
        self.active.cancel(&handle.query_id);
        Ok(())
    }

    async fn resume_session(&self, input: &ProviderQueryInput) -> Result<ResumeResult> {
        if let Some(sid) = &input.provider_session_id {
            if self.sdk.can_resume(sid).await? {
                return Ok(ResumeResult {
                    provider_session_id: sid.clone(),
                    resumed: true,
                });
            }
        }
        Ok(ResumeResult {
            provider_session_id: uuid::Uuid::new_v4().to_string(),
            resumed: false,
        })
    }
}

/// The failure tail of a stream: `rate_limit` (when applicable), then
/// `done{failed}`, then the thrown error.
fn failure_events(
    provider_id: &str,
    query_id: &str,
    ne: Error,
) -> Vec<Result<ProviderEvent>> {
    let mut events = Vec::with_capacity(3);

    let (message, status_code) = match &ne {
        Error::Provider {
            message,
            status_code,
            ..
        } => (message.clone(), *status_code),
        other => (other.to_string(), None),
    };

    if ne.provider_code() == Some(ProviderErrorCode::RateLimit) {
        events.push(Ok(ProviderEvent::new(
            provider_id,
            query_id,
            ProviderEventKind::RateLimit {
                retry_after_ms: None,
                status_code,
            },
        )));
    }

    events.push(Ok(ProviderEvent::new(
        provider_id,
        query_id,
        ProviderEventKind::Done {
            reason: DoneReason::Failed,
            error_message: Some(message),
        },
    )));
    events.push(Err(ne));
    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use ar_domain::event::BoxStream;
    use parking_lot::Mutex;

    use crate::active::CancelToken;

    /// Replays a scripted frame list; optionally cancels the query token
    /// after the nth frame to model an SDK observing the abort signal.
    struct FakeSdk {
        frames: Mutex<Vec<Result<SdkEvent>>>,
        resumable: bool,
    }

    impl FakeSdk {
        fn new(frames: Vec<Result<SdkEvent>>) -> Arc<Self> {
            Arc::new(Self {
                frames: Mutex::new(frames),
                resumable: true,
            })
        }
    }

    #[async_trait::async_trait]
    impl AgentSdk for FakeSdk {
        async fn open(
            &self,
            _query: SdkQuery,
            cancel: CancelToken,
        ) -> Result<BoxStream<'static, Result<SdkEvent>>> {
            let frames: Vec<Result<SdkEvent>> = self.frames.lock().drain(..).collect();
            let stream = async_stream::stream! {
                for frame in frames {
                    if cancel.is_cancelled() {
                        // SDK terminates mid-stream on abort.
                        return;
                    }
                    yield frame;
                }
            };
            Ok(Box::pin(stream))
        }

        async fn can_resume(&self, _session_id: &str) -> Result<bool> {
            Ok(self.resumable)
        }
    }

    async fn collect(
        provider: &SdkProvider,
        input: &ProviderQueryInput,
    ) -> (Vec<ProviderEvent>, Option<Error>) {
        let handle = provider.start_query(input).await.unwrap();
        let mut stream = provider.stream_events(&handle).await.unwrap();
        let mut events = Vec::new();
        let mut error = None;
        while let Some(item) = stream.next().await {
            match item {
                Ok(e) => events.push(e),
                Err(e) => error = Some(e),
            }
        }
        (events, error)
    }

    fn usage(input: u64, output: u64) -> SdkEvent {
        SdkEvent::Usage {
            input_tokens: input,
            output_tokens: output,
            cache_read_input_tokens: None,
            cache_creation_input_tokens: None,
        }
    }

    #[tokio::test]
    async fn translates_full_stream() {
        let sdk = FakeSdk::new(vec![
            Ok(SdkEvent::SessionStarted {
                session_id: "sess-1".into(),
            }),
            Ok(SdkEvent::TextDelta { text: "hel".into() }),
            Ok(SdkEvent::ToolUseStarted {
                name: "exec".into(),
                input: serde_json::json!({"cmd": "ls"}),
            }),
            Ok(SdkEvent::ToolUseFinished {
                name: "exec".into(),
                output: serde_json::json!({"exit": 0}),
            }),
            Ok(SdkEvent::TextDelta { text: "lo".into() }),
            Ok(usage(10, 5)),
            Ok(SdkEvent::ContextWindow {
                used_tokens: 1200,
                max_tokens: 200_000,
            }),
            Ok(SdkEvent::Completed),
        ]);
        let provider = SdkProvider::new("claude", sdk);
        let (events, error) = collect(&provider, &ProviderQueryInput::default()).await;

        assert!(error.is_none());
        assert!(matches!(
            events[0].kind,
            ProviderEventKind::Session { .. }
        ));
        let done_count = events.iter().filter(|e| e.is_done()).count();
        assert_eq!(done_count, 1);
        assert!(events.last().unwrap().is_done());
        assert!(matches!(
            events.last().unwrap().kind,
            ProviderEventKind::Done {
                reason: DoneReason::Completed,
                ..
            }
        ));
        assert!(events
            .iter()
            .any(|e| matches!(e.kind, ProviderEventKind::Tool { phase: ToolPhase::Start, .. })));
        // Every event carries the envelope.
        for e in &events {
            assert_eq!(e.provider_id, "claude");
            assert!(!e.query_id.is_empty());
        }
    }

    #[tokio::test]
    async fn zero_usage_frames_are_dropped() {
        let sdk = FakeSdk::new(vec![
            Ok(usage(0, 0)),
            Ok(usage(3, 0)),
            Ok(SdkEvent::Completed),
        ]);
        let provider = SdkProvider::new("claude", sdk);
        let (events, _) = collect(&provider, &ProviderQueryInput::default()).await;

        let usage_events: Vec<_> = events
            .iter()
            .filter(|e| matches!(e.kind, ProviderEventKind::Usage { .. }))
            .collect();
        assert_eq!(usage_events.len(), 1);
    }

    #[tokio::test]
    async fn rate_limit_failure_emits_tail_then_error() {
        let sdk = FakeSdk::new(vec![
            Ok(SdkEvent::TextDelta {
                text: "partial".into(),
            }),
            Err(Error::Other("HTTP 429: rate limit".into())),
        ]);
        let provider = SdkProvider::new("claude", sdk);
        let (events, error) = collect(&provider, &ProviderQueryInput::default()).await;

        assert!(matches!(events[0].kind, ProviderEventKind::Text { .. }));
        assert!(matches!(
            events[1].kind,
            ProviderEventKind::RateLimit {
                status_code: Some(429),
                ..
            }
        ));
        assert!(matches!(
            events[2].kind,
            ProviderEventKind::Done {
                reason: DoneReason::Failed,
                ..
            }
        ));
        assert_eq!(
            error.unwrap().provider_code(),
            Some(ProviderErrorCode::RateLimit)
        );
        assert_eq!(provider.active_queries(), 0);
    }

    #[tokio::test]
    async fn non_rate_limit_failure_skips_rate_limit_event() {
        let sdk = FakeSdk::new(vec![Err(Error::Other("401 unauthorized".into()))]);
        let provider = SdkProvider::new("claude", sdk);
        let (events, error) = collect(&provider, &ProviderQueryInput::default()).await;

        assert_eq!(events.len(), 1);
        assert!(matches!(
            events[0].kind,
            ProviderEventKind::Done {
                reason: DoneReason::Failed,
                ..
            }
        ));
        assert_eq!(error.unwrap().provider_code(), Some(ProviderErrorCode::Auth));
    }

    #[tokio::test]
    async fn abort_mid_stream_yields_done_aborted() {
        let sdk = FakeSdk::new(vec![
            Ok(SdkEvent::TextDelta { text: "a".into() }),
            Ok(SdkEvent::TextDelta { text: "b".into() }),
            Ok(SdkEvent::Completed),
        ]);
        let provider = SdkProvider::new("claude", sdk);

        let handle = provider
            .start_query(&ProviderQueryInput::default())
            .await
            .unwrap();
        let mut stream = provider.stream_events(&handle).await.unwrap();

        // First delta arrives, then the caller aborts.
        let first = stream.next().await.unwrap().unwrap();
        assert!(matches!(first.kind, ProviderEventKind::Text { .. }));
        provider.abort_query(&handle).await.unwrap();

        let mut last = first;
        while let Some(item) = stream.next().await {
            last = item.unwrap();
        }
        assert!(matches!(
            last.kind,
            ProviderEventKind::Done {
                reason: DoneReason::Aborted,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn abort_is_idempotent() {
        let sdk = FakeSdk::new(vec![]);
        let provider = SdkProvider::new("claude", sdk);
        let handle = provider
            .start_query(&ProviderQueryInput::default())
            .await
            .unwrap();
        provider.abort_query(&handle).await.unwrap();
        provider.abort_query(&handle).await.unwrap();
    }

    #[tokio::test]
    async fn resume_known_session() {
        let sdk = FakeSdk::new(vec![]);
        let provider = SdkProvider::new("claude", sdk);
        let input = ProviderQueryInput {
            provider_session_id: Some("sess-9".into()),
            ..Default::default()
        };
        let result = provider.resume_session(&input).await.unwrap();
        assert!(result.resumed);
        assert_eq!(result.provider_session_id, "sess-9");
    }

    #[tokio::test]
    async fn resume_without_prior_session_mints_new() {
        let sdk = FakeSdk::new(vec![]);
        let provider = SdkProvider::new("claude", sdk);
        let result = provider
            .resume_session(&ProviderQueryInput::default())
            .await
            .unwrap();
        assert!(!result.resumed);
        assert!(!result.provider_session_id.is_empty());
    }
}
