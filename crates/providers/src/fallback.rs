//! Fallback provider adapter — a deterministic echo simulator.
//!
//! Used when the primary is rate-limited (and in dry-run deployments with
//! no SDK credentials at all). Echoes the prompt as a single text event and
//! synthesizes usage from a words-to-tokens estimate.

use std::sync::Arc;

use ar_domain::error::{Error, ProviderErrorCode, Result};
use ar_domain::event::{
    DoneReason, EventStream, ProviderEvent, ProviderEventKind, ProviderQueryHandle,
    ResumeResult,
};

use crate::active::ActiveQueryMap;
use crate::traits::{ProviderAdapter, ProviderCapabilities, ProviderQueryInput};

/// Estimate tokens from a word count. English averages ~1.4 tokens/word.
fn estimate_tokens(text: &str) -> u64 {
    let words = text.split_whitespace().count() as f64;
    (words * 1.4).ceil() as u64
}

pub struct EchoProvider {
    provider_id: String,
    enabled: bool,
    active: Arc<ActiveQueryMap>,
}

impl EchoProvider {
    pub fn new(provider_id: impl Into<String>, enabled: bool) -> Self {
        Self {
            provider_id: provider_id.into(),
            enabled,
            active: Arc::new(ActiveQueryMap::new()),
        }
    }
}

#[async_trait::async_trait]
impl ProviderAdapter for EchoProvider {
    fn provider_id(&self) -> &str {
        &self.provider_id
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            supports_resume: false,
            supports_mid_stream_injection: false,
            supports_tool_streaming: false,
        }
    }

    async fn start_query(&self, input: &ProviderQueryInput) -> Result<ProviderQueryHandle> {
        if !self.enabled {
            return Err(Error::provider(
                &self.provider_id,
                ProviderErrorCode::InvalidRequest,
                "fallback provider is disabled by configuration",
            ));
        }
        let handle = ProviderQueryHandle::new();
        self.active.register(&handle.query_id, input.clone());
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

        let guard = self.active.release_guard(&handle.query_id);
        let provider_id = self.provider_id.clone();
        let query_id = handle.query_id.clone();
        let tokens = estimate_tokens(&input.prompt);

        let stream = async_stream::stream! {
            let _guard = guard;
            yield Ok(ProviderEvent::new(
                provider_id.clone(),
                query_id.clone(),
                ProviderEventKind::Text {
                    delta: input.prompt.clone(),
                },
            ));
            if tokens > 0 {
                yield Ok(ProviderEvent::new(
                    provider_id.clone(),
                    query_id.clone(),
                    ProviderEventKind::Usage {
                        input_tokens: tokens,
                        output_tokens: tokens,
                        cache_read_input_tokens: None,
                        cache_creation_input_tokens: None,
                    },
                ));
            }
            yield Ok(ProviderEvent::new(
                provider_id,
                query_id,
                ProviderEventKind::Done {
                    reason: DoneReason::Completed,
                    error_message: None,
                },
            ));
        };

        Ok(Box::pin(stream))
    }

    async fn abort_query(&self, handle: &ProviderQueryHandle) -> Result<()> {
        self.active.cancel(&handle.query_id);
        Ok(())
    }

    async fn resume_session(&self, _input: &ProviderQueryInput) -> Result<ResumeResult> {
        // Echo sessions are stateless; every call is a fresh session.
        Ok(ResumeResult {
            provider_session_id: uuid::Uuid::new_v4().to_string(),
            resumed: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;

    async fn collect(provider: &EchoProvider, prompt: &str) -> Vec<ProviderEvent> {
        let input = ProviderQueryInput {
            prompt: prompt.into(),
            ..Default::default()
        };
        let handle = provider.start_query(&input).await.unwrap();
        let mut stream = provider.stream_events(&handle).await.unwrap();
        let mut events = Vec::new();
        while let Some(item) = stream.next().await {
            events.push(item.unwrap());
        }
        events
    }

    #[tokio::test]
    async fn echoes_prompt_with_synthetic_usage() {
        let provider = EchoProvider::new("codex", true);
        let events = collect(&provider, "five words in this prompt").await;

        assert!(matches!(
            &events[0].kind,
            ProviderEventKind::Text { delta } if delta == "five words in this prompt"
        ));
        // ceil(5 * 1.4) = 7 tokens, both directions.
        assert!(matches!(
            events[1].kind,
            ProviderEventKind::Usage {
                input_tokens: 7,
                output_tokens: 7,
                ..
            }
        ));
        assert!(events[2].is_done());
        assert_eq!(events.len(), 3);
    }

    #[tokio::test]
    async fn empty_prompt_skips_usage() {
        let provider = EchoProvider::new("codex", true);
        let events = collect(&provider, "").await;
        assert_eq!(events.len(), 2);
        assert!(events[1].is_done());
    }

    #[tokio::test]
    async fn disabled_rejects_immediately() {
        let provider = EchoProvider::new("codex", false);
        let err = provider
            .start_query(&ProviderQueryInput::default())
            .await
            .unwrap_err();
        assert_eq!(
            err.provider_code(),
            Some(ProviderErrorCode::InvalidRequest)
        );
    }

    #[test]
    fn token_estimate_rounds_up() {
        assert_eq!(estimate_tokens("one two three"), 5); // ceil(4.2)
        assert_eq!(estimate_tokens("word"), 2); // ceil(1.4)
        assert_eq!(estimate_tokens(""), 0);
    }
}
