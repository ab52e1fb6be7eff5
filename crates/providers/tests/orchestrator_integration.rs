//! End-to-end orchestration over real adapters: an SDK-backed primary that
//! rate-limits and the echo fallback that answers.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;

use ar_domain::config::RetryPolicy;
use ar_domain::error::Result;
use ar_domain::event::{BoxStream, DoneReason, ProviderEventKind};
use ar_providers::orchestrator::{ExecuteRequest, ProviderOrchestrator};
use ar_providers::sdk::{AgentSdk, SdkEvent, SdkQuery};
use ar_providers::{CancelToken, EchoProvider, ProviderQueryInput, ProviderRegistry, SdkProvider};

/// An SDK whose every stream fails with a rate limit.
struct RateLimitedSdk;

#[async_trait::async_trait]
impl AgentSdk for RateLimitedSdk {
    async fn open(
        &self,
        _query: SdkQuery,
        _cancel: CancelToken,
    ) -> Result<BoxStream<'static, Result<SdkEvent>>> {
        let stream = async_stream::stream! {
            yield Err(ar_domain::error::Error::Other(
                "429 Too Many Requests".into(),
            ));
        };
        Ok(Box::pin(stream))
    }

    async fn can_resume(&self, _session_id: &str) -> Result<bool> {
        Ok(false)
    }
}

#[tokio::test]
async fn rate_limited_primary_hands_over_to_echo() {
    let mut registry = ProviderRegistry::new();
    registry.register(Arc::new(SdkProvider::new("claude", Arc::new(RateLimitedSdk))));
    registry.register(Arc::new(EchoProvider::new("codex", true)));

    let policies = HashMap::from([(
        "claude".to_string(),
        RetryPolicy {
            max_retries: 0,
            base_backoff_ms: 100,
        },
    )]);
    let orchestrator = ProviderOrchestrator::new(Arc::new(registry), policies)
        .with_sleep(Arc::new(|_| Box::pin(async {})));

    let (tx, mut rx) = mpsc::channel(64);
    let outcome = orchestrator
        .execute(
            ExecuteRequest {
                primary_provider_id: "claude".into(),
                fallback_provider_id: Some("codex".into()),
                input: ProviderQueryInput {
                    prompt: "fallback response".into(),
                    session_key: "default:100:main".into(),
                    ..Default::default()
                },
            },
            tx,
        )
        .await
        .unwrap();

    assert_eq!(outcome.provider_id, "codex");

    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }

    // The primary's failure tail is visible (streaming responsiveness),
    // then the fallback's full answer.
    assert!(matches!(
        events[0].kind,
        ProviderEventKind::RateLimit {
            status_code: Some(429),
            ..
        }
    ));
    assert!(matches!(
        events[1].kind,
        ProviderEventKind::Done {
            reason: DoneReason::Failed,
            ..
        }
    ));

    let deltas: Vec<&str> = events
        .iter()
        .filter_map(|e| match &e.kind {
            ProviderEventKind::Text { delta } => Some(delta.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(deltas, vec!["fallback response"]);

    // Exactly one completed terminal from the provider that answered.
    let completed: Vec<_> = events
        .iter()
        .filter(|e| {
            matches!(
                e.kind,
                ProviderEventKind::Done {
                    reason: DoneReason::Completed,
                    ..
                }
            )
        })
        .collect();
    assert_eq!(completed.len(), 1);
    assert_eq!(completed[0].provider_id, "codex");
}
