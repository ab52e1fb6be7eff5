//! Provider orchestrator — retry, backoff, and the rate-limit fallback
//! chain.
//!
//! One `execute` call produces exactly one complete event stream to the
//! caller's channel. Retryable failures back off exponentially
//! (`base * 2^attempt`); a rate-limited provider hands over to the fallback
//! when one is configured. The sleep function is injectable so tests can
//! observe backoff without waiting.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::sync::mpsc;

use ar_domain::config::RetryPolicy;
use ar_domain::error::{
    normalize_provider_error, Error, ProviderErrorCode, Result,
};
use ar_domain::event::{ProviderEvent, ProviderQueryHandle};
use ar_domain::trace::TraceEvent;

use crate::registry::ProviderRegistry;
use crate::traits::{ProviderAdapter, ProviderQueryInput};

pub type SleepFuture = Pin<Box<dyn Future<Output = ()> + Send>>;
pub type SleepFn = Arc<dyn Fn(Duration) -> SleepFuture + Send + Sync>;

/// One provider query request.
#[derive(Debug, Clone)]
pub struct ExecuteRequest {
    pub primary_provider_id: String,
    pub fallback_provider_id: Option<String>,
    pub input: ProviderQueryInput,
}

/// Which provider ultimately answered, and in how many attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryOutcome {
    pub provider_id: String,
    pub attempts: u32,
}

pub struct ProviderOrchestrator {
    registry: Arc<ProviderRegistry>,
    policies: HashMap<String, RetryPolicy>,
    sleep: SleepFn,
}

impl ProviderOrchestrator {
    pub fn new(registry: Arc<ProviderRegistry>, policies: HashMap<String, RetryPolicy>) -> Self {
        Self {
            registry,
            policies,
            sleep: Arc::new(|d| Box::pin(tokio::time::sleep(d))),
        }
    }

    /// Replace the sleep function (tests record backoff instead of waiting).
    pub fn with_sleep(mut self, sleep: SleepFn) -> Self {
        self.sleep = sleep;
        self
    }

    fn policy(&self, provider_id: &str) -> RetryPolicy {
        self.policies
            .get(provider_id)
            .copied()
            .unwrap_or_else(|| RetryPolicy::for_provider(provider_id))
    }

    /// Drive one query through the provider chain.
    ///
    /// Events stream to `on_event` in emission order; partial output from a
    /// failed primary may be followed by the fallback's full output (the
    /// price of streaming responsiveness).
    pub async fn execute(
        &self,
        req: ExecuteRequest,
        on_event: mpsc::Sender<ProviderEvent>,
    ) -> Result<QueryOutcome> {
        let mut chain = vec![req.primary_provider_id.as_str()];
        if let Some(fallback) = req.fallback_provider_id.as_deref() {
            chain.push(fallback);
        }

        let mut last_error: Option<Error> = None;

        for (idx, provider_id) in chain.iter().enumerate() {
            // A missing adapter is a wiring bug; never caught here.
            let adapter = self.registry.get_or_throw(provider_id)?;
            let policy = self.policy(provider_id);
            let mut attempt: u32 = 0;

            loop {
                match self.run_attempt(&adapter, &req.input, &on_event).await {
                    Ok(()) => {
                        return Ok(QueryOutcome {
                            provider_id: (*provider_id).to_owned(),
                            attempts: attempt + 1,
                        });
                    }
                    Err(raw) => {
                        let ne = normalize_provider_error(provider_id, raw);
                        let is_rate_limit =
                            ne.provider_code() == Some(ProviderErrorCode::RateLimit);

                        if ne.retryable() && attempt < policy.max_retries {
                            let backoff_ms = policy.base_backoff_ms * 2u64.pow(attempt);
                            TraceEvent::ProviderRetry {
                                provider_id: (*provider_id).to_owned(),
                                attempt,
                                backoff_ms,
                            }
                            .emit();
                            (self.sleep)(Duration::from_millis(backoff_ms)).await;
                            attempt += 1;
                            last_error = Some(ne);
                            continue;
                        }

                        if is_rate_limit && req.fallback_provider_id.is_some() {
                            if let Some(next) = chain.get(idx + 1) {
                                TraceEvent::ProviderFallback {
                                    from_provider: (*provider_id).to_owned(),
                                    to_provider: (*next).to_owned(),
                                    reason: ne.to_string(),
                                }
                                .emit();
                            }
                            last_error = Some(ne);
                            break;
                        }

                        return Err(ne);
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            Error::provider(
                "orchestrator",
                ProviderErrorCode::Internal,
                "provider chain exhausted without an attempt",
            )
        }))
    }

    async fn run_attempt(
        &self,
        adapter: &Arc<dyn ProviderAdapter>,
        input: &ProviderQueryInput,
        on_event: &mpsc::Sender<ProviderEvent>,
    ) -> Result<()> {
        let handle = adapter.start_query(input).await?;
        let result = drive_stream(adapter, &handle, on_event).await;

        // Best-effort: idempotent, harmless after completion, and the only
        // way to reach a stream the caller stopped consuming.
        if let Err(e) = adapter.abort_query(&handle).await {
            tracing::debug!(
                provider_id = %adapter.provider_id(),
                error = %e,
                "post-attempt abort failed"
            );
        }
        result
    }
}

async fn drive_stream(
    adapter: &Arc<dyn ProviderAdapter>,
    handle: &ProviderQueryHandle,
    on_event: &mpsc::Sender<ProviderEvent>,
) -> Result<()> {
    let mut stream = adapter.stream_events(handle).await?;
    while let Some(item) = stream.next().await {
        let event = item?;
        // Awaited send keeps per-query delivery strictly serialized.
        if on_event.send(event).await.is_err() {
            return Err(Error::provider(
                adapter.provider_id(),
                ProviderErrorCode::Abort,
                "event receiver dropped",
            ));
        }
    }
    Ok(())
}
