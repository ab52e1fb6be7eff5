use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Default id of the primary (SDK-backed) provider adapter.
pub const DEFAULT_PRIMARY_PROVIDER: &str = "claude";

/// Default id of the fallback (echo simulator) provider adapter.
pub const DEFAULT_FALLBACK_PROVIDER: &str = "codex";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Providers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvidersConfig {
    #[serde(default = "d_primary_adapter")]
    pub primary: AdapterConfig,
    #[serde(default = "d_fallback_adapter")]
    pub fallback: AdapterConfig,

    /// Per-provider retry policy overrides keyed by provider id. Providers
    /// without an entry use [`RetryPolicy::for_provider`].
    #[serde(default)]
    pub retry: HashMap<String, RetryPolicy>,

    /// Timeout the external client applies to a single request.
    #[serde(default = "d_timeout_ms")]
    pub default_timeout_ms: u64,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            primary: d_primary_adapter(),
            fallback: d_fallback_adapter(),
            retry: HashMap::new(),
            default_timeout_ms: d_timeout_ms(),
        }
    }
}

impl ProvidersConfig {
    /// Effective retry policy for a provider: config override or the
    /// built-in per-provider default.
    pub fn retry_policy(&self, provider_id: &str) -> RetryPolicy {
        self.retry
            .get(provider_id)
            .copied()
            .unwrap_or_else(|| RetryPolicy::for_provider(provider_id))
    }
}

/// One adapter's enablement + id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdapterConfig {
    pub id: String,
    #[serde(default = "d_true")]
    pub enabled: bool,
}

/// Retry policy for one provider in the orchestrator.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_backoff_ms: u64,
}

impl RetryPolicy {
    /// Built-in defaults: the primary gets one retry at 200ms base, the
    /// fallback none at 100ms, anything unknown behaves like the fallback.
    pub fn for_provider(provider_id: &str) -> Self {
        if provider_id == DEFAULT_PRIMARY_PROVIDER {
            Self {
                max_retries: 1,
                base_backoff_ms: 200,
            }
        } else {
            Self {
                max_retries: 0,
                base_backoff_ms: 100,
            }
        }
    }
}

fn d_primary_adapter() -> AdapterConfig {
    AdapterConfig {
        id: DEFAULT_PRIMARY_PROVIDER.into(),
        enabled: true,
    }
}

fn d_fallback_adapter() -> AdapterConfig {
    AdapterConfig {
        id: DEFAULT_FALLBACK_PROVIDER.into(),
        enabled: true,
    }
}

fn d_true() -> bool {
    true
}

fn d_timeout_ms() -> u64 {
    30_000
}
