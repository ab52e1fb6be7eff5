use serde::Serialize;

/// Structured trace events emitted across all AgentRelay crates.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    InboundAdmitted {
        channel: String,
        session_key: String,
        interrupt_bypass: bool,
    },
    InboundRejected {
        channel: String,
        code: String,
        message: String,
    },
    OutboundDispatched {
        channel: String,
        session_key: String,
        payload_type: String,
        message_id: String,
    },
    ProviderRetry {
        provider_id: String,
        attempt: u32,
        backoff_ms: u64,
    },
    ProviderFallback {
        from_provider: String,
        to_provider: String,
        reason: String,
    },
    SessionRestored {
        session_key: String,
    },
    SessionEvicted {
        session_key: String,
        reason: String,
    },
    SessionKilled {
        session_key: String,
        lost_steering: usize,
    },
    SteeringDropped {
        session_key: String,
        dropped: usize,
    },
    CronEnqueued {
        job: String,
        queue_len: usize,
    },
    CronDrained {
        job: String,
        remaining: usize,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "ar_event");
    }
}
