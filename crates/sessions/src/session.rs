//! The per-identity session object.
//!
//! Tracks the provider-side session id, token counters, context window
//! occupancy, activity timestamps, and a bounded steering buffer for
//! messages that arrive while a query is mid-stream.

use std::collections::VecDeque;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use ar_domain::identity::SessionIdentity;

/// Steering messages kept per session; older entries are dropped first.
pub const STEERING_CAPACITY: usize = 100;

/// Separator between steering messages when the buffer is consumed.
const STEERING_JOIN: &str = "\n---\n";

/// One buffered steering message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SteeringMessage {
    pub text: String,
    pub timestamp_ms: i64,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Session
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone)]
pub struct Session {
    pub session_key: String,
    pub identity: SessionIdentity,
    pub provider_session_id: Option<String>,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub total_queries: u64,
    pub context_window_usage: u64,
    pub context_window_size: u64,
    pub last_activity: DateTime<Utc>,
    pub session_start_time: Option<DateTime<Utc>>,
    pub is_running: bool,
    pub is_active: bool,
    pub working_dir: Option<PathBuf>,
    steering: VecDeque<SteeringMessage>,
}

impl Session {
    pub fn new(identity: SessionIdentity) -> Self {
        Self {
            session_key: identity.session_key(),
            identity,
            provider_session_id: None,
            total_input_tokens: 0,
            total_output_tokens: 0,
            total_queries: 0,
            context_window_usage: 0,
            context_window_size: 0,
            last_activity: Utc::now(),
            session_start_time: Some(Utc::now()),
            is_running: false,
            is_active: true,
            working_dir: None,
            steering: VecDeque::new(),
        }
    }

    pub fn touch(&mut self) {
        self.last_activity = Utc::now();
    }

    /// Apply one usage event. Counters only ever grow.
    pub fn apply_usage(&mut self, input_tokens: u64, output_tokens: u64) {
        self.total_input_tokens += input_tokens;
        self.total_output_tokens += output_tokens;
        self.touch();
    }

    pub fn record_query(&mut self) {
        self.total_queries += 1;
        self.touch();
    }

    pub fn set_context_window(&mut self, used_tokens: u64, max_tokens: u64) {
        self.context_window_usage = used_tokens;
        self.context_window_size = max_tokens;
    }

    // ── Steering buffer ────────────────────────────────────────────

    /// Append a steering message. When the buffer would exceed capacity,
    /// the oldest entries are dropped and returned — never silently.
    pub fn add_steering(&mut self, text: impl Into<String>, timestamp_ms: i64) -> Vec<SteeringMessage> {
        self.steering.push_back(SteeringMessage {
            text: text.into(),
            timestamp_ms,
        });

        let mut dropped = Vec::new();
        while self.steering.len() > STEERING_CAPACITY {
            if let Some(old) = self.steering.pop_front() {
                dropped.push(old);
            }
        }
        dropped
    }

    /// Drain the buffer into one string, oldest first.
    pub fn consume_steering(&mut self) -> Option<String> {
        if self.steering.is_empty() {
            return None;
        }
        let joined = self
            .steering
            .drain(..)
            .map(|m| m.text)
            .collect::<Vec<_>>()
            .join(STEERING_JOIN);
        Some(joined)
    }

    pub fn steering_len(&self) -> usize {
        self.steering.len()
    }

    /// Texts still buffered (reported when a session is killed).
    pub fn steering_texts(&self) -> Vec<String> {
        self.steering.iter().map(|m| m.text.clone()).collect()
    }

    // ── Snapshot mapping ───────────────────────────────────────────

    pub fn to_data(&self) -> SessionData {
        SessionData {
            session_key: Some(self.session_key.clone()),
            session_id: self.provider_session_id.clone(),
            saved_at: Utc::now(),
            working_dir: self.working_dir.clone(),
            context_window_usage: self.context_window_usage,
            context_window_size: self.context_window_size,
            total_input_tokens: self.total_input_tokens,
            total_output_tokens: self.total_output_tokens,
            total_queries: self.total_queries,
            session_start_time: self.session_start_time,
        }
    }

    pub fn restore_from_data(&mut self, data: &SessionData) {
        self.provider_session_id = data.session_id.clone();
        self.working_dir = data.working_dir.clone();
        self.context_window_usage = data.context_window_usage;
        self.context_window_size = data.context_window_size;
        self.total_input_tokens = data.total_input_tokens;
        self.total_output_tokens = data.total_output_tokens;
        self.total_queries = data.total_queries;
        self.session_start_time = data.session_start_time;
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Snapshot data
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// On-disk snapshot shape. Field names are part of the persisted format;
/// the camelCase ones match what older deployments wrote.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionData {
    /// Canonical session key. Filenames replace `:` with `_`, which is not
    /// reversible when an id contains underscores, so the key travels in
    /// the payload too.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_key: Option<String>,

    /// Provider-side session id.
    #[serde(default)]
    pub session_id: Option<String>,

    pub saved_at: DateTime<Utc>,

    #[serde(default)]
    pub working_dir: Option<PathBuf>,

    #[serde(rename = "contextWindowUsage", default)]
    pub context_window_usage: u64,

    #[serde(rename = "contextWindowSize", default)]
    pub context_window_size: u64,

    #[serde(rename = "totalInputTokens", default)]
    pub total_input_tokens: u64,

    #[serde(rename = "totalOutputTokens", default)]
    pub total_output_tokens: u64,

    #[serde(rename = "totalQueries", default)]
    pub total_queries: u64,

    #[serde(
        rename = "sessionStartTime",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub session_start_time: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        let identity = SessionIdentity::new("default", "100", "main").unwrap();
        Session::new(identity)
    }

    #[test]
    fn usage_is_monotonic() {
        let mut s = session();
        s.apply_usage(10, 5);
        s.apply_usage(0, 0);
        s.apply_usage(3, 7);
        assert_eq!(s.total_input_tokens, 13);
        assert_eq!(s.total_output_tokens, 12);
    }

    #[test]
    fn steering_buffer_bounded_at_capacity() {
        let mut s = session();
        let mut total_dropped = 0;
        for i in 0..150 {
            total_dropped += s.add_steering(format!("msg {i}"), i as i64).len();
        }
        assert_eq!(s.steering_len(), STEERING_CAPACITY);
        assert_eq!(total_dropped, 50);
    }

    #[test]
    fn drops_come_from_the_head() {
        let mut s = session();
        for i in 0..STEERING_CAPACITY {
            assert!(s.add_steering(format!("msg {i}"), i as i64).is_empty());
        }
        let dropped = s.add_steering("newest", 999);
        assert_eq!(dropped.len(), 1);
        assert_eq!(dropped[0].text, "msg 0");
    }

    #[test]
    fn consume_preserves_order_and_clears() {
        let mut s = session();
        for i in 0..50 {
            s.add_steering(format!("msg {i}"), i as i64);
        }
        let joined = s.consume_steering().unwrap();
        assert!(joined.starts_with("msg 0"));
        assert!(joined.ends_with("msg 49"));
        assert!(joined.contains("\n---\n"));
        assert_eq!(s.steering_len(), 0);
        assert!(s.consume_steering().is_none());
    }

    #[test]
    fn snapshot_round_trip_preserves_counters() {
        let mut s = session();
        s.provider_session_id = Some("sess-1".into());
        s.apply_usage(120, 45);
        s.record_query();
        s.record_query();
        s.set_context_window(9000, 200_000);

        let data = s.to_data();
        let mut restored = session();
        restored.restore_from_data(&data);

        assert_eq!(restored.provider_session_id.as_deref(), Some("sess-1"));
        assert_eq!(restored.total_input_tokens, 120);
        assert_eq!(restored.total_output_tokens, 45);
        assert_eq!(restored.total_queries, 2);
        assert_eq!(restored.context_window_usage, 9000);
        assert_eq!(restored.context_window_size, 200_000);
        assert_eq!(restored.session_start_time, s.session_start_time);
    }

    #[test]
    fn snapshot_serializes_legacy_field_names() {
        let mut s = session();
        s.apply_usage(7, 3);
        let json = serde_json::to_value(s.to_data()).unwrap();
        assert_eq!(json["totalInputTokens"], 7);
        assert_eq!(json["totalOutputTokens"], 3);
        assert!(json.get("total_input_tokens").is_none());
        assert!(json.get("saved_at").is_some());
    }
}
