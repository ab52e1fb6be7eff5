//! Inbound idempotency.
//!
//! Connectors retry on webhook timeouts and replay on reconnect; this
//! in-memory store tracks seen platform event ids with a TTL so a retried
//! event is dropped before it reaches normalization.

use std::collections::HashMap;
use std::time::{Duration, Instant};

pub struct DedupeStore {
    seen: parking_lot::Mutex<HashMap<String, Instant>>,
    ttl: Duration,
}

impl DedupeStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            seen: parking_lot::Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Returns `true` if this event id was already seen (duplicate).
    pub fn check_and_insert(&self, event_id: &str) -> bool {
        let mut map = self.seen.lock();
        let now = Instant::now();

        // Lazy cleanup when the map grows large.
        if map.len() > 10_000 {
            map.retain(|_, ts| now.duration_since(*ts) < self.ttl);
        }

        if let Some(ts) = map.get(event_id) {
            if now.duration_since(*ts) < self.ttl {
                return true;
            }
        }

        map.insert(event_id.to_string(), now);
        false
    }
}
