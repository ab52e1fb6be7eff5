//! Timestamp-monotonic admission per `(channel, thread)`.
//!
//! The gate remembers the maximum observed timestamp for each pair. Older
//! events are rejected, except interrupts (`!`-prefixed text), which are
//! admitted without advancing the maximum so that the interrupt does not
//! mask genuinely newer traffic.

use std::collections::HashMap;

use parking_lot::Mutex;

use ar_domain::error::{ChannelErrorCode, Error, Result};

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admission {
    /// The event was older than the watermark but admitted as an interrupt.
    pub interrupt_bypass_applied: bool,
}

/// Per-`(channel_id, thread_id)` high-watermark gate.
pub struct OrderingGate {
    max_seen: Mutex<HashMap<(String, String), i64>>,
}

impl Default for OrderingGate {
    fn default() -> Self {
        Self::new()
    }
}

impl OrderingGate {
    pub fn new() -> Self {
        Self {
            max_seen: Mutex::new(HashMap::new()),
        }
    }

    /// Admit or reject one event.
    ///
    /// Admitted in-order events advance the watermark. Out-of-order
    /// interrupts are admitted with `interrupt_bypass_applied = true` and do
    /// NOT advance it; anything else out-of-order fails with
    /// `CHANNEL_INVALID_PAYLOAD`.
    pub fn admit(
        &self,
        channel_id: &str,
        thread_id: &str,
        timestamp_ms: i64,
        is_interrupt: bool,
    ) -> Result<Admission> {
        let key = (channel_id.to_owned(), thread_id.to_owned());
        let mut max_seen = self.max_seen.lock();

        match max_seen.get(&key) {
            Some(&max) if timestamp_ms < max => {
                if is_interrupt {
                    // Watermark intentionally untouched.
                    Ok(Admission {
                        interrupt_bypass_applied: true,
                    })
                } else {
                    Err(Error::channel(
                        ChannelErrorCode::InvalidPayload,
                        format!(
                            "out-of-order event: timestamp {timestamp_ms} < watermark {max} \
                             for {channel_id}/{thread_id}"
                        ),
                    ))
                }
            }
            _ => {
                max_seen.insert(key, timestamp_ms);
                Ok(Admission {
                    interrupt_bypass_applied: false,
                })
            }
        }
    }

    /// Current watermark for a pair, if any traffic was seen.
    pub fn watermark(&self, channel_id: &str, thread_id: &str) -> Option<i64> {
        self.max_seen
            .lock()
            .get(&(channel_id.to_owned(), thread_id.to_owned()))
            .copied()
    }
}
