//! Per-query cancellation tokens and the active query set.
//!
//! Each started query gets a [`CancelToken`]; `abort_query` fires it, which
//! the adapter's underlying stream observes. The [`ActiveQueryMap`] also
//! keeps the original input so `stream_events` can be called with just the
//! handle. Release is guard-based: the entry is removed when the stream
//! finishes, error or not.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::traits::ProviderQueryInput;

/// A cancellation token the streaming loop checks between frames.
#[derive(Clone)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Signal cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Check if cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

struct ActiveQuery {
    token: CancelToken,
    input: ProviderQueryInput,
}

/// Tracks in-flight queries per query id.
#[derive(Default)]
pub struct ActiveQueryMap {
    entries: Mutex<HashMap<String, ActiveQuery>>,
}

impl ActiveQueryMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a query; returns its cancel token.
    pub fn register(&self, query_id: &str, input: ProviderQueryInput) -> CancelToken {
        let token = CancelToken::new();
        self.entries.lock().insert(
            query_id.to_owned(),
            ActiveQuery {
                token: token.clone(),
                input,
            },
        );
        token
    }

    /// The cancel token for a running query.
    pub fn token(&self, query_id: &str) -> Option<CancelToken> {
        self.entries.lock().get(query_id).map(|q| q.token.clone())
    }

    /// The input a query was started with.
    pub fn input(&self, query_id: &str) -> Option<ProviderQueryInput> {
        self.entries.lock().get(query_id).map(|q| q.input.clone())
    }

    /// Cancel a running query. Idempotent; returns whether it was active.
    pub fn cancel(&self, query_id: &str) -> bool {
        match self.entries.lock().get(query_id) {
            Some(q) => {
                q.token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn remove(&self, query_id: &str) {
        self.entries.lock().remove(query_id);
    }

    pub fn is_active(&self, query_id: &str) -> bool {
        self.entries.lock().contains_key(query_id)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Guard that removes the query when dropped, however the stream ends.
    pub fn release_guard(self: &Arc<Self>, query_id: &str) -> ReleaseGuard {
        ReleaseGuard {
            map: Arc::clone(self),
            query_id: query_id.to_owned(),
        }
    }
}

/// Removes an active-set entry on drop.
pub struct ReleaseGuard {
    map: Arc<ActiveQueryMap>,
    query_id: String,
}

impl Drop for ReleaseGuard {
    fn drop(&mut self) {
        self.map.remove(&self.query_id);
    }
}
