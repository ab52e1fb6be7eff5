//! Per-session turn cancellation.
//!
//! Each running turn registers a handle keyed by session key. Killing the
//! session fires the handle; the turn loop races the provider future
//! against it and drops the in-flight stream when it wins.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;

/// A cancellation handle the turn loop can await.
#[derive(Clone)]
pub struct TurnCancelHandle {
    cancelled: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl TurnCancelHandle {
    fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            notify: Arc::new(Notify::new()),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Resolve when (or immediately after) cancellation fires.
    pub async fn cancelled(&self) {
        if self.is_cancelled() {
            return;
        }
        self.notify.notified().await;
    }
}

/// Tracks active turn cancellation handles per session key.
#[derive(Default)]
pub struct CancelMap {
    handles: Mutex<HashMap<String, TurnCancelHandle>>,
}

impl CancelMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create and register a handle for a session's running turn.
    pub fn register(&self, session_key: &str) -> TurnCancelHandle {
        let handle = TurnCancelHandle::new();
        self.handles
            .lock()
            .insert(session_key.to_owned(), handle.clone());
        handle
    }

    /// Cancel a running turn. Returns whether one was registered.
    pub fn cancel(&self, session_key: &str) -> bool {
        match self.handles.lock().get(session_key) {
            Some(handle) => {
                handle.cancel();
                true
            }
            None => false,
        }
    }

    /// Remove the handle when a turn completes.
    pub fn remove(&self, session_key: &str) {
        self.handles.lock().remove(session_key);
    }

    pub fn is_running(&self, session_key: &str) -> bool {
        self.handles.lock().contains_key(session_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cancel_wakes_waiter() {
        let map = CancelMap::new();
        let handle = map.register("s1");
        assert!(map.is_running("s1"));

        let waiter = handle.clone();
        let task = tokio::spawn(async move {
            waiter.cancelled().await;
            true
        });

        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        assert!(map.cancel("s1"));
        assert!(task.await.unwrap());
        assert!(handle.is_cancelled());
    }

    #[tokio::test]
    async fn cancelled_resolves_immediately_after_fire() {
        let map = CancelMap::new();
        let handle = map.register("s1");
        map.cancel("s1");
        // Must not hang.
        handle.cancelled().await;
    }

    #[test]
    fn cancel_unknown_session_is_false() {
        let map = CancelMap::new();
        assert!(!map.cancel("ghost"));
        map.remove("ghost");
    }

    #[test]
    fn remove_clears_running() {
        let map = CancelMap::new();
        map.register("s1");
        map.remove("s1");
        assert!(!map.is_running("s1"));
    }
}
