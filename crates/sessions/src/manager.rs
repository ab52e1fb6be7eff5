//! Session manager — owns the session map and its lifetime.
//!
//! Sessions live until 24h of inactivity (TTL) or the live-session cap
//! forces LRU eviction. Evicted and shut-down sessions are snapshotted
//! first; a later `get_or_create` for the same key restores counters and
//! the provider session id from disk.
//!
//! Locking: the map-level `RwLock` guards insert/remove; each session's
//! own `Mutex` guards its counters and steering buffer.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;

use ar_domain::config::StorageConfig;
use ar_domain::error::Result;
use ar_domain::identity::{parse_session_key, SessionIdentity};
use ar_domain::trace::TraceEvent;

use crate::session::Session;
use crate::snapshot::SnapshotStore;
use crate::workdir::WorkdirManager;

/// Idle time after which a session is evicted.
pub const SESSION_TTL_HOURS: i64 = 24;

/// Live session cap; the least-recently-active are evicted beyond it.
pub const MAX_LIVE_SESSIONS: usize = 100;

/// Cleanup timer period.
pub const CLEANUP_INTERVAL: Duration = Duration::from_secs(60 * 60);

pub type SharedSession = Arc<Mutex<Session>>;

/// Hook invoked with the session key when a running session is killed, so
/// the owner can abort the in-flight provider query.
pub type AbortHook = Arc<dyn Fn(&str) + Send + Sync>;

/// Summary returned by [`SessionManager::kill_session`].
#[derive(Debug, Clone, Serialize)]
pub struct KillResult {
    /// Steering messages lost with the session.
    pub count: usize,
    pub messages: Vec<String>,
}

/// Per-session row in [`GlobalStats`].
#[derive(Debug, Clone, Serialize)]
pub struct SessionStats {
    pub session_key: String,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub total_queries: u64,
    pub last_activity: DateTime<Utc>,
    pub is_running: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct GlobalStats {
    pub session_count: usize,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub total_queries: u64,
    /// Sorted by `last_activity`, most recent first.
    pub sessions: Vec<SessionStats>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// SessionManager
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct SessionManager {
    sessions: RwLock<HashMap<String, SharedSession>>,
    snapshots: SnapshotStore,
    workdirs: WorkdirManager,
    abort_hook: RwLock<Option<AbortHook>>,
    cleanup_task: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl SessionManager {
    pub fn new(storage: &StorageConfig) -> Result<Arc<Self>> {
        Ok(Arc::new(Self {
            sessions: RwLock::new(HashMap::new()),
            snapshots: SnapshotStore::new(&storage.sessions_dir)?,
            workdirs: WorkdirManager::new(&storage.thread_workdirs_dir, &storage.base_workdir)?,
            abort_hook: RwLock::new(None),
            cleanup_task: Mutex::new(None),
        }))
    }

    /// Install the abort hook called when a running session is killed.
    pub fn set_abort_hook(&self, hook: AbortHook) {
        *self.abort_hook.write() = Some(hook);
    }

    // ── Lookup & creation ──────────────────────────────────────────

    /// Return the session for an identity, constructing it on first use.
    /// A snapshot for the key, if present, seeds the new session.
    pub fn get_or_create(&self, identity: &SessionIdentity) -> SharedSession {
        let session_key = identity.session_key();

        if let Some(existing) = self.sessions.read().get(&session_key) {
            return Arc::clone(existing);
        }

        let mut session = Session::new(identity.clone());
        if let Some(data) = self.snapshots.load(&session_key) {
            session.restore_from_data(&data);
            TraceEvent::SessionRestored {
                session_key: session_key.clone(),
            }
            .emit();
        }

        match self.workdirs.ensure_alias(identity) {
            Ok(path) => session.working_dir = Some(path),
            Err(e) => {
                tracing::warn!(
                    session_key = %session_key,
                    error = %e,
                    "failed to create thread workdir alias"
                );
            }
        }

        let mut sessions = self.sessions.write();
        // A concurrent creator may have won the race.
        Arc::clone(
            sessions
                .entry(session_key)
                .or_insert_with(|| Arc::new(Mutex::new(session))),
        )
    }

    /// Look up (or construct) by canonical session key.
    pub fn get_by_key(&self, session_key: &str) -> Result<SharedSession> {
        let identity = parse_session_key(session_key)?;
        Ok(self.get_or_create(&identity))
    }

    /// Convenience for single-tenant chat traffic.
    pub fn get_or_create_chat(&self, chat_id: &str, thread_id: &str) -> Result<SharedSession> {
        let identity = SessionIdentity::new("default", chat_id, thread_id)?;
        Ok(self.get_or_create(&identity))
    }

    pub fn has_session(&self, session_key: &str) -> bool {
        self.sessions.read().contains_key(session_key)
    }

    pub fn get_active_session_keys(&self) -> Vec<String> {
        self.sessions.read().keys().cloned().collect()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.read().len()
    }

    /// Whether any running session's key starts with `prefix`.
    pub fn any_running_with_prefix(&self, prefix: &str) -> bool {
        self.sessions
            .read()
            .iter()
            .any(|(key, session)| key.starts_with(prefix) && session.lock().is_running)
    }

    // ── Stats ──────────────────────────────────────────────────────

    pub fn global_stats(&self) -> GlobalStats {
        let mut rows: Vec<SessionStats> = self
            .sessions
            .read()
            .values()
            .map(|shared| {
                let s = shared.lock();
                SessionStats {
                    session_key: s.session_key.clone(),
                    total_input_tokens: s.total_input_tokens,
                    total_output_tokens: s.total_output_tokens,
                    total_queries: s.total_queries,
                    last_activity: s.last_activity,
                    is_running: s.is_running,
                }
            })
            .collect();
        rows.sort_by(|a, b| b.last_activity.cmp(&a.last_activity));

        GlobalStats {
            session_count: rows.len(),
            total_input_tokens: rows.iter().map(|r| r.total_input_tokens).sum(),
            total_output_tokens: rows.iter().map(|r| r.total_output_tokens).sum(),
            total_queries: rows.iter().map(|r| r.total_queries).sum(),
            sessions: rows,
        }
    }

    // ── Kill ───────────────────────────────────────────────────────

    /// Remove a session entirely: abort any running query, drop it from the
    /// map, delete its snapshot. Returns the steering messages that die
    /// with it, or `None` if the key was unknown.
    pub fn kill_session(&self, session_key: &str) -> Option<KillResult> {
        let shared = self.sessions.write().remove(session_key)?;

        let (was_running, messages) = {
            let session = shared.lock();
            (session.is_running, session.steering_texts())
        };

        if was_running {
            if let Some(hook) = self.abort_hook.read().clone() {
                hook(session_key);
            }
        }

        if let Err(e) = self.snapshots.delete(session_key) {
            tracing::warn!(session_key, error = %e, "failed to delete snapshot");
        }

        TraceEvent::SessionKilled {
            session_key: session_key.to_owned(),
            lost_steering: messages.len(),
        }
        .emit();

        Some(KillResult {
            count: messages.len(),
            messages,
        })
    }

    // ── Persistence ────────────────────────────────────────────────

    /// Snapshot every live session. Individual write failures are logged;
    /// the rest still get saved.
    pub fn save_all(&self) -> Result<()> {
        let entries: Vec<(String, SharedSession)> = self
            .sessions
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), Arc::clone(v)))
            .collect();

        for (key, shared) in entries {
            let data = shared.lock().to_data();
            if let Err(e) = self.snapshots.save(&key, &data) {
                tracing::warn!(session_key = %key, error = %e, "failed to save snapshot");
            }
        }
        Ok(())
    }

    /// Load every snapshot on disk into live sessions. Called at startup.
    pub fn restore_all(&self) -> usize {
        let mut restored = 0;
        for (key, data) in self.snapshots.load_all() {
            let identity = match parse_session_key(&key) {
                Ok(identity) => identity,
                Err(e) => {
                    tracing::warn!(session_key = %key, error = %e, "skipping snapshot with bad key");
                    continue;
                }
            };
            let shared = self.get_or_create(&identity);
            shared.lock().restore_from_data(&data);
            restored += 1;
        }
        tracing::info!(restored, "session snapshots loaded");
        restored
    }

    // ── Cleanup ────────────────────────────────────────────────────

    /// Evict idle sessions (TTL), then enforce the live-session cap (LRU).
    /// Evicted sessions are saved first so nothing is lost.
    pub fn cleanup(&self) {
        let now = Utc::now();
        let ttl = ChronoDuration::hours(SESSION_TTL_HOURS);

        let expired: Vec<String> = self
            .sessions
            .read()
            .iter()
            .filter(|(_, shared)| now - shared.lock().last_activity > ttl)
            .map(|(key, _)| key.clone())
            .collect();

        for key in expired {
            self.evict(&key, "ttl");
        }

        let over = self.session_count().saturating_sub(MAX_LIVE_SESSIONS);
        if over > 0 {
            let mut by_age: Vec<(String, DateTime<Utc>)> = self
                .sessions
                .read()
                .iter()
                .map(|(key, shared)| (key.clone(), shared.lock().last_activity))
                .collect();
            by_age.sort_by(|a, b| a.1.cmp(&b.1));

            for (key, _) in by_age.into_iter().take(over) {
                self.evict(&key, "lru");
            }
        }
    }

    fn evict(&self, session_key: &str, reason: &str) {
        let removed = self.sessions.write().remove(session_key);
        if let Some(shared) = removed {
            let data = shared.lock().to_data();
            if let Err(e) = self.snapshots.save(session_key, &data) {
                tracing::warn!(session_key, error = %e, "failed to save evicted session");
            }
            TraceEvent::SessionEvicted {
                session_key: session_key.to_owned(),
                reason: reason.to_owned(),
            }
            .emit();
        }
    }

    /// Start the hourly cleanup timer. Subsequent calls are no-ops until
    /// [`SessionManager::stop`].
    pub fn start_cleanup_timer(self: &Arc<Self>) {
        let mut task = self.cleanup_task.lock();
        if task.is_some() {
            return;
        }
        let manager = Arc::clone(self);
        *task = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(CLEANUP_INTERVAL);
            interval.tick().await; // first tick is immediate
            loop {
                interval.tick().await;
                manager.cleanup();
            }
        }));
    }

    /// Cancel the cleanup timer and save all live sessions.
    pub async fn stop(&self) -> Result<()> {
        if let Some(task) = self.cleanup_task.lock().take() {
            task.abort();
        }
        self.save_all()
    }
}
