//! Session management for AgentRelay.
//!
//! Owns the per-identity session objects: counters, steering buffers, TTL
//! and LRU lifetime, on-disk snapshots, per-thread working directory
//! aliases, and the dated chat capture files.

pub mod manager;
pub mod session;
pub mod snapshot;
pub mod transcript;
pub mod workdir;

pub use manager::{GlobalStats, KillResult, SessionManager};
pub use session::{Session, SessionData, SteeringMessage};
pub use snapshot::SnapshotStore;
pub use transcript::{ChatCapture, ChatRecord};
pub use workdir::WorkdirManager;
