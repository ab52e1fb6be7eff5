use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Storage
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// On-disk layout. Session lifetime constants (TTL, LRU cap, steering
/// capacity) are compile-time in `ar-sessions`, not configured here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Session snapshot files, one per session key.
    #[serde(default = "d_sessions_dir")]
    pub sessions_dir: PathBuf,

    /// Chat capture root: `{chats_dir}/{tenant}/{channel}/{thread}/…`.
    #[serde(default = "d_chats_dir")]
    pub chats_dir: PathBuf,

    /// Per-thread working directory aliases.
    #[serde(default = "d_thread_workdirs_dir")]
    pub thread_workdirs_dir: PathBuf,

    /// Shared base working directory the aliases point at.
    #[serde(default = "d_base_workdir")]
    pub base_workdir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            sessions_dir: d_sessions_dir(),
            chats_dir: d_chats_dir(),
            thread_workdirs_dir: d_thread_workdirs_dir(),
            base_workdir: d_base_workdir(),
        }
    }
}

fn d_sessions_dir() -> PathBuf {
    "./data/sessions".into()
}

fn d_chats_dir() -> PathBuf {
    "./data/chats".into()
}

fn d_thread_workdirs_dir() -> PathBuf {
    "./data/workdirs".into()
}

fn d_base_workdir() -> PathBuf {
    "./data/workspace".into()
}
