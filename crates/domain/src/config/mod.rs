mod channels;
mod providers;
mod scheduler;
mod server;
mod storage;

pub use channels::*;
pub use providers::*;
pub use scheduler::*;
pub use server::*;
pub use storage::*;

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub channels: ChannelsConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

impl Config {
    /// Apply the environment overrides recognized by the core. File config
    /// loses to the environment for these keys.
    pub fn apply_env_overrides(&mut self) {
        if let Some(v) = bool_env("SLACK_SKELETON_ENABLED") {
            self.channels.slack.skeleton_enabled = v;
        }
        if let Ok(list) = std::env::var("SLACK_ALLOWED_TENANTS") {
            self.channels.slack.allowed_tenants = list
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_owned)
                .collect();
        }
        if let Some(v) = bool_env("PRIMARY_PROVIDER_ENABLED") {
            self.providers.primary.enabled = v;
        }
        if let Some(v) = bool_env("FALLBACK_PROVIDER_ENABLED") {
            self.providers.fallback.enabled = v;
        }
    }
}

/// Parse a boolean environment flag. Accepts `1`/`true`/`yes` (any case).
fn bool_env(key: &str) -> Option<bool> {
    let raw = std::env::var(key).ok()?;
    Some(matches!(
        raw.to_lowercase().as_str(),
        "1" | "true" | "yes"
    ))
}
