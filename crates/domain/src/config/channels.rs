use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Channels
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ChannelsConfig {
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub slack: SlackConfig,
}

/// Telegram channel boundary settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    #[serde(default = "d_true")]
    pub enabled: bool,

    /// User ids allowed to talk to the agent. Empty = everyone.
    #[serde(default)]
    pub allowed_user_ids: Vec<String>,

    /// Bot API token env var; unset = skeleton mode (no outbound port).
    #[serde(default = "d_telegram_token_env")]
    pub bot_token_env: String,

    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            allowed_user_ids: Vec::new(),
            bot_token_env: d_telegram_token_env(),
            rate_limit: RateLimitConfig::default(),
        }
    }
}

/// Slack channel boundary settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlackConfig {
    /// Skeleton mode: accept inbound and return placeholder receipts without
    /// a wired outbound port. Overridden by `SLACK_SKELETON_ENABLED`.
    #[serde(default)]
    pub skeleton_enabled: bool,

    /// Workspace tenants accepted by the boundary. Empty = no gating.
    /// Overridden by `SLACK_ALLOWED_TENANTS` (comma list).
    #[serde(default)]
    pub allowed_tenants: Vec<String>,

    /// Env var holding the request signing secret. Unset disables
    /// signature verification (dev mode).
    #[serde(default = "d_slack_signing_env")]
    pub signing_secret_env: String,

    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

impl Default for SlackConfig {
    fn default() -> Self {
        Self {
            skeleton_enabled: false,
            allowed_tenants: Vec::new(),
            signing_secret_env: d_slack_signing_env(),
            rate_limit: RateLimitConfig::default(),
        }
    }
}

/// Sliding-window inbound rate limit, applied per sender identity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "d_rate_max_events")]
    pub max_events: u32,
    #[serde(default = "d_rate_window_secs")]
    pub window_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_events: d_rate_max_events(),
            window_secs: d_rate_window_secs(),
        }
    }
}

fn d_true() -> bool {
    true
}

fn d_telegram_token_env() -> String {
    "TELEGRAM_BOT_TOKEN".into()
}

fn d_slack_signing_env() -> String {
    "SLACK_SIGNING_SECRET".into()
}

fn d_rate_max_events() -> u32 {
    20
}

fn d_rate_window_secs() -> u64 {
    60
}
