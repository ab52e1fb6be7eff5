use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Scheduler
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// How often the queue drain timer fires.
    #[serde(default = "d_drain_interval_ms")]
    pub drain_interval_ms: u64,

    /// Cron-driven jobs evaluated by the tick loop.
    #[serde(default)]
    pub schedules: Vec<ScheduleConfig>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            drain_interval_ms: d_drain_interval_ms(),
            schedules: Vec::new(),
        }
    }
}

/// One cron job definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Human name; slugged into the cron session thread id.
    pub name: String,
    /// 5-field cron expression (min hour dom month dow).
    pub cron: String,
    /// IANA timezone for cron evaluation. Invalid values fall back to UTC.
    #[serde(default = "d_timezone")]
    pub timezone: String,
    /// Prompt submitted when the job fires.
    pub prompt: String,
}

fn d_drain_interval_ms() -> u64 {
    5_000
}

fn d_timezone() -> String {
    "UTC".into()
}
