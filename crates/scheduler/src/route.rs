//! Scheduler route construction.
//!
//! Cron jobs are addressed like any other conversation, just under the
//! reserved `cron` tenant: `cron:scheduler:<slug-of-job-name>`. Everything
//! downstream (session manager, providers, outbound) treats them as
//! ordinary sessions.

use ar_domain::config::DEFAULT_PRIMARY_PROVIDER;
use ar_domain::envelope::AgentRoute;
use ar_domain::identity::SessionIdentity;

/// Tenant reserved for scheduled work.
pub const CRON_TENANT: &str = "cron";

/// Channel id for the scheduler's own traffic.
pub const CRON_CHANNEL: &str = "scheduler";

/// Canonical key prefix for every cron session.
pub const CRON_KEY_PREFIX: &str = "cron:";

/// Slug a job name into a thread id: lowercase, runs of non-alphanumerics
/// become one `-`, edges trimmed. A blank result falls back to `"job"`.
pub fn slug(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut pending_dash = false;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    if out.is_empty() {
        "job".to_owned()
    } else {
        out
    }
}

/// Build the route a scheduled job executes under.
pub fn build_scheduler_route(name: &str) -> AgentRoute {
    let identity = SessionIdentity {
        tenant_id: CRON_TENANT.to_owned(),
        channel_id: CRON_CHANNEL.to_owned(),
        thread_id: slug(name),
    };
    AgentRoute::new(
        identity,
        CRON_CHANNEL,
        CRON_TENANT,
        None,
        DEFAULT_PRIMARY_PROVIDER,
    )
}
