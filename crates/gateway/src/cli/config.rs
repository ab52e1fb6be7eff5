//! `config validate` / `config show` subcommands.

use chrono::Utc;

use ar_domain::config::Config;
use ar_scheduler::{cron_next_tz, parse_tz};

/// Check the config for problems a serve would hit later. Returns `false`
/// when any error-level finding exists.
pub fn validate(config: &Config) -> bool {
    let mut ok = true;

    for schedule in &config.scheduler.schedules {
        let tz = parse_tz(&schedule.timezone);
        if cron_next_tz(&schedule.cron, &Utc::now(), tz).is_none() {
            eprintln!(
                "error: schedule {:?} has a cron expression that never fires: {:?}",
                schedule.name, schedule.cron
            );
            ok = false;
        }
        if schedule.timezone.parse::<chrono_tz::Tz>().is_err() {
            eprintln!(
                "warning: schedule {:?} has unknown timezone {:?}, falling back to UTC",
                schedule.name, schedule.timezone
            );
        }
        if schedule.prompt.trim().is_empty() {
            eprintln!("error: schedule {:?} has an empty prompt", schedule.name);
            ok = false;
        }
    }

    for (label, rate) in [
        ("telegram", &config.channels.telegram.rate_limit),
        ("slack", &config.channels.slack.rate_limit),
    ] {
        if rate.max_events == 0 {
            eprintln!("error: {label} rate limit allows zero events");
            ok = false;
        }
    }

    if config.providers.primary.id == config.providers.fallback.id {
        eprintln!(
            "error: primary and fallback providers share the id {:?}",
            config.providers.primary.id
        );
        ok = false;
    }

    if ok {
        println!("config OK");
    }
    ok
}

/// Print the effective config (after env overrides) as TOML.
pub fn show(config: &Config) {
    match toml::to_string_pretty(config) {
        Ok(rendered) => println!("{rendered}"),
        Err(e) => eprintln!("error: cannot render config: {e}"),
    }
}
