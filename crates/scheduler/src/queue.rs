//! Cron job queue and drain loop.
//!
//! Due jobs are enqueued by the tick loop and drained one at a time, only
//! when no cron session is busy. The drain timer is a single-writer
//! resource: `start` is idempotent while a timer runs, `stop` releases it.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use ar_domain::config::ScheduleConfig;
use ar_domain::error::{Error, Result};
use ar_domain::trace::TraceEvent;

use crate::cron::{cron_next_tz, parse_tz};
use crate::route::build_scheduler_route;

/// One queued job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronJob {
    pub schedule_name: String,
    pub prompt: String,
    /// Canonical `cron:scheduler:<slug>` key.
    pub session_key: String,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Queue
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Default)]
pub struct JobQueue {
    jobs: Mutex<VecDeque<CronJob>>,
}

impl JobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&self, job: CronJob) {
        let mut jobs = self.jobs.lock();
        jobs.push_back(job.clone());
        TraceEvent::CronEnqueued {
            job: job.schedule_name,
            queue_len: jobs.len(),
        }
        .emit();
    }

    /// Pop the oldest job.
    pub fn shift(&self) -> Option<CronJob> {
        self.jobs.lock().pop_front()
    }

    pub fn len(&self) -> usize {
        self.jobs.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.lock().is_empty()
    }
}

/// Drain at most one job from the queue.
///
/// - empty queue → `on_queue_empty`
/// - busy runtime → `on_queue_not_empty` (job stays queued)
/// - otherwise: shift one job, run it, then signal based on what remains
pub async fn process_queued_jobs<E, Fut>(
    queue: &JobQueue,
    is_busy: impl Fn() -> bool,
    execute_job: E,
    on_queue_not_empty: impl Fn(usize),
    on_queue_empty: impl Fn(),
) -> Result<()>
where
    E: FnOnce(CronJob) -> Fut,
    Fut: Future<Output = Result<String>>,
{
    if queue.is_empty() {
        on_queue_empty();
        return Ok(());
    }
    if is_busy() {
        on_queue_not_empty(queue.len());
        return Ok(());
    }

    let Some(job) = queue.shift() else {
        on_queue_empty();
        return Ok(());
    };
    let name = job.schedule_name.clone();
    execute_job(job).await?;

    let remaining = queue.len();
    TraceEvent::CronDrained {
        job: name,
        remaining,
    }
    .emit();

    if remaining == 0 {
        on_queue_empty();
    } else {
        on_queue_not_empty(remaining);
    }
    Ok(())
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Drain timer
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub type DrainFn =
    Arc<dyn Fn() -> Pin<Box<dyn Future<Output = Result<()>> + Send>> + Send + Sync>;
pub type DrainErrorFn = Arc<dyn Fn(Error) + Send + Sync>;

/// Single drain timer per process area. `start` returns `false` (no-op)
/// while a timer is already running.
#[derive(Default)]
pub struct QueueDrainTimer {
    handle: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl QueueDrainTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&self, interval_ms: u64, on_drain: DrainFn, on_error: DrainErrorFn) -> bool {
        let mut handle = self.handle.lock();
        if handle.as_ref().map(|h| !h.is_finished()).unwrap_or(false) {
            return false;
        }

        *handle = Some(tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(Duration::from_millis(interval_ms.max(1)));
            interval.tick().await; // immediate first tick
            loop {
                interval.tick().await;
                if let Err(e) = on_drain().await {
                    on_error(e);
                }
            }
        }));
        true
    }

    pub fn stop(&self) -> bool {
        match self.handle.lock().take() {
            Some(task) => {
                task.abort();
                true
            }
            None => false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .lock()
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Schedule tick
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

struct ScheduleState {
    config: ScheduleConfig,
    tz: chrono_tz::Tz,
    next_run: Option<DateTime<Utc>>,
}

/// Evaluates configured schedules against the clock and emits due jobs.
pub struct JobScheduler {
    schedules: Mutex<Vec<ScheduleState>>,
}

impl JobScheduler {
    pub fn new(configs: &[ScheduleConfig], now: &DateTime<Utc>) -> Self {
        let schedules = configs
            .iter()
            .map(|config| {
                let tz = parse_tz(&config.timezone);
                ScheduleState {
                    next_run: cron_next_tz(&config.cron, now, tz),
                    tz,
                    config: config.clone(),
                }
            })
            .collect();
        Self {
            schedules: Mutex::new(schedules),
        }
    }

    pub fn schedule_count(&self) -> usize {
        self.schedules.lock().len()
    }

    /// Jobs whose next occurrence has passed. Each due schedule advances to
    /// its next occurrence after `now` (missed windows are not replayed).
    pub fn due_jobs(&self, now: &DateTime<Utc>) -> Vec<CronJob> {
        let mut due = Vec::new();
        for state in self.schedules.lock().iter_mut() {
            let Some(next) = state.next_run else { continue };
            if next > *now {
                continue;
            }
            let route = build_scheduler_route(&state.config.name);
            due.push(CronJob {
                schedule_name: state.config.name.clone(),
                prompt: state.config.prompt.clone(),
                session_key: route.session_key,
            });
            state.next_run = cron_next_tz(&state.config.cron, now, state.tz);
        }
        due
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn job(name: &str) -> CronJob {
        CronJob {
            schedule_name: name.into(),
            prompt: "run".into(),
            session_key: format!("cron:scheduler:{name}"),
        }
    }

    #[test]
    fn queue_is_fifo() {
        let queue = JobQueue::new();
        queue.enqueue(job("a"));
        queue.enqueue(job("b"));
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.shift().unwrap().schedule_name, "a");
        assert_eq!(queue.shift().unwrap().schedule_name, "b");
        assert!(queue.shift().is_none());
    }

    #[tokio::test]
    async fn empty_queue_signals_empty() {
        let queue = JobQueue::new();
        let empties = AtomicUsize::new(0);
        process_queued_jobs(
            &queue,
            || false,
            |_| async { Ok("ok".into()) },
            |_| panic!("queue should be empty"),
            || {
                empties.fetch_add(1, Ordering::SeqCst);
            },
        )
        .await
        .unwrap();
        assert_eq!(empties.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn busy_runtime_keeps_job_queued() {
        let queue = JobQueue::new();
        queue.enqueue(job("a"));
        let not_empties = AtomicUsize::new(0);
        process_queued_jobs(
            &queue,
            || true,
            |_| async { panic!("must not execute while busy") },
            |len| {
                assert_eq!(len, 1);
                not_empties.fetch_add(1, Ordering::SeqCst);
            },
            || panic!("queue is not empty"),
        )
        .await
        .unwrap();
        assert_eq!(not_empties.load(Ordering::SeqCst), 1);
        assert_eq!(queue.len(), 1);
    }

    #[tokio::test]
    async fn idle_runtime_drains_one_job() {
        let queue = JobQueue::new();
        queue.enqueue(job("a"));
        queue.enqueue(job("b"));

        let executed = Mutex::new(Vec::new());
        let not_empties = AtomicUsize::new(0);
        process_queued_jobs(
            &queue,
            || false,
            |job| {
                executed.lock().push(job.schedule_name);
                async { Ok("done".into()) }
            },
            |len| {
                assert_eq!(len, 1);
                not_empties.fetch_add(1, Ordering::SeqCst);
            },
            || panic!("one job remains"),
        )
        .await
        .unwrap();

        assert_eq!(*executed.lock(), vec!["a"]);
        assert_eq!(queue.len(), 1);
        assert_eq!(not_empties.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn drain_timer_is_single_writer() {
        let timer = QueueDrainTimer::new();
        let ticks = Arc::new(AtomicUsize::new(0));

        let ticks_clone = Arc::clone(&ticks);
        let on_drain: DrainFn = Arc::new(move || {
            let ticks = Arc::clone(&ticks_clone);
            Box::pin(async move {
                ticks.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
        });
        let on_error: DrainErrorFn = Arc::new(|_| {});

        assert!(timer.start(5, on_drain.clone(), on_error.clone()));
        // Second start while running is a no-op.
        assert!(!timer.start(5, on_drain.clone(), on_error.clone()));
        assert!(timer.is_running());

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(ticks.load(Ordering::SeqCst) >= 2);

        assert!(timer.stop());
        assert!(!timer.stop());
        assert!(!timer.is_running());

        // After stop, a new timer may start.
        assert!(timer.start(5, on_drain, on_error));
        timer.stop();
    }

    #[test]
    fn scheduler_emits_due_jobs_once() {
        let configs = vec![ScheduleConfig {
            name: "Daily Summary".into(),
            cron: "0 9 * * *".into(),
            timezone: "UTC".into(),
            prompt: "Summarize.".into(),
        }];
        let start = Utc.with_ymd_and_hms(2026, 3, 15, 8, 0, 0).unwrap();
        let scheduler = JobScheduler::new(&configs, &start);

        // Not yet due.
        assert!(scheduler.due_jobs(&start).is_empty());

        // Past 09:00 — one job, with the slugged cron key.
        let later = Utc.with_ymd_and_hms(2026, 3, 15, 9, 0, 30).unwrap();
        let due = scheduler.due_jobs(&later);
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].session_key, "cron:scheduler:daily-summary");

        // Same instant again: already advanced to tomorrow.
        assert!(scheduler.due_jobs(&later).is_empty());
    }
}
