//! Cron evaluation and scheduled batch dispatch.
//!
//! The long-running `start` mode ticks on a fixed interval, evaluates the
//! configured cron expressions, and dispatches whichever batch jobs are due:
//! the booking mail scan and the taste digest. A job failure is logged and
//! the loop keeps ticking.

use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use crate::config::HeartbeatConfig;
use crate::pipeline::batch::{self, BatchDeps};

/// A named scheduled job with its cron expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledJob {
    /// Job name, used for last-run tracking and logs.
    pub name: String,
    /// Cron expression (seconds-resolution, `cron` crate syntax).
    pub cron: String,
}

/// Tracks last-run timestamps for scheduled jobs.
#[derive(Debug, Default)]
pub struct SchedulerState {
    last_run: HashMap<String, DateTime<Utc>>,
}

impl SchedulerState {
    /// Create a scheduler state with no recorded runs.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that a job was executed at the given time.
    pub fn record_run(&mut self, name: &str, at: DateTime<Utc>) {
        self.last_run.insert(name.to_owned(), at);
    }

    /// Get the last run time for a job.
    pub fn last_run_for(&self, name: &str) -> Option<&DateTime<Utc>> {
        self.last_run.get(name)
    }
}

/// The jobs the heartbeat runs, built from config.
pub fn configured_jobs(config: &HeartbeatConfig) -> Vec<ScheduledJob> {
    let mut jobs = Vec::new();
    if config.booking_scan_enabled {
        jobs.push(ScheduledJob {
            name: "booking-scan".to_owned(),
            cron: config.booking_scan_cron.clone(),
        });
    }
    if config.taste_digest_enabled {
        jobs.push(ScheduledJob {
            name: "taste-digest".to_owned(),
            cron: config.taste_digest_cron.clone(),
        });
    }
    jobs
}

/// Check which jobs are due for execution this tick.
///
/// A job is due if its cron expression matches a time between its last run
/// (epoch for never-run jobs) and now.
pub fn due_jobs<'a>(
    jobs: &'a [ScheduledJob],
    state: &SchedulerState,
    now: DateTime<Utc>,
) -> Vec<&'a ScheduledJob> {
    jobs.iter()
        .filter(|job| {
            let schedule = match cron::Schedule::from_str(&job.cron) {
                Ok(s) => s,
                Err(e) => {
                    warn!(
                        job = %job.name,
                        cron = %job.cron,
                        error = %e,
                        "invalid cron expression, skipping job"
                    );
                    return false;
                }
            };

            let after = state
                .last_run_for(&job.name)
                .copied()
                .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);

            schedule.after(&after).take(1).any(|next| next <= now)
        })
        .collect()
}

/// Run the scheduler loop until the process is stopped.
///
/// # Errors
///
/// Never returns normally; an error indicates the loop itself broke.
pub async fn run_loop(deps: &BatchDeps, config: &HeartbeatConfig) -> anyhow::Result<()> {
    let jobs = configured_jobs(config);
    if jobs.is_empty() {
        warn!("no heartbeat jobs enabled, scheduler idle");
    }
    let mut state = SchedulerState::new();
    let tick = Duration::from_secs(config.tick_secs.max(1));
    info!(jobs = jobs.len(), tick_secs = tick.as_secs(), "heartbeat started");

    loop {
        let now = Utc::now();
        let due: Vec<ScheduledJob> = due_jobs(&jobs, &state, now).into_iter().cloned().collect();
        for job in due {
            info!(job = %job.name, "running scheduled job");
            state.record_run(&job.name, Utc::now());
            let result = match job.name.as_str() {
                "booking-scan" => batch::run_booking_scan(deps).await,
                "taste-digest" => batch::run_taste_digest(deps).await,
                other => {
                    warn!(job = other, "unknown scheduled job");
                    continue;
                }
            };
            match result {
                Ok(outcomes) => info!(
                    job = %job.name,
                    delivered = outcomes.iter().filter(|o| o.delivered).count(),
                    users = outcomes.len(),
                    "scheduled job finished"
                ),
                Err(e) => error!(job = %job.name, error = %e, "scheduled job failed"),
            }
        }
        tokio::time::sleep(tick).await;
    }
}
