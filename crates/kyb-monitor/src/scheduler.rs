//! Worker pool over the job table.
//!
//! A tick runs `workers` concurrent loops of "claim next due job, run it"
//! until nothing is claimable. Each claim reads the clock when it happens,
//! so its lease runs from the claim and not from the start of the pass.
//! Every run moves its job's `next_due_at` past the clock (or disables it).
//! The scheduler holds no job state of its own; all coordination goes
//! through conditional updates in the database.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use futures::future::join_all;
use serde::Serialize;
use tokio::sync::watch;

use crate::clock::{Clock, SystemClock};
use crate::runner::RunOutcome;
use crate::{Monitor, MonitorError};

/// Counts for one scheduler pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TickReport {
    pub claimed: usize,
    pub succeeded: usize,
    pub changed: usize,
    pub failed: usize,
    pub disabled: usize,
    pub rate_limited: usize,
    pub discarded: usize,
    pub lease_conflicts: usize,
    /// Runs aborted by a storage error.
    pub errors: usize,
}

impl TickReport {
    fn record(&mut self, outcome: &RunOutcome) {
        match outcome {
            RunOutcome::Succeeded { diff_id, .. } => {
                self.succeeded += 1;
                if diff_id.is_some() {
                    self.changed += 1;
                }
            }
            RunOutcome::Failed { .. } => self.failed += 1,
            RunOutcome::Disabled { .. } => self.disabled += 1,
            RunOutcome::RateLimited { .. } => self.rate_limited += 1,
            RunOutcome::Discarded => self.discarded += 1,
            RunOutcome::LeaseConflict => self.lease_conflicts += 1,
        }
    }

    fn merge(mut self, other: Self) -> Self {
        self.claimed += other.claimed;
        self.succeeded += other.succeeded;
        self.changed += other.changed;
        self.failed += other.failed;
        self.disabled += other.disabled;
        self.rate_limited += other.rate_limited;
        self.discarded += other.discarded;
        self.lease_conflicts += other.lease_conflicts;
        self.errors += other.errors;
        self
    }
}

#[derive(Debug, Clone)]
pub struct Scheduler {
    monitor: Arc<Monitor>,
}

impl Scheduler {
    #[must_use]
    pub const fn new(monitor: Arc<Monitor>) -> Self {
        Self { monitor }
    }

    #[must_use]
    pub fn monitor(&self) -> &Monitor {
        &self.monitor
    }

    /// Run every job due at `now`, with the clock held at `now`.
    pub async fn tick(&self, now: DateTime<Utc>) -> TickReport {
        self.tick_with(&now).await
    }

    /// Run every job due by `clock`.
    pub async fn tick_with(&self, clock: &dyn Clock) -> TickReport {
        let workers = self.monitor.config().scheduler.workers.max(1);
        let reports = join_all((0..workers).map(|worker| self.worker(worker, clock))).await;
        let report = reports.into_iter().fold(TickReport::default(), TickReport::merge);
        tracing::debug!(?report, "tick finished");
        report
    }

    async fn worker(&self, worker: usize, clock: &dyn Clock) -> TickReport {
        let scheduler = &self.monitor.config().scheduler;
        let ttl = TimeDelta::from_std(scheduler.lease_ttl()).unwrap_or(TimeDelta::seconds(300));
        let mut report = TickReport::default();

        loop {
            let claimed = match self
                .monitor
                .service()
                .claim_next_due(clock.now(), ttl, scheduler.claim_batch)
                .await
            {
                Ok(Some(claimed)) => claimed,
                Ok(None) => break,
                Err(e) => {
                    tracing::error!(worker, error = %e, "claim failed");
                    report.errors += 1;
                    break;
                }
            };
            report.claimed += 1;

            match self.monitor.run_job_with(&claimed, clock).await {
                Ok(outcome) => {
                    tracing::debug!(
                        worker,
                        job_id = %claimed.job.id,
                        source = %claimed.job.source,
                        ?outcome,
                        "job run"
                    );
                    report.record(&outcome);
                }
                Err(e) => {
                    // The lease is left to expire; another tick retries.
                    tracing::error!(worker, job_id = %claimed.job.id, error = %e, "job run failed");
                    report.errors += 1;
                }
            }
        }
        report
    }

    /// Tick until `shutdown` turns `true`, sleeping between passes until the
    /// next job is due or `tick_interval` elapses, whichever is sooner.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::Database`] if the next due time cannot be read.
    pub async fn run_until(&self, mut shutdown: watch::Receiver<bool>) -> Result<(), MonitorError> {
        let interval = self.monitor.config().scheduler.tick_interval();
        tracing::info!(
            workers = self.monitor.config().scheduler.workers,
            tick_secs = interval.as_secs(),
            "scheduler started"
        );

        while !*shutdown.borrow() {
            let report = self.tick_with(&SystemClock).await;
            if report.claimed > 0 {
                tracing::info!(
                    claimed = report.claimed,
                    succeeded = report.succeeded,
                    changed = report.changed,
                    failed = report.failed,
                    "scheduler pass"
                );
            }

            let pause = self.pause(interval, Utc::now()).await?;
            tokio::select! {
                () = tokio::time::sleep(pause) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
        tracing::info!("scheduler stopped");
        Ok(())
    }

    async fn pause(&self, interval: Duration, now: DateTime<Utc>) -> Result<Duration, MonitorError> {
        let next = self.monitor.service().next_due_at().await?;
        let until_due = next.map_or(interval, |due| (due - now).to_std().unwrap_or(Duration::ZERO));
        Ok(until_due.min(interval).max(Duration::from_millis(100)))
    }
}
