//! One job run: fetch, store, diff, alert, score, complete.
//!
//! Adapter errors never escape a run. They become job state changes and a
//! [`RunOutcome`]; only storage failures surface as [`MonitorError`].

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use kyb_core::entities::{Counterparty, Diff};
use kyb_core::enums::{JobState, Source};
use kyb_core::record::NormalizedRecord;
use kyb_db::{ClaimedJob, JobFailure, RateSlot, SaveOutcome};
use kyb_registry::{AdapterError, Identifier};
use serde::Serialize;

use crate::alerts::AlertOutcome;
use crate::clock::Clock;
use crate::{ARCHIVED_REASON, Monitor, MonitorError};

/// Result of [`Monitor::run_job`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RunOutcome {
    /// Fetched and stored. `diff_id` is set when a new snapshot was created.
    Succeeded {
        snapshot_created: bool,
        diff_id: Option<String>,
        alerts_raised: usize,
    },
    /// Retryable failure; the job moved to `backoff` or `degraded`.
    Failed {
        state: JobState,
        consecutive_failures: u32,
        error: String,
    },
    /// Invalid or missing identifier; no retry until corrected.
    Disabled { reason: String },
    /// Source rate limit; released untouched until `retry_at`.
    RateLimited { retry_at: DateTime<Utc> },
    /// The counterparty was archived mid-run; the result was dropped.
    Discarded,
    /// The lease was lost before completion.
    LeaseConflict,
}

/// What storing one fetched record produced.
#[derive(Debug, Clone, PartialEq)]
pub struct Ingest {
    pub snapshot: SaveOutcome,
    pub diff: Option<Diff>,
    pub alerts: AlertOutcome,
}

fn to_delta(duration: Duration) -> TimeDelta {
    TimeDelta::from_std(duration).unwrap_or_else(|_| TimeDelta::seconds(i64::from(u32::MAX)))
}

impl Monitor {
    /// Store a fetched record: snapshot, diff against the previous one, and
    /// alerts for the diff.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::Database`] on storage failures.
    pub async fn ingest(
        &self,
        counterparty_id: &str,
        source: Source,
        record: &NormalizedRecord,
        now: DateTime<Utc>,
    ) -> Result<Ingest, MonitorError> {
        let service = self.service();
        let snapshot = service.save_snapshot(counterparty_id, source, record, now).await?;

        let SaveOutcome::Created { snapshot: new, previous } = &snapshot else {
            return Ok(Ingest {
                snapshot,
                diff: None,
                alerts: AlertOutcome::default(),
            });
        };

        // Every new snapshot gets a diff, even when all changes fall within
        // the float tolerance.
        let changes = kyb_diff::compare(previous.as_ref(), new, self.diff_options());
        let diff = service
            .insert_diff(
                counterparty_id,
                source,
                previous.as_ref().map(|p| p.id.as_str()),
                &new.id,
                &changes.changes,
                changes.risk_impact,
                now,
            )
            .await?;
        tracing::info!(
            counterparty_id,
            %source,
            diff_id = %diff.id,
            fields = diff.changes.len(),
            risk_impact = diff.risk_impact,
            "snapshot changed"
        );
        let alerts = if changes.is_empty() {
            AlertOutcome::default()
        } else {
            self.process_all(&diff, now).await?
        };

        Ok(Ingest {
            snapshot,
            diff: Some(diff),
            alerts,
        })
    }

    /// Run one claimed job to completion with the clock held at `now`.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::Database`] on storage failures. The lease is
    /// then left to expire.
    pub async fn run_job(
        &self,
        claimed: &ClaimedJob,
        now: DateTime<Utc>,
    ) -> Result<RunOutcome, MonitorError> {
        self.run_job_with(claimed, &now).await
    }

    /// Run one claimed job to completion. The clock is read again once the
    /// fetch returns, so stored results carry the fetch time.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::Database`] on storage failures. The lease is
    /// then left to expire.
    pub async fn run_job_with(
        &self,
        claimed: &ClaimedJob,
        clock: &dyn Clock,
    ) -> Result<RunOutcome, MonitorError> {
        let now = clock.now();
        let job = &claimed.job;
        let service = self.service();
        let counterparty = service.get_counterparty(&job.counterparty_id).await?;
        if counterparty.is_archived() {
            return self.discard(claimed, now).await;
        }

        let Some(identifier) = Identifier::for_source(&counterparty, job.source) else {
            return self
                .disable(claimed, &counterparty, "no identifier on record", false, now)
                .await;
        };
        if let Err(err) = identifier.validate() {
            return self
                .disable(claimed, &counterparty, &err.to_string(), true, now)
                .await;
        }

        let Some(adapter) = self.adapters().get(job.source) else {
            let err = AdapterError::SourceUnavailable(format!("no adapter configured for {}", job.source));
            return self.fail(claimed, &err, now).await;
        };

        if let RateSlot::Wait(until) = service
            .acquire_rate_slot(job.source, to_delta(adapter.min_interval()), now)
            .await?
        {
            if service.release_job(claimed, until, now).await? {
                tracing::debug!(job_id = %job.id, source = %job.source, %until, "rate limited, released");
                return Ok(RunOutcome::RateLimited { retry_at: until });
            }
            return Ok(RunOutcome::LeaseConflict);
        }

        let fetched = match tokio::time::timeout(adapter.timeout(), adapter.fetch(&identifier)).await {
            Ok(result) => result,
            Err(_) => Err(AdapterError::SourceUnavailable(format!(
                "timed out after {}s",
                adapter.timeout().as_secs()
            ))),
        };
        let now = clock.now();
        let record = match fetched {
            Ok(record) => record,
            Err(AdapterError::InvalidIdentifier(reason)) => {
                return self.disable(claimed, &counterparty, &reason, true, now).await;
            }
            Err(err) => return self.fail(claimed, &err, now).await,
        };

        // Archival may have happened while the fetch was in flight.
        let counterparty = service.get_counterparty(&job.counterparty_id).await?;
        if counterparty.is_archived() {
            tracing::debug!(job_id = %job.id, "counterparty archived during fetch, discarding");
            return self.discard(claimed, now).await;
        }
        let current = service.get_job(&job.id).await?;
        if current.lease_owner.as_deref() != Some(claimed.lease_token.as_str()) {
            return Ok(RunOutcome::LeaseConflict);
        }

        let ingest = self.ingest(&counterparty.id, job.source, &record, now).await?;
        let poll = to_delta(self.config().sources.get(job.source).poll_interval());
        if !service
            .complete_job_success(&job.id, &claimed.lease_token, now + poll, now)
            .await?
        {
            tracing::warn!(job_id = %job.id, "lease lost before completion");
            return Ok(RunOutcome::LeaseConflict);
        }
        service.resolve_operational_alert(&job.id, now).await?;
        self.score(&counterparty.id, now).await?;

        Ok(RunOutcome::Succeeded {
            snapshot_created: ingest.snapshot.is_created(),
            diff_id: ingest.diff.map(|d| d.id),
            alerts_raised: ingest.alerts.raised.len(),
        })
    }

    /// Drop a run for an archived counterparty. Archival normally revoked
    /// the lease already, making this a no-op.
    async fn discard(&self, claimed: &ClaimedJob, now: DateTime<Utc>) -> Result<RunOutcome, MonitorError> {
        self.service()
            .disable_job(&claimed.job.id, &claimed.lease_token, ARCHIVED_REASON, now)
            .await?;
        Ok(RunOutcome::Discarded)
    }

    async fn disable(
        &self,
        claimed: &ClaimedJob,
        counterparty: &Counterparty,
        reason: &str,
        notify: bool,
        now: DateTime<Utc>,
    ) -> Result<RunOutcome, MonitorError> {
        let job = &claimed.job;
        if !self
            .service()
            .disable_job(&job.id, &claimed.lease_token, reason, now)
            .await?
        {
            return Ok(RunOutcome::LeaseConflict);
        }
        tracing::warn!(job_id = %job.id, source = %job.source, reason, "job disabled");
        if notify {
            self.raise_identifier_alert(counterparty, job.source, reason, now)
                .await?;
        }
        self.score(&counterparty.id, now).await?;
        Ok(RunOutcome::Disabled {
            reason: reason.to_string(),
        })
    }

    async fn fail(
        &self,
        claimed: &ClaimedJob,
        err: &AdapterError,
        now: DateTime<Utc>,
    ) -> Result<RunOutcome, MonitorError> {
        let job = &claimed.job;
        let scheduler = &self.config().scheduler;

        let failures = job.consecutive_failures.saturating_add(1);
        let format_errors = if matches!(err, AdapterError::SourceFormat(_)) {
            job.consecutive_format_errors.saturating_add(1)
        } else {
            0
        };
        // Degraded is sticky until the next success.
        let degraded = claimed.prior_state == JobState::Degraded
            || failures >= scheduler.degraded_threshold
            || format_errors >= scheduler.format_error_cap;

        let mut backoff = scheduler.backoff_for(failures);
        if degraded {
            backoff = backoff.max(Duration::from_secs(scheduler.backoff_max_secs));
        }
        if let AdapterError::RateLimited { retry_after_secs } = err {
            backoff = backoff.max(Duration::from_secs(*retry_after_secs));
        }

        let state = if degraded { JobState::Degraded } else { JobState::Backoff };
        let error = format!("{}: {err}", err.kind());
        let failure = JobFailure {
            state,
            consecutive_failures: failures,
            consecutive_format_errors: format_errors,
            backoff_secs: backoff.as_secs(),
            next_due_at: now + to_delta(backoff),
            last_error: error.clone(),
        };
        if !self
            .service()
            .complete_job_failure(&job.id, &claimed.lease_token, &failure, now)
            .await?
        {
            return Ok(RunOutcome::LeaseConflict);
        }
        tracing::warn!(
            job_id = %job.id,
            source = %job.source,
            failures,
            %state,
            error = %err,
            "fetch failed"
        );

        if degraded {
            let message = format!("{} failing for {failures} consecutive runs: {error}", job.source);
            self.service()
                .open_operational_alert(job, failures, &message, now)
                .await?;
        }

        Ok(RunOutcome::Failed {
            state,
            consecutive_failures: failures,
            error,
        })
    }
}
