//! Monitoring job repository: scheduling state and leases.
//!
//! Workers coordinate only through this table. A claim is a conditional
//! UPDATE that succeeds for exactly one worker; every later write for the run
//! is conditioned on the lease token it received, so a run whose lease was
//! revoked (archival, expiry) cannot overwrite newer state.

use chrono::{DateTime, TimeDelta, Utc};

use kyb_core::entities::MonitoringJob;
use kyb_core::enums::{JobState, Source};
use kyb_core::ids::{PREFIX_JOB, PREFIX_LEASE};

use crate::error::DatabaseError;
use crate::helpers::{
    format_datetime, get_datetime, get_opt_datetime, get_opt_string, get_unsigned, parse_enum,
    to_sql_int,
};
use crate::service::KybService;

const SELECT_COLS: &str = "id, counterparty_id, source, state, next_due_at, last_run_at, \
     last_success_at, consecutive_failures, consecutive_format_errors, backoff_secs, last_error, \
     lease_owner, lease_expires_at, created_at, updated_at";

/// Jobs a worker may take: waiting and due, or running with an expired lease.
const CLAIMABLE_WHERE: &str = "((state IN ('pending', 'backoff', 'degraded') AND next_due_at <= ?1)
      OR (state = 'running' AND lease_expires_at <= ?1))";

/// A job leased to one worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimedJob {
    /// The job as stored after the claim (state `running`).
    pub job: MonitoringJob,
    /// Token every completion write must present.
    pub lease_token: String,
    /// State the job was claimed from.
    pub prior_state: JobState,
}

impl ClaimedJob {
    /// State to return to when the run is abandoned without an attempt.
    #[must_use]
    pub const fn release_state(&self) -> JobState {
        match self.prior_state {
            JobState::Running => JobState::Pending,
            other => other,
        }
    }
}

/// Outcome of a failed attempt, as computed by the runner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobFailure {
    /// `backoff` or `degraded`.
    pub state: JobState,
    pub consecutive_failures: u32,
    pub consecutive_format_errors: u32,
    pub backoff_secs: u64,
    pub next_due_at: DateTime<Utc>,
    pub last_error: String,
}

fn row_to_job(row: &libsql::Row) -> Result<MonitoringJob, DatabaseError> {
    Ok(MonitoringJob {
        id: row.get(0)?,
        counterparty_id: row.get(1)?,
        source: parse_enum(&row.get::<String>(2)?)?,
        state: parse_enum(&row.get::<String>(3)?)?,
        next_due_at: get_datetime(row, 4)?,
        last_run_at: get_opt_datetime(row, 5)?,
        last_success_at: get_opt_datetime(row, 6)?,
        consecutive_failures: get_unsigned(row, 7)?,
        consecutive_format_errors: get_unsigned(row, 8)?,
        backoff_secs: get_unsigned(row, 9)?,
        last_error: get_opt_string(row, 10)?,
        lease_owner: get_opt_string(row, 11)?,
        lease_expires_at: get_opt_datetime(row, 12)?,
        created_at: get_datetime(row, 13)?,
        updated_at: get_datetime(row, 14)?,
    })
}

impl KybService {
    /// Create the job for (counterparty, source), due immediately.
    ///
    /// A job created `disabled` carries `last_error` as the reason.
    pub async fn create_job(
        &self,
        counterparty_id: &str,
        source: Source,
        state: JobState,
        last_error: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<MonitoringJob, DatabaseError> {
        let id = self.db().generate_id(PREFIX_JOB).await?;
        let ts = format_datetime(&now);
        self.db()
            .conn()
            .execute(
                "INSERT INTO monitoring_jobs (id, counterparty_id, source, state, next_due_at,
                     last_error, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?5, ?5)",
                libsql::params![
                    id.as_str(),
                    counterparty_id,
                    source.as_str(),
                    state.as_str(),
                    ts,
                    last_error
                ],
            )
            .await
            .map_err(|e| DatabaseError::from_write(e, "monitoring job"))?;
        tracing::debug!(job_id = %id, counterparty_id, %source, %state, "job created");
        self.get_job(&id).await
    }

    pub async fn get_job(&self, id: &str) -> Result<MonitoringJob, DatabaseError> {
        let mut rows = self
            .db()
            .conn()
            .query(
                &format!("SELECT {SELECT_COLS} FROM monitoring_jobs WHERE id = ?1"),
                [id],
            )
            .await?;
        let row = rows.next().await?.ok_or(DatabaseError::NoResult)?;
        row_to_job(&row)
    }

    pub async fn find_job(
        &self,
        counterparty_id: &str,
        source: Source,
    ) -> Result<Option<MonitoringJob>, DatabaseError> {
        let mut rows = self
            .db()
            .conn()
            .query(
                &format!(
                    "SELECT {SELECT_COLS} FROM monitoring_jobs
                     WHERE counterparty_id = ?1 AND source = ?2"
                ),
                libsql::params![counterparty_id, source.as_str()],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(row_to_job(&row)?)),
            None => Ok(None),
        }
    }

    pub async fn list_jobs_for_counterparty(
        &self,
        counterparty_id: &str,
    ) -> Result<Vec<MonitoringJob>, DatabaseError> {
        self.query_jobs(
            &format!(
                "SELECT {SELECT_COLS} FROM monitoring_jobs WHERE counterparty_id = ?1
                 ORDER BY source"
            ),
            vec![counterparty_id.into()],
        )
        .await
    }

    /// All jobs, optionally restricted to one state, soonest due first.
    pub async fn list_jobs(&self, state: Option<JobState>) -> Result<Vec<MonitoringJob>, DatabaseError> {
        match state {
            Some(state) => {
                self.query_jobs(
                    &format!(
                        "SELECT {SELECT_COLS} FROM monitoring_jobs WHERE state = ?1
                         ORDER BY next_due_at, id"
                    ),
                    vec![state.as_str().into()],
                )
                .await
            }
            None => {
                self.query_jobs(
                    &format!("SELECT {SELECT_COLS} FROM monitoring_jobs ORDER BY next_due_at, id"),
                    Vec::new(),
                )
                .await
            }
        }
    }

    async fn query_jobs(
        &self,
        sql: &str,
        params: Vec<libsql::Value>,
    ) -> Result<Vec<MonitoringJob>, DatabaseError> {
        let mut rows = self
            .db()
            .conn()
            .query(sql, libsql::params_from_iter(params))
            .await?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(row_to_job(&row)?);
        }
        Ok(out)
    }

    /// Lease one specific job if it is claimable at `now`.
    ///
    /// Returns `None` on a lease conflict: another worker claimed it first or
    /// it is not due.
    pub async fn claim_job(
        &self,
        job_id: &str,
        now: DateTime<Utc>,
        lease_ttl: TimeDelta,
    ) -> Result<Option<ClaimedJob>, DatabaseError> {
        let current = self.get_job(job_id).await?;
        let token = self.db().generate_id(PREFIX_LEASE).await?;
        let ts = format_datetime(&now);

        let changed = self
            .db()
            .conn()
            .execute(
                &format!(
                    "UPDATE monitoring_jobs
                     SET state = 'running', lease_owner = ?2, lease_expires_at = ?3,
                         last_run_at = ?1, updated_at = ?1
                     WHERE id = ?4 AND state = ?5 AND {CLAIMABLE_WHERE}"
                ),
                libsql::params![
                    ts,
                    token.as_str(),
                    format_datetime(&(now + lease_ttl)),
                    job_id,
                    current.state.as_str()
                ],
            )
            .await?;
        if changed != 1 {
            tracing::debug!(job_id, "lease conflict");
            return Ok(None);
        }

        let job = self.get_job(job_id).await?;
        Ok(Some(ClaimedJob {
            job,
            lease_token: token,
            prior_state: current.state,
        }))
    }

    /// Lease the next due job, trying up to `batch` candidates in due order.
    pub async fn claim_next_due(
        &self,
        now: DateTime<Utc>,
        lease_ttl: TimeDelta,
        batch: u32,
    ) -> Result<Option<ClaimedJob>, DatabaseError> {
        let mut rows = self
            .db()
            .conn()
            .query(
                &format!(
                    "SELECT id FROM monitoring_jobs WHERE {CLAIMABLE_WHERE}
                     ORDER BY next_due_at, id LIMIT ?2"
                ),
                libsql::params![format_datetime(&now), i64::from(batch.max(1))],
            )
            .await?;
        let mut candidates = Vec::new();
        while let Some(row) = rows.next().await? {
            candidates.push(row.get::<String>(0)?);
        }

        for id in candidates {
            if let Some(claimed) = self.claim_job(&id, now, lease_ttl).await? {
                return Ok(Some(claimed));
            }
        }
        Ok(None)
    }

    /// Successful run: back to `pending`, counters reset.
    ///
    /// Returns `false` when the lease is no longer held.
    pub async fn complete_job_success(
        &self,
        job_id: &str,
        lease_token: &str,
        next_due_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<bool, DatabaseError> {
        let changed = self
            .db()
            .conn()
            .execute(
                "UPDATE monitoring_jobs
                 SET state = 'pending', next_due_at = ?1, last_success_at = ?2, updated_at = ?2,
                     consecutive_failures = 0, consecutive_format_errors = 0, backoff_secs = 0,
                     last_error = NULL, lease_owner = NULL, lease_expires_at = NULL
                 WHERE id = ?3 AND lease_owner = ?4 AND state = 'running'",
                libsql::params![
                    format_datetime(&next_due_at),
                    format_datetime(&now),
                    job_id,
                    lease_token
                ],
            )
            .await?;
        Ok(changed == 1)
    }

    /// Failed run with a retryable error.
    pub async fn complete_job_failure(
        &self,
        job_id: &str,
        lease_token: &str,
        failure: &JobFailure,
        now: DateTime<Utc>,
    ) -> Result<bool, DatabaseError> {
        if !JobState::Running.can_transition_to(failure.state) || failure.state == JobState::Pending {
            return Err(DatabaseError::InvalidState(format!(
                "a failed run cannot move a job to '{}'",
                failure.state
            )));
        }
        let changed = self
            .db()
            .conn()
            .execute(
                "UPDATE monitoring_jobs
                 SET state = ?1, consecutive_failures = ?2, consecutive_format_errors = ?3,
                     backoff_secs = ?4, next_due_at = ?5, last_error = ?6, updated_at = ?7,
                     lease_owner = NULL, lease_expires_at = NULL
                 WHERE id = ?8 AND lease_owner = ?9 AND state = 'running'",
                libsql::params![
                    failure.state.as_str(),
                    i64::from(failure.consecutive_failures),
                    i64::from(failure.consecutive_format_errors),
                    to_sql_int(failure.backoff_secs),
                    format_datetime(&failure.next_due_at),
                    failure.last_error.as_str(),
                    format_datetime(&now),
                    job_id,
                    lease_token
                ],
            )
            .await?;
        Ok(changed == 1)
    }

    /// Stop a leased job for good (invalid identifier).
    pub async fn disable_job(
        &self,
        job_id: &str,
        lease_token: &str,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, DatabaseError> {
        let changed = self
            .db()
            .conn()
            .execute(
                "UPDATE monitoring_jobs
                 SET state = 'disabled', last_error = ?1, updated_at = ?2,
                     lease_owner = NULL, lease_expires_at = NULL
                 WHERE id = ?3 AND lease_owner = ?4 AND state = 'running'",
                libsql::params![reason, format_datetime(&now), job_id, lease_token],
            )
            .await?;
        Ok(changed == 1)
    }

    /// Give a lease back without an attempt (rate limit), due again at
    /// `next_due_at`. Failure counters are untouched.
    pub async fn release_job(
        &self,
        claimed: &ClaimedJob,
        next_due_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<bool, DatabaseError> {
        let changed = self
            .db()
            .conn()
            .execute(
                "UPDATE monitoring_jobs
                 SET state = ?1, next_due_at = ?2, updated_at = ?3,
                     lease_owner = NULL, lease_expires_at = NULL
                 WHERE id = ?4 AND lease_owner = ?5 AND state = 'running'",
                libsql::params![
                    claimed.release_state().as_str(),
                    format_datetime(&next_due_at),
                    format_datetime(&now),
                    claimed.job.id.as_str(),
                    claimed.lease_token.as_str()
                ],
            )
            .await?;
        Ok(changed == 1)
    }

    /// Disable every job of a counterparty, revoking any held lease.
    pub async fn disable_jobs_for_counterparty(
        &self,
        counterparty_id: &str,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<u64, DatabaseError> {
        let changed = self
            .db()
            .conn()
            .execute(
                "UPDATE monitoring_jobs
                 SET state = 'disabled', last_error = ?1, updated_at = ?2,
                     lease_owner = NULL, lease_expires_at = NULL
                 WHERE counterparty_id = ?3 AND state != 'disabled'",
                libsql::params![reason, format_datetime(&now), counterparty_id],
            )
            .await?;
        Ok(changed)
    }

    /// Disable one job regardless of who holds it, revoking any lease.
    pub async fn force_disable_job(
        &self,
        job_id: &str,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, DatabaseError> {
        let changed = self
            .db()
            .conn()
            .execute(
                "UPDATE monitoring_jobs
                 SET state = 'disabled', last_error = ?1, updated_at = ?2,
                     lease_owner = NULL, lease_expires_at = NULL
                 WHERE id = ?3 AND state != 'disabled'",
                libsql::params![reason, format_datetime(&now), job_id],
            )
            .await?;
        Ok(changed == 1)
    }

    /// Pull the pending jobs of a counterparty for `sources` forward to `now`.
    pub async fn make_jobs_due(
        &self,
        counterparty_id: &str,
        sources: &[Source],
        now: DateTime<Utc>,
    ) -> Result<u64, DatabaseError> {
        let ts = format_datetime(&now);
        let mut total = 0;
        for source in sources {
            total += self
                .db()
                .conn()
                .execute(
                    "UPDATE monitoring_jobs SET next_due_at = ?1, updated_at = ?1
                     WHERE counterparty_id = ?2 AND source = ?3 AND state = 'pending'
                       AND next_due_at > ?1",
                    libsql::params![ts.as_str(), counterparty_id, source.as_str()],
                )
                .await?;
        }
        Ok(total)
    }

    /// Earliest `next_due_at` among waiting jobs.
    pub async fn next_due_at(&self) -> Result<Option<DateTime<Utc>>, DatabaseError> {
        let mut rows = self
            .db()
            .conn()
            .query(
                "SELECT MIN(next_due_at) FROM monitoring_jobs
                 WHERE state IN ('pending', 'backoff', 'degraded')",
                (),
            )
            .await?;
        match rows.next().await? {
            Some(row) => get_opt_datetime(&row, 0),
            None => Ok(None),
        }
    }

    /// Move a disabled job back to `pending`, due immediately, counters reset.
    pub async fn reenable_job(&self, job_id: &str, now: DateTime<Utc>) -> Result<bool, DatabaseError> {
        let ts = format_datetime(&now);
        let changed = self
            .db()
            .conn()
            .execute(
                "UPDATE monitoring_jobs
                 SET state = 'pending', next_due_at = ?1, updated_at = ?1,
                     consecutive_failures = 0, consecutive_format_errors = 0, backoff_secs = 0,
                     last_error = NULL
                 WHERE id = ?2 AND state = 'disabled'",
                libsql::params![ts, job_id],
            )
            .await?;
        Ok(changed == 1)
    }
}
