//! Operational alert repository.
//!
//! One open operational alert per job. The runner opens it when a job enters
//! `degraded` and resolves it on the next success.

use chrono::{DateTime, Utc};

use kyb_core::entities::{MonitoringJob, OperationalAlert};
use kyb_core::ids::PREFIX_OPS_ALERT;

use crate::error::DatabaseError;
use crate::helpers::{format_datetime, get_bool, get_datetime, get_opt_datetime, get_unsigned, parse_enum};
use crate::service::KybService;

const SELECT_COLS: &str = "id, job_id, counterparty_id, source, message, consecutive_failures, \
     is_resolved, created_at, resolved_at";

fn row_to_ops_alert(row: &libsql::Row) -> Result<OperationalAlert, DatabaseError> {
    Ok(OperationalAlert {
        id: row.get(0)?,
        job_id: row.get(1)?,
        counterparty_id: row.get(2)?,
        source: parse_enum(&row.get::<String>(3)?)?,
        message: row.get(4)?,
        consecutive_failures: get_unsigned(row, 5)?,
        is_resolved: get_bool(row, 6)?,
        created_at: get_datetime(row, 7)?,
        resolved_at: get_opt_datetime(row, 8)?,
    })
}

impl KybService {
    pub async fn find_open_operational_alert(
        &self,
        job_id: &str,
    ) -> Result<Option<OperationalAlert>, DatabaseError> {
        let mut rows = self
            .db()
            .conn()
            .query(
                &format!(
                    "SELECT {SELECT_COLS} FROM operational_alerts
                     WHERE job_id = ?1 AND is_resolved = 0"
                ),
                [job_id],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(row_to_ops_alert(&row)?)),
            None => Ok(None),
        }
    }

    /// Open the operational alert for a degraded job.
    ///
    /// Returns `(alert, created)`. When one is already open it is refreshed
    /// and returned with `created = false`.
    pub async fn open_operational_alert(
        &self,
        job: &MonitoringJob,
        consecutive_failures: u32,
        message: &str,
        now: DateTime<Utc>,
    ) -> Result<(OperationalAlert, bool), DatabaseError> {
        if self.find_open_operational_alert(&job.id).await?.is_some() {
            let alert = self
                .touch_operational_alert(&job.id, consecutive_failures, message)
                .await?
                .ok_or(DatabaseError::NoResult)?;
            return Ok((alert, false));
        }

        let id = self.db().generate_id(PREFIX_OPS_ALERT).await?;
        let inserted = self
            .db()
            .conn()
            .execute(
                "INSERT INTO operational_alerts (id, job_id, counterparty_id, source, message,
                     consecutive_failures, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                libsql::params![
                    id.as_str(),
                    job.id.as_str(),
                    job.counterparty_id.as_str(),
                    job.source.as_str(),
                    message,
                    i64::from(consecutive_failures),
                    format_datetime(&now)
                ],
            )
            .await;
        match inserted {
            Ok(_) => {}
            Err(e) if DatabaseError::is_unique_violation(&e) => {
                let alert = self
                    .touch_operational_alert(&job.id, consecutive_failures, message)
                    .await?
                    .ok_or(DatabaseError::NoResult)?;
                return Ok((alert, false));
            }
            Err(e) => return Err(e.into()),
        }
        tracing::warn!(job_id = %job.id, source = %job.source, consecutive_failures, "job degraded");

        let mut rows = self
            .db()
            .conn()
            .query(
                &format!("SELECT {SELECT_COLS} FROM operational_alerts WHERE id = ?1"),
                [id.as_str()],
            )
            .await?;
        let row = rows.next().await?.ok_or(DatabaseError::NoResult)?;
        Ok((row_to_ops_alert(&row)?, true))
    }

    /// Update the failure count and message of the open alert, if any.
    pub async fn touch_operational_alert(
        &self,
        job_id: &str,
        consecutive_failures: u32,
        message: &str,
    ) -> Result<Option<OperationalAlert>, DatabaseError> {
        self.db()
            .conn()
            .execute(
                "UPDATE operational_alerts SET consecutive_failures = ?1, message = ?2
                 WHERE job_id = ?3 AND is_resolved = 0",
                libsql::params![i64::from(consecutive_failures), message, job_id],
            )
            .await?;
        self.find_open_operational_alert(job_id).await
    }

    /// Resolve the open alert of a job. Returns whether one was open.
    pub async fn resolve_operational_alert(
        &self,
        job_id: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, DatabaseError> {
        let changed = self
            .db()
            .conn()
            .execute(
                "UPDATE operational_alerts SET is_resolved = 1, resolved_at = ?1
                 WHERE job_id = ?2 AND is_resolved = 0",
                libsql::params![format_datetime(&now), job_id],
            )
            .await?;
        if changed > 0 {
            tracing::info!(job_id, "operational alert resolved");
        }
        Ok(changed > 0)
    }

    /// Operational alerts, newest first.
    pub async fn list_operational_alerts(
        &self,
        include_resolved: bool,
    ) -> Result<Vec<OperationalAlert>, DatabaseError> {
        let sql = if include_resolved {
            format!("SELECT {SELECT_COLS} FROM operational_alerts ORDER BY created_at DESC, rowid DESC")
        } else {
            format!(
                "SELECT {SELECT_COLS} FROM operational_alerts WHERE is_resolved = 0
                 ORDER BY created_at DESC, rowid DESC"
            )
        };
        let mut rows = self.db().conn().query(&sql, ()).await?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(row_to_ops_alert(&row)?);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use kyb_core::enums::{JobState, Source};

    use crate::test_support::{at, seed_counterparty, t0, test_service};

    #[tokio::test]
    async fn one_open_alert_per_job() {
        let svc = test_service().await;
        let cp = seed_counterparty(&svc, "ACME").await;
        let job = svc
            .create_job(&cp.id, Source::Vies, JobState::Pending, None, t0())
            .await
            .unwrap();

        let (first, created) = svc
            .open_operational_alert(&job, 10, "source_unavailable: timeout", at(1))
            .await
            .unwrap();
        assert!(created);
        assert_eq!(first.consecutive_failures, 10);
        assert_eq!(first.source, Source::Vies);

        let (second, created) = svc
            .open_operational_alert(&job, 11, "source_unavailable: 503", at(2))
            .await
            .unwrap();
        assert!(!created);
        assert_eq!(second.id, first.id);
        assert_eq!(second.consecutive_failures, 11);
        assert_eq!(second.message, "source_unavailable: 503");
        assert_eq!(svc.list_operational_alerts(false).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn resolve_then_reopen_creates_new_alert() {
        let svc = test_service().await;
        let cp = seed_counterparty(&svc, "ACME").await;
        let job = svc
            .create_job(&cp.id, Source::Gleif, JobState::Pending, None, t0())
            .await
            .unwrap();

        let (first, _) = svc.open_operational_alert(&job, 10, "down", at(1)).await.unwrap();
        assert!(svc.resolve_operational_alert(&job.id, at(2)).await.unwrap());
        assert!(!svc.resolve_operational_alert(&job.id, at(3)).await.unwrap());
        assert!(svc.touch_operational_alert(&job.id, 12, "x").await.unwrap().is_none());

        let (second, created) = svc.open_operational_alert(&job, 10, "down again", at(4)).await.unwrap();
        assert!(created);
        assert_ne!(second.id, first.id);

        let all = svc.list_operational_alerts(true).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, second.id);
        assert!(all[1].is_resolved);
        assert_eq!(all[1].resolved_at, Some(at(2)));
    }
}
