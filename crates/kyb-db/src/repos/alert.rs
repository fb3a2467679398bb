//! Tenant alert repository.
//!
//! At most one open alert exists per (counterparty, alert type). Raising an
//! alert that is already open updates it in place.

use chrono::{DateTime, Utc};

use kyb_core::entities::Alert;
use kyb_core::enums::{AlertType, Severity};
use kyb_core::ids::PREFIX_ALERT;

use crate::error::DatabaseError;
use crate::helpers::{format_datetime, get_bool, get_datetime, get_opt_datetime, get_opt_string, parse_enum};
use crate::service::KybService;

const SELECT_COLS: &str = "id, tenant_id, counterparty_id, alert_type, severity, message, \
     is_read, is_resolved, diff_id, created_at, last_observed_at, resolved_at";

/// Result of [`KybService::upsert_alert`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlertUpsert {
    Created(Alert),
    Updated(Alert),
}

impl AlertUpsert {
    #[must_use]
    pub const fn alert(&self) -> &Alert {
        match self {
            Self::Created(alert) | Self::Updated(alert) => alert,
        }
    }

    #[must_use]
    pub fn into_alert(self) -> Alert {
        match self {
            Self::Created(alert) | Self::Updated(alert) => alert,
        }
    }
}

/// Listing filter for [`KybService::list_alerts`].
#[derive(Debug, Clone, Default)]
pub struct AlertFilter {
    pub counterparty_id: Option<String>,
    pub include_resolved: bool,
    pub unread_only: bool,
    pub limit: Option<u32>,
}

fn row_to_alert(row: &libsql::Row) -> Result<Alert, DatabaseError> {
    Ok(Alert {
        id: row.get(0)?,
        tenant_id: row.get(1)?,
        counterparty_id: row.get(2)?,
        alert_type: parse_enum(&row.get::<String>(3)?)?,
        severity: parse_enum(&row.get::<String>(4)?)?,
        message: row.get(5)?,
        is_read: get_bool(row, 6)?,
        is_resolved: get_bool(row, 7)?,
        diff_id: get_opt_string(row, 8)?,
        created_at: get_datetime(row, 9)?,
        last_observed_at: get_datetime(row, 10)?,
        resolved_at: get_opt_datetime(row, 11)?,
    })
}

impl KybService {
    pub async fn get_alert(&self, id: &str) -> Result<Alert, DatabaseError> {
        let mut rows = self
            .db()
            .conn()
            .query(&format!("SELECT {SELECT_COLS} FROM alerts WHERE id = ?1"), [id])
            .await?;
        let row = rows.next().await?.ok_or(DatabaseError::NoResult)?;
        row_to_alert(&row)
    }

    pub async fn find_open_alert(
        &self,
        counterparty_id: &str,
        alert_type: AlertType,
    ) -> Result<Option<Alert>, DatabaseError> {
        let mut rows = self
            .db()
            .conn()
            .query(
                &format!(
                    "SELECT {SELECT_COLS} FROM alerts
                     WHERE counterparty_id = ?1 AND alert_type = ?2 AND is_resolved = 0"
                ),
                libsql::params![counterparty_id, alert_type.as_str()],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(row_to_alert(&row)?)),
            None => Ok(None),
        }
    }

    /// Raise an alert, or refresh the open one of the same type.
    ///
    /// A refresh replaces message, severity and diff, bumps
    /// `last_observed_at`, and marks the alert unread again.
    #[allow(clippy::too_many_arguments)]
    pub async fn upsert_alert(
        &self,
        tenant_id: &str,
        counterparty_id: &str,
        alert_type: AlertType,
        severity: Severity,
        message: &str,
        diff_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<AlertUpsert, DatabaseError> {
        if let Some(open) = self.find_open_alert(counterparty_id, alert_type).await? {
            let alert = self
                .refresh_alert(&open.id, severity, message, diff_id, now)
                .await?;
            return Ok(AlertUpsert::Updated(alert));
        }

        let id = self.db().generate_id(PREFIX_ALERT).await?;
        let ts = format_datetime(&now);
        let inserted = self
            .db()
            .conn()
            .execute(
                &format!(
                    "INSERT INTO alerts ({SELECT_COLS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, 0, ?7, ?8, ?8, NULL)"
                ),
                libsql::params![
                    id.as_str(),
                    tenant_id,
                    counterparty_id,
                    alert_type.as_str(),
                    severity.as_str(),
                    message,
                    diff_id,
                    ts
                ],
            )
            .await;

        match inserted {
            Ok(_) => {
                tracing::info!(counterparty_id, %alert_type, %severity, "alert raised");
                Ok(AlertUpsert::Created(self.get_alert(&id).await?))
            }
            // Another writer opened the same alert between our read and insert.
            Err(e) if DatabaseError::is_unique_violation(&e) => {
                let open = self
                    .find_open_alert(counterparty_id, alert_type)
                    .await?
                    .ok_or(DatabaseError::NoResult)?;
                let alert = self
                    .refresh_alert(&open.id, severity, message, diff_id, now)
                    .await?;
                Ok(AlertUpsert::Updated(alert))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn refresh_alert(
        &self,
        id: &str,
        severity: Severity,
        message: &str,
        diff_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Alert, DatabaseError> {
        self.db()
            .conn()
            .execute(
                "UPDATE alerts SET severity = ?1, message = ?2, diff_id = COALESCE(?3, diff_id),
                        last_observed_at = ?4, is_read = 0
                 WHERE id = ?5",
                libsql::params![severity.as_str(), message, diff_id, format_datetime(&now), id],
            )
            .await?;
        tracing::debug!(alert_id = id, "open alert refreshed");
        self.get_alert(id).await
    }

    /// Resolve the open alert of a type, if any. Returns the resolved alert.
    pub async fn resolve_open_alert(
        &self,
        counterparty_id: &str,
        alert_type: AlertType,
        now: DateTime<Utc>,
    ) -> Result<Option<Alert>, DatabaseError> {
        let Some(open) = self.find_open_alert(counterparty_id, alert_type).await? else {
            return Ok(None);
        };
        if self.resolve_alert(&open.id, now).await? {
            tracing::info!(counterparty_id, %alert_type, "alert resolved");
            Ok(Some(self.get_alert(&open.id).await?))
        } else {
            Ok(None)
        }
    }

    /// Resolve by id. Returns `false` when the alert was already resolved.
    pub async fn resolve_alert(&self, id: &str, now: DateTime<Utc>) -> Result<bool, DatabaseError> {
        let changed = self
            .db()
            .conn()
            .execute(
                "UPDATE alerts SET is_resolved = 1, resolved_at = ?1
                 WHERE id = ?2 AND is_resolved = 0",
                libsql::params![format_datetime(&now), id],
            )
            .await?;
        Ok(changed == 1)
    }

    pub async fn mark_alert_read(&self, id: &str) -> Result<bool, DatabaseError> {
        let changed = self
            .db()
            .conn()
            .execute(
                "UPDATE alerts SET is_read = 1 WHERE id = ?1 AND is_read = 0",
                [id],
            )
            .await?;
        Ok(changed == 1)
    }

    /// Alerts of a tenant, most recently observed first.
    pub async fn list_alerts(
        &self,
        tenant_id: &str,
        filter: &AlertFilter,
    ) -> Result<Vec<Alert>, DatabaseError> {
        let mut clauses = vec!["tenant_id = ?1".to_string()];
        let mut params: Vec<libsql::Value> = vec![tenant_id.into()];
        if let Some(counterparty_id) = &filter.counterparty_id {
            params.push(counterparty_id.clone().into());
            clauses.push(format!("counterparty_id = ?{}", params.len()));
        }
        if !filter.include_resolved {
            clauses.push("is_resolved = 0".to_string());
        }
        if filter.unread_only {
            clauses.push("is_read = 0".to_string());
        }
        params.push(i64::from(filter.limit.unwrap_or(u32::MAX)).into());
        let sql = format!(
            "SELECT {SELECT_COLS} FROM alerts WHERE {}
             ORDER BY last_observed_at DESC, rowid DESC LIMIT ?{}",
            clauses.join(" AND "),
            params.len()
        );

        let mut rows = self
            .db()
            .conn()
            .query(&sql, libsql::params_from_iter(params))
            .await?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(row_to_alert(&row)?);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{at, seed_counterparty, test_service};

    #[tokio::test]
    async fn raising_twice_updates_in_place() {
        let svc = test_service().await;
        let cp = seed_counterparty(&svc, "ACME").await;

        let first = svc
            .upsert_alert("t1", &cp.id, AlertType::VatInvalid, Severity::Medium, "VAT invalid", None, at(0))
            .await
            .unwrap();
        assert!(matches!(first, AlertUpsert::Created(_)));
        svc.mark_alert_read(&first.alert().id).await.unwrap();

        let second = svc
            .upsert_alert("t1", &cp.id, AlertType::VatInvalid, Severity::High, "still invalid", None, at(60))
            .await
            .unwrap();
        let AlertUpsert::Updated(alert) = second else {
            panic!("expected update in place");
        };
        assert_eq!(alert.id, first.alert().id);
        assert_eq!(alert.severity, Severity::High);
        assert_eq!(alert.message, "still invalid");
        assert_eq!(alert.created_at, at(0));
        assert_eq!(alert.last_observed_at, at(60));
        assert!(!alert.is_read, "refresh marks the alert unread");

        let open = svc.list_alerts("t1", &AlertFilter::default()).await.unwrap();
        assert_eq!(open.len(), 1);
    }

    #[tokio::test]
    async fn resolved_alert_allows_a_new_one() {
        let svc = test_service().await;
        let cp = seed_counterparty(&svc, "ACME").await;

        let first = svc
            .upsert_alert("t1", &cp.id, AlertType::LeiLapsed, Severity::Medium, "lapsed", None, at(0))
            .await
            .unwrap()
            .into_alert();
        let resolved = svc
            .resolve_open_alert(&cp.id, AlertType::LeiLapsed, at(10))
            .await
            .unwrap()
            .unwrap();
        assert!(resolved.is_resolved);
        assert_eq!(resolved.resolved_at, Some(at(10)));

        let second = svc
            .upsert_alert("t1", &cp.id, AlertType::LeiLapsed, Severity::Medium, "lapsed again", None, at(20))
            .await
            .unwrap();
        assert!(matches!(second, AlertUpsert::Created(_)));
        assert_ne!(second.alert().id, first.id);

        let all = svc
            .list_alerts(
                "t1",
                &AlertFilter {
                    include_resolved: true,
                    ..AlertFilter::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn partial_index_blocks_second_open_alert() {
        let svc = test_service().await;
        let cp = seed_counterparty(&svc, "ACME").await;
        svc.upsert_alert("t1", &cp.id, AlertType::ProfileChange, Severity::Low, "x", None, at(0))
            .await
            .unwrap();

        let raw = svc
            .db()
            .conn()
            .execute(
                "INSERT INTO alerts (id, tenant_id, counterparty_id, alert_type, severity, message,
                                     created_at, last_observed_at)
                 VALUES ('alr-dup', 't1', ?1, 'profile_change', 'low', 'y', 'a', 'a')",
                [cp.id.as_str()],
            )
            .await;
        assert!(raw.is_err());
    }

    #[tokio::test]
    async fn filters() {
        let svc = test_service().await;
        let a = seed_counterparty(&svc, "A").await;
        let b = seed_counterparty(&svc, "B").await;
        let alert = svc
            .upsert_alert("t1", &a.id, AlertType::ProfileChange, Severity::Low, "a", None, at(0))
            .await
            .unwrap()
            .into_alert();
        svc.upsert_alert("t1", &b.id, AlertType::ProfileChange, Severity::Low, "b", None, at(1))
            .await
            .unwrap();
        assert!(svc.mark_alert_read(&alert.id).await.unwrap());
        assert!(!svc.mark_alert_read(&alert.id).await.unwrap());

        let only_a = svc
            .list_alerts(
                "t1",
                &AlertFilter {
                    counterparty_id: Some(a.id.clone()),
                    ..AlertFilter::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(only_a.len(), 1);

        let unread = svc
            .list_alerts(
                "t1",
                &AlertFilter {
                    unread_only: true,
                    ..AlertFilter::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(unread.len(), 1);
        assert_eq!(unread[0].counterparty_id, b.id);

        assert!(svc.list_alerts("t2", &AlertFilter::default()).await.unwrap().is_empty());
    }
}
