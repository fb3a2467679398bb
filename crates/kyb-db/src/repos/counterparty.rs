//! Counterparty repository: create, read, risk fields, identifiers, archival.

use chrono::{DateTime, Utc};

use kyb_core::entities::{Counterparty, NewCounterparty};
use kyb_core::enums::{CounterpartyStatus, RiskCategory};
use kyb_core::ids::PREFIX_COUNTERPARTY;

use crate::error::DatabaseError;
use crate::helpers::{format_datetime, get_datetime, get_opt_string, get_unsigned, parse_enum};
use crate::service::KybService;

const SELECT_COLS: &str = "id, tenant_id, display_name, vat_number, lei_code, country_code, \
     risk_score, risk_category, status, created_at, updated_at";

fn row_to_counterparty(row: &libsql::Row) -> Result<Counterparty, DatabaseError> {
    Ok(Counterparty {
        id: row.get(0)?,
        tenant_id: row.get(1)?,
        display_name: row.get(2)?,
        vat_number: get_opt_string(row, 3)?,
        lei_code: get_opt_string(row, 4)?,
        country_code: row.get(5)?,
        risk_score: get_unsigned(row, 6)?,
        risk_category: parse_enum(&row.get::<String>(7)?)?,
        status: parse_enum(&row.get::<String>(8)?)?,
        created_at: get_datetime(row, 9)?,
        updated_at: get_datetime(row, 10)?,
    })
}

impl KybService {
    /// Insert a counterparty. Identifiers are stored as given; callers
    /// normalize them first.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError::Duplicate`] when the tenant already has a
    /// counterparty with the same VAT number or LEI.
    pub async fn create_counterparty(
        &self,
        tenant_id: &str,
        new: &NewCounterparty,
        now: DateTime<Utc>,
    ) -> Result<Counterparty, DatabaseError> {
        let id = self.db().generate_id(PREFIX_COUNTERPARTY).await?;
        let ts = format_datetime(&now);

        self.db()
            .conn()
            .execute(
                &format!(
                    "INSERT INTO counterparties ({SELECT_COLS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7, ?8, ?9, ?9)"
                ),
                libsql::params![
                    id.as_str(),
                    tenant_id,
                    new.display_name.as_str(),
                    new.vat_number.as_deref(),
                    new.lei_code.as_deref(),
                    new.country_code.as_str(),
                    RiskCategory::Low.as_str(),
                    CounterpartyStatus::Active.as_str(),
                    ts
                ],
            )
            .await
            .map_err(|e| DatabaseError::from_write(e, "counterparty"))?;

        tracing::debug!(counterparty_id = %id, tenant_id, "counterparty created");
        self.get_counterparty(&id).await
    }

    pub async fn get_counterparty(&self, id: &str) -> Result<Counterparty, DatabaseError> {
        let mut rows = self
            .db()
            .conn()
            .query(
                &format!("SELECT {SELECT_COLS} FROM counterparties WHERE id = ?1"),
                [id],
            )
            .await?;
        let row = rows.next().await?.ok_or(DatabaseError::NoResult)?;
        row_to_counterparty(&row)
    }

    /// Counterparties of one tenant, oldest first.
    pub async fn list_counterparties(
        &self,
        tenant_id: &str,
        include_archived: bool,
    ) -> Result<Vec<Counterparty>, DatabaseError> {
        let sql = if include_archived {
            format!(
                "SELECT {SELECT_COLS} FROM counterparties WHERE tenant_id = ?1
                 ORDER BY created_at, id"
            )
        } else {
            format!(
                "SELECT {SELECT_COLS} FROM counterparties WHERE tenant_id = ?1
                 AND status = 'active' ORDER BY created_at, id"
            )
        };
        let mut rows = self.db().conn().query(&sql, [tenant_id]).await?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(row_to_counterparty(&row)?);
        }
        Ok(out)
    }

    /// Persist a recomputed score.
    pub async fn update_risk(
        &self,
        id: &str,
        score: u8,
        category: RiskCategory,
        now: DateTime<Utc>,
    ) -> Result<(), DatabaseError> {
        let changed = self
            .db()
            .conn()
            .execute(
                "UPDATE counterparties SET risk_score = ?1, risk_category = ?2, updated_at = ?3
                 WHERE id = ?4",
                libsql::params![
                    i64::from(score),
                    category.as_str(),
                    format_datetime(&now),
                    id
                ],
            )
            .await?;
        if changed == 0 {
            return Err(DatabaseError::NoResult);
        }
        Ok(())
    }

    /// Soft-delete. Returns `false` when already archived.
    pub async fn archive_counterparty(
        &self,
        id: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, DatabaseError> {
        let current = self.get_counterparty(id).await?;
        if !current
            .status
            .can_transition_to(CounterpartyStatus::Archived)
        {
            return Ok(false);
        }
        let changed = self
            .db()
            .conn()
            .execute(
                "UPDATE counterparties SET status = ?1, updated_at = ?2
                 WHERE id = ?3 AND status = 'active'",
                libsql::params![
                    CounterpartyStatus::Archived.as_str(),
                    format_datetime(&now),
                    id
                ],
            )
            .await?;
        Ok(changed == 1)
    }

    pub async fn rename_counterparty(
        &self,
        id: &str,
        display_name: &str,
        now: DateTime<Utc>,
    ) -> Result<Counterparty, DatabaseError> {
        let changed = self
            .db()
            .conn()
            .execute(
                "UPDATE counterparties SET display_name = ?1, updated_at = ?2 WHERE id = ?3",
                libsql::params![display_name, format_datetime(&now), id],
            )
            .await?;
        if changed == 0 {
            return Err(DatabaseError::NoResult);
        }
        self.get_counterparty(id).await
    }

    /// Replace both registry identifiers.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError::Duplicate`] when another counterparty of the
    /// tenant already holds the VAT number or LEI.
    pub async fn set_identifiers(
        &self,
        id: &str,
        vat_number: Option<&str>,
        lei_code: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Counterparty, DatabaseError> {
        let changed = self
            .db()
            .conn()
            .execute(
                "UPDATE counterparties SET vat_number = ?1, lei_code = ?2, updated_at = ?3
                 WHERE id = ?4",
                libsql::params![vat_number, lei_code, format_datetime(&now), id],
            )
            .await
            .map_err(|e| DatabaseError::from_write(e, "counterparty"))?;
        if changed == 0 {
            return Err(DatabaseError::NoResult);
        }
        self.get_counterparty(id).await
    }
}

#[cfg(test)]
mod tests {
    use crate::error::DatabaseError;
    use crate::test_support::{at, new_counterparty, t0, test_service};
    use kyb_core::enums::{CounterpartyStatus, RiskCategory};

    #[tokio::test]
    async fn create_and_get() {
        let svc = test_service().await;
        let cp = svc
            .create_counterparty(
                "t1",
                &new_counterparty("ACME GmbH", Some("DE123456789"), None),
                t0(),
            )
            .await
            .unwrap();

        assert!(cp.id.starts_with("cpy-"));
        assert_eq!(cp.vat_number.as_deref(), Some("DE123456789"));
        assert_eq!(cp.lei_code, None);
        assert_eq!(cp.risk_score, 0);
        assert_eq!(cp.risk_category, RiskCategory::Low);
        assert_eq!(cp.status, CounterpartyStatus::Active);
        assert_eq!(cp.created_at, t0());

        let fetched = svc.get_counterparty(&cp.id).await.unwrap();
        assert_eq!(fetched, cp);
    }

    #[tokio::test]
    async fn duplicate_vat_within_tenant_is_rejected() {
        let svc = test_service().await;
        let new = new_counterparty("ACME GmbH", Some("DE123456789"), None);
        svc.create_counterparty("t1", &new, t0()).await.unwrap();

        let err = svc.create_counterparty("t1", &new, t0()).await.unwrap_err();
        assert!(matches!(err, DatabaseError::Duplicate { .. }), "{err}");

        // Other tenants may monitor the same company.
        svc.create_counterparty("t2", &new, t0()).await.unwrap();
    }

    #[tokio::test]
    async fn duplicate_lei_within_tenant_is_rejected() {
        let svc = test_service().await;
        let a = new_counterparty("A", None, Some("5493001KJTIIGC8Y1R12"));
        let b = new_counterparty("B", None, Some("5493001KJTIIGC8Y1R12"));
        svc.create_counterparty("t1", &a, t0()).await.unwrap();
        assert!(matches!(
            svc.create_counterparty("t1", &b, t0()).await,
            Err(DatabaseError::Duplicate { .. })
        ));
    }

    #[tokio::test]
    async fn missing_identifiers_never_collide() {
        let svc = test_service().await;
        for name in ["A", "B", "C"] {
            svc.create_counterparty("t1", &new_counterparty(name, None, None), t0())
                .await
                .unwrap();
        }
        assert_eq!(svc.list_counterparties("t1", false).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn archive_is_soft_and_once() {
        let svc = test_service().await;
        let cp = svc
            .create_counterparty("t1", &new_counterparty("A", None, None), t0())
            .await
            .unwrap();

        assert!(svc.archive_counterparty(&cp.id, at(10)).await.unwrap());
        assert!(!svc.archive_counterparty(&cp.id, at(20)).await.unwrap());

        let archived = svc.get_counterparty(&cp.id).await.unwrap();
        assert!(archived.is_archived());
        assert_eq!(archived.updated_at, at(10));
        assert!(svc.list_counterparties("t1", false).await.unwrap().is_empty());
        assert_eq!(svc.list_counterparties("t1", true).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn update_risk_and_identifiers() {
        let svc = test_service().await;
        let cp = svc
            .create_counterparty("t1", &new_counterparty("A", Some("DEX"), None), t0())
            .await
            .unwrap();

        svc.update_risk(&cp.id, 95, RiskCategory::Critical, at(5))
            .await
            .unwrap();
        let updated = svc
            .set_identifiers(&cp.id, Some("DE123456789"), Some("5493001KJTIIGC8Y1R12"), at(6))
            .await
            .unwrap();
        assert_eq!(updated.risk_score, 95);
        assert_eq!(updated.risk_category, RiskCategory::Critical);
        assert_eq!(updated.vat_number.as_deref(), Some("DE123456789"));
        assert_eq!(updated.lei_code.as_deref(), Some("5493001KJTIIGC8Y1R12"));

        let renamed = svc.rename_counterparty(&cp.id, "A2", at(7)).await.unwrap();
        assert_eq!(renamed.display_name, "A2");
    }

    #[tokio::test]
    async fn unknown_counterparty() {
        let svc = test_service().await;
        assert!(matches!(
            svc.get_counterparty("cpy-missing").await,
            Err(DatabaseError::NoResult)
        ));
        assert!(matches!(
            svc.update_risk("cpy-missing", 1, RiskCategory::Low, t0()).await,
            Err(DatabaseError::NoResult)
        ));
    }
}
