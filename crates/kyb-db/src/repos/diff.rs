//! Diff repository. Diffs are immutable once written.

use chrono::{DateTime, Utc};

use kyb_core::entities::{Diff, FieldChange};
use kyb_core::enums::Source;
use kyb_core::ids::PREFIX_DIFF;

use crate::error::DatabaseError;
use crate::helpers::{format_datetime, get_datetime, get_opt_string, parse_enum};
use crate::service::KybService;

const SELECT_COLS: &str = "id, counterparty_id, source, old_snapshot_id, new_snapshot_id, \
     changes, risk_impact, created_at";

fn row_to_diff(row: &libsql::Row) -> Result<Diff, DatabaseError> {
    Ok(Diff {
        id: row.get(0)?,
        counterparty_id: row.get(1)?,
        source: parse_enum(&row.get::<String>(2)?)?,
        old_snapshot_id: get_opt_string(row, 3)?,
        new_snapshot_id: row.get(4)?,
        changes: serde_json::from_str(&row.get::<String>(5)?)?,
        risk_impact: row.get(6)?,
        created_at: get_datetime(row, 7)?,
    })
}

impl KybService {
    #[allow(clippy::too_many_arguments)]
    pub async fn insert_diff(
        &self,
        counterparty_id: &str,
        source: Source,
        old_snapshot_id: Option<&str>,
        new_snapshot_id: &str,
        changes: &[FieldChange],
        risk_impact: i64,
        now: DateTime<Utc>,
    ) -> Result<Diff, DatabaseError> {
        let id = self.db().generate_id(PREFIX_DIFF).await?;
        self.db()
            .conn()
            .execute(
                &format!(
                    "INSERT INTO diffs ({SELECT_COLS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"
                ),
                libsql::params![
                    id.as_str(),
                    counterparty_id,
                    source.as_str(),
                    old_snapshot_id,
                    new_snapshot_id,
                    serde_json::to_string(changes)?,
                    risk_impact,
                    format_datetime(&now)
                ],
            )
            .await?;
        self.get_diff(&id).await
    }

    pub async fn get_diff(&self, id: &str) -> Result<Diff, DatabaseError> {
        let mut rows = self
            .db()
            .conn()
            .query(&format!("SELECT {SELECT_COLS} FROM diffs WHERE id = ?1"), [id])
            .await?;
        let row = rows.next().await?.ok_or(DatabaseError::NoResult)?;
        row_to_diff(&row)
    }

    /// Diffs of a counterparty, newest first, optionally for one source.
    pub async fn list_diffs(
        &self,
        counterparty_id: &str,
        source: Option<Source>,
        limit: u32,
    ) -> Result<Vec<Diff>, DatabaseError> {
        let mut rows = match source {
            Some(source) => {
                self.db()
                    .conn()
                    .query(
                        &format!(
                            "SELECT {SELECT_COLS} FROM diffs
                             WHERE counterparty_id = ?1 AND source = ?2
                             ORDER BY created_at DESC, rowid DESC LIMIT ?3"
                        ),
                        libsql::params![counterparty_id, source.as_str(), i64::from(limit)],
                    )
                    .await?
            }
            None => {
                self.db()
                    .conn()
                    .query(
                        &format!(
                            "SELECT {SELECT_COLS} FROM diffs
                             WHERE counterparty_id = ?1
                             ORDER BY created_at DESC, rowid DESC LIMIT ?2"
                        ),
                        libsql::params![counterparty_id, i64::from(limit)],
                    )
                    .await?
            }
        };
        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(row_to_diff(&row)?);
        }
        Ok(out)
    }

    /// All diffs created at or after `since`, newest first. Risk scoring reads
    /// its decayed history from here.
    pub async fn diffs_since(
        &self,
        counterparty_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<Diff>, DatabaseError> {
        let mut rows = self
            .db()
            .conn()
            .query(
                &format!(
                    "SELECT {SELECT_COLS} FROM diffs
                     WHERE counterparty_id = ?1 AND created_at >= ?2
                     ORDER BY created_at DESC, rowid DESC"
                ),
                libsql::params![counterparty_id, format_datetime(&since)],
            )
            .await?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(row_to_diff(&row)?);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{at, seed_counterparty, test_service};
    use kyb_core::enums::ChangeKind;
    use kyb_core::record::NormalizedRecord;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[tokio::test]
    async fn insert_roundtrips_changes() {
        let svc = test_service().await;
        let cp = seed_counterparty(&svc, "ACME").await;
        let snap = svc
            .save_snapshot(&cp.id, Source::Vies, &NormalizedRecord::new().with("valid", false), at(0))
            .await
            .unwrap();

        let changes = vec![FieldChange {
            path: "valid".into(),
            kind: ChangeKind::Modified,
            old: Some(json!(true)),
            new: Some(json!(false)),
        }];
        let diff = svc
            .insert_diff(&cp.id, Source::Vies, None, &snap.current().id, &changes, 50, at(0))
            .await
            .unwrap();

        assert!(diff.id.starts_with("dif-"));
        assert!(diff.is_initial());
        assert_eq!(diff.changes, changes);
        assert_eq!(diff.risk_impact, 50);
        assert_eq!(svc.get_diff(&diff.id).await.unwrap(), diff);
    }

    #[tokio::test]
    async fn listing_and_window() {
        let svc = test_service().await;
        let cp = seed_counterparty(&svc, "ACME").await;
        let snap = svc
            .save_snapshot(&cp.id, Source::Gleif, &NormalizedRecord::new(), at(0))
            .await
            .unwrap();
        let snap_id = snap.current().id.clone();

        for (i, source) in [Source::Gleif, Source::Vies, Source::Gleif].into_iter().enumerate() {
            let secs = i64::try_from(i).unwrap() * 100;
            svc.insert_diff(&cp.id, source, None, &snap_id, &[], 0, at(secs))
                .await
                .unwrap();
        }

        assert_eq!(svc.list_diffs(&cp.id, None, 10).await.unwrap().len(), 3);
        let gleif = svc.list_diffs(&cp.id, Some(Source::Gleif), 10).await.unwrap();
        assert_eq!(gleif.len(), 2);
        assert_eq!(gleif[0].created_at, at(200));

        let recent = svc.diffs_since(&cp.id, at(100)).await.unwrap();
        assert_eq!(recent.len(), 2);
    }

    #[tokio::test]
    async fn diffs_are_immutable() {
        let svc = test_service().await;
        let cp = seed_counterparty(&svc, "ACME").await;
        let snap = svc
            .save_snapshot(&cp.id, Source::Gleif, &NormalizedRecord::new(), at(0))
            .await
            .unwrap();
        let diff = svc
            .insert_diff(&cp.id, Source::Gleif, None, &snap.current().id, &[], 0, at(0))
            .await
            .unwrap();

        let result = svc
            .db()
            .conn()
            .execute(
                "UPDATE diffs SET risk_impact = 100 WHERE id = ?1",
                [diff.id.as_str()],
            )
            .await;
        assert!(result.is_err());
    }
}
