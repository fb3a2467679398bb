//! Snapshot store: content-hashed, append-only registry answers.
//!
//! A fetch whose content hash equals the latest snapshot's is recorded as an
//! observation instead of a new snapshot.

use chrono::{DateTime, Utc};

use kyb_core::entities::{Snapshot, SnapshotObservation};
use kyb_core::enums::Source;
use kyb_core::ids::{PREFIX_OBSERVATION, PREFIX_SNAPSHOT};
use kyb_core::record::NormalizedRecord;

use crate::error::DatabaseError;
use crate::helpers::{format_datetime, get_datetime, parse_enum};
use crate::service::KybService;

const SELECT_COLS: &str = "id, counterparty_id, source, content_hash, payload, fetched_at";

const OBSERVATION_COLS: &str =
    "id, snapshot_id, counterparty_id, source, content_hash, observed_at";

/// Result of [`KybService::save_snapshot`].
#[derive(Debug, Clone, PartialEq)]
pub enum SaveOutcome {
    /// The payload differs from the latest snapshot (or there was none).
    Created {
        snapshot: Snapshot,
        previous: Option<Snapshot>,
    },
    /// Same content as the latest snapshot; only an observation was written.
    Unchanged {
        latest: Snapshot,
        observation: SnapshotObservation,
    },
}

impl SaveOutcome {
    #[must_use]
    pub const fn is_created(&self) -> bool {
        matches!(self, Self::Created { .. })
    }

    /// The snapshot now current for the (counterparty, source) pair.
    #[must_use]
    pub const fn current(&self) -> &Snapshot {
        match self {
            Self::Created { snapshot, .. } => snapshot,
            Self::Unchanged { latest, .. } => latest,
        }
    }
}

fn row_to_snapshot(row: &libsql::Row) -> Result<Snapshot, DatabaseError> {
    let payload: serde_json::Value = serde_json::from_str(&row.get::<String>(4)?)?;
    Ok(Snapshot {
        id: row.get(0)?,
        counterparty_id: row.get(1)?,
        source: parse_enum(&row.get::<String>(2)?)?,
        content_hash: row.get(3)?,
        payload: NormalizedRecord::try_from(payload)
            .map_err(|e| DatabaseError::InvalidState(e.to_string()))?,
        fetched_at: get_datetime(row, 5)?,
    })
}

fn row_to_observation(row: &libsql::Row) -> Result<SnapshotObservation, DatabaseError> {
    Ok(SnapshotObservation {
        id: row.get(0)?,
        snapshot_id: row.get(1)?,
        counterparty_id: row.get(2)?,
        source: parse_enum(&row.get::<String>(3)?)?,
        content_hash: row.get(4)?,
        observed_at: get_datetime(row, 5)?,
    })
}

impl KybService {
    /// Store a fetched record, deduplicating by content hash against the
    /// latest snapshot.
    ///
    /// Callers hold the job lease for (counterparty, source), which keeps the
    /// read-compare-insert sequence free of concurrent writers.
    pub async fn save_snapshot(
        &self,
        counterparty_id: &str,
        source: Source,
        record: &NormalizedRecord,
        now: DateTime<Utc>,
    ) -> Result<SaveOutcome, DatabaseError> {
        let hash = record.content_hash();
        let previous = self.latest_snapshot(counterparty_id, source).await?;

        if let Some(latest) = previous.as_ref().filter(|s| s.content_hash == hash) {
            let id = self.db().generate_id(PREFIX_OBSERVATION).await?;
            self.db()
                .conn()
                .execute(
                    &format!(
                        "INSERT INTO snapshot_observations ({OBSERVATION_COLS})
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6)"
                    ),
                    libsql::params![
                        id.as_str(),
                        latest.id.as_str(),
                        counterparty_id,
                        source.as_str(),
                        hash.as_str(),
                        format_datetime(&now)
                    ],
                )
                .await?;
            tracing::debug!(counterparty_id, %source, "snapshot unchanged");
            let observation = self.get_observation(&id).await?;
            return Ok(SaveOutcome::Unchanged {
                latest: latest.clone(),
                observation,
            });
        }

        let id = self.db().generate_id(PREFIX_SNAPSHOT).await?;
        let payload = serde_json::to_string(&record.to_value())?;
        self.db()
            .conn()
            .execute(
                &format!(
                    "INSERT INTO snapshots ({SELECT_COLS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)"
                ),
                libsql::params![
                    id.as_str(),
                    counterparty_id,
                    source.as_str(),
                    hash.as_str(),
                    payload,
                    format_datetime(&now)
                ],
            )
            .await?;
        tracing::debug!(counterparty_id, %source, snapshot_id = %id, "snapshot stored");

        let snapshot = self.get_snapshot(&id).await?;
        Ok(SaveOutcome::Created { snapshot, previous })
    }

    pub async fn get_snapshot(&self, id: &str) -> Result<Snapshot, DatabaseError> {
        let mut rows = self
            .db()
            .conn()
            .query(
                &format!("SELECT {SELECT_COLS} FROM snapshots WHERE id = ?1"),
                [id],
            )
            .await?;
        let row = rows.next().await?.ok_or(DatabaseError::NoResult)?;
        row_to_snapshot(&row)
    }

    async fn get_observation(&self, id: &str) -> Result<SnapshotObservation, DatabaseError> {
        let mut rows = self
            .db()
            .conn()
            .query(
                &format!("SELECT {OBSERVATION_COLS} FROM snapshot_observations WHERE id = ?1"),
                [id],
            )
            .await?;
        let row = rows.next().await?.ok_or(DatabaseError::NoResult)?;
        row_to_observation(&row)
    }

    pub async fn latest_snapshot(
        &self,
        counterparty_id: &str,
        source: Source,
    ) -> Result<Option<Snapshot>, DatabaseError> {
        Ok(self
            .snapshot_history(counterparty_id, source, 1)
            .await?
            .into_iter()
            .next())
    }

    /// Up to `limit` snapshots, newest first (ties broken by insertion order).
    pub async fn snapshot_history(
        &self,
        counterparty_id: &str,
        source: Source,
        limit: u32,
    ) -> Result<Vec<Snapshot>, DatabaseError> {
        let mut rows = self
            .db()
            .conn()
            .query(
                &format!(
                    "SELECT {SELECT_COLS} FROM snapshots
                     WHERE counterparty_id = ?1 AND source = ?2
                     ORDER BY fetched_at DESC, rowid DESC
                     LIMIT ?3"
                ),
                libsql::params![counterparty_id, source.as_str(), i64::from(limit)],
            )
            .await?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(row_to_snapshot(&row)?);
        }
        Ok(out)
    }

    /// The latest snapshot of every source that has one.
    pub async fn latest_snapshots(
        &self,
        counterparty_id: &str,
    ) -> Result<Vec<Snapshot>, DatabaseError> {
        let mut out = Vec::new();
        for source in Source::ALL {
            if let Some(snapshot) = self.latest_snapshot(counterparty_id, source).await? {
                out.push(snapshot);
            }
        }
        Ok(out)
    }

    /// Observations of unchanged content, newest first.
    pub async fn list_observations(
        &self,
        counterparty_id: &str,
        source: Source,
        limit: u32,
    ) -> Result<Vec<SnapshotObservation>, DatabaseError> {
        let mut rows = self
            .db()
            .conn()
            .query(
                &format!(
                    "SELECT {OBSERVATION_COLS} FROM snapshot_observations
                     WHERE counterparty_id = ?1 AND source = ?2
                     ORDER BY observed_at DESC, rowid DESC
                     LIMIT ?3"
                ),
                libsql::params![counterparty_id, source.as_str(), i64::from(limit)],
            )
            .await?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(row_to_observation(&row)?);
        }
        Ok(out)
    }

    /// When the source was last seen, changed or not.
    pub async fn last_observed_at(
        &self,
        counterparty_id: &str,
        source: Source,
    ) -> Result<Option<DateTime<Utc>>, DatabaseError> {
        let snapshot = self
            .latest_snapshot(counterparty_id, source)
            .await?
            .map(|s| s.fetched_at);
        let observation = self
            .list_observations(counterparty_id, source, 1)
            .await?
            .into_iter()
            .next()
            .map(|o| o.observed_at);
        Ok(snapshot.max(observation))
    }
}
