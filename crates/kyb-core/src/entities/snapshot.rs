use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::enums::Source;
use crate::record::NormalizedRecord;

/// Immutable capture of one source's normalized answer for one counterparty.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct Snapshot {
    pub id: String,
    pub counterparty_id: String,
    pub source: Source,
    pub content_hash: String,
    pub payload: NormalizedRecord,
    pub fetched_at: DateTime<Utc>,
}

/// Marker that a fetch returned content identical to `snapshot_id`.
///
/// Proves the check ran without creating a diff-triggering snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct SnapshotObservation {
    pub id: String,
    pub snapshot_id: String,
    pub counterparty_id: String,
    pub source: Source,
    pub content_hash: String,
    pub observed_at: DateTime<Utc>,
}
