use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::enums::{ChangeKind, Source};

/// One leaf-level difference between two snapshots.
///
/// `old` is `None` for `added`, `new` is `None` for `removed`. A JSON `null`
/// that was present is `Some(Value::Null)`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct FieldChange {
    pub path: String,
    pub kind: ChangeKind,
    pub old: Option<Value>,
    pub new: Option<Value>,
}

/// Persisted result of comparing two snapshots of the same source.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct Diff {
    pub id: String,
    pub counterparty_id: String,
    pub source: Source,
    pub old_snapshot_id: Option<String>,
    pub new_snapshot_id: String,
    pub changes: Vec<FieldChange>,
    pub risk_impact: i64,
    pub created_at: DateTime<Utc>,
}

impl Diff {
    /// First observation for this source (no previous snapshot).
    #[must_use]
    pub const fn is_initial(&self) -> bool {
        self.old_snapshot_id.is_none()
    }
}
