use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::enums::{AlertType, Severity, Source};

/// Tenant-visible notification derived from one or more diffs.
///
/// At most one unresolved alert exists per `(counterparty_id, alert_type)`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct Alert {
    pub id: String,
    pub tenant_id: String,
    pub counterparty_id: String,
    pub alert_type: AlertType,
    pub severity: Severity,
    pub message: String,
    pub is_read: bool,
    pub is_resolved: bool,
    pub diff_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_observed_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

/// Staff-facing notice that a monitoring job has degraded.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct OperationalAlert {
    pub id: String,
    pub job_id: String,
    pub counterparty_id: String,
    pub source: Source,
    pub message: String,
    pub consecutive_failures: u32,
    pub is_resolved: bool,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}
