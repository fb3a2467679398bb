//! Alert significance thresholds.

use std::collections::BTreeMap;

use kyb_core::enums::AlertType;
use serde::{Deserialize, Serialize};

const fn default_emit_cleared_alerts() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct AlertsConfig {
    /// Per-type threshold a diff's risk impact must exceed to raise an alert.
    /// Types not listed use 0.
    #[serde(default)]
    pub thresholds: BTreeMap<AlertType, i64>,

    /// Raise a low-severity `sanction_cleared` alert when a match goes away.
    #[serde(default = "default_emit_cleared_alerts")]
    pub emit_cleared_alerts: bool,
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            thresholds: BTreeMap::new(),
            emit_cleared_alerts: default_emit_cleared_alerts(),
        }
    }
}

impl AlertsConfig {
    #[must_use]
    pub fn threshold_for(&self, alert_type: AlertType) -> i64 {
        self.thresholds.get(&alert_type).copied().unwrap_or(0)
    }
}
