use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::enums::{CounterpartyStatus, RiskCategory};

/// A tenant-owned business under monitoring.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct Counterparty {
    pub id: String,
    pub tenant_id: String,
    pub display_name: String,
    pub vat_number: Option<String>,
    pub lei_code: Option<String>,
    pub country_code: String,
    pub risk_score: u8,
    pub risk_category: RiskCategory,
    pub status: CounterpartyStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Counterparty {
    #[must_use]
    pub fn is_archived(&self) -> bool {
        self.status == CounterpartyStatus::Archived
    }
}

/// Identifiers supplied by the tenant when a counterparty is added.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct NewCounterparty {
    pub display_name: String,
    pub country_code: String,
    pub vat_number: Option<String>,
    pub lei_code: Option<String>,
}
