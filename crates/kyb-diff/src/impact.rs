//! Risk-impact table and transition classification.
//!
//! Only a handful of fields carry risk. Everything else (addresses, scores,
//! case numbers, list names) is recorded in the diff with zero impact.

use kyb_core::entities::FieldChange;
use kyb_core::enums::{ChangeKind, Source};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const FIELD_MATCHED: &str = "matched";
pub const FIELD_PROCEEDING_ACTIVE: &str = "proceeding_active";
pub const FIELD_VALID: &str = "valid";
pub const FIELD_STATUS: &str = "status";
pub const FIELD_NAME: &str = "name";
pub const FIELD_LEGAL_NAME: &str = "legal_name";
pub const FIELD_ENTITY_CATEGORY: &str = "entity_category";

/// GLEIF registration status of a healthy LEI.
pub const LEI_ISSUED: &str = "ISSUED";

pub const IMPACT_SANCTION: i64 = 100;
pub const IMPACT_INSOLVENCY: i64 = 80;
pub const IMPACT_VAT: i64 = 50;
pub const IMPACT_LEI: i64 = 50;
pub const IMPACT_NAME: i64 = 10;
pub const IMPACT_CATEGORY: i64 = 5;

/// A change that matters for alerting and scoring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RiskTransition {
    SanctionMatched,
    SanctionCleared,
    InsolvencyFiled,
    InsolvencyClosed,
    VatInvalidated,
    VatRevalidated,
    LeiLapsed { status: String },
    LeiReinstated,
    ProfileChanged { field: String },
}

impl RiskTransition {
    /// Signed impact of this transition.
    #[must_use]
    pub fn impact(&self) -> i64 {
        match self {
            Self::SanctionMatched => IMPACT_SANCTION,
            Self::SanctionCleared => -IMPACT_SANCTION,
            Self::InsolvencyFiled => IMPACT_INSOLVENCY,
            Self::InsolvencyClosed => -IMPACT_INSOLVENCY,
            Self::VatInvalidated => IMPACT_VAT,
            Self::VatRevalidated => -IMPACT_VAT,
            Self::LeiLapsed { .. } => IMPACT_LEI,
            Self::LeiReinstated => -IMPACT_LEI,
            Self::ProfileChanged { field } => {
                if field == FIELD_ENTITY_CATEGORY {
                    IMPACT_CATEGORY
                } else {
                    IMPACT_NAME
                }
            }
        }
    }

    /// Whether this transition undoes an earlier risk finding.
    #[must_use]
    pub const fn is_reversal(&self) -> bool {
        matches!(
            self,
            Self::SanctionCleared | Self::InsolvencyClosed | Self::VatRevalidated | Self::LeiReinstated
        )
    }
}

/// Boolean flip carried by a modified field: `Some(new)` when the value went
/// from `!new` to `new`.
fn bool_flip(change: &FieldChange) -> Option<bool> {
    if change.kind != ChangeKind::Modified {
        return None;
    }
    let old = change.old.as_ref().and_then(Value::as_bool)?;
    let new = change.new.as_ref().and_then(Value::as_bool)?;
    (old != new).then_some(new)
}

fn as_str(value: Option<&Value>) -> Option<&str> {
    value.and_then(Value::as_str)
}

/// Classify one change of a `source` record.
#[must_use]
pub fn classify(source: Source, change: &FieldChange) -> Option<RiskTransition> {
    let path = change.path.as_str();
    match source {
        Source::SanctionsEu | Source::SanctionsOfac | Source::SanctionsUk if path == FIELD_MATCHED => {
            bool_flip(change).map(|matched| {
                if matched {
                    RiskTransition::SanctionMatched
                } else {
                    RiskTransition::SanctionCleared
                }
            })
        }
        Source::InsolvencyDe if path == FIELD_PROCEEDING_ACTIVE => bool_flip(change).map(|active| {
            if active {
                RiskTransition::InsolvencyFiled
            } else {
                RiskTransition::InsolvencyClosed
            }
        }),
        Source::Vies if path == FIELD_VALID => bool_flip(change).map(|valid| {
            if valid {
                RiskTransition::VatRevalidated
            } else {
                RiskTransition::VatInvalidated
            }
        }),
        Source::Vies if path == FIELD_NAME && change.kind == ChangeKind::Modified => {
            Some(RiskTransition::ProfileChanged {
                field: path.to_string(),
            })
        }
        Source::Gleif if path == FIELD_STATUS && change.kind == ChangeKind::Modified => {
            let old = as_str(change.old.as_ref());
            let new = as_str(change.new.as_ref());
            match (old == Some(LEI_ISSUED), new == Some(LEI_ISSUED)) {
                (true, false) => Some(RiskTransition::LeiLapsed {
                    status: new.unwrap_or("UNKNOWN").to_string(),
                }),
                (false, true) => Some(RiskTransition::LeiReinstated),
                _ => None,
            }
        }
        Source::Gleif
            if (path == FIELD_LEGAL_NAME || path == FIELD_ENTITY_CATEGORY)
                && change.kind == ChangeKind::Modified =>
        {
            Some(RiskTransition::ProfileChanged {
                field: path.to_string(),
            })
        }
        _ => None,
    }
}

/// Every risk-relevant transition in `changes`, in change order.
#[must_use]
pub fn transitions(source: Source, changes: &[FieldChange]) -> Vec<RiskTransition> {
    changes.iter().filter_map(|c| classify(source, c)).collect()
}

/// Sum of the impact-table entries for `changes`.
#[must_use]
pub fn risk_impact(source: Source, changes: &[FieldChange]) -> i64 {
    transitions(source, changes)
        .iter()
        .map(RiskTransition::impact)
        .sum()
}
