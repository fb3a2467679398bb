//! # kyb-diff
//!
//! Structural comparison of two snapshots of the same source.
//!
//! The walk recurses into JSON objects and treats arrays and scalars as
//! leaves. Numbers closer than the configured tolerance are equal; `null` and
//! an absent key are distinct. Output is sorted by dot-joined field path, so
//! comparing the same pair twice is byte-identical.
//!
//! Each change is then classified against the impact table in [`impact`].
//! An initial comparison (no previous snapshot) lists every leaf as `added`
//! and has zero impact: onboarding never alerts.

pub mod impact;
mod walk;

pub use impact::{RiskTransition, classify, risk_impact, transitions};

use kyb_config::DiffConfig;
use kyb_core::entities::{FieldChange, Snapshot};
use kyb_core::enums::Source;
use kyb_core::record::NormalizedRecord;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiffOptions {
    pub float_tolerance: f64,
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self::from(&DiffConfig::default())
    }
}

impl From<&DiffConfig> for DiffOptions {
    fn from(config: &DiffConfig) -> Self {
        Self {
            float_tolerance: config.float_tolerance,
        }
    }
}

/// Result of [`compare`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeSet {
    pub source: Source,
    pub changes: Vec<FieldChange>,
    pub risk_impact: i64,
    /// No previous snapshot existed.
    pub initial: bool,
}

impl ChangeSet {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Risk-relevant transitions. Always empty for an initial change set.
    #[must_use]
    pub fn transitions(&self) -> Vec<RiskTransition> {
        if self.initial {
            return Vec::new();
        }
        transitions(self.source, &self.changes)
    }
}

/// Compare two snapshots of the same source.
#[must_use]
pub fn compare(old: Option<&Snapshot>, new: &Snapshot, options: DiffOptions) -> ChangeSet {
    compare_records(new.source, old.map(|s| &s.payload), &new.payload, options)
}

/// Compare two normalized records of `source`.
#[must_use]
pub fn compare_records(
    source: Source,
    old: Option<&NormalizedRecord>,
    new: &NormalizedRecord,
    options: DiffOptions,
) -> ChangeSet {
    let initial = old.is_none();
    let old_value = old.map_or_else(|| Value::Object(Map::new()), NormalizedRecord::to_value);
    let new_value = new.to_value();

    let mut changes = Vec::new();
    walk::walk(
        "",
        Some(&old_value),
        Some(&new_value),
        options.float_tolerance,
        &mut changes,
    );
    changes.sort_by(|a, b| a.path.cmp(&b.path));

    let risk_impact = if initial { 0 } else { risk_impact(source, &changes) };
    ChangeSet {
        source,
        changes,
        risk_impact,
        initial,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use kyb_core::enums::ChangeKind;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn snapshot(source: Source, payload: serde_json::Value) -> Snapshot {
        let payload = NormalizedRecord::try_from(payload).unwrap();
        let fetched_at: DateTime<Utc> = "2026-03-01T12:00:00Z".parse().unwrap();
        Snapshot {
            id: "snp-0000000000000001".into(),
            counterparty_id: "cpy-0000000000000001".into(),
            source,
            content_hash: payload.content_hash(),
            payload,
            fetched_at,
        }
    }

    fn vies(valid: bool, name: &str) -> Snapshot {
        snapshot(
            Source::Vies,
            json!({
                "valid": valid,
                "name": name,
                "address": "Hauptstr. 1, Berlin",
                "country_code": "DE",
                "vat_number": "123456789",
            }),
        )
    }

    #[test]
    fn initial_lists_every_leaf_with_zero_impact() {
        let new = snapshot(Source::SanctionsEu, json!({"matched": true, "match_score": 0.97}));
        let set = compare(None, &new, DiffOptions::default());
        assert!(set.initial);
        assert_eq!(set.risk_impact, 0);
        assert!(set.transitions().is_empty());
        assert_eq!(set.changes.len(), 2);
        assert!(set.changes.iter().all(|c| c.kind == ChangeKind::Added));
    }

    #[test]
    fn identical_payloads_have_no_changes() {
        let a = vies(true, "ACME");
        let b = vies(true, "ACME");
        let set = compare(Some(&a), &b, DiffOptions::default());
        assert!(set.is_empty());
        assert_eq!(set.risk_impact, 0);
        assert!(!set.initial);
    }

    #[test]
    fn vat_invalidation_scores_fifty() {
        let set = compare(Some(&vies(true, "ACME")), &vies(false, "ACME"), DiffOptions::default());
        assert_eq!(set.changes.len(), 1);
        assert_eq!(set.changes[0].path, "valid");
        assert_eq!(set.risk_impact, 50);
        assert_eq!(set.transitions(), vec![RiskTransition::VatInvalidated]);
    }

    #[test]
    fn output_is_sorted_and_deterministic() {
        let old = snapshot(
            Source::Gleif,
            json!({"status": "ISSUED", "legal_name": "A", "a": {"z": 1, "b": 2}, "a-b": 1}),
        );
        let new = snapshot(
            Source::Gleif,
            json!({"status": "LAPSED", "legal_name": "B", "a": {"z": 3, "b": 4}, "a-b": 2}),
        );
        let first = compare(Some(&old), &new, DiffOptions::default());
        let second = compare(Some(&old), &new, DiffOptions::default());
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first.changes).unwrap(),
            serde_json::to_string(&second.changes).unwrap()
        );
        let paths: Vec<_> = first.changes.iter().map(|c| c.path.as_str()).collect();
        assert_eq!(paths, vec!["a-b", "a.b", "a.z", "legal_name", "status"]);
        assert_eq!(first.risk_impact, 60);
    }

    #[test]
    fn score_jitter_within_tolerance_is_ignored() {
        let old = snapshot(Source::SanctionsOfac, json!({"matched": true, "match_score": 0.91}));
        let new = snapshot(Source::SanctionsOfac, json!({"matched": true, "match_score": 0.915}));
        assert!(compare(Some(&old), &new, DiffOptions::default()).is_empty());

        let strict = DiffOptions { float_tolerance: 0.0 };
        assert_eq!(compare(Some(&old), &new, strict).changes.len(), 1);
    }
}
