//! Sources, status enums, alert taxonomy, and change kinds for KYB Watch.
//!
//! All enums use `snake_case` serialization via `#[serde(rename_all = "snake_case")]`.
//! Status enums with state machines provide `allowed_next_states()` to enforce
//! valid transitions at the application layer.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Source
// ---------------------------------------------------------------------------

/// External registry a counterparty is monitored through.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Vies,
    Gleif,
    SanctionsEu,
    SanctionsOfac,
    SanctionsUk,
    InsolvencyDe,
}

impl Source {
    pub const ALL: [Self; 6] = [
        Self::Vies,
        Self::Gleif,
        Self::SanctionsEu,
        Self::SanctionsOfac,
        Self::SanctionsUk,
        Self::InsolvencyDe,
    ];

    /// Sources monitored for every counterparty, keyed by name + country.
    pub const ALWAYS_MONITORED: [Self; 4] = [
        Self::SanctionsEu,
        Self::SanctionsOfac,
        Self::SanctionsUk,
        Self::InsolvencyDe,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Vies => "vies",
            Self::Gleif => "gleif",
            Self::SanctionsEu => "sanctions_eu",
            Self::SanctionsOfac => "sanctions_ofac",
            Self::SanctionsUk => "sanctions_uk",
            Self::InsolvencyDe => "insolvency_de",
        }
    }

    /// Whether this source is one of the sanctions lists.
    #[must_use]
    pub const fn is_sanctions(self) -> bool {
        matches!(
            self,
            Self::SanctionsEu | Self::SanctionsOfac | Self::SanctionsUk
        )
    }

    /// Short list label stored in sanctions records (`EU`, `OFAC`, `UK`).
    #[must_use]
    pub const fn list_label(self) -> Option<&'static str> {
        match self {
            Self::SanctionsEu => Some("EU"),
            Self::SanctionsOfac => Some("OFAC"),
            Self::SanctionsUk => Some("UK"),
            Self::Vies | Self::Gleif | Self::InsolvencyDe => None,
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// CounterpartyStatus
// ---------------------------------------------------------------------------

/// Lifecycle status of a counterparty. Archival is a soft delete.
///
/// ```text
/// active → archived
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum CounterpartyStatus {
    Active,
    Archived,
}

impl CounterpartyStatus {
    #[must_use]
    pub const fn allowed_next_states(self) -> &'static [Self] {
        match self {
            Self::Active => &[Self::Archived],
            Self::Archived => &[],
        }
    }

    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        self.allowed_next_states().contains(&next)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Archived => "archived",
        }
    }
}

impl fmt::Display for CounterpartyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// RiskCategory
// ---------------------------------------------------------------------------

/// Qualitative risk category derived from a 0–100 score.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum RiskCategory {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskCategory {
    /// Map a score onto its band: 90+ critical, 70+ high, 40+ medium, else low.
    #[must_use]
    pub const fn from_score(score: u8) -> Self {
        match score {
            90..=u8::MAX => Self::Critical,
            70..=89 => Self::High,
            40..=69 => Self::Medium,
            _ => Self::Low,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for RiskCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Severity
// ---------------------------------------------------------------------------

/// Alert severity.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Severity implied by a positive risk impact.
    #[must_use]
    pub const fn from_impact(impact: i64) -> Self {
        if impact >= 90 {
            Self::Critical
        } else if impact >= 70 {
            Self::High
        } else if impact >= 40 {
            Self::Medium
        } else {
            Self::Low
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// AlertType
// ---------------------------------------------------------------------------

/// Tenant-visible alert types, mirroring the risk drivers.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    NewSanctionMatch,
    SanctionCleared,
    InsolvencyFiled,
    VatInvalid,
    LeiLapsed,
    ProfileChange,
    /// A monitoring job was disabled because the stored identifier is malformed.
    IdentifierInvalid,
}

impl AlertType {
    pub const ALL: [Self; 7] = [
        Self::NewSanctionMatch,
        Self::SanctionCleared,
        Self::InsolvencyFiled,
        Self::VatInvalid,
        Self::LeiLapsed,
        Self::ProfileChange,
        Self::IdentifierInvalid,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NewSanctionMatch => "new_sanction_match",
            Self::SanctionCleared => "sanction_cleared",
            Self::InsolvencyFiled => "insolvency_filed",
            Self::VatInvalid => "vat_invalid",
            Self::LeiLapsed => "lei_lapsed",
            Self::ProfileChange => "profile_change",
            Self::IdentifierInvalid => "identifier_invalid",
        }
    }
}

impl fmt::Display for AlertType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// JobState
// ---------------------------------------------------------------------------

/// Scheduling state of a monitoring job.
///
/// ```text
/// pending  → running → pending   (success)
/// backoff  →         → backoff   (retryable failure)
/// degraded →         → degraded  (failure threshold reached)
///                    → disabled  (invalid identifier, archived counterparty)
///                    → prior     (rate-limit release)
/// disabled → pending             (identifier corrected)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Pending,
    Running,
    Backoff,
    Disabled,
    Degraded,
}

impl JobState {
    /// States a worker may claim a job from.
    pub const CLAIMABLE: [Self; 3] = [Self::Pending, Self::Backoff, Self::Degraded];

    #[must_use]
    #[allow(clippy::match_same_arms)]
    pub const fn allowed_next_states(self) -> &'static [Self] {
        match self {
            Self::Pending | Self::Backoff | Self::Degraded => &[Self::Running, Self::Disabled],
            Self::Running => &[
                Self::Pending,
                Self::Backoff,
                Self::Degraded,
                Self::Disabled,
            ],
            Self::Disabled => &[Self::Pending],
        }
    }

    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        self.allowed_next_states().contains(&next)
    }

    #[must_use]
    pub fn is_claimable(self) -> bool {
        Self::CLAIMABLE.contains(&self)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Backoff => "backoff",
            Self::Disabled => "disabled",
            Self::Degraded => "degraded",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ChangeKind
// ---------------------------------------------------------------------------

/// Kind of a field-level change between two snapshots.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Added,
    Removed,
    Modified,
}

impl ChangeKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Added => "added",
            Self::Removed => "removed",
            Self::Modified => "modified",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(100, RiskCategory::Critical)]
    #[case(90, RiskCategory::Critical)]
    #[case(89, RiskCategory::High)]
    #[case(70, RiskCategory::High)]
    #[case(69, RiskCategory::Medium)]
    #[case(40, RiskCategory::Medium)]
    #[case(39, RiskCategory::Low)]
    #[case(0, RiskCategory::Low)]
    fn risk_category_bands(#[case] score: u8, #[case] expected: RiskCategory) {
        assert_eq!(RiskCategory::from_score(score), expected);
    }

    #[test]
    fn severity_from_impact() {
        assert_eq!(Severity::from_impact(100), Severity::Critical);
        assert_eq!(Severity::from_impact(80), Severity::High);
        assert_eq!(Severity::from_impact(50), Severity::Medium);
        assert_eq!(Severity::from_impact(10), Severity::Low);
    }

    #[test]
    fn source_as_str_matches_serde() {
        for source in Source::ALL {
            let json = serde_json::to_string(&source).unwrap();
            assert_eq!(json, format!("\"{}\"", source.as_str()));
        }
    }

    #[test]
    fn alert_type_as_str_matches_serde() {
        for alert_type in AlertType::ALL {
            let json = serde_json::to_string(&alert_type).unwrap();
            assert_eq!(json, format!("\"{}\"", alert_type.as_str()));
        }
    }

    #[test]
    fn sanctions_sources_have_labels() {
        for source in Source::ALL {
            assert_eq!(source.is_sanctions(), source.list_label().is_some());
        }
    }

    #[test]
    fn job_state_machine() {
        assert!(JobState::Pending.can_transition_to(JobState::Running));
        assert!(JobState::Backoff.can_transition_to(JobState::Running));
        assert!(JobState::Degraded.can_transition_to(JobState::Running));
        assert!(JobState::Running.can_transition_to(JobState::Degraded));
        assert!(JobState::Disabled.can_transition_to(JobState::Pending));
        assert!(!JobState::Disabled.can_transition_to(JobState::Running));
        assert!(!JobState::Running.can_transition_to(JobState::Running));
    }

    #[test]
    fn only_waiting_states_are_claimable() {
        assert!(JobState::Pending.is_claimable());
        assert!(JobState::Backoff.is_claimable());
        assert!(JobState::Degraded.is_claimable());
        assert!(!JobState::Running.is_claimable());
        assert!(!JobState::Disabled.is_claimable());
    }

    #[test]
    fn archived_is_terminal() {
        assert!(CounterpartyStatus::Active.can_transition_to(CounterpartyStatus::Archived));
        assert!(CounterpartyStatus::Archived.allowed_next_states().is_empty());
    }
}
