//! # kyb-risk
//!
//! Pure scoring policy. Callers gather [`RiskInputs`] from storage; the
//! policy evaluates each band independently and the highest one wins. Bands
//! are never summed.
//!
//! Decaying bands use whole elapsed days, so a score is stable for a fixed
//! `now` and within a day.

use chrono::{DateTime, Utc};
use kyb_config::RiskConfig;
use kyb_core::enums::RiskCategory;
use serde::{Deserialize, Serialize};

/// Facts about one counterparty at evaluation time.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RiskInputs {
    /// At least one snapshot exists from any source.
    pub has_snapshots: bool,
    /// Highest `match_score` among sanctions lists currently reporting a match.
    pub active_sanction_score: Option<f64>,
    pub insolvency_active: bool,
    /// Most recent time a sanctions match went away.
    pub sanction_cleared_at: Option<DateTime<Utc>>,
    /// VAT invalid, LEI not issued, or an identifier job disabled.
    pub identifier_invalid: bool,
    /// Most recent diff with positive risk impact.
    pub last_risk_change_at: Option<DateTime<Utc>>,
}

/// Band that determined a score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskFactor {
    SanctionMatch,
    Insolvency,
    SanctionCleared,
    InvalidIdentifier,
    RecentChange,
    Unverified,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub score: u8,
    pub category: RiskCategory,
    /// `None` when no band applies (score 0).
    pub factor: Option<RiskFactor>,
}

#[derive(Debug, Clone, Default)]
pub struct RiskPolicy {
    config: RiskConfig,
}

impl RiskPolicy {
    #[must_use]
    pub const fn new(config: RiskConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub const fn config(&self) -> &RiskConfig {
        &self.config
    }

    #[must_use]
    pub fn evaluate(&self, inputs: &RiskInputs, now: DateTime<Utc>) -> RiskAssessment {
        let c = &self.config;
        let candidates = [
            inputs
                .active_sanction_score
                .map(|s| (self.sanction_score(s), RiskFactor::SanctionMatch)),
            inputs
                .insolvency_active
                .then_some((c.insolvency, RiskFactor::Insolvency)),
            inputs.sanction_cleared_at.and_then(|at| {
                decay(c.cleared_start, c.cleared_end, c.cooldown_days, at, now)
                    .map(|s| (s, RiskFactor::SanctionCleared))
            }),
            inputs
                .identifier_invalid
                .then_some((c.invalid_identifier, RiskFactor::InvalidIdentifier)),
            inputs.last_risk_change_at.and_then(|at| {
                decay(
                    c.recent_change_start,
                    c.recent_change_end,
                    c.recent_change_window_days,
                    at,
                    now,
                )
                .map(|s| (s, RiskFactor::RecentChange))
            }),
            (!inputs.has_snapshots).then_some((c.unverified, RiskFactor::Unverified)),
        ];

        // First maximum wins ties, so order above is precedence.
        let best = candidates
            .into_iter()
            .flatten()
            .fold(None::<(u8, RiskFactor)>, |best, cand| match best {
                Some(b) if b.0 >= cand.0 => Some(b),
                _ => Some(cand),
            });

        let score = best.map_or(0, |(s, _)| s).min(100);
        RiskAssessment {
            score,
            category: RiskCategory::from_score(score),
            factor: best.map(|(_, f)| f),
        }
    }

    /// `floor + round(10 × match_score)`, clamped to `[floor, 100]`.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn sanction_score(&self, match_score: f64) -> u8 {
        let floor = self.config.sanction_floor.min(100);
        let ratio = if match_score.is_finite() {
            match_score.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let bonus = (ratio * 10.0).round() as u8;
        floor.saturating_add(bonus).clamp(floor, 100)
    }
}

/// Linear decay from `start` to `end` over `window_days` whole days since
/// `since`. `None` once the window has passed.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn decay(start: u8, end: u8, window_days: u32, since: DateTime<Utc>, now: DateTime<Utc>) -> Option<u8> {
    let elapsed = (now - since).num_days().max(0);
    let window = i64::from(window_days);
    if elapsed > window {
        return None;
    }
    if window == 0 {
        return Some(start);
    }
    let span = i64::from(start) - i64::from(end);
    // Round half away from zero in integer arithmetic.
    let drop = (2 * span * elapsed + window) / (2 * window);
    Some((i64::from(start) - drop).clamp(0, 100) as u8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn now() -> DateTime<Utc> {
        "2026-06-01T09:00:00Z".parse().unwrap()
    }

    fn days_ago(days: i64) -> DateTime<Utc> {
        now() - TimeDelta::days(days)
    }

    fn verified() -> RiskInputs {
        RiskInputs {
            has_snapshots: true,
            ..RiskInputs::default()
        }
    }

    fn eval(inputs: &RiskInputs) -> RiskAssessment {
        RiskPolicy::default().evaluate(inputs, now())
    }

    #[test]
    fn clean_counterparty_scores_zero() {
        let result = eval(&verified());
        assert_eq!(
            result,
            RiskAssessment {
                score: 0,
                category: RiskCategory::Low,
                factor: None
            }
        );
    }

    #[test]
    fn unverified_scores_ten() {
        let result = eval(&RiskInputs::default());
        assert_eq!(result.score, 10);
        assert_eq!(result.factor, Some(RiskFactor::Unverified));
    }

    #[rstest]
    #[case(0.0, 90)]
    #[case(0.84, 98)]
    #[case(0.97, 100)]
    #[case(1.0, 100)]
    #[case(7.5, 100)]
    #[case(f64::NAN, 90)]
    fn sanction_band(#[case] match_score: f64, #[case] expected: u8) {
        let inputs = RiskInputs {
            active_sanction_score: Some(match_score),
            ..verified()
        };
        let result = eval(&inputs);
        assert_eq!(result.score, expected);
        assert_eq!(result.category, RiskCategory::Critical);
    }

    #[test]
    fn sanctions_dominate_every_lower_finding() {
        let inputs = RiskInputs {
            has_snapshots: false,
            active_sanction_score: Some(0.5),
            insolvency_active: true,
            sanction_cleared_at: Some(days_ago(1)),
            identifier_invalid: true,
            last_risk_change_at: Some(days_ago(0)),
        };
        let result = eval(&inputs);
        assert!((90..=100).contains(&result.score));
        assert_eq!(result.factor, Some(RiskFactor::SanctionMatch));
    }

    #[test]
    fn insolvency_is_high() {
        let inputs = RiskInputs {
            insolvency_active: true,
            identifier_invalid: true,
            ..verified()
        };
        let result = eval(&inputs);
        assert_eq!(result.score, 80);
        assert_eq!(result.category, RiskCategory::High);
    }

    #[rstest]
    #[case(0, Some(89))]
    #[case(15, Some(79))]
    #[case(30, Some(70))]
    #[case(31, None)]
    fn cleared_sanction_decays(#[case] days: i64, #[case] expected: Option<u8>) {
        let inputs = RiskInputs {
            sanction_cleared_at: Some(days_ago(days)),
            ..verified()
        };
        let result = eval(&inputs);
        match expected {
            Some(score) => {
                assert_eq!(result.score, score);
                assert_eq!(result.factor, Some(RiskFactor::SanctionCleared));
            }
            None => assert_eq!(result.score, 0),
        }
    }

    #[rstest]
    #[case(0, 39)]
    #[case(45, 29)]
    #[case(90, 20)]
    #[case(91, 0)]
    fn recent_change_decays(#[case] days: i64, #[case] expected: u8) {
        let inputs = RiskInputs {
            last_risk_change_at: Some(days_ago(days)),
            ..verified()
        };
        assert_eq!(eval(&inputs).score, expected);
    }

    #[test]
    fn invalid_identifier_is_medium() {
        let inputs = RiskInputs {
            identifier_invalid: true,
            last_risk_change_at: Some(days_ago(0)),
            ..verified()
        };
        let result = eval(&inputs);
        assert_eq!(result.score, 55);
        assert_eq!(result.category, RiskCategory::Medium);
    }

    #[test]
    fn evaluation_is_idempotent_within_a_day() {
        let inputs = RiskInputs {
            sanction_cleared_at: Some(days_ago(10)),
            ..verified()
        };
        let policy = RiskPolicy::default();
        let first = policy.evaluate(&inputs, now());
        let again = policy.evaluate(&inputs, now());
        let later = policy.evaluate(&inputs, now() + TimeDelta::hours(3));
        assert_eq!(first, again);
        assert_eq!(first, later);
    }

    #[test]
    fn future_timestamps_count_as_day_zero() {
        let inputs = RiskInputs {
            sanction_cleared_at: Some(now() + TimeDelta::days(2)),
            ..verified()
        };
        assert_eq!(eval(&inputs).score, 89);
    }
}
