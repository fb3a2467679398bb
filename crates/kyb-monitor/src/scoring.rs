//! Risk score recomputation.
//!
//! Gathers [`RiskInputs`] from the latest snapshot per source, recent diffs
//! and job states, evaluates the policy, and persists the result on the
//! counterparty row.

use chrono::{DateTime, TimeDelta, Utc};
use kyb_core::enums::{JobState, Source};
use kyb_diff::RiskTransition;
use kyb_diff::impact::{FIELD_MATCHED, FIELD_PROCEEDING_ACTIVE, FIELD_STATUS, FIELD_VALID, LEI_ISSUED};
use kyb_registry::Identifier;
use kyb_risk::{RiskAssessment, RiskInputs};

use crate::{ARCHIVED_REASON, Monitor, MonitorError};

impl Monitor {
    /// Collect scoring inputs for one counterparty as of `now`.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::Database`] on storage failures.
    pub async fn risk_inputs(
        &self,
        counterparty_id: &str,
        now: DateTime<Utc>,
    ) -> Result<RiskInputs, MonitorError> {
        let service = self.service();
        let mut inputs = RiskInputs::default();
        let counterparty = service.get_counterparty(counterparty_id).await?;
        // VIES and GLEIF findings only count while their identifier is on record.
        let on_record = |source: Source| Identifier::for_source(&counterparty, source).is_some();

        let latest = service.latest_snapshots(counterparty_id).await?;
        inputs.has_snapshots = !latest.is_empty();
        for snapshot in latest.iter().filter(|s| on_record(s.source)) {
            let record = &snapshot.payload;
            match snapshot.source {
                source if source.is_sanctions() => {
                    if record.get_bool(FIELD_MATCHED) == Some(true) {
                        let score = record.get_f64("match_score").unwrap_or(0.0);
                        inputs.active_sanction_score = Some(
                            inputs
                                .active_sanction_score
                                .map_or(score, |best| best.max(score)),
                        );
                    }
                }
                Source::InsolvencyDe => {
                    inputs.insolvency_active |= record.get_bool(FIELD_PROCEEDING_ACTIVE) == Some(true);
                }
                Source::Vies => {
                    inputs.identifier_invalid |= record.get_bool(FIELD_VALID) == Some(false);
                }
                Source::Gleif => {
                    inputs.identifier_invalid |= record
                        .get_str(FIELD_STATUS)
                        .is_some_and(|status| status != LEI_ISSUED);
                }
                _ => {}
            }
        }

        for job in service.list_jobs_for_counterparty(counterparty_id).await? {
            let identifier_job = matches!(job.source, Source::Vies | Source::Gleif);
            if identifier_job
                && on_record(job.source)
                && job.state == JobState::Disabled
                && job.last_error.as_deref() != Some(ARCHIVED_REASON)
            {
                inputs.identifier_invalid = true;
            }
        }

        let risk = &self.config().risk;
        let horizon = risk.cooldown_days.max(risk.recent_change_window_days);
        let since = now - TimeDelta::days(i64::from(horizon) + 1);
        for diff in service.diffs_since(counterparty_id, since).await? {
            if diff.created_at > now {
                continue;
            }
            if diff.risk_impact > 0 {
                inputs.last_risk_change_at = inputs.last_risk_change_at.max(Some(diff.created_at));
            }
            let cleared = kyb_diff::transitions(diff.source, &diff.changes)
                .contains(&RiskTransition::SanctionCleared);
            if cleared && !diff.is_initial() {
                inputs.sanction_cleared_at = inputs.sanction_cleared_at.max(Some(diff.created_at));
            }
        }

        Ok(inputs)
    }

    /// Recompute and persist the risk score of a counterparty.
    ///
    /// Idempotent for a fixed `now`.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::Database`] on storage failures.
    pub async fn score(
        &self,
        counterparty_id: &str,
        now: DateTime<Utc>,
    ) -> Result<RiskAssessment, MonitorError> {
        let inputs = self.risk_inputs(counterparty_id, now).await?;
        let assessment = self.policy().evaluate(&inputs, now);
        self.service()
            .update_risk(counterparty_id, assessment.score, assessment.category, now)
            .await?;
        tracing::debug!(
            counterparty_id,
            score = assessment.score,
            category = %assessment.category,
            "risk score updated"
        );
        Ok(assessment)
    }

    /// Rescore every active counterparty of a tenant. Decaying bands move
    /// without new diffs, so this runs periodically.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::Database`] on storage failures.
    pub async fn rescore_tenant(
        &self,
        tenant_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<(String, RiskAssessment)>, MonitorError> {
        let mut out = Vec::new();
        for counterparty in self.service().list_counterparties(tenant_id, false).await? {
            let assessment = self.score(&counterparty.id, now).await?;
            out.push((counterparty.id, assessment));
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use kyb_core::entities::NewCounterparty;
    use kyb_core::enums::{JobState, RiskCategory, Source};
    use kyb_core::record::NormalizedRecord;
    use kyb_registry::AdapterRegistry;
    use kyb_risk::RiskFactor;

    use crate::test_support::{days, monitor, t0};

    fn sanctions(matched: bool, score: f64) -> NormalizedRecord {
        NormalizedRecord::new()
            .with("matched", matched)
            .with("match_score", score)
            .with("list_name", if matched { "EU" } else { "" })
    }

    async fn seeded(m: &crate::Monitor) -> String {
        let new = NewCounterparty {
            display_name: "ACME GmbH".into(),
            country_code: "DE".into(),
            ..NewCounterparty::default()
        };
        m.service().create_counterparty("t1", &new, t0()).await.unwrap().id
    }

    #[tokio::test]
    async fn no_snapshots_is_unverified() {
        let m = monitor(AdapterRegistry::new()).await;
        let id = seeded(&m).await;
        let result = m.score(&id, t0()).await.unwrap();
        assert_eq!(result.score, 10);
        let cp = m.service().get_counterparty(&id).await.unwrap();
        assert_eq!(cp.risk_score, 10);
        assert_eq!(cp.risk_category, RiskCategory::Low);
    }

    #[tokio::test]
    async fn active_match_dominates_and_score_is_idempotent() {
        let m = monitor(AdapterRegistry::new()).await;
        let id = seeded(&m).await;
        let svc = m.service();
        svc.save_snapshot(&id, Source::SanctionsOfac, &sanctions(true, 0.93), t0())
            .await
            .unwrap();
        svc.save_snapshot(
            &id,
            Source::InsolvencyDe,
            &NormalizedRecord::new().with("proceeding_active", true),
            t0(),
        )
        .await
        .unwrap();

        let first = m.score(&id, t0()).await.unwrap();
        let second = m.score(&id, t0()).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.score, 99);
        assert_eq!(first.category, RiskCategory::Critical);
        assert_eq!(first.factor, Some(RiskFactor::SanctionMatch));
    }

    #[tokio::test]
    async fn cleared_match_decays() {
        let m = monitor(AdapterRegistry::new()).await;
        let id = seeded(&m).await;
        let svc = m.service();
        let old = svc
            .save_snapshot(&id, Source::SanctionsEu, &sanctions(true, 0.9), t0())
            .await
            .unwrap();
        let new = svc
            .save_snapshot(&id, Source::SanctionsEu, &sanctions(false, 0.0), days(1))
            .await
            .unwrap();
        let set = kyb_diff::compare(Some(old.current()), new.current(), m.diff_options());
        svc.insert_diff(
            &id,
            Source::SanctionsEu,
            Some(&old.current().id),
            &new.current().id,
            &set.changes,
            set.risk_impact,
            days(1),
        )
        .await
        .unwrap();

        assert_eq!(m.score(&id, days(1)).await.unwrap().score, 89);
        assert_eq!(m.score(&id, days(31)).await.unwrap().score, 70);
        assert_eq!(m.score(&id, days(40)).await.unwrap().score, 0);
    }

    #[tokio::test]
    async fn disabled_identifier_job_counts_as_invalid() {
        let m = monitor(AdapterRegistry::new()).await;
        let new = NewCounterparty {
            display_name: "ACME GmbH".into(),
            country_code: "DE".into(),
            vat_number: Some("DE123456789".into()),
            ..NewCounterparty::default()
        };
        let id = m.service().create_counterparty("t1", &new, t0()).await.unwrap().id;
        m.service()
            .create_job(&id, Source::Vies, JobState::Disabled, Some("bad"), t0())
            .await
            .unwrap();
        let result = m.score(&id, t0()).await.unwrap();
        assert_eq!(result.score, 55);
        assert_eq!(result.factor, Some(RiskFactor::InvalidIdentifier));
    }

    #[tokio::test]
    async fn findings_without_identifier_on_record_are_ignored() {
        let m = monitor(AdapterRegistry::new()).await;
        let id = seeded(&m).await;
        let svc = m.service();
        svc.create_job(&id, Source::Gleif, JobState::Disabled, Some("identifier removed"), t0())
            .await
            .unwrap();
        svc.save_snapshot(
            &id,
            Source::Vies,
            &NormalizedRecord::new().with("valid", false),
            t0(),
        )
        .await
        .unwrap();

        let result = m.score(&id, t0()).await.unwrap();
        assert_eq!(result.score, 0);
        assert_eq!(result.category, RiskCategory::Low);
    }
}
