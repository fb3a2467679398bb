//! Alert generation from persisted diffs.
//!
//! Each risk transition in a diff maps to raising or resolving one alert
//! type. Raising goes through the storage upsert, so an open alert of the
//! same type is refreshed instead of duplicated.

use chrono::{DateTime, Utc};
use kyb_core::entities::{Alert, Counterparty, Diff};
use kyb_core::enums::{AlertType, Severity, Source};
use kyb_core::record::NormalizedRecord;
use kyb_diff::RiskTransition;
use kyb_diff::impact::FIELD_MATCHED;
use serde::Serialize;

use crate::{Monitor, MonitorError};

/// Alerts touched while processing one diff.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AlertOutcome {
    /// Created or refreshed alerts.
    pub raised: Vec<Alert>,
    pub resolved: Vec<Alert>,
}

impl AlertOutcome {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.raised.is_empty() && self.resolved.is_empty()
    }

    /// The most severe raised alert.
    #[must_use]
    pub fn most_severe(&self) -> Option<&Alert> {
        self.raised.iter().max_by_key(|a| a.severity)
    }
}

fn text(record: &NormalizedRecord, key: &str) -> Option<String> {
    record
        .get_str(key)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn sanction_list(record: &NormalizedRecord, source: Source) -> String {
    text(record, "list_name")
        .or_else(|| source.list_label().map(str::to_string))
        .unwrap_or_else(|| source.to_string())
}

impl Monitor {
    /// Process a diff and return the most severe alert it raised or refreshed.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::Database`] on storage failures.
    pub async fn process(
        &self,
        diff: &Diff,
        now: DateTime<Utc>,
    ) -> Result<Option<Alert>, MonitorError> {
        let outcome = self.process_all(diff, now).await?;
        Ok(outcome.most_severe().cloned())
    }

    /// Process a diff, raising and resolving alerts for each risk transition.
    ///
    /// Initial diffs never alert.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::Database`] on storage failures.
    pub async fn process_all(
        &self,
        diff: &Diff,
        now: DateTime<Utc>,
    ) -> Result<AlertOutcome, MonitorError> {
        let mut outcome = AlertOutcome::default();
        if diff.is_initial() {
            return Ok(outcome);
        }
        let transitions = kyb_diff::transitions(diff.source, &diff.changes);
        if transitions.is_empty() {
            return Ok(outcome);
        }

        let service = self.service();
        let counterparty = service.get_counterparty(&diff.counterparty_id).await?;
        let record = service.get_snapshot(&diff.new_snapshot_id).await?.payload;
        let mut profile_fields = Vec::new();
        let mut profile_impact = 0;

        // Thresholds and severity follow the impact each transition carries,
        // so opposite findings in one diff do not cancel out.
        for transition in transitions {
            let impact = transition.impact();
            let severity = Severity::from_impact(impact);
            match transition {
                RiskTransition::SanctionMatched => {
                    let message = format!(
                        "Possible sanctions match on {} list: {} (score {:.2})",
                        sanction_list(&record, diff.source),
                        text(&record, "matched_name")
                            .unwrap_or_else(|| counterparty.display_name.clone()),
                        record.get_f64("match_score").unwrap_or(0.0),
                    );
                    self.raise(
                        &mut outcome,
                        &counterparty,
                        diff,
                        impact,
                        AlertType::NewSanctionMatch,
                        severity,
                        &message,
                        now,
                    )
                    .await?;
                }
                RiskTransition::SanctionCleared => {
                    if !self.still_sanctioned(&counterparty.id, diff.source).await? {
                        self.resolve(
                            &mut outcome,
                            &counterparty.id,
                            AlertType::NewSanctionMatch,
                            now,
                        )
                        .await?;
                    }
                    if self.config().alerts.emit_cleared_alerts {
                        let message = format!(
                            "Sanctions match on {} list no longer reported",
                            diff.source.list_label().unwrap_or(diff.source.as_str())
                        );
                        self.raise_cleared(&mut outcome, &counterparty, diff, impact, &message, now)
                            .await?;
                    }
                }
                RiskTransition::InsolvencyFiled => {
                    let message = format!(
                        "Insolvency proceeding published: {} at {}, case {}",
                        text(&record, "proceeding_type").unwrap_or_else(|| "proceeding".into()),
                        text(&record, "court").unwrap_or_else(|| "unknown court".into()),
                        text(&record, "case_number").unwrap_or_else(|| "n/a".into()),
                    );
                    self.raise(
                        &mut outcome,
                        &counterparty,
                        diff,
                        impact,
                        AlertType::InsolvencyFiled,
                        severity,
                        &message,
                        now,
                    )
                    .await?;
                }
                RiskTransition::InsolvencyClosed => {
                    self.resolve(&mut outcome, &counterparty.id, AlertType::InsolvencyFiled, now)
                        .await?;
                }
                RiskTransition::VatInvalidated => {
                    let message = format!(
                        "VAT number {} reported invalid by VIES",
                        counterparty.vat_number.as_deref().unwrap_or("(none)")
                    );
                    self.raise(
                        &mut outcome,
                        &counterparty,
                        diff,
                        impact,
                        AlertType::VatInvalid,
                        severity,
                        &message,
                        now,
                    )
                    .await?;
                }
                RiskTransition::VatRevalidated => {
                    self.resolve(&mut outcome, &counterparty.id, AlertType::VatInvalid, now)
                        .await?;
                    self.resolve(&mut outcome, &counterparty.id, AlertType::IdentifierInvalid, now)
                        .await?;
                }
                RiskTransition::LeiLapsed { status } => {
                    let message = format!(
                        "LEI {} registration status changed to {status}",
                        counterparty.lei_code.as_deref().unwrap_or("(none)")
                    );
                    self.raise(
                        &mut outcome,
                        &counterparty,
                        diff,
                        impact,
                        AlertType::LeiLapsed,
                        severity,
                        &message,
                        now,
                    )
                    .await?;
                }
                RiskTransition::LeiReinstated => {
                    self.resolve(&mut outcome, &counterparty.id, AlertType::LeiLapsed, now)
                        .await?;
                }
                RiskTransition::ProfileChanged { field } => {
                    profile_impact += impact;
                    profile_fields.push(field);
                }
            }
        }

        if !profile_fields.is_empty() {
            let details: Vec<String> = profile_fields
                .iter()
                .map(|field| match text(&record, field) {
                    Some(value) => format!("{field} is now '{value}'"),
                    None => format!("{field} changed"),
                })
                .collect();
            let message = format!(
                "Registry profile changed ({}): {}",
                diff.source,
                details.join(", ")
            );
            self.raise(
                &mut outcome,
                &counterparty,
                diff,
                profile_impact,
                AlertType::ProfileChange,
                Severity::Low,
                &message,
                now,
            )
            .await?;
        }

        Ok(outcome)
    }

    /// Raise the tenant-facing alert for a job disabled by a malformed
    /// identifier.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::Database`] on storage failures.
    pub async fn raise_identifier_alert(
        &self,
        counterparty: &Counterparty,
        source: Source,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<Alert, MonitorError> {
        let what = match source {
            Source::Vies => "VAT number",
            Source::Gleif => "LEI",
            _ => "Name or country",
        };
        let message = format!("{what} format invalid, please correct ({reason})");
        let alert = self
            .service()
            .upsert_alert(
                &counterparty.tenant_id,
                &counterparty.id,
                AlertType::IdentifierInvalid,
                Severity::Medium,
                &message,
                None,
                now,
            )
            .await?
            .into_alert();
        Ok(alert)
    }

    #[allow(clippy::too_many_arguments)]
    async fn raise(
        &self,
        outcome: &mut AlertOutcome,
        counterparty: &Counterparty,
        diff: &Diff,
        impact: i64,
        alert_type: AlertType,
        severity: Severity,
        message: &str,
        now: DateTime<Utc>,
    ) -> Result<(), MonitorError> {
        let threshold = self.config().alerts.threshold_for(alert_type);
        if impact <= threshold {
            tracing::debug!(
                counterparty_id = %counterparty.id,
                %alert_type,
                impact,
                threshold,
                "below significance threshold"
            );
            return Ok(());
        }
        self.upsert(outcome, counterparty, diff, alert_type, severity, message, now)
            .await
    }

    /// Cleared alerts accompany negative impact, so the threshold applies to
    /// its magnitude.
    async fn raise_cleared(
        &self,
        outcome: &mut AlertOutcome,
        counterparty: &Counterparty,
        diff: &Diff,
        impact: i64,
        message: &str,
        now: DateTime<Utc>,
    ) -> Result<(), MonitorError> {
        let threshold = self.config().alerts.threshold_for(AlertType::SanctionCleared);
        if impact.abs() <= threshold {
            return Ok(());
        }
        self.upsert(
            outcome,
            counterparty,
            diff,
            AlertType::SanctionCleared,
            Severity::Low,
            message,
            now,
        )
        .await
    }

    #[allow(clippy::too_many_arguments)]
    async fn upsert(
        &self,
        outcome: &mut AlertOutcome,
        counterparty: &Counterparty,
        diff: &Diff,
        alert_type: AlertType,
        severity: Severity,
        message: &str,
        now: DateTime<Utc>,
    ) -> Result<(), MonitorError> {
        let alert = self
            .service()
            .upsert_alert(
                &counterparty.tenant_id,
                &counterparty.id,
                alert_type,
                severity,
                message,
                Some(&diff.id),
                now,
            )
            .await?
            .into_alert();
        outcome.raised.push(alert);
        Ok(())
    }

    async fn resolve(
        &self,
        outcome: &mut AlertOutcome,
        counterparty_id: &str,
        alert_type: AlertType,
        now: DateTime<Utc>,
    ) -> Result<(), MonitorError> {
        if let Some(alert) = self
            .service()
            .resolve_open_alert(counterparty_id, alert_type, now)
            .await?
        {
            outcome.resolved.push(alert);
        }
        Ok(())
    }

    /// Whether a sanctions list other than `except` still reports a match.
    async fn still_sanctioned(
        &self,
        counterparty_id: &str,
        except: Source,
    ) -> Result<bool, MonitorError> {
        for source in Source::ALL {
            if !source.is_sanctions() || source == except {
                continue;
            }
            if let Some(snapshot) = self.service().latest_snapshot(counterparty_id, source).await? {
                if snapshot.payload.get_bool(FIELD_MATCHED) == Some(true) {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }
}
