//! Counterparty lifecycle: registration, identifier correction, renaming,
//! archival. Each keeps the job table in step with the counterparty row.

use chrono::{DateTime, Utc};
use kyb_core::entities::{Alert, Counterparty, MonitoringJob, NewCounterparty};
use kyb_core::enums::{AlertType, JobState, Source};
use kyb_registry::Identifier;
use kyb_registry::identifier::{normalize_lei, normalize_vat};
use serde::Serialize;

use crate::{ARCHIVED_REASON, Monitor, MonitorError};

/// Counterparty plus the jobs and corrective alerts created for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Registration {
    pub counterparty: Counterparty,
    pub jobs: Vec<MonitoringJob>,
    pub alerts: Vec<Alert>,
}

fn clean(value: Option<&str>, normalize: fn(&str) -> String) -> Option<String> {
    value.map(normalize).filter(|v| !v.is_empty())
}

fn validate_profile(display_name: &str, country_code: &str) -> Result<(), MonitorError> {
    if display_name.trim().is_empty() {
        return Err(MonitorError::InvalidInput("display name is required".into()));
    }
    let country = country_code.trim();
    if country.len() != 2 || !country.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(MonitorError::InvalidInput(format!(
            "country code must be two letters, got '{country_code}'"
        )));
    }
    Ok(())
}

impl Monitor {
    /// Sources a counterparty is monitored through, limited to configured
    /// adapters.
    fn monitored_sources(&self, counterparty: &Counterparty) -> Vec<Source> {
        let mut sources = Vec::new();
        if counterparty.vat_number.is_some() {
            sources.push(Source::Vies);
        }
        if counterparty.lei_code.is_some() {
            sources.push(Source::Gleif);
        }
        sources.extend(Source::ALWAYS_MONITORED);
        sources.retain(|source| {
            let configured = self.adapters().contains(*source);
            if !configured {
                tracing::debug!(%source, "no adapter configured, not monitoring");
            }
            configured
        });
        sources
    }

    /// Create a counterparty and its monitoring jobs.
    ///
    /// A job whose identifier already fails validation is created
    /// `disabled` with a corrective alert and never reaches the registry.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::InvalidInput`] for a blank name or malformed
    /// country, and [`MonitorError::Database`] (`Duplicate`) when the tenant
    /// already monitors the VAT number or LEI.
    pub async fn register_counterparty(
        &self,
        tenant_id: &str,
        new: &NewCounterparty,
        now: DateTime<Utc>,
    ) -> Result<Registration, MonitorError> {
        validate_profile(&new.display_name, &new.country_code)?;
        let normalized = NewCounterparty {
            display_name: new.display_name.trim().to_string(),
            country_code: new.country_code.trim().to_uppercase(),
            vat_number: clean(new.vat_number.as_deref(), normalize_vat),
            lei_code: clean(new.lei_code.as_deref(), normalize_lei),
        };

        let counterparty = self
            .service()
            .create_counterparty(tenant_id, &normalized, now)
            .await?;
        tracing::info!(counterparty_id = %counterparty.id, tenant_id, "counterparty registered");

        let mut jobs = Vec::new();
        let mut alerts = Vec::new();
        for source in self.monitored_sources(&counterparty) {
            let (job, alert) = self.create_job_for(&counterparty, source, now).await?;
            jobs.push(job);
            alerts.extend(alert);
        }
        self.score(&counterparty.id, now).await?;

        Ok(Registration {
            counterparty: self.service().get_counterparty(&counterparty.id).await?,
            jobs,
            alerts,
        })
    }

    async fn create_job_for(
        &self,
        counterparty: &Counterparty,
        source: Source,
        now: DateTime<Utc>,
    ) -> Result<(MonitoringJob, Option<Alert>), MonitorError> {
        let invalid = Identifier::for_source(counterparty, source)
            .map(|identifier| identifier.validate())
            .and_then(Result::err);

        match invalid {
            None => {
                let job = self
                    .service()
                    .create_job(&counterparty.id, source, JobState::Pending, None, now)
                    .await?;
                Ok((job, None))
            }
            Some(err) => {
                let reason = err.to_string();
                let job = self
                    .service()
                    .create_job(&counterparty.id, source, JobState::Disabled, Some(&reason), now)
                    .await?;
                tracing::warn!(counterparty_id = %counterparty.id, %source, %reason, "identifier rejected");
                let alert = self
                    .raise_identifier_alert(counterparty, source, &reason, now)
                    .await?;
                Ok((job, Some(alert)))
            }
        }
    }

    /// Replace the VAT number and LEI of a counterparty.
    ///
    /// Disabled identifier jobs are re-enabled when the new value validates,
    /// missing jobs are created, and jobs whose identifier was removed are
    /// disabled. The corrective alert is resolved once every identifier
    /// validates.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::Archived`] for archived counterparties and
    /// [`MonitorError::Database`] on storage failures or duplicates.
    pub async fn correct_identifiers(
        &self,
        counterparty_id: &str,
        vat_number: Option<&str>,
        lei_code: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Registration, MonitorError> {
        let service = self.service();
        let current = service.get_counterparty(counterparty_id).await?;
        if current.is_archived() {
            return Err(MonitorError::Archived(counterparty_id.to_string()));
        }

        let vat = clean(vat_number, normalize_vat);
        let lei = clean(lei_code, normalize_lei);
        let counterparty = service
            .set_identifiers(counterparty_id, vat.as_deref(), lei.as_deref(), now)
            .await?;

        let mut alerts = Vec::new();
        let mut all_valid = true;
        for source in [Source::Vies, Source::Gleif] {
            if !self.adapters().contains(source) {
                continue;
            }
            let existing = service.find_job(counterparty_id, source).await?;
            let Some(identifier) = Identifier::for_source(&counterparty, source) else {
                if let Some(job) = existing {
                    service
                        .force_disable_job(&job.id, "identifier removed", now)
                        .await?;
                }
                continue;
            };

            match (identifier.validate(), existing) {
                (Ok(()), Some(job)) => {
                    if job.state == JobState::Disabled {
                        service.reenable_job(&job.id, now).await?;
                    } else {
                        service.make_jobs_due(counterparty_id, &[source], now).await?;
                    }
                }
                (Ok(()), None) => {
                    service
                        .create_job(counterparty_id, source, JobState::Pending, None, now)
                        .await?;
                }
                (Err(err), existing) => {
                    all_valid = false;
                    let reason = err.to_string();
                    match existing {
                        Some(job) => {
                            service.force_disable_job(&job.id, &reason, now).await?;
                        }
                        None => {
                            service
                                .create_job(counterparty_id, source, JobState::Disabled, Some(&reason), now)
                                .await?;
                        }
                    }
                    alerts.push(
                        self.raise_identifier_alert(&counterparty, source, &reason, now)
                            .await?,
                    );
                }
            }
        }

        if all_valid {
            service
                .resolve_open_alert(counterparty_id, AlertType::IdentifierInvalid, now)
                .await?;
        }
        tracing::info!(counterparty_id, all_valid, "identifiers corrected");
        self.score(counterparty_id, now).await?;

        Ok(Registration {
            counterparty: service.get_counterparty(counterparty_id).await?,
            jobs: service.list_jobs_for_counterparty(counterparty_id).await?,
            alerts,
        })
    }

    /// Change the display name and re-screen name-keyed sources now.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::InvalidInput`] for a blank name,
    /// [`MonitorError::Archived`] for archived counterparties.
    pub async fn rename_counterparty(
        &self,
        counterparty_id: &str,
        display_name: &str,
        now: DateTime<Utc>,
    ) -> Result<Counterparty, MonitorError> {
        let current = self.service().get_counterparty(counterparty_id).await?;
        if current.is_archived() {
            return Err(MonitorError::Archived(counterparty_id.to_string()));
        }
        validate_profile(display_name, &current.country_code)?;
        let renamed = self
            .service()
            .rename_counterparty(counterparty_id, display_name.trim(), now)
            .await?;
        self.service()
            .make_jobs_due(counterparty_id, &Source::ALWAYS_MONITORED, now)
            .await?;
        Ok(renamed)
    }

    /// Archive a counterparty and stop all its jobs. In-flight runs discard
    /// their results. Returns `false` when already archived.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::Database`] on storage failures.
    pub async fn archive_counterparty(
        &self,
        counterparty_id: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, MonitorError> {
        let service = self.service();
        if !service.archive_counterparty(counterparty_id, now).await? {
            return Ok(false);
        }
        let disabled = service
            .disable_jobs_for_counterparty(counterparty_id, ARCHIVED_REASON, now)
            .await?;
        tracing::info!(counterparty_id, jobs = disabled, "counterparty archived");
        Ok(true)
    }
}
