//! # kyb-monitor
//!
//! The monitoring pipeline. For one due job:
//!
//! ```text
//! claim → adapter.fetch → save_snapshot → compare → insert_diff
//!       → alerts → score → complete
//! ```
//!
//! [`Monitor`] bundles the storage service, the adapter registry and the
//! configuration. Pipeline steps are `impl Monitor` blocks grouped by concern
//! ([`alerts`], [`scoring`], [`registration`], [`runner`]). [`Scheduler`]
//! drives a pool of workers over the job table.

pub mod alerts;
pub mod clock;
pub mod registration;
pub mod runner;
pub mod scheduler;
pub mod scoring;

mod error;

pub use alerts::AlertOutcome;
pub use clock::{Clock, SystemClock};
pub use error::MonitorError;
pub use registration::Registration;
pub use runner::RunOutcome;
pub use scheduler::{Scheduler, TickReport};

use std::sync::Arc;

use kyb_config::KybConfig;
use kyb_db::KybService;
use kyb_diff::DiffOptions;
use kyb_registry::AdapterRegistry;
use kyb_risk::RiskPolicy;

/// Reason stored on jobs disabled because their counterparty was archived.
pub const ARCHIVED_REASON: &str = "counterparty archived";

/// Shared handles for every pipeline step.
pub struct Monitor {
    service: Arc<KybService>,
    adapters: AdapterRegistry,
    config: KybConfig,
    policy: RiskPolicy,
}

impl Monitor {
    #[must_use]
    pub fn new(service: Arc<KybService>, adapters: AdapterRegistry, config: KybConfig) -> Self {
        let policy = RiskPolicy::new(config.risk.clone());
        Self {
            service,
            adapters,
            config,
            policy,
        }
    }

    #[must_use]
    pub fn service(&self) -> &KybService {
        &self.service
    }

    #[must_use]
    pub const fn adapters(&self) -> &AdapterRegistry {
        &self.adapters
    }

    #[must_use]
    pub const fn config(&self) -> &KybConfig {
        &self.config
    }

    #[must_use]
    pub const fn policy(&self) -> &RiskPolicy {
        &self.policy
    }

    #[must_use]
    pub fn diff_options(&self) -> DiffOptions {
        DiffOptions::from(&self.config.diff)
    }
}

impl std::fmt::Debug for Monitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Monitor")
            .field("adapters", &self.adapters)
            .finish_non_exhaustive()
    }
}
