//! # kyb-config
//!
//! Layered configuration loading for KYB Watch using figment.
//!
//! Configuration sources (in priority order, highest wins):
//! 1. Environment variables (`KYB_*` prefix, `__` as separator)
//! 2. Project-level `.kyb/config.toml`
//! 3. User-level `~/.config/kyb/config.toml`
//! 4. Built-in defaults
//!
//! # Environment Variable Mapping
//!
//! Figment maps `KYB_DATABASE__PATH` -> `database.path`,
//! `KYB_SOURCES__VIES__TIMEOUT_SECS` -> `sources.vies.timeout_secs`, etc.
//!
//! # Usage
//!
//! ```no_run
//! use kyb_config::KybConfig;
//!
//! let config = KybConfig::load_with_dotenv().expect("config");
//! config.validate().expect("valid config");
//! println!("workers: {}", config.scheduler.workers);
//! ```

mod alerts;
mod database;
mod diff;
mod error;
mod matching;
mod risk;
mod scheduler;
mod sources;

pub use alerts::AlertsConfig;
pub use database::DatabaseConfig;
pub use diff::DiffConfig;
pub use error::ConfigError;
pub use matching::MatchingConfig;
pub use risk::RiskConfig;
pub use scheduler::SchedulerConfig;
pub use sources::{SourceConfig, SourcesConfig};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the project-local configuration directory.
pub const PROJECT_DIR: &str = ".kyb";

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct KybConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub sources: SourcesConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub risk: RiskConfig,
    #[serde(default)]
    pub diff: DiffConfig,
    #[serde(default)]
    pub matching: MatchingConfig,
    #[serde(default)]
    pub alerts: AlertsConfig,
}

impl KybConfig {
    /// Load configuration from all sources (TOML files + environment variables).
    ///
    /// Does NOT call `dotenvy`; use [`Self::load_with_dotenv`] for `.env` loading.
    pub fn load() -> Result<Self, ConfigError> {
        Self::figment().extract().map_err(ConfigError::from)
    }

    /// Load configuration reading the project file from `project_dir/config.toml`
    /// instead of `.kyb/config.toml`.
    pub fn load_from(project_dir: &Path) -> Result<Self, ConfigError> {
        Self::figment_for(project_dir)
            .extract()
            .map_err(ConfigError::from)
    }

    /// Load configuration with `.env` file support.
    pub fn load_with_dotenv() -> Result<Self, ConfigError> {
        Self::load_dotenv_from_workspace();
        Self::load()
    }

    /// Build the figment provider chain with the default project directory.
    pub fn figment() -> Figment {
        Self::figment_for(Path::new(PROJECT_DIR))
    }

    /// Build the figment provider chain.
    ///
    /// Public so tests can inspect the figment or add providers on top.
    pub fn figment_for(project_dir: &Path) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(global_path) = Self::global_config_path() {
            if global_path.exists() {
                figment = figment.merge(Toml::file(global_path));
            }
        }

        let local_path = project_dir.join("config.toml");
        if local_path.exists() {
            figment = figment.merge(Toml::file(local_path));
        }

        figment.merge(Env::prefixed("KYB_").split("__"))
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scheduler.workers == 0 {
            return Err(invalid("scheduler.workers", "must be at least 1"));
        }
        if self.scheduler.backoff_base_secs == 0 {
            return Err(invalid("scheduler.backoff_base_secs", "must be positive"));
        }
        if self.scheduler.backoff_base_secs > self.scheduler.backoff_max_secs {
            return Err(invalid(
                "scheduler.backoff_base_secs",
                "must not exceed scheduler.backoff_max_secs",
            ));
        }
        if self.scheduler.degraded_threshold == 0 {
            return Err(invalid("scheduler.degraded_threshold", "must be at least 1"));
        }
        if self.scheduler.lease_ttl_secs == 0 {
            return Err(invalid("scheduler.lease_ttl_secs", "must be positive"));
        }
        if !self.diff.float_tolerance.is_finite() || self.diff.float_tolerance < 0.0 {
            return Err(invalid("diff.float_tolerance", "must be a non-negative number"));
        }
        if !(0.0..=1.0).contains(&self.matching.name_similarity_floor) {
            return Err(invalid(
                "matching.name_similarity_floor",
                "must be between 0 and 1",
            ));
        }
        if self.risk.cleared_start < self.risk.cleared_end {
            return Err(invalid("risk.cleared_start", "must not be below risk.cleared_end"));
        }
        if self.risk.recent_change_start < self.risk.recent_change_end {
            return Err(invalid(
                "risk.recent_change_start",
                "must not be below risk.recent_change_end",
            ));
        }
        if self.risk.sanction_floor > 100 {
            return Err(invalid("risk.sanction_floor", "must be at most 100"));
        }
        for source in kyb_core::enums::Source::ALL {
            let config = self.sources.get(source);
            if config.enabled && config.base_url.is_empty() {
                return Err(invalid(
                    &format!("sources.{source}.base_url"),
                    "must be set for an enabled source",
                ));
            }
        }
        Ok(())
    }

    /// Path to the user-global config file.
    fn global_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("kyb").join("config.toml"))
    }

    /// Load `.env` from the workspace root.
    ///
    /// Walks up from `CARGO_MANIFEST_DIR` (if available) or the current dir
    /// looking for a `.env` file. Silently does nothing if none is found.
    fn load_dotenv_from_workspace() {
        if let Ok(manifest_dir) = std::env::var("CARGO_MANIFEST_DIR") {
            let mut dir = PathBuf::from(manifest_dir);
            // crate -> crates/ -> workspace root
            for _ in 0..3 {
                let env_path = dir.join(".env");
                if env_path.exists() {
                    let _ = dotenvy::from_path(&env_path);
                    return;
                }
                if !dir.pop() {
                    break;
                }
            }
        }

        let _ = dotenvy::dotenv();
    }
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = KybConfig::default();
        config.validate().unwrap();
        assert_eq!(config.database.path, "kyb.db");
        assert!(config.alerts.emit_cleared_alerts);
    }

    #[test]
    fn figment_builds_without_files() {
        let config: KybConfig = KybConfig::figment_for(Path::new("/nonexistent/kyb"))
            .extract()
            .expect("should extract defaults");
        assert_eq!(config.scheduler.workers, 4);
        assert!((config.matching.name_similarity_floor - 0.85).abs() < f64::EPSILON);
    }

    #[test]
    fn zero_workers_rejected() {
        let mut config = KybConfig::default();
        config.scheduler.workers = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("scheduler.workers"));
    }

    #[test]
    fn inverted_backoff_rejected() {
        let mut config = KybConfig::default();
        config.scheduler.backoff_base_secs = 1_000;
        config.scheduler.backoff_max_secs = 10;
        assert!(config.validate().is_err());
    }

    #[test]
    fn negative_tolerance_rejected() {
        let mut config = KybConfig::default();
        config.diff.float_tolerance = -0.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn enabled_source_needs_base_url() {
        let mut config = KybConfig::default();
        config.sources.gleif.base_url.clear();
        assert!(config.validate().is_err());
        config.sources.gleif.enabled = false;
        config.validate().unwrap();
    }
}
