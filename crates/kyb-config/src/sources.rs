//! Per-registry connection and polling settings.

use std::time::Duration;

use kyb_core::enums::Source;
use serde::{Deserialize, Serialize};

const fn default_poll_interval_secs() -> u64 {
    86_400
}

const fn default_rate_limit_interval_ms() -> u64 {
    1_000
}

const fn default_timeout_secs() -> u64 {
    30
}

const fn default_enabled() -> bool {
    true
}

/// Settings for one external registry.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct SourceConfig {
    /// Base URL of the remote API.
    #[serde(default)]
    pub base_url: String,

    /// API key or credential, sent as the source requires. Empty = none.
    #[serde(default)]
    pub api_key: String,

    /// Polling interval after a successful fetch.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Minimum interval between two calls to this source, across all workers.
    #[serde(default = "default_rate_limit_interval_ms")]
    pub rate_limit_interval_ms: u64,

    /// Per-call timeout; elapsed calls count as the source being unavailable.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Disabled sources are not registered and their jobs never run.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_key: String::new(),
            poll_interval_secs: default_poll_interval_secs(),
            rate_limit_interval_ms: default_rate_limit_interval_ms(),
            timeout_secs: default_timeout_secs(),
            enabled: default_enabled(),
        }
    }
}

impl SourceConfig {
    fn with(base_url: &str, poll_interval_secs: u64, rate_limit_interval_ms: u64) -> Self {
        Self {
            base_url: base_url.to_string(),
            poll_interval_secs,
            rate_limit_interval_ms,
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    #[must_use]
    pub const fn rate_limit_interval(&self) -> Duration {
        Duration::from_millis(self.rate_limit_interval_ms)
    }

    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// API key, if one is set.
    #[must_use]
    pub fn api_key(&self) -> Option<&str> {
        (!self.api_key.is_empty()).then_some(self.api_key.as_str())
    }
}

fn default_vies() -> SourceConfig {
    SourceConfig::with(
        "https://ec.europa.eu/taxation_customs/vies/rest-api",
        86_400,
        1_000,
    )
}

fn default_gleif() -> SourceConfig {
    SourceConfig::with("https://api.gleif.org/api/v1", 86_400, 1_000)
}

fn default_opensanctions() -> SourceConfig {
    SourceConfig::with("https://api.opensanctions.org", 21_600, 500)
}

fn default_insolvency_de() -> SourceConfig {
    SourceConfig::with(
        "https://neu.insolvenzbekanntmachungen.de/api",
        86_400,
        2_000,
    )
}

/// Settings for every supported registry.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct SourcesConfig {
    #[serde(default = "default_vies")]
    pub vies: SourceConfig,
    #[serde(default = "default_gleif")]
    pub gleif: SourceConfig,
    #[serde(default = "default_opensanctions")]
    pub sanctions_eu: SourceConfig,
    #[serde(default = "default_opensanctions")]
    pub sanctions_ofac: SourceConfig,
    #[serde(default = "default_opensanctions")]
    pub sanctions_uk: SourceConfig,
    #[serde(default = "default_insolvency_de")]
    pub insolvency_de: SourceConfig,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            vies: default_vies(),
            gleif: default_gleif(),
            sanctions_eu: default_opensanctions(),
            sanctions_ofac: default_opensanctions(),
            sanctions_uk: default_opensanctions(),
            insolvency_de: default_insolvency_de(),
        }
    }
}

impl SourcesConfig {
    /// Settings for `source`.
    #[must_use]
    pub const fn get(&self, source: Source) -> &SourceConfig {
        match source {
            Source::Vies => &self.vies,
            Source::Gleif => &self.gleif,
            Source::SanctionsEu => &self.sanctions_eu,
            Source::SanctionsOfac => &self.sanctions_ofac,
            Source::SanctionsUk => &self.sanctions_uk,
            Source::InsolvencyDe => &self.insolvency_de,
        }
    }

    /// Mutable settings for `source`.
    pub const fn get_mut(&mut self, source: Source) -> &mut SourceConfig {
        match source {
            Source::Vies => &mut self.vies,
            Source::Gleif => &mut self.gleif,
            Source::SanctionsEu => &mut self.sanctions_eu,
            Source::SanctionsOfac => &mut self.sanctions_ofac,
            Source::SanctionsUk => &mut self.sanctions_uk,
            Source::InsolvencyDe => &mut self.insolvency_de,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_source_has_a_base_url() {
        let config = SourcesConfig::default();
        for source in Source::ALL {
            assert!(
                !config.get(source).base_url.is_empty(),
                "{source} should have a default base URL"
            );
            assert!(config.get(source).enabled);
            assert_eq!(config.get(source).timeout_secs, 30);
        }
    }

    #[test]
    fn sanctions_poll_more_often_than_registries() {
        let config = SourcesConfig::default();
        assert!(config.sanctions_eu.poll_interval_secs < config.vies.poll_interval_secs);
    }

    #[test]
    fn empty_api_key_is_none() {
        let mut config = SourceConfig::default();
        assert!(config.api_key().is_none());
        config.api_key = "secret".into();
        assert_eq!(config.api_key(), Some("secret"));
    }

    #[test]
    fn durations() {
        let config = SourceConfig {
            poll_interval_secs: 60,
            rate_limit_interval_ms: 250,
            timeout_secs: 5,
            ..Default::default()
        };
        assert_eq!(config.poll_interval(), Duration::from_secs(60));
        assert_eq!(config.rate_limit_interval(), Duration::from_millis(250));
        assert_eq!(config.timeout(), Duration::from_secs(5));
    }
}
