//! # kyb-registry
//!
//! Registry adapters for KYB Watch. Each adapter turns one identifier into a
//! [`NormalizedRecord`] for one source:
//! - VIES (EU VAT validation)
//! - GLEIF (LEI registration status)
//! - EU / OFAC / UK sanctions lists (OpenSanctions-compatible matching API)
//! - German insolvency publications
//!
//! Adapters validate identifiers offline before any network call and report
//! failures as [`AdapterError`]. They declare their minimum call interval but
//! never throttle themselves; the scheduler enforces it.

pub mod gleif;
pub mod identifier;
pub mod insolvency;
pub mod names;
pub mod sanctions;
pub mod vies;

mod error;
mod http;

pub use error::AdapterError;
pub use http::build_client;
pub use identifier::Identifier;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use kyb_config::{MatchingConfig, SourcesConfig};
use kyb_core::enums::Source;
use kyb_core::record::NormalizedRecord;

// ── Adapter ────────────────────────────────────────────────────────

/// A client for one external registry.
#[async_trait]
pub trait RegistryAdapter: Send + Sync {
    fn source(&self) -> Source;

    /// Minimum interval between two calls to this source, across all workers.
    fn min_interval(&self) -> Duration;

    /// Upper bound for a single [`fetch`](Self::fetch).
    fn timeout(&self) -> Duration;

    /// Offline identifier check.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::InvalidIdentifier`] when the identifier is
    /// malformed or of the wrong kind for this source.
    fn validate(&self, identifier: &Identifier) -> Result<(), AdapterError>;

    /// Query the registry. Validates first and fails fast without network I/O.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError`] for invalid identifiers, transport failures,
    /// rate limiting, or malformed responses.
    async fn fetch(&self, identifier: &Identifier) -> Result<NormalizedRecord, AdapterError>;
}

// ── Registry ───────────────────────────────────────────────────────

/// Source-keyed set of adapters.
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    adapters: HashMap<Source, Arc<dyn RegistryAdapter>>,
}

impl AdapterRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build adapters for every enabled source. Sources sharing a timeout
    /// share one HTTP client.
    ///
    /// # Errors
    ///
    /// Returns the `reqwest` error if an HTTP client cannot be built.
    pub fn from_config(
        sources: &SourcesConfig,
        matching: &MatchingConfig,
    ) -> Result<Self, reqwest::Error> {
        let mut clients: HashMap<Duration, reqwest::Client> = HashMap::new();
        let mut registry = Self::new();
        let floor = matching.name_similarity_floor;

        for source in Source::ALL {
            let config = sources.get(source);
            if !config.enabled {
                tracing::info!(%source, "source disabled in configuration");
                continue;
            }
            let http = match clients.get(&config.timeout()) {
                Some(client) => client.clone(),
                None => {
                    let client = build_client(config.timeout())?;
                    clients.insert(config.timeout(), client.clone());
                    client
                }
            };

            let adapter: Arc<dyn RegistryAdapter> = match source {
                Source::Vies => Arc::new(vies::ViesAdapter::new(http, config)),
                Source::Gleif => Arc::new(gleif::GleifAdapter::new(http, config)),
                Source::SanctionsEu | Source::SanctionsOfac | Source::SanctionsUk => Arc::new(
                    sanctions::SanctionsAdapter::new(http, source, config, floor),
                ),
                Source::InsolvencyDe => {
                    Arc::new(insolvency::InsolvencyDeAdapter::new(http, config, floor))
                }
            };
            registry.insert(adapter);
        }
        Ok(registry)
    }

    /// Register or replace the adapter for its source.
    pub fn insert(&mut self, adapter: Arc<dyn RegistryAdapter>) {
        self.adapters.insert(adapter.source(), adapter);
    }

    #[must_use]
    pub fn get(&self, source: Source) -> Option<Arc<dyn RegistryAdapter>> {
        self.adapters.get(&source).cloned()
    }

    #[must_use]
    pub fn contains(&self, source: Source) -> bool {
        self.adapters.contains_key(&source)
    }

    /// Registered sources in declaration order.
    #[must_use]
    pub fn sources(&self) -> Vec<Source> {
        let mut sources: Vec<Source> = self.adapters.keys().copied().collect();
        sources.sort();
        sources
    }
}

impl std::fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterRegistry")
            .field("sources", &self.sources())
            .finish()
    }
}
