//! German insolvency publication feed adapter.
//!
//! Record keys: `proceeding_active`, `case_number`, `court`,
//! `proceeding_type`, `published_at`. Only open proceedings of a debtor whose
//! name passes the local similarity floor are reported.

use std::time::Duration;

use async_trait::async_trait;
use kyb_config::SourceConfig;
use kyb_core::enums::Source;
use kyb_core::record::NormalizedRecord;
use serde::Deserialize;
use serde_json::Value;

use crate::error::AdapterError;
use crate::http::{check_response, read_json};
use crate::identifier::Identifier;
use crate::names::name_similarity;
use crate::RegistryAdapter;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    results: Vec<Publication>,
}

#[derive(Debug, Deserialize)]
struct Publication {
    debtor_name: String,
    case_number: String,
    court: Option<String>,
    proceeding_type: Option<String>,
    published_at: Option<String>,
    #[serde(default)]
    active: bool,
}

pub struct InsolvencyDeAdapter {
    http: reqwest::Client,
    base_url: String,
    similarity_floor: f64,
    min_interval: Duration,
    timeout: Duration,
}

impl InsolvencyDeAdapter {
    #[must_use]
    pub fn new(http: reqwest::Client, config: &SourceConfig, similarity_floor: f64) -> Self {
        Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            similarity_floor,
            min_interval: config.rate_limit_interval(),
            timeout: config.timeout(),
        }
    }
}

#[async_trait]
impl RegistryAdapter for InsolvencyDeAdapter {
    fn source(&self) -> Source {
        Source::InsolvencyDe
    }

    fn min_interval(&self) -> Duration {
        self.min_interval
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn validate(&self, identifier: &Identifier) -> Result<(), AdapterError> {
        match identifier {
            Identifier::NameCountry { .. } => identifier.validate(),
            other => Err(AdapterError::InvalidIdentifier(format!(
                "insolvency search expects a name and country, got {other}"
            ))),
        }
    }

    async fn fetch(&self, identifier: &Identifier) -> Result<NormalizedRecord, AdapterError> {
        self.validate(identifier)?;
        let Identifier::NameCountry { name, country } = identifier else {
            return Err(AdapterError::InvalidIdentifier(identifier.to_string()));
        };

        let url = format!(
            "{}/search?name={}&country={}",
            self.base_url,
            urlencoding::encode(name),
            urlencoding::encode(country)
        );
        tracing::debug!(%url, "searching insolvency publications");
        let resp = check_response(self.http.get(&url).send().await?).await?;
        let data: SearchResponse = read_json(resp).await?;
        Ok(normalize(name, data, self.similarity_floor))
    }
}

fn normalize(name: &str, data: SearchResponse, similarity_floor: f64) -> NormalizedRecord {
    let latest = data
        .results
        .into_iter()
        .filter(|p| p.active)
        .filter(|p| name_similarity(name, &p.debtor_name) >= similarity_floor)
        .max_by(|a, b| a.published_at.cmp(&b.published_at));

    match latest {
        Some(p) => NormalizedRecord::new()
            .with("proceeding_active", true)
            .with("case_number", p.case_number)
            .with("court", p.court.map_or(Value::Null, Value::String))
            .with("proceeding_type", p.proceeding_type.map_or(Value::Null, Value::String))
            .with("published_at", p.published_at.map_or(Value::Null, Value::String)),
        None => NormalizedRecord::new()
            .with("proceeding_active", false)
            .with("case_number", Value::Null)
            .with("court", Value::Null)
            .with("proceeding_type", Value::Null)
            .with("published_at", Value::Null),
    }
}
