//! GLEIF LEI registry adapter.
//!
//! Record keys: `status`, `legal_name`, `entity_category`, `entity_status`,
//! `country`, `next_renewal_date`. An unknown LEI yields `status: NOT_FOUND`.

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
use crate::RegistryAdapter;

/// Registration status of a live LEI.
pub const STATUS_ISSUED: &str = "ISSUED";
/// Synthetic status for an LEI GLEIF does not know.
pub const STATUS_NOT_FOUND: &str = "NOT_FOUND";

#[derive(Debug, Deserialize)]
struct LeiRecordResponse {
    data: LeiRecord,
}

#[derive(Debug, Deserialize)]
struct LeiRecord {
    attributes: LeiAttributes,
}

#[derive(Debug, Deserialize)]
struct LeiAttributes {
    entity: Entity,
    registration: Registration,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Entity {
    legal_name: Option<LocalizedName>,
    category: Option<String>,
    status: Option<String>,
    legal_address: Option<Address>,
}

#[derive(Debug, Deserialize)]
struct LocalizedName {
    name: String,
}

#[derive(Debug, Deserialize)]
struct Address {
    country: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Registration {
    status: Option<String>,
    next_renewal_date: Option<String>,
}

pub struct GleifAdapter {
    http: reqwest::Client,
    base_url: String,
    min_interval: Duration,
    timeout: Duration,
}

impl GleifAdapter {
    #[must_use]
    pub fn new(http: reqwest::Client, config: &SourceConfig) -> Self {
        Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            min_interval: config.rate_limit_interval(),
            timeout: config.timeout(),
        }
    }
}

#[async_trait]
impl RegistryAdapter for GleifAdapter {
    fn source(&self) -> Source {
        Source::Gleif
    }

    fn min_interval(&self) -> Duration {
        self.min_interval
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn validate(&self, identifier: &Identifier) -> Result<(), AdapterError> {
        lei_code(identifier).map(|_| ())
    }

    async fn fetch(&self, identifier: &Identifier) -> Result<NormalizedRecord, AdapterError> {
        let lei = lei_code(identifier)?;
        let url = format!("{}/lei-records/{}", self.base_url, urlencoding::encode(lei));
        tracing::debug!(%url, "querying GLEIF");

        let resp = self
            .http
            .get(&url)
            .header(reqwest::header::ACCEPT, "application/vnd.api+json")
            .send()
            .await?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(not_found());
        }
        let data: LeiRecordResponse = read_json(check_response(resp).await?).await?;
        normalize(data)
    }
}

fn lei_code(identifier: &Identifier) -> Result<&str, AdapterError> {
    match identifier {
        Identifier::Lei(code) => {
            identifier.validate()?;
            Ok(code)
        }
        other => Err(AdapterError::InvalidIdentifier(format!(
            "GLEIF expects an LEI, got {other}"
        ))),
    }
}

fn normalize(data: LeiRecordResponse) -> Result<NormalizedRecord, AdapterError> {
    let LeiAttributes {
        entity,
        registration,
    } = data.data.attributes;

    let status = registration.status.ok_or_else(|| {
        AdapterError::SourceFormat("GLEIF record lacks registration.status".to_string())
    })?;

    Ok(NormalizedRecord::new()
        .with("status", status)
        .with("legal_name", opt(entity.legal_name.map(|n| n.name)))
        .with("entity_category", opt(entity.category))
        .with("entity_status", opt(entity.status))
        .with("country", opt(entity.legal_address.and_then(|a| a.country)))
        .with("next_renewal_date", opt(registration.next_renewal_date)))
}

fn not_found() -> NormalizedRecord {
    NormalizedRecord::new()
        .with("status", STATUS_NOT_FOUND)
        .with("legal_name", Value::Null)
        .with("entity_category", Value::Null)
        .with("entity_status", Value::Null)
        .with("country", Value::Null)
        .with("next_renewal_date", Value::Null)
}

fn opt(value: Option<String>) -> Value {
    value.map_or(Value::Null, Value::String)
}
