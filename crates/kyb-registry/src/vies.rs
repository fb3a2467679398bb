//! VIES (EU VAT Information Exchange System) adapter.
//!
//! Record keys: `valid`, `name`, `address`, `country_code`, `vat_number`.

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

/// Placeholder VIES returns for undisclosed names and addresses.
const PLACEHOLDER: &str = "---";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ViesResponse {
    is_valid: Option<bool>,
    user_error: Option<String>,
    name: Option<String>,
    address: Option<String>,
    #[serde(default)]
    error_wrappers: Vec<ErrorWrapper>,
}

#[derive(Debug, Deserialize)]
struct ErrorWrapper {
    error: String,
}

pub struct ViesAdapter {
    http: reqwest::Client,
    base_url: String,
    min_interval: Duration,
    timeout: Duration,
}

impl ViesAdapter {
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
impl RegistryAdapter for ViesAdapter {
    fn source(&self) -> Source {
        Source::Vies
    }

    fn min_interval(&self) -> Duration {
        self.min_interval
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn validate(&self, identifier: &Identifier) -> Result<(), AdapterError> {
        vat_parts(identifier).map(|_| ())
    }

    async fn fetch(&self, identifier: &Identifier) -> Result<NormalizedRecord, AdapterError> {
        let (country, number) = vat_parts(identifier)?;

        let url = format!(
            "{}/ms/{}/vat/{}",
            self.base_url,
            urlencoding::encode(country),
            urlencoding::encode(number)
        );
        tracing::debug!(%url, "querying VIES");
        let resp = self.http.get(&url).send().await?;

        // VIES reports INVALID_INPUT and friends as 400 with a JSON body.
        let data: ViesResponse = if resp.status() == reqwest::StatusCode::BAD_REQUEST {
            read_json(resp).await?
        } else {
            read_json(check_response(resp).await?).await?
        };
        normalize(country, number, data)
    }
}

/// The validated prefix and national part of a VAT identifier.
fn vat_parts(identifier: &Identifier) -> Result<(&str, &str), AdapterError> {
    match identifier {
        Identifier::Vat { country, number } => {
            identifier.validate()?;
            Ok((country, number))
        }
        other => Err(AdapterError::InvalidIdentifier(format!(
            "VIES expects a VAT number, got {other}"
        ))),
    }
}

fn normalize(country: &str, number: &str, data: ViesResponse) -> Result<NormalizedRecord, AdapterError> {
    let code = data
        .user_error
        .as_deref()
        .or_else(|| data.error_wrappers.first().map(|w| w.error.as_str()));

    match code {
        Some("INVALID_INPUT") => {
            return Err(AdapterError::InvalidIdentifier(format!(
                "VIES rejected {country}{number} as malformed"
            )));
        }
        Some(c @ ("MS_UNAVAILABLE" | "TIMEOUT" | "SERVICE_UNAVAILABLE")) => {
            return Err(AdapterError::SourceUnavailable(format!("VIES: {c}")));
        }
        Some(c) if c.ends_with("MAX_CONCURRENT_REQ") => {
            return Err(AdapterError::SourceUnavailable(format!("VIES: {c}")));
        }
        Some("VALID" | "INVALID") | None => {}
        Some(other) if data.is_valid.is_none() => {
            return Err(AdapterError::SourceFormat(format!(
                "VIES returned unknown status {other}"
            )));
        }
        Some(_) => {}
    }

    let valid = data
        .is_valid
        .ok_or_else(|| AdapterError::SourceFormat("VIES response lacks isValid".to_string()))?;

    Ok(NormalizedRecord::new()
        .with("valid", valid)
        .with("name", disclosed(data.name))
        .with("address", disclosed(data.address))
        .with("country_code", country)
        .with("vat_number", format!("{country}{number}")))
}

/// Trimmed text, or null for blanks and the `---` placeholder.
fn disclosed(text: Option<String>) -> Value {
    match text.as_deref().map(str::trim) {
        Some(t) if !t.is_empty() && t != PLACEHOLDER => Value::String(t.to_string()),
        _ => Value::Null,
    }
}
