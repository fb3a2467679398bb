//! Sanctions list screening against an OpenSanctions-compatible matching API.
//!
//! One adapter instance per list (EU, OFAC, UK). Record keys: `matched`,
//! `match_score`, `list_name`, `matched_name`, `entry_id`.

use std::time::Duration;

use async_trait::async_trait;
use kyb_config::SourceConfig;
use kyb_core::enums::Source;
use kyb_core::record::NormalizedRecord;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::error::AdapterError;
use crate::http::{check_response, read_json};
use crate::identifier::Identifier;
use crate::names::{best_similarity, round2};
use crate::RegistryAdapter;

const QUERY_KEY: &str = "q";

#[derive(Debug, Deserialize)]
struct MatchResponse {
    responses: std::collections::HashMap<String, QueryResponse>,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    results: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    id: String,
    caption: String,
    score: f64,
    #[serde(rename = "match")]
    is_match: bool,
    #[serde(default)]
    properties: CandidateProperties,
}

#[derive(Debug, Default, Deserialize)]
struct CandidateProperties {
    #[serde(default)]
    name: Vec<String>,
    #[serde(default)]
    alias: Vec<String>,
}

impl Candidate {
    fn names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.caption.as_str())
            .chain(self.properties.name.iter().map(String::as_str))
            .chain(self.properties.alias.iter().map(String::as_str))
    }
}

pub struct SanctionsAdapter {
    http: reqwest::Client,
    source: Source,
    base_url: String,
    api_key: Option<String>,
    similarity_floor: f64,
    min_interval: Duration,
    timeout: Duration,
}

impl SanctionsAdapter {
    /// `similarity_floor` is the minimum local name similarity a remote match
    /// needs to count.
    #[must_use]
    pub fn new(
        http: reqwest::Client,
        source: Source,
        config: &SourceConfig,
        similarity_floor: f64,
    ) -> Self {
        Self {
            http,
            source,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key().map(String::from),
            similarity_floor,
            min_interval: config.rate_limit_interval(),
            timeout: config.timeout(),
        }
    }

    fn list_name(&self) -> &'static str {
        self.source.list_label().unwrap_or("")
    }
}

/// Dataset screened for each sanctions source.
#[must_use]
pub const fn dataset(source: Source) -> Option<&'static str> {
    match source {
        Source::SanctionsEu => Some("eu_fsf"),
        Source::SanctionsOfac => Some("us_ofac_sdn"),
        Source::SanctionsUk => Some("gb_hmt_sanctions"),
        Source::Vies | Source::Gleif | Source::InsolvencyDe => None,
    }
}

#[async_trait]
impl RegistryAdapter for SanctionsAdapter {
    fn source(&self) -> Source {
        self.source
    }

    fn min_interval(&self) -> Duration {
        self.min_interval
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn validate(&self, identifier: &Identifier) -> Result<(), AdapterError> {
        name_country(identifier).map(|_| ())
    }

    async fn fetch(&self, identifier: &Identifier) -> Result<NormalizedRecord, AdapterError> {
        let (name, country) = name_country(identifier)?;
        let dataset = dataset(self.source).ok_or_else(|| {
            AdapterError::SourceFormat(format!("{} is not a sanctions list", self.source))
        })?;

        let url = format!("{}/match/{dataset}", self.base_url);
        let body = json!({
            "queries": {
                QUERY_KEY: {
                    "schema": "LegalEntity",
                    "properties": {
                        "name": [name],
                        "country": [country.to_lowercase()],
                    }
                }
            }
        });
        tracing::debug!(%url, source = %self.source, "screening name");

        let mut request = self.http.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.header(reqwest::header::AUTHORIZATION, format!("ApiKey {key}"));
        }
        let resp = check_response(request.send().await?).await?;
        let data: MatchResponse = read_json(resp).await?;
        normalize(name, data, self.list_name(), self.similarity_floor)
    }
}

fn name_country(identifier: &Identifier) -> Result<(&str, &str), AdapterError> {
    match identifier {
        Identifier::NameCountry { name, country } => {
            identifier.validate()?;
            Ok((name, country))
        }
        other => Err(AdapterError::InvalidIdentifier(format!(
            "sanctions screening expects a name and country, got {other}"
        ))),
    }
}

fn normalize(
    name: &str,
    data: MatchResponse,
    list_name: &str,
    similarity_floor: f64,
) -> Result<NormalizedRecord, AdapterError> {
    let mut responses = data.responses;
    let query = responses.remove(QUERY_KEY).ok_or_else(|| {
        AdapterError::SourceFormat("match response lacks the submitted query".to_string())
    })?;

    let best = query
        .results
        .into_iter()
        .filter(|c| c.is_match)
        .filter(|c| {
            let similarity = best_similarity(name, c.names());
            if similarity < similarity_floor {
                tracing::debug!(candidate = %c.caption, similarity, "suppressed dissimilar match");
            }
            similarity >= similarity_floor
        })
        .max_by(|a, b| a.score.total_cmp(&b.score));

    let record = NormalizedRecord::new().with("list_name", list_name);
    Ok(match best {
        Some(candidate) => record
            .with("matched", true)
            .with("match_score", round2(candidate.score))
            .with("matched_name", candidate.caption)
            .with("entry_id", candidate.id),
        None => record
            .with("matched", false)
            .with("match_score", Value::Null)
            .with("matched_name", Value::Null)
            .with("entry_id", Value::Null),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const FIXTURE: &str = r#"{
        "responses": {
            "q": {
                "status": 200,
                "results": [
                    {
                        "id": "eu-fsf-1234",
                        "caption": "ACME Trading GmbH",
                        "schema": "Company",
                        "properties": {"name": ["ACME Trading GmbH"], "alias": ["ACME Trade"]},
                        "datasets": ["eu_fsf"],
                        "score": 0.9351,
                        "match": true
                    },
                    {
                        "id": "eu-fsf-9999",
                        "caption": "Nordwind Shipping Ltd",
                        "schema": "Company",
                        "properties": {"name": ["Nordwind Shipping Ltd"]},
                        "datasets": ["eu_fsf"],
                        "score": 0.97,
                        "match": true
                    },
                    {
                        "id": "eu-fsf-5678",
                        "caption": "ACME Trading GmbH & Co",
                        "properties": {},
                        "score": 0.6,
                        "match": false
                    }
                ],
                "total": {"value": 3, "relation": "eq"}
            }
        }
    }"#;

    fn parse(name: &str, body: &str) -> Result<NormalizedRecord, AdapterError> {
        let data: MatchResponse = serde_json::from_str(body).unwrap();
        normalize(name, data, "EU", 0.85)
    }

    #[test]
    fn picks_remote_match_that_survives_name_filter() {
        let record = parse("ACME Trading GmbH", FIXTURE).unwrap();
        assert_eq!(
            record.to_value(),
            serde_json::json!({
                "matched": true,
                "match_score": 0.94,
                "list_name": "EU",
                "matched_name": "ACME Trading GmbH",
                "entry_id": "eu-fsf-1234",
            })
        );
    }

    #[test]
    fn dissimilar_remote_match_is_suppressed() {
        let record = parse("Blue Harbour Logistics", FIXTURE).unwrap();
        assert_eq!(record.get_bool("matched"), Some(false));
        assert_eq!(record.get("match_score"), Some(&Value::Null));
        assert_eq!(record.get_str("list_name"), Some("EU"));
    }

    #[test]
    fn empty_results_mean_no_match() {
        let record = parse("ACME", r#"{"responses": {"q": {"results": []}}}"#).unwrap();
        assert_eq!(record.get_bool("matched"), Some(false));
    }

    #[test]
    fn missing_query_is_format_error() {
        let err = parse("ACME", r#"{"responses": {}}"#).unwrap_err();
        assert!(matches!(err, AdapterError::SourceFormat(_)));
    }

    #[test]
    fn datasets_per_list() {
        assert_eq!(dataset(Source::SanctionsEu), Some("eu_fsf"));
        assert_eq!(dataset(Source::SanctionsOfac), Some("us_ofac_sdn"));
        assert_eq!(dataset(Source::SanctionsUk), Some("gb_hmt_sanctions"));
        assert_eq!(dataset(Source::Vies), None);
    }

    #[tokio::test]
    #[ignore] // requires network and an API key in KYB_SOURCES__SANCTIONS_EU__API_KEY
    async fn live_screening() {
        let config = kyb_config::KybConfig::load_with_dotenv().unwrap();
        let adapter = SanctionsAdapter::new(
            reqwest::Client::new(),
            Source::SanctionsEu,
            &config.sources.sanctions_eu,
            config.matching.name_similarity_floor,
        );
        let record = adapter
            .fetch(&Identifier::NameCountry {
                name: "Rosneft".into(),
                country: "RU".into(),
            })
            .await;
        println!("{record:?}");
    }
}
