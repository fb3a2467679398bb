//! Registry identifiers and their offline validation.

use std::fmt;

use kyb_core::entities::Counterparty;
use kyb_core::enums::Source;

use crate::error::AdapterError;

/// VIES member-state prefixes: EU-27 (Greece as `EL`) plus Northern Ireland.
const VIES_PREFIXES: [&str; 28] = [
    "AT", "BE", "BG", "CY", "CZ", "DE", "DK", "EE", "EL", "ES", "FI", "FR", "HR", "HU", "IE",
    "IT", "LT", "LU", "LV", "MT", "NL", "PL", "PT", "RO", "SE", "SI", "SK", "XI",
];

/// What a registry is queried by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identifier {
    /// VAT number split into its member-state prefix and national part.
    Vat { country: String, number: String },
    /// Legal Entity Identifier.
    Lei(String),
    /// Name plus ISO country, for list screening.
    NameCountry { name: String, country: String },
}

impl Identifier {
    /// Build a VAT identifier from a raw string such as `"de 123.456.789"`.
    #[must_use]
    pub fn vat(raw: &str) -> Self {
        let normalized = normalize_vat(raw);
        let split = normalized
            .char_indices()
            .nth(2)
            .map_or(normalized.len(), |(i, _)| i);
        let (country, number) = normalized.split_at(split);
        Self::Vat {
            country: country.to_string(),
            number: number.to_string(),
        }
    }

    #[must_use]
    pub fn lei(raw: &str) -> Self {
        Self::Lei(normalize_lei(raw))
    }

    /// The identifier `source` is queried with, or `None` when the
    /// counterparty has no such identifier.
    #[must_use]
    pub fn for_source(counterparty: &Counterparty, source: Source) -> Option<Self> {
        match source {
            Source::Vies => counterparty.vat_number.as_deref().map(Self::vat),
            Source::Gleif => counterparty.lei_code.as_deref().map(Self::lei),
            Source::SanctionsEu
            | Source::SanctionsOfac
            | Source::SanctionsUk
            | Source::InsolvencyDe => Some(Self::NameCountry {
                name: counterparty.display_name.trim().to_string(),
                country: counterparty.country_code.trim().to_uppercase(),
            }),
        }
    }

    /// Offline format check. No network I/O.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::InvalidIdentifier`] describing the first problem.
    pub fn validate(&self) -> Result<(), AdapterError> {
        match self {
            Self::Vat { country, number } => validate_vat(country, number),
            Self::Lei(code) => validate_lei(code),
            Self::NameCountry { name, country } => validate_name_country(name, country),
        }
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Vat { country, number } => write!(f, "VAT {country}{number}"),
            Self::Lei(code) => write!(f, "LEI {code}"),
            Self::NameCountry { name, country } => write!(f, "{name} ({country})"),
        }
    }
}

/// Upper-case and drop spaces and dots.
#[must_use]
pub fn normalize_vat(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace() && *c != '.')
        .flat_map(char::to_uppercase)
        .collect()
}

#[must_use]
pub fn normalize_lei(raw: &str) -> String {
    raw.trim().to_uppercase()
}

fn validate_vat(country: &str, number: &str) -> Result<(), AdapterError> {
    if !VIES_PREFIXES.contains(&country) {
        return Err(AdapterError::InvalidIdentifier(format!(
            "VAT number format invalid: unknown member-state prefix '{country}'"
        )));
    }
    let len = number.chars().count();
    if !(2..=12).contains(&len) {
        return Err(AdapterError::InvalidIdentifier(format!(
            "VAT number format invalid: national part must be 2-12 characters, got {len}"
        )));
    }
    if let Some(bad) = number
        .chars()
        .find(|c| !(c.is_ascii_uppercase() || c.is_ascii_digit() || *c == '+' || *c == '*'))
    {
        return Err(AdapterError::InvalidIdentifier(format!(
            "VAT number format invalid: unexpected character '{bad}'"
        )));
    }
    Ok(())
}

fn validate_lei(code: &str) -> Result<(), AdapterError> {
    if code.len() != 20 || !code.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()) {
        return Err(AdapterError::InvalidIdentifier(
            "LEI format invalid: expected 20 upper-case alphanumeric characters".to_string(),
        ));
    }
    if lei_checksum(code) != 1 {
        return Err(AdapterError::InvalidIdentifier(
            "LEI format invalid: check digits do not match".to_string(),
        ));
    }
    Ok(())
}

/// ISO 7064 MOD 97-10 remainder, letters expanded to 10..=35.
fn lei_checksum(code: &str) -> u32 {
    code.chars().fold(0_u32, |acc, c| {
        let value = c.to_digit(36).unwrap_or(0);
        if value >= 10 {
            (acc * 100 + value) % 97
        } else {
            (acc * 10 + value) % 97
        }
    })
}

fn validate_name_country(name: &str, country: &str) -> Result<(), AdapterError> {
    if name.trim().is_empty() {
        return Err(AdapterError::InvalidIdentifier(
            "counterparty name is blank".to_string(),
        ));
    }
    if country.len() != 2 || !country.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(AdapterError::InvalidIdentifier(format!(
            "country code '{country}' is not ISO 3166 alpha-2"
        )));
    }
    Ok(())
}
