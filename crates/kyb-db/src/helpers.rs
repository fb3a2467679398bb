//! Row-to-entity parsing helpers.
//!
//! Every repo converts `libsql::Row` (column-indexed) into typed entity
//! structs. These helpers isolate the parsing logic and the single timestamp
//! format all tables use.

use chrono::{DateTime, SecondsFormat, Utc};

use crate::error::DatabaseError;

/// Encode a timestamp as fixed-width RFC 3339 with microseconds and `Z`.
///
/// Fixed width keeps text ordering chronological in SQL comparisons.
#[must_use]
pub fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a required TEXT column as `DateTime<Utc>`.
///
/// # Errors
///
/// Returns `DatabaseError::Query` if the string is not RFC 3339.
pub fn parse_datetime(s: &str) -> Result<DateTime<Utc>, DatabaseError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DatabaseError::Query(format!("Failed to parse datetime '{s}': {e}")))
}

/// Parse an optional TEXT column as `Option<DateTime<Utc>>`.
///
/// # Errors
///
/// Returns `DatabaseError::Query` if a non-empty string cannot be parsed.
pub fn parse_optional_datetime(s: Option<&str>) -> Result<Option<DateTime<Utc>>, DatabaseError> {
    match s {
        Some(s) if !s.is_empty() => Ok(Some(parse_datetime(s)?)),
        _ => Ok(None),
    }
}

/// Parse a TEXT column into a serde-deserializable enum.
///
/// Works with all kyb-core enums that use `#[serde(rename_all = "snake_case")]`.
///
/// # Errors
///
/// Returns `DatabaseError::Query` if the string does not match any enum variant.
pub fn parse_enum<T: serde::de::DeserializeOwned>(s: &str) -> Result<T, DatabaseError> {
    serde_json::from_value(serde_json::Value::String(s.to_string()))
        .map_err(|e| DatabaseError::Query(format!("Failed to parse enum from '{s}': {e}")))
}

/// Read a nullable TEXT column. Returns `None` for both SQL NULL and empty string.
///
/// `row.get::<String>(idx)` on a NULL column returns an error, not `""`.
///
/// # Errors
///
/// Returns `DatabaseError` if the column read fails.
pub fn get_opt_string(row: &libsql::Row, idx: i32) -> Result<Option<String>, DatabaseError> {
    match row.get::<Option<String>>(idx)? {
        Some(s) if s.is_empty() => Ok(None),
        other => Ok(other),
    }
}

/// Read a nullable TEXT timestamp column.
///
/// # Errors
///
/// Returns `DatabaseError` if the read or parse fails.
pub fn get_opt_datetime(
    row: &libsql::Row,
    idx: i32,
) -> Result<Option<DateTime<Utc>>, DatabaseError> {
    parse_optional_datetime(get_opt_string(row, idx)?.as_deref())
}

/// Read a required TEXT timestamp column.
///
/// # Errors
///
/// Returns `DatabaseError` if the read or parse fails.
pub fn get_datetime(row: &libsql::Row, idx: i32) -> Result<DateTime<Utc>, DatabaseError> {
    parse_datetime(&row.get::<String>(idx)?)
}

/// Read an INTEGER column stored as 0/1.
///
/// # Errors
///
/// Returns `DatabaseError` if the column read fails.
pub fn get_bool(row: &libsql::Row, idx: i32) -> Result<bool, DatabaseError> {
    Ok(row.get::<i64>(idx)? != 0)
}

/// Read a non-negative INTEGER column into any narrower unsigned type.
///
/// # Errors
///
/// Returns `DatabaseError::InvalidState` for negative or out-of-range values.
pub fn get_unsigned<T: TryFrom<i64>>(row: &libsql::Row, idx: i32) -> Result<T, DatabaseError> {
    let raw = row.get::<i64>(idx)?;
    T::try_from(raw)
        .map_err(|_| DatabaseError::InvalidState(format!("column {idx} out of range: {raw}")))
}

/// Clamp an unsigned count into an SQL INTEGER.
#[must_use]
pub fn to_sql_int(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kyb_core::enums::JobState;

    #[test]
    fn format_is_fixed_width_and_sortable() {
        let early: DateTime<Utc> = "2026-01-01T00:00:00Z".parse().unwrap();
        let later: DateTime<Utc> = "2026-01-01T00:00:00.5Z".parse().unwrap();
        let a = format_datetime(&early);
        let b = format_datetime(&later);
        assert_eq!(a, "2026-01-01T00:00:00.000000Z");
        assert_eq!(a.len(), b.len());
        assert!(a < b);
    }

    #[test]
    fn roundtrip_datetime() {
        let now = Utc::now();
        let parsed = parse_datetime(&format_datetime(&now)).unwrap();
        assert_eq!(parsed.timestamp_micros(), now.timestamp_micros());
    }

    #[test]
    fn parse_garbage_datetime_fails() {
        assert!(parse_datetime("yesterday").is_err());
        assert_eq!(parse_optional_datetime(Some("")).unwrap(), None);
        assert_eq!(parse_optional_datetime(None).unwrap(), None);
    }

    #[test]
    fn parse_enum_snake_case() {
        let state: JobState = parse_enum("degraded").unwrap();
        assert_eq!(state, JobState::Degraded);
        assert!(parse_enum::<JobState>("sleeping").is_err());
    }
}
