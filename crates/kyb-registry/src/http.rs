//! Shared HTTP helpers for registry adapters.
//!
//! Centralizes status-code checks (429 rate limiting with `Retry-After`
//! parsing, 5xx → [`AdapterError::SourceUnavailable`], other non-success →
//! [`AdapterError::SourceFormat`]) so adapter modules stay focused on request
//! construction and response mapping.

use std::time::Duration;

use serde::de::DeserializeOwned;

use crate::error::AdapterError;

/// Fallback when a 429 carries no usable `Retry-After`.
const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

/// Build the HTTP client shared by adapters with the same timeout.
///
/// # Errors
///
/// Returns the `reqwest` error if the TLS backend cannot be initialised.
pub fn build_client(timeout: Duration) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .user_agent(concat!("kyb-watch/", env!("CARGO_PKG_VERSION")))
        .timeout(timeout)
        .build()
}

/// Check an HTTP response for common error conditions.
///
/// Returns the response unchanged on success.
pub async fn check_response(resp: reqwest::Response) -> Result<reqwest::Response, AdapterError> {
    let status = resp.status();
    if status == 429 {
        return Err(AdapterError::RateLimited {
            retry_after_secs: parse_retry_after(&resp),
        });
    }
    if status.is_server_error() {
        return Err(AdapterError::SourceUnavailable(format!(
            "HTTP {}: {}",
            status.as_u16(),
            resp.text().await.unwrap_or_default()
        )));
    }
    if !status.is_success() {
        return Err(AdapterError::SourceFormat(format!(
            "unexpected HTTP {}: {}",
            status.as_u16(),
            resp.text().await.unwrap_or_default()
        )));
    }
    Ok(resp)
}

/// Read the body and decode it as JSON, reporting decode failures as
/// [`AdapterError::SourceFormat`].
pub async fn read_json<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, AdapterError> {
    let body = resp.text().await?;
    Ok(serde_json::from_str(&body)?)
}

/// Parse the `Retry-After` header as seconds, falling back to 60 s.
fn parse_retry_after(resp: &reqwest::Response) -> u64 {
    resp.headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(DEFAULT_RETRY_AFTER_SECS)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mock_response(status: u16, body: &'static str) -> reqwest::Response {
        reqwest::Response::from(
            ::http::Response::builder()
                .status(status)
                .body(body)
                .unwrap(),
        )
    }

    fn mock_response_with_retry_after(value: &str) -> reqwest::Response {
        reqwest::Response::from(
            ::http::Response::builder()
                .status(429)
                .header("Retry-After", value)
                .body("")
                .unwrap(),
        )
    }

    #[test]
    fn parse_retry_after_from_header() {
        let resp = mock_response_with_retry_after("120");
        assert_eq!(parse_retry_after(&resp), 120);
    }

    #[test]
    fn parse_retry_after_missing_or_garbage() {
        assert_eq!(parse_retry_after(&mock_response(429, "")), 60);
        assert_eq!(
            parse_retry_after(&mock_response_with_retry_after("soon")),
            60
        );
    }

    #[tokio::test]
    async fn rate_limited_with_header() {
        let err = check_response(mock_response_with_retry_after("30"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AdapterError::RateLimited {
                retry_after_secs: 30
            }
        ));
    }

    #[tokio::test]
    async fn server_error_is_unavailable() {
        let err = check_response(mock_response(503, "maintenance"))
            .await
            .unwrap_err();
        assert!(matches!(err, AdapterError::SourceUnavailable(ref m) if m.contains("maintenance")));
    }

    #[tokio::test]
    async fn unexpected_client_error_is_format() {
        let err = check_response(mock_response(400, "")).await.unwrap_err();
        assert!(matches!(err, AdapterError::SourceFormat(_)));
    }

    #[tokio::test]
    async fn success_passes_through() {
        assert!(check_response(mock_response(200, "{}")).await.is_ok());
    }

    #[tokio::test]
    async fn undecodable_body_is_format() {
        let err = read_json::<serde_json::Value>(mock_response(200, "<html>"))
            .await
            .unwrap_err();
        assert!(matches!(err, AdapterError::SourceFormat(_)));
    }
}
