//! Shared test utilities for kyb-db unit tests.

use chrono::{DateTime, TimeDelta, Utc};
use kyb_core::entities::{Counterparty, NewCounterparty};

use crate::service::KybService;

/// In-memory service with the schema applied.
pub async fn test_service() -> KybService {
    KybService::new_local(":memory:").await.unwrap()
}

/// Fixed reference instant so tests are independent of the wall clock.
pub fn t0() -> DateTime<Utc> {
    "2026-03-01T12:00:00Z".parse().unwrap()
}

pub fn at(secs: i64) -> DateTime<Utc> {
    t0() + TimeDelta::seconds(secs)
}

pub fn new_counterparty(name: &str, vat: Option<&str>, lei: Option<&str>) -> NewCounterparty {
    NewCounterparty {
        display_name: name.to_string(),
        country_code: "DE".to_string(),
        vat_number: vat.map(String::from),
        lei_code: lei.map(String::from),
    }
}

/// Create a counterparty for tenant `t1`.
pub async fn seed_counterparty(svc: &KybService, name: &str) -> Counterparty {
    svc.create_counterparty("t1", &new_counterparty(name, None, None), t0())
        .await
        .unwrap()
}
