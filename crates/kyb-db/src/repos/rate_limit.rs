//! Per-source request spacing shared by all workers.
//!
//! Each source has one row holding the earliest instant the next request may
//! start. Taking a slot is a compare-and-set on that instant, so concurrent
//! workers never both start a request inside the same interval.

use chrono::{DateTime, TimeDelta, Utc};

use kyb_core::enums::Source;

use crate::error::DatabaseError;
use crate::helpers::{format_datetime, get_datetime};
use crate::service::KybService;

/// Result of [`KybService::acquire_rate_slot`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateSlot {
    /// The caller may issue its request now.
    Acquired,
    /// Another request holds the interval; retry at the given instant.
    Wait(DateTime<Utc>),
}

impl KybService {
    /// Reserve the next request slot for `source`.
    ///
    /// On success the next slot opens at `now + min_interval`.
    pub async fn acquire_rate_slot(
        &self,
        source: Source,
        min_interval: TimeDelta,
        now: DateTime<Utc>,
    ) -> Result<RateSlot, DatabaseError> {
        let ts = format_datetime(&now);
        let next = format_datetime(&(now + min_interval));
        let conn = self.db().conn();

        let inserted = conn
            .execute(
                "INSERT OR IGNORE INTO source_rate_limits (source, next_allowed_at) VALUES (?1, ?2)",
                libsql::params![source.as_str(), next.as_str()],
            )
            .await?;
        if inserted == 1 {
            return Ok(RateSlot::Acquired);
        }

        let updated = conn
            .execute(
                "UPDATE source_rate_limits SET next_allowed_at = ?1
                 WHERE source = ?2 AND next_allowed_at <= ?3",
                libsql::params![next.as_str(), source.as_str(), ts],
            )
            .await?;
        if updated == 1 {
            return Ok(RateSlot::Acquired);
        }

        let mut rows = conn
            .query(
                "SELECT next_allowed_at FROM source_rate_limits WHERE source = ?1",
                [source.as_str()],
            )
            .await?;
        let row = rows.next().await?.ok_or(DatabaseError::NoResult)?;
        let until = get_datetime(&row, 0)?;
        tracing::trace!(%source, %until, "rate limited");
        Ok(RateSlot::Wait(until))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{at, test_service};

    #[tokio::test]
    async fn slots_are_spaced_by_interval() {
        let svc = test_service().await;
        let interval = TimeDelta::seconds(2);

        assert_eq!(
            svc.acquire_rate_slot(Source::Vies, interval, at(0)).await.unwrap(),
            RateSlot::Acquired
        );
        assert_eq!(
            svc.acquire_rate_slot(Source::Vies, interval, at(1)).await.unwrap(),
            RateSlot::Wait(at(2))
        );
        assert_eq!(
            svc.acquire_rate_slot(Source::Vies, interval, at(2)).await.unwrap(),
            RateSlot::Acquired
        );
        assert_eq!(
            svc.acquire_rate_slot(Source::Vies, interval, at(2)).await.unwrap(),
            RateSlot::Wait(at(4))
        );
    }

    #[tokio::test]
    async fn sources_are_independent() {
        let svc = test_service().await;
        let interval = TimeDelta::seconds(5);
        assert_eq!(
            svc.acquire_rate_slot(Source::Vies, interval, at(0)).await.unwrap(),
            RateSlot::Acquired
        );
        assert_eq!(
            svc.acquire_rate_slot(Source::Gleif, interval, at(0)).await.unwrap(),
            RateSlot::Acquired
        );
    }
}
