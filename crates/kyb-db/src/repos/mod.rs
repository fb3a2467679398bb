//! Repository modules implementing storage operations for all KYB entities.
//!
//! Each module adds methods to `KybService` via `impl KybService` blocks.

pub mod alert;
pub mod counterparty;
pub mod diff;
pub mod job;
pub mod ops_alert;
pub mod rate_limit;
pub mod snapshot;
