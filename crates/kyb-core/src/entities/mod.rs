//! Entity structs for all KYB domain objects.
//!
//! Each entity maps to a table in the libSQL database (see `kyb-db/migrations`).
//! All structs derive `Serialize`, `Deserialize`, and `JsonSchema` for JSON
//! roundtrip and schema validation.

mod alert;
mod counterparty;
mod diff;
mod job;
mod snapshot;

pub use alert::{Alert, OperationalAlert};
pub use counterparty::{Counterparty, NewCounterparty};
pub use diff::{Diff, FieldChange};
pub use job::MonitoringJob;
pub use snapshot::{Snapshot, SnapshotObservation};
