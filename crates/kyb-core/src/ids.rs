//! ID prefix constants.
//!
//! IDs are generated by the database as `{prefix}-{16 hex chars}`.

pub const PREFIX_COUNTERPARTY: &str = "cpy";
pub const PREFIX_SNAPSHOT: &str = "snp";
pub const PREFIX_OBSERVATION: &str = "obs";
pub const PREFIX_DIFF: &str = "dif";
pub const PREFIX_ALERT: &str = "alr";
pub const PREFIX_OPS_ALERT: &str = "ops";
pub const PREFIX_JOB: &str = "job";
pub const PREFIX_LEASE: &str = "lse";

/// Every prefix in use, for exhaustive ID-generation tests.
pub const ALL_PREFIXES: &[&str] = &[
    PREFIX_COUNTERPARTY,
    PREFIX_SNAPSHOT,
    PREFIX_OBSERVATION,
    PREFIX_DIFF,
    PREFIX_ALERT,
    PREFIX_OPS_ALERT,
    PREFIX_JOB,
    PREFIX_LEASE,
];
