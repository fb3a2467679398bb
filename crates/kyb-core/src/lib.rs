//! # kyb-core
//!
//! Core types, ID prefixes, and error types for KYB Watch.
//!
//! This crate provides the foundational types shared across all KYB crates:
//! - Entity structs for the monitoring domain (counterparties, snapshots, diffs, alerts, jobs)
//! - Status enums with state machine transitions
//! - ID prefix constants
//! - The normalized registry record and its canonical content hash
//! - Cross-cutting error types

pub mod canonical;
pub mod entities;
pub mod enums;
pub mod errors;
pub mod ids;
pub mod record;
