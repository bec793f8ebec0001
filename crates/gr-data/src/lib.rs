//! Data layer for Granary.
//!
//! Provides:
//! - An in-memory, tenant-sharded [`Store`] with hard tenant isolation
//! - Ingestion entry points that validate before anything reaches the core
//! - The market curve resolver (exact forward → nearest forward → spot)
//! - A mock futures generator for demo tenants

pub mod curve;
pub mod ingest;
pub mod mock;
pub mod store;

pub use curve::*;
pub use ingest::*;
pub use mock::*;
pub use store::*;
