//! Exposure aggregation: turning immutable purchase records into per-month
//! exposure buckets.

pub mod aggregator;

pub use aggregator::*;
