//! The service boundary: a typed facade over the engine crates, plus the
//! deterministic demo seed used by the standalone binary and tests.

pub mod api;
pub mod demo;

pub use api::*;
pub use demo::*;
