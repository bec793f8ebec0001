//! Hedge session lifecycle: open, stage, preview, execute or cancel, and the
//! resulting executed-hedge portfolio.

pub mod events;
pub mod manager;
pub mod portfolio;

pub use events::*;
pub use manager::*;
pub use portfolio::*;
