//! Parametric value-at-risk for commodity procurement exposure.
//!
//! The model is deliberately simple: per (commodity, month),
//! `VaR = z * sigma * price * |exposure|`, with sigma estimated from spot
//! log returns and commodity results combined under independence. Data gaps
//! degrade visibly (quality flags, `None` points) rather than silently.

pub mod engine;
pub mod math;
pub mod volatility;

pub use engine::*;
pub use math::*;
pub use volatility::*;
