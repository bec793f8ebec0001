//! Volatility estimation from stored spot history.

use chrono::NaiveDate;
use rayon::prelude::*;
use rust_decimal::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;
use uuid::Uuid;

use gr_data::Store;

use crate::math::log_return_volatility;

/// Risk model tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskConfig {
    /// Most recent spot observations used for the volatility estimate.
    pub volatility_window: usize,
    /// Minimum observations required before an estimate is produced.
    pub min_observations: usize,
    /// Confidence level used when a request does not specify one.
    pub default_confidence: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            volatility_window: 60,
            min_observations: 20,
            default_confidence: 0.95,
        }
    }
}

/// Outcome of a per-commodity volatility estimate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VolatilityEstimate {
    /// Per-observation sigma of log returns over the window.
    Estimated { sigma: f64, observations: usize },
    /// Not enough usable history; the count says how much was found.
    Insufficient { observations: usize },
}

impl VolatilityEstimate {
    pub fn sigma(&self) -> Option<f64> {
        match self {
            VolatilityEstimate::Estimated { sigma, .. } => Some(*sigma),
            VolatilityEstimate::Insufficient { .. } => None,
        }
    }
}

/// Estimates volatility per commodity from spot history.
#[derive(Debug, Clone, Default)]
pub struct VolatilityEstimator {
    config: RiskConfig,
}

impl VolatilityEstimator {
    pub fn new(config: RiskConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RiskConfig {
        &self.config
    }

    /// Estimate sigma for one commodity using spot observations at/before
    /// `as_of`, trimmed to the configured window.
    pub fn estimate(
        &self,
        store: &Store,
        commodity_id: Uuid,
        as_of: NaiveDate,
    ) -> VolatilityEstimate {
        let history = store.spot_history(commodity_id, as_of);
        let start = history.len().saturating_sub(self.config.volatility_window);
        let window = &history[start..];

        let observations = window.len();
        if observations < self.config.min_observations {
            debug!(
                %commodity_id,
                observations,
                required = self.config.min_observations,
                "insufficient spot history"
            );
            return VolatilityEstimate::Insufficient { observations };
        }

        let prices: Vec<f64> = window
            .iter()
            .filter_map(|p| p.price.to_f64())
            .collect();

        match log_return_volatility(&prices) {
            Some(sigma) => VolatilityEstimate::Estimated {
                sigma,
                observations,
            },
            None => VolatilityEstimate::Insufficient { observations },
        }
    }

    /// Estimate sigma for many commodities in parallel.
    pub fn estimate_all(
        &self,
        store: &Store,
        commodity_ids: &[Uuid],
        as_of: NaiveDate,
    ) -> HashMap<Uuid, VolatilityEstimate> {
        commodity_ids
            .par_iter()
            .map(|id| (*id, self.estimate(store, *id, as_of)))
            .collect()
    }
}
