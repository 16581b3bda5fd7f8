//! Gas price selection for fast inclusion

use crate::config::{GasConfig, SubmissionConfig};
use crate::ledger::{with_timeout, Ledger};

use ethers::types::U256;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Picks the gas price for each attempt. Never fails.
pub struct GasResolver {
    ledger: Arc<dyn Ledger>,
    /// Percentage added on top of the live network price
    premium_percent: u64,
    /// Ceiling for dynamically resolved prices, in wei
    max_gas_price: U256,
    request_timeout: Duration,
}

impl GasResolver {
    pub fn new(ledger: Arc<dyn Ledger>, config: &GasConfig, request_timeout: Duration) -> Self {
        Self {
            ledger,
            premium_percent: config.premium_percent,
            max_gas_price: config.max_gas_price_gwei.wei(),
            request_timeout,
        }
    }

    /// Gas price in wei for one attempt.
    ///
    /// With dynamic pricing the live price plus premium is used, capped at
    /// the ceiling and never below the configured hint. Any lookup failure
    /// falls back to the hint.
    pub async fn resolve(&self, config: &SubmissionConfig) -> U256 {
        let hint = config.gas_price_hint.wei();
        if !config.use_dynamic_gas {
            return hint;
        }

        match with_timeout("gas price", self.request_timeout, self.ledger.gas_price()).await {
            Ok(live) => {
                let price = self.with_premium(live).min(self.max_gas_price).max(hint);
                debug!("Gas price: live {} wei, using {} wei", live, price);
                price
            }
            Err(e) => {
                warn!("Failed to get current gas price, using configured value: {}", e);
                crate::metrics::record_gas_fallback();
                hint
            }
        }
    }

    fn with_premium(&self, price: U256) -> U256 {
        let premium = price.saturating_mul(U256::from(self.premium_percent)) / 100;
        price.saturating_add(premium)
    }
}
