//! Moving-average crossing strategy.
//!
//! Watches the `signal` product and trades the `traded` product. Each step
//! with a signal quote compares the expanding mean of all signal prices seen
//! so far against the rolling mean over the last `window` prices, and against
//! the rolling mean `gap` steps earlier:
//!
//! - expanding inside (rolling_before, rolling) from below: buy
//! - expanding inside (rolling, rolling_before) from above: sell
//! - otherwise trade toward the rolling mean, sized by the spread
//!
//! Crossing trades use `base_quantity` until more than `scale_after` prices
//! have been seen, then `scaled_quantity`.

use std::collections::VecDeque;

use anyhow::ensure;

use super::STRATEGY_SECTION;
use crate::domain::config_validation::{
    optional_count, optional_double, positive_double, require_string,
};
use crate::domain::error::QuotevalError;
use crate::domain::market::MarketView;
use crate::domain::portfolio::Ledger;
use crate::domain::strategy::{StrategyFactory, Trader};
use crate::domain::universe::Universe;
use crate::ports::config_port::ConfigPort;

#[derive(Debug, Clone, PartialEq)]
pub struct MovingAverageParams {
    pub signal: String,
    pub traded: String,
    pub window: usize,
    pub gap: usize,
    pub base_quantity: f64,
    pub scaled_quantity: f64,
    pub scale_after: usize,
    pub spread_multiplier: f64,
}

impl Default for MovingAverageParams {
    fn default() -> Self {
        MovingAverageParams {
            signal: String::new(),
            traded: String::new(),
            window: 10,
            gap: 5,
            base_quantity: 10.0,
            scaled_quantity: 1_000.0,
            scale_after: 300,
            spread_multiplier: 10.0,
        }
    }
}

impl MovingAverageParams {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, QuotevalError> {
        let d = MovingAverageParams::default();
        let params = MovingAverageParams {
            signal: require_string(config, STRATEGY_SECTION, "signal")?,
            traded: require_string(config, STRATEGY_SECTION, "traded")?,
            window: optional_count(config, STRATEGY_SECTION, "window", d.window)?,
            gap: optional_count(config, STRATEGY_SECTION, "gap", d.gap)?,
            base_quantity: positive_double(config, STRATEGY_SECTION, "base_quantity", d.base_quantity)?,
            scaled_quantity: positive_double(
                config,
                STRATEGY_SECTION,
                "scaled_quantity",
                d.scaled_quantity,
            )?,
            scale_after: optional_count(config, STRATEGY_SECTION, "scale_after", d.scale_after)?,
            spread_multiplier: optional_double(
                config,
                STRATEGY_SECTION,
                "spread_multiplier",
                d.spread_multiplier,
            )?,
        };
        if params.spread_multiplier < 0.0 {
            return Err(QuotevalError::ConfigInvalid {
                section: STRATEGY_SECTION.to_string(),
                key: "spread_multiplier".to_string(),
                reason: "spread_multiplier must not be negative".to_string(),
            });
        }
        if params.window == 0 {
            return Err(QuotevalError::ConfigInvalid {
                section: STRATEGY_SECTION.to_string(),
                key: "window".to_string(),
                reason: "window must be at least 1".to_string(),
            });
        }
        Ok(params)
    }
}

impl StrategyFactory for MovingAverageParams {
    fn build(&self, universe: &Universe) -> anyhow::Result<Box<dyn Trader>> {
        for product in [&self.signal, &self.traded] {
            ensure!(
                universe.contains(product),
                "product {product} is not in the universe"
            );
        }
        ensure!(self.window > 0, "window must be at least 1");
        Ok(Box::new(MovingAverageTrader::new(self.clone())))
    }
}

/// Running statistics over the signal price history.
#[derive(Debug, Clone, Default)]
struct SignalHistory {
    count: usize,
    sum: f64,
    /// Last `window + gap` prices, oldest first.
    recent: VecDeque<f64>,
}

impl SignalHistory {
    fn push(&mut self, price: f64, capacity: usize) {
        self.count += 1;
        self.sum += price;
        if self.recent.len() == capacity {
            self.recent.pop_front();
        }
        self.recent.push_back(price);
    }

    fn expanding_mean(&self) -> f64 {
        self.sum / self.count as f64
    }

    /// Mean of the `window` prices ending `lag` steps before the latest.
    fn rolling_mean(&self, window: usize, lag: usize) -> Option<f64> {
        let end = self.recent.len().checked_sub(lag)?;
        let start = end.checked_sub(window)?;
        let sum: f64 = self.recent.range(start..end).sum();
        Some(sum / window as f64)
    }
}

pub struct MovingAverageTrader {
    params: MovingAverageParams,
    history: SignalHistory,
}

impl MovingAverageTrader {
    pub fn new(params: MovingAverageParams) -> Self {
        MovingAverageTrader {
            params,
            history: SignalHistory::default(),
        }
    }
}

impl Trader for MovingAverageTrader {
    fn on_quote(&mut self, market: &MarketView<'_>, ledger: &mut Ledger<'_, '_>) -> anyhow::Result<()> {
        let p = &self.params;
        let Some(price) = market.price(&p.signal) else {
            return Ok(());
        };
        self.history.push(price, p.window + p.gap);

        let Some(rolling) = self.history.rolling_mean(p.window, 0) else {
            return Ok(());
        };
        let expanding = self.history.expanding_mean();
        let before = self.history.rolling_mean(p.window, p.gap);
        let crossing_qty = if self.history.count > p.scale_after {
            p.scaled_quantity
        } else {
            p.base_quantity
        };

        let rising = before.is_some_and(|b| expanding < rolling && expanding > b);
        let falling = before.is_some_and(|b| expanding > rolling && expanding < b);

        if rising {
            ledger.buy(&p.traded, crossing_qty);
        } else if falling {
            ledger.sell(&p.traded, crossing_qty);
        } else if expanding < rolling {
            ledger.buy(&p.traded, p.spread_multiplier * (rolling - expanding).abs());
        } else if expanding > rolling {
            ledger.sell(&p.traded, p.spread_multiplier * (rolling - expanding).abs());
        }
        Ok(())
    }
}
