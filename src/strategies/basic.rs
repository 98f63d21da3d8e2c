//! Idle and buy-and-hold strategies.

use anyhow::ensure;

use super::STRATEGY_SECTION;
use crate::domain::config_validation::{positive_double, require_string};
use crate::domain::error::QuotevalError;
use crate::domain::market::MarketView;
use crate::domain::portfolio::{Ledger, TradeResult};
use crate::domain::strategy::{StrategyFactory, Trader};
use crate::domain::universe::Universe;
use crate::ports::config_port::ConfigPort;

pub struct Idle;

impl Trader for Idle {
    fn on_quote(&mut self, _market: &MarketView<'_>, _ledger: &mut Ledger<'_, '_>) -> anyhow::Result<()> {
        Ok(())
    }
}

pub struct IdleFactory;

impl StrategyFactory for IdleFactory {
    fn build(&self, _universe: &Universe) -> anyhow::Result<Box<dyn Trader>> {
        Ok(Box::new(Idle))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BuyAndHoldParams {
    pub product: String,
    pub quantity: f64,
}

impl BuyAndHoldParams {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, QuotevalError> {
        Ok(BuyAndHoldParams {
            product: require_string(config, STRATEGY_SECTION, "product")?,
            quantity: positive_double(config, STRATEGY_SECTION, "quantity", 1.0)?,
        })
    }
}

impl StrategyFactory for BuyAndHoldParams {
    fn build(&self, universe: &Universe) -> anyhow::Result<Box<dyn Trader>> {
        ensure!(
            universe.contains(&self.product),
            "product {} is not in the universe",
            self.product
        );
        Ok(Box::new(BuyAndHold {
            params: self.clone(),
            filled: false,
        }))
    }
}

/// Buys once, at the first step with a quote where the order fills.
pub struct BuyAndHold {
    params: BuyAndHoldParams,
    filled: bool,
}

impl Trader for BuyAndHold {
    fn on_quote(&mut self, market: &MarketView<'_>, ledger: &mut Ledger<'_, '_>) -> anyhow::Result<()> {
        if self.filled || market.price(&self.params.product).is_none() {
            return Ok(());
        }
        match ledger.buy(&self.params.product, self.params.quantity) {
            TradeResult::Filled { .. } => self.filled = true,
            TradeResult::Rejected(reason) => {
                tracing::debug!(product = %self.params.product, %reason, "buy-and-hold entry rejected");
            }
        }
        Ok(())
    }
}
