//! Threshold strategy: buy cheap, sell dear.
//!
//! Goes long `quantity` when the price is below `buy_below` and the book is
//! not already long; otherwise sells `quantity` when the price is above
//! `sell_above` and the book is not already short.

use anyhow::ensure;

use super::STRATEGY_SECTION;
use crate::domain::config_validation::{positive_double, require_double, require_string};
use crate::domain::error::QuotevalError;
use crate::domain::market::MarketView;
use crate::domain::portfolio::Ledger;
use crate::domain::strategy::{StrategyFactory, Trader};
use crate::domain::universe::Universe;
use crate::ports::config_port::ConfigPort;

#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdParams {
    pub product: String,
    pub quantity: f64,
    pub buy_below: f64,
    pub sell_above: f64,
}

impl ThresholdParams {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, QuotevalError> {
        let params = ThresholdParams {
            product: require_string(config, STRATEGY_SECTION, "product")?,
            quantity: positive_double(config, STRATEGY_SECTION, "quantity", 10_000.0)?,
            buy_below: require_double(config, STRATEGY_SECTION, "buy_below")?,
            sell_above: require_double(config, STRATEGY_SECTION, "sell_above")?,
        };
        if params.buy_below > params.sell_above {
            return Err(QuotevalError::ConfigInvalid {
                section: STRATEGY_SECTION.to_string(),
                key: "buy_below".to_string(),
                reason: "buy_below must not exceed sell_above".to_string(),
            });
        }
        Ok(params)
    }
}

impl StrategyFactory for ThresholdParams {
    fn build(&self, universe: &Universe) -> anyhow::Result<Box<dyn Trader>> {
        ensure!(
            universe.contains(&self.product),
            "product {} is not in the universe",
            self.product
        );
        Ok(Box::new(ThresholdTrader {
            params: self.clone(),
        }))
    }
}

pub struct ThresholdTrader {
    params: ThresholdParams,
}

impl Trader for ThresholdTrader {
    fn on_quote(&mut self, market: &MarketView<'_>, ledger: &mut Ledger<'_, '_>) -> anyhow::Result<()> {
        let p = &self.params;
        let Some(price) = market.price(&p.product) else {
            return Ok(());
        };
        let held = ledger.position(&p.product);

        if held <= 0.0 && price < p.buy_below {
            ledger.buy(&p.product, p.quantity);
        } else if held >= 0.0 && price > p.sell_above {
            ledger.sell(&p.product, p.quantity);
        }
        Ok(())
    }
}
