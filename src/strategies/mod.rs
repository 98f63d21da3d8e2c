//! Built-in strategies, selectable by name from the `[strategy]` section.
//!
//! Each strategy reads its parameters through [`ConfigPort`] and is returned
//! as a [`StrategyFactory`]; the factory checks the configured products
//! against the run's universe when the trader is built.

pub mod basic;
pub mod moving_average;
pub mod threshold;

use crate::domain::error::QuotevalError;
use crate::domain::strategy::StrategyFactory;
use crate::ports::config_port::ConfigPort;

pub const STRATEGY_SECTION: &str = "strategy";

/// Registered names with a one-line description.
pub const STRATEGY_NAMES: &[(&str, &str)] = &[
    ("idle", "never trades"),
    ("buy_and_hold", "buys `quantity` of `product` once and holds"),
    (
        "threshold",
        "buys `product` below `buy_below`, sells above `sell_above`",
    ),
    (
        "moving_average",
        "trades `traded` on expanding vs rolling mean crossings of `signal`",
    ),
];

pub fn factory_from_config(
    name: &str,
    config: &dyn ConfigPort,
) -> Result<Box<dyn StrategyFactory>, QuotevalError> {
    match name.trim() {
        "idle" => Ok(Box::new(basic::IdleFactory)),
        "buy_and_hold" => Ok(Box::new(basic::BuyAndHoldParams::from_config(config)?)),
        "threshold" => Ok(Box::new(threshold::ThresholdParams::from_config(config)?)),
        "moving_average" => Ok(Box::new(moving_average::MovingAverageParams::from_config(
            config,
        )?)),
        other => Err(QuotevalError::UnknownStrategy {
            name: other.to_string(),
        }),
    }
}
