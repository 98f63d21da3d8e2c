//! The strategy boundary: a factory that builds a trader from the universe,
//! and a trader that reacts to each step through the ledger.

use super::market::MarketView;
use super::portfolio::Ledger;
use super::universe::Universe;

/// Per-step callback implemented by user strategies.
///
/// Trading happens only through `ledger`. Returning an error (or panicking)
/// marks the step as faulted; trades already filled in the step stand.
pub trait Trader {
    fn on_quote(&mut self, market: &MarketView<'_>, ledger: &mut Ledger<'_, '_>) -> anyhow::Result<()>;
}

/// Construction entry point, called once per run.
pub trait StrategyFactory {
    fn build(&self, universe: &Universe) -> anyhow::Result<Box<dyn Trader>>;
}

/// Adapts a plain function or closure into a [`StrategyFactory`].
pub struct FnFactory<F>(pub F);

impl<F> StrategyFactory for FnFactory<F>
where
    F: Fn(&Universe) -> anyhow::Result<Box<dyn Trader>>,
{
    fn build(&self, universe: &Universe) -> anyhow::Result<Box<dyn Trader>> {
        (self.0)(universe)
    }
}
