#![allow(dead_code)]

use quoteval::domain::error::QuotevalError;
use quoteval::domain::market::MarketView;
use quoteval::domain::portfolio::Ledger;
use quoteval::domain::quote::QuoteRow;
use quoteval::domain::strategy::{StrategyFactory, Trader};
use quoteval::domain::universe::Universe;
use quoteval::ports::data_port::{QuoteRows, QuoteSource};

/// In-memory quote source; every `rows` call replays the same rows.
pub struct MemoryQuoteSource {
    pub rows: Vec<QuoteRow>,
}

impl MemoryQuoteSource {
    pub fn new(rows: Vec<QuoteRow>) -> Self {
        Self { rows }
    }

    /// One product, one quote per timestep starting at 1.
    pub fn single(product: &str, prices: &[f64]) -> Self {
        Self::new(
            prices
                .iter()
                .enumerate()
                .map(|(i, &p)| QuoteRow::new(i as i64 + 1, product, p))
                .collect(),
        )
    }
}

impl QuoteSource for MemoryQuoteSource {
    fn rows(&self) -> Result<QuoteRows<'_>, QuotevalError> {
        Ok(Box::new(self.rows.iter().cloned().map(Ok)))
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

pub struct NeverTrades;

impl Trader for NeverTrades {
    fn on_quote(&mut self, _: &MarketView<'_>, _: &mut Ledger<'_, '_>) -> anyhow::Result<()> {
        Ok(())
    }
}

pub struct AlwaysFails;

impl Trader for AlwaysFails {
    fn on_quote(&mut self, market: &MarketView<'_>, _: &mut Ledger<'_, '_>) -> anyhow::Result<()> {
        anyhow::bail!("no signal at step {}", market.step())
    }
}

pub struct AlwaysPanics;

impl Trader for AlwaysPanics {
    fn on_quote(&mut self, _: &MarketView<'_>, _: &mut Ledger<'_, '_>) -> anyhow::Result<()> {
        let empty: Vec<f64> = Vec::new();
        let _ = empty[0];
        Ok(())
    }
}

/// Buys `quantity` of `product` at step `at` and then holds.
pub struct BuyAt {
    pub product: String,
    pub quantity: f64,
    pub at: usize,
}

impl Trader for BuyAt {
    fn on_quote(&mut self, market: &MarketView<'_>, ledger: &mut Ledger<'_, '_>) -> anyhow::Result<()> {
        if market.step() == self.at {
            ledger.buy(&self.product, self.quantity);
        }
        Ok(())
    }
}

/// Replays a fixed list of (step, product, signed quantity) orders, then
/// fails on steps listed in `fail_on` after placing that step's orders.
pub struct Scripted {
    pub orders: Vec<(usize, String, f64)>,
    pub fail_on: Vec<usize>,
}

impl Trader for Scripted {
    fn on_quote(&mut self, market: &MarketView<'_>, ledger: &mut Ledger<'_, '_>) -> anyhow::Result<()> {
        for (step, product, qty) in &self.orders {
            if *step != market.step() {
                continue;
            }
            if *qty >= 0.0 {
                ledger.buy(product, *qty);
            } else {
                ledger.sell(product, -*qty);
            }
        }
        if self.fail_on.contains(&market.step()) {
            anyhow::bail!("scripted failure");
        }
        Ok(())
    }
}

/// Factory that hands out a fresh trader from `make` on every build.
pub struct MakeTrader<F>(pub F);

impl<F> StrategyFactory for MakeTrader<F>
where
    F: Fn() -> Box<dyn Trader>,
{
    fn build(&self, _universe: &Universe) -> anyhow::Result<Box<dyn Trader>> {
        Ok((self.0)())
    }
}

pub struct FailingFactory;

impl StrategyFactory for FailingFactory {
    fn build(&self, _universe: &Universe) -> anyhow::Result<Box<dyn Trader>> {
        anyhow::bail!("missing model weights")
    }
}

pub fn buy_at(product: &str, quantity: f64, at: usize) -> impl StrategyFactory {
    let product = product.to_string();
    MakeTrader(move || -> Box<dyn Trader> {
        Box::new(BuyAt {
            product: product.clone(),
            quantity,
            at,
        })
    })
}
