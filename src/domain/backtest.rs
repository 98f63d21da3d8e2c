//! Backtest engine and event loop.
//!
//! BacktestConfig defines the evaluation parameters. One step per snapshot:
//! update marks, hand the trader a market view and a ledger, then mark the
//! portfolio to market and record NAV.

use serde::Serialize;

use super::error::QuotevalError;
use super::feed::{self, FeedSummary};
use super::market::{MarketView, PriceMarks};
use super::metrics::{DEFAULT_PERIODS_PER_YEAR, ScoreReport};
use super::portfolio::{DEFAULT_LEVERAGE_LIMIT, Ledger, Portfolio};
use super::quote::{QuoteSnapshot, Timestep};
use super::runner::{StepFault, StrategyRunner};
use super::strategy::StrategyFactory;
use super::universe::Universe;
use crate::ports::data_port::QuoteSource;

pub const DEFAULT_INITIAL_CASH: f64 = 100_000.0;

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub initial_cash: f64,
    pub leverage_limit: f64,
    pub periods_per_year: f64,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        BacktestConfig {
            initial_cash: DEFAULT_INITIAL_CASH,
            leverage_limit: DEFAULT_LEVERAGE_LIMIT,
            periods_per_year: DEFAULT_PERIODS_PER_YEAR,
        }
    }
}

/// Net asset value after a step's trades.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NavPoint {
    pub step: usize,
    pub timestep: Timestep,
    pub nav: f64,
}

#[derive(Debug)]
pub struct BacktestResult {
    pub universe: Universe,
    pub portfolio: Portfolio,
    pub nav_series: Vec<NavPoint>,
    pub fault_count: usize,
    pub faults: Vec<StepFault>,
}

impl BacktestResult {
    pub fn steps(&self) -> usize {
        self.nav_series.len()
    }

    pub fn final_nav(&self) -> f64 {
        self.nav_series
            .last()
            .map_or(self.portfolio.initial_cash(), |p| p.nav)
    }
}

/// Drive `factory`'s trader across `feed`.
///
/// The trader is built once before the first step. Strategy faults are
/// recorded and the loop continues; a feed error aborts the run.
pub fn run_backtest<I>(
    universe: &Universe,
    feed: I,
    factory: &dyn StrategyFactory,
    config: &BacktestConfig,
) -> Result<BacktestResult, QuotevalError>
where
    I: IntoIterator<Item = Result<QuoteSnapshot, QuotevalError>>,
{
    let mut runner = StrategyRunner::load(factory, universe)?;
    let mut portfolio = Portfolio::new(config.initial_cash, config.leverage_limit);
    let mut marks = PriceMarks::default();
    let mut nav_series = Vec::new();

    tracing::info!(
        products = universe.count(),
        initial_cash = config.initial_cash,
        leverage_limit = config.leverage_limit,
        "backtest started"
    );

    for snapshot in feed {
        let snapshot = snapshot?;
        marks.apply(&snapshot);
        let view = MarketView::new(universe, &snapshot, &marks);

        {
            let mut ledger = Ledger::new(&mut portfolio, &view);
            runner.invoke(&mut ledger);
        }

        let nav = portfolio.net_asset_value(&view);
        tracing::trace!(step = snapshot.step, timestep = %snapshot.timestep, nav, "step complete");
        nav_series.push(NavPoint {
            step: snapshot.step,
            timestep: snapshot.timestep,
            nav,
        });
    }

    let (fault_count, faults) = runner.into_faults();
    tracing::info!(
        steps = nav_series.len(),
        trades = portfolio.trade_count(),
        rejected = portfolio.rejected_count(),
        faults = fault_count,
        "backtest finished"
    );

    Ok(BacktestResult {
        universe: universe.clone(),
        portfolio,
        nav_series,
        fault_count,
        faults,
    })
}

/// Everything one evaluation produces.
#[derive(Debug)]
pub struct Evaluation {
    pub summary: FeedSummary,
    pub result: BacktestResult,
    pub report: ScoreReport,
}

/// Validate `source`, run the strategy over it and score the run.
///
/// The source is read twice: a validation scan that fixes the universe and
/// surfaces data format errors before any strategy code runs, then the
/// streaming pass the loop consumes.
pub fn evaluate(
    source: &dyn QuoteSource,
    factory: &dyn StrategyFactory,
    config: &BacktestConfig,
) -> Result<Evaluation, QuotevalError> {
    let summary = feed::scan(source)?;
    tracing::info!(
        source = %source.describe(),
        products = summary.universe.count(),
        steps = summary.steps,
        "quote source validated"
    );

    let stream = feed::open(source, &summary.universe)?;
    let result = run_backtest(&summary.universe, stream, factory, config)?;
    let report = ScoreReport::compute(&result, config.periods_per_year);

    Ok(Evaluation {
        summary,
        result,
        report,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::strategy::{FnFactory, Trader};
    use approx::assert_relative_eq;

    fn snap(step: usize, ts: i64, prices: &[(&str, f64)]) -> Result<QuoteSnapshot, QuotevalError> {
        Ok(QuoteSnapshot {
            step,
            timestep: Timestep(ts),
            prices: prices.iter().map(|&(p, v)| (p.to_string(), v)).collect(),
        })
    }

    struct BuyFirst {
        product: &'static str,
        quantity: f64,
        done: bool,
    }

    impl Trader for BuyFirst {
        fn on_quote(&mut self, _market: &MarketView<'_>, ledger: &mut Ledger<'_, '_>) -> anyhow::Result<()> {
            if !self.done {
                ledger.buy(self.product, self.quantity);
                self.done = true;
            }
            Ok(())
        }
    }

    fn buy_first(product: &'static str, quantity: f64) -> impl StrategyFactory {
        FnFactory(move |_: &Universe| -> anyhow::Result<Box<dyn Trader>> {
            Ok(Box::new(BuyFirst {
                product,
                quantity,
                done: false,
            }))
        })
    }

    #[test]
    fn default_config() {
        let c = BacktestConfig::default();
        assert_relative_eq!(c.initial_cash, 100_000.0);
        assert_relative_eq!(c.leverage_limit, 10.0);
        assert_relative_eq!(c.periods_per_year, 252.0);
    }

    #[test]
    fn nav_recorded_after_each_step() {
        let universe = Universe::new(["A"]);
        let feed = vec![
            snap(0, 1, &[("A", 10.0)]),
            snap(1, 2, &[("A", 12.0)]),
            snap(2, 3, &[("A", 9.0)]),
        ];
        let config = BacktestConfig {
            initial_cash: 1_000.0,
            ..BacktestConfig::default()
        };

        let result = run_backtest(&universe, feed, &buy_first("A", 10.0), &config).unwrap();

        let navs: Vec<f64> = result.nav_series.iter().map(|p| p.nav).collect();
        assert_eq!(navs.len(), 3);
        assert_relative_eq!(navs[0], 1_000.0);
        assert_relative_eq!(navs[1], 1_020.0);
        assert_relative_eq!(navs[2], 990.0);
        assert_relative_eq!(result.final_nav(), 990.0);
        assert_eq!(result.portfolio.trade_count(), 1);
    }

    #[test]
    fn missing_quote_values_at_last_mark() {
        let universe = Universe::new(["A", "B"]);
        let feed = vec![
            snap(0, 1, &[("A", 10.0), ("B", 1.0)]),
            snap(1, 2, &[("B", 2.0)]),
        ];
        let config = BacktestConfig {
            initial_cash: 1_000.0,
            ..BacktestConfig::default()
        };

        let result = run_backtest(&universe, feed, &buy_first("A", 5.0), &config).unwrap();

        assert_relative_eq!(result.nav_series[1].nav, 1_000.0);
    }

    #[test]
    fn feed_error_aborts_run() {
        let universe = Universe::new(["A"]);
        let feed = vec![
            snap(0, 1, &[("A", 10.0)]),
            Err(QuotevalError::data_format("bad row")),
        ];

        let err = run_backtest(&universe, feed, &buy_first("A", 1.0), &BacktestConfig::default())
            .unwrap_err();
        assert!(matches!(err, QuotevalError::DataFormat { .. }));
    }

    #[test]
    fn empty_feed_has_initial_nav() {
        let universe = Universe::new(["A"]);
        let result = run_backtest(
            &universe,
            Vec::new(),
            &buy_first("A", 1.0),
            &BacktestConfig::default(),
        )
        .unwrap();
        assert_eq!(result.steps(), 0);
        assert_relative_eq!(result.final_nav(), 100_000.0);
    }
}
