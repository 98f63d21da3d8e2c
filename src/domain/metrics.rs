//! Score report: Sharpe ratio and auxiliary performance metrics.

use serde::Serialize;

use super::backtest::{BacktestResult, NavPoint};
use super::runner::StepFault;

pub const DEFAULT_PERIODS_PER_YEAR: f64 = 252.0;

/// Reported Sharpe when the return series has no usable variance.
pub const DEGENERATE_SHARPE: f64 = 0.0;

const MIN_STDDEV: f64 = 1e-12;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreReport {
    pub sharpe_ratio: f64,
    pub annualized_sharpe: f64,
    /// True when the Sharpe fields hold [`DEGENERATE_SHARPE`].
    pub degenerate: bool,
    pub pnl: f64,
    pub total_return: f64,
    pub initial_nav: f64,
    pub final_nav: f64,
    pub max_drawdown: f64,
    pub trade_count: usize,
    pub rejected_trades: usize,
    pub fault_count: usize,
    pub steps: usize,
    pub nav_series: Vec<NavPoint>,
    pub faults: Vec<StepFault>,
}

impl ScoreReport {
    pub fn compute(result: &BacktestResult, periods_per_year: f64) -> Self {
        let initial_nav = result.portfolio.initial_cash();
        let final_nav = result.final_nav();
        let pnl = final_nav - initial_nav;
        let total_return = if initial_nav > 0.0 {
            pnl / initial_nav
        } else {
            0.0
        };

        let navs: Vec<f64> = result.nav_series.iter().map(|p| p.nav).collect();
        let returns = step_returns(&navs);
        let (sharpe_ratio, annualized_sharpe, degenerate) = match sharpe_ratio(&returns) {
            Some(s) => (s, s * periods_per_year.sqrt(), false),
            None => (DEGENERATE_SHARPE, DEGENERATE_SHARPE, true),
        };

        ScoreReport {
            sharpe_ratio,
            annualized_sharpe,
            degenerate,
            pnl,
            total_return,
            initial_nav,
            final_nav,
            max_drawdown: max_drawdown(&navs),
            trade_count: result.portfolio.trade_count(),
            rejected_trades: result.portfolio.rejected_count(),
            fault_count: result.fault_count,
            steps: result.steps(),
            nav_series: result.nav_series.clone(),
            faults: result.faults.clone(),
        }
    }
}

/// r_t = NAV_t / NAV_{t-1} − 1; zero where the previous NAV is not positive.
pub fn step_returns(navs: &[f64]) -> Vec<f64> {
    navs.windows(2)
        .map(|w| {
            let prev = w[0];
            let curr = w[1];
            if prev > 0.0 { curr / prev - 1.0 } else { 0.0 }
        })
        .collect()
}

/// Mean over sample standard deviation. `None` with fewer than two returns
/// or no variance.
pub fn sharpe_ratio(returns: &[f64]) -> Option<f64> {
    if returns.len() < 2 {
        return None;
    }

    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1.0);
    let stddev = variance.sqrt();

    if !stddev.is_finite() || stddev < MIN_STDDEV {
        return None;
    }
    let sharpe = mean / stddev;
    sharpe.is_finite().then_some(sharpe)
}

/// Largest peak-to-trough fall as a fraction of the peak.
pub fn max_drawdown(navs: &[f64]) -> f64 {
    let Some(&first) = navs.first() else {
        return 0.0;
    };

    let mut peak = first;
    let mut max_dd = 0.0_f64;

    for &nav in navs {
        if nav > peak {
            peak = nav;
        } else if peak > 0.0 {
            let dd = (peak - nav) / peak;
            if dd > max_dd {
                max_dd = dd;
            }
        }
    }

    max_dd
}
