//! Portfolio state and the per-step trading ledger.
//!
//! [`Portfolio`] owns cash and the position book for one run. Strategies never
//! see it directly: each step they get a [`Ledger`], which pairs the portfolio
//! with that step's [`MarketView`] and is the only way to trade. Every trade
//! is checked against the leverage limit on the projected post-trade state and
//! either commits completely or leaves the portfolio untouched.

use std::collections::BTreeMap;

use super::market::MarketView;

pub const DEFAULT_LEVERAGE_LIMIT: f64 = 10.0;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RejectReason {
    #[error("invalid quantity {0}")]
    InvalidQuantity(f64),

    #[error("no price for {0} this step")]
    NoPrice(String),

    #[error("projected leverage {projected:.4} exceeds limit {limit:.2}")]
    LeverageExceeded { projected: f64, limit: f64 },
}

/// Outcome of a buy or sell call.
#[derive(Debug, Clone, PartialEq)]
pub enum TradeResult {
    Filled {
        product: String,
        /// Signed: positive bought, negative sold.
        quantity: f64,
        price: f64,
        cash_after: f64,
    },
    Rejected(RejectReason),
}

impl TradeResult {
    pub fn is_filled(&self) -> bool {
        matches!(self, TradeResult::Filled { .. })
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, TradeResult::Rejected(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Portfolio {
    cash: f64,
    initial_cash: f64,
    leverage_limit: f64,
    positions: BTreeMap<String, f64>,
    trade_count: usize,
    rejected_count: usize,
}

/// Valuation of a hypothetical portfolio state.
#[derive(Debug, Clone, Copy)]
struct Projection {
    cash: f64,
    nav: f64,
    gross: f64,
}

impl Portfolio {
    pub fn new(initial_cash: f64, leverage_limit: f64) -> Self {
        Portfolio {
            cash: initial_cash,
            initial_cash,
            leverage_limit,
            positions: BTreeMap::new(),
            trade_count: 0,
            rejected_count: 0,
        }
    }

    pub fn cash(&self) -> f64 {
        self.cash
    }

    pub fn initial_cash(&self) -> f64 {
        self.initial_cash
    }

    pub fn leverage_limit(&self) -> f64 {
        self.leverage_limit
    }

    pub fn positions(&self) -> &BTreeMap<String, f64> {
        &self.positions
    }

    /// Signed quantity held, zero when flat.
    pub fn position(&self, product: &str) -> f64 {
        self.positions.get(product).copied().unwrap_or(0.0)
    }

    pub fn trade_count(&self) -> usize {
        self.trade_count
    }

    pub fn rejected_count(&self) -> usize {
        self.rejected_count
    }

    /// cash + Σ(quantity × mark)
    pub fn net_asset_value(&self, market: &MarketView<'_>) -> f64 {
        let position_value: f64 = self
            .positions
            .iter()
            .filter_map(|(product, &qty)| market.mark(product).map(|price| qty * price))
            .sum();
        self.cash + position_value
    }

    /// Σ|quantity × mark|
    pub fn gross_exposure(&self, market: &MarketView<'_>) -> f64 {
        self.positions
            .iter()
            .filter_map(|(product, &qty)| market.mark(product).map(|price| (qty * price).abs()))
            .sum()
    }

    /// Gross exposure over NAV; infinite when NAV is not positive.
    pub fn leverage(&self, market: &MarketView<'_>) -> f64 {
        leverage_of(
            self.gross_exposure(market),
            self.net_asset_value(market),
        )
    }

    fn project(&self, market: &MarketView<'_>, product: &str, delta: f64, price: f64) -> Projection {
        let cash = self.cash - delta * price;
        let mut nav = cash;
        let mut gross = 0.0;
        let mut traded_seen = false;

        for (held, &qty) in &self.positions {
            let (qty, px) = if held == product {
                traded_seen = true;
                (qty + delta, price)
            } else {
                match market.mark(held) {
                    Some(px) => (qty, px),
                    None => continue,
                }
            };
            nav += qty * px;
            gross += (qty * px).abs();
        }
        if !traded_seen {
            nav += delta * price;
            gross += (delta * price).abs();
        }

        Projection { cash, nav, gross }
    }

    fn execute(&mut self, market: &MarketView<'_>, product: &str, delta: f64) -> TradeResult {
        let Some(price) = market.price(product) else {
            return self.reject(market, product, RejectReason::NoPrice(product.to_string()));
        };

        if delta == 0.0 {
            return TradeResult::Filled {
                product: product.to_string(),
                quantity: 0.0,
                price,
                cash_after: self.cash,
            };
        }

        let projected = self.project(market, product, delta, price);
        let projected_leverage = leverage_of(projected.gross, projected.nav);
        if !(projected_leverage <= self.leverage_limit) {
            return self.reject(
                market,
                product,
                RejectReason::LeverageExceeded {
                    projected: projected_leverage,
                    limit: self.leverage_limit,
                },
            );
        }

        self.cash = projected.cash;
        let qty = self.positions.entry(product.to_string()).or_insert(0.0);
        *qty += delta;
        if *qty == 0.0 {
            self.positions.remove(product);
        }
        self.trade_count += 1;

        tracing::debug!(
            step = market.step(),
            timestep = %market.timestep(),
            "{} {} {} @ {} | cash={:.2}",
            if delta > 0.0 { "BOUGHT" } else { "SOLD" },
            delta.abs(),
            product,
            price,
            self.cash
        );

        TradeResult::Filled {
            product: product.to_string(),
            quantity: delta,
            price,
            cash_after: self.cash,
        }
    }

    fn reject(&mut self, market: &MarketView<'_>, product: &str, reason: RejectReason) -> TradeResult {
        self.rejected_count += 1;
        tracing::debug!(
            step = market.step(),
            timestep = %market.timestep(),
            product,
            "trade rejected: {reason}"
        );
        TradeResult::Rejected(reason)
    }
}

fn leverage_of(gross: f64, nav: f64) -> f64 {
    if nav <= 0.0 || !nav.is_finite() {
        return f64::INFINITY;
    }
    gross / nav
}

/// Trading handle scoped to one step of one run.
pub struct Ledger<'a, 'm> {
    portfolio: &'a mut Portfolio,
    market: &'a MarketView<'m>,
}

impl<'a, 'm> Ledger<'a, 'm> {
    pub fn new(portfolio: &'a mut Portfolio, market: &'a MarketView<'m>) -> Self {
        Ledger { portfolio, market }
    }

    /// The view this ledger prices trades against.
    pub fn market(&self) -> &'a MarketView<'m> {
        self.market
    }

    pub fn buy(&mut self, product: &str, quantity: f64) -> TradeResult {
        self.trade(product, quantity, 1.0)
    }

    /// Equivalent to a buy of the negated quantity; shorting is allowed.
    pub fn sell(&mut self, product: &str, quantity: f64) -> TradeResult {
        self.trade(product, quantity, -1.0)
    }

    fn trade(&mut self, product: &str, quantity: f64, sign: f64) -> TradeResult {
        if !quantity.is_finite() || quantity < 0.0 {
            return self
                .portfolio
                .reject(self.market, product, RejectReason::InvalidQuantity(quantity));
        }
        self.portfolio.execute(self.market, product, sign * quantity)
    }

    pub fn cash(&self) -> f64 {
        self.portfolio.cash()
    }

    pub fn positions(&self) -> &BTreeMap<String, f64> {
        self.portfolio.positions()
    }

    pub fn position(&self, product: &str) -> f64 {
        self.portfolio.position(product)
    }

    pub fn net_asset_value(&self) -> f64 {
        self.portfolio.net_asset_value(self.market)
    }

    pub fn gross_exposure(&self) -> f64 {
        self.portfolio.gross_exposure(self.market)
    }

    pub fn leverage(&self) -> f64 {
        self.portfolio.leverage(self.market)
    }

    pub fn leverage_limit(&self) -> f64 {
        self.portfolio.leverage_limit()
    }
}
