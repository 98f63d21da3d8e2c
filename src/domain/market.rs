//! Read-only market view handed to strategies each step.

use std::collections::BTreeMap;

use super::quote::{QuoteSnapshot, Timestep};
use super::universe::Universe;

/// Last observed price per product, carried forward across steps.
///
/// Used for valuation only: a product that skips a step keeps its previous
/// mark, but cannot be traded until it is quoted again.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceMarks {
    marks: BTreeMap<String, f64>,
}

impl PriceMarks {
    pub fn apply(&mut self, snapshot: &QuoteSnapshot) {
        for (product, &price) in &snapshot.prices {
            match self.marks.get_mut(product) {
                Some(mark) => *mark = price,
                None => {
                    self.marks.insert(product.clone(), price);
                }
            }
        }
    }

    pub fn get(&self, product: &str) -> Option<f64> {
        self.marks.get(product).copied()
    }

    pub fn len(&self) -> usize {
        self.marks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.marks.is_empty()
    }
}

/// Immutable per-step facade over the universe and current quotes.
///
/// Holds only shared borrows, so nothing a strategy does through it can
/// reach simulation state.
#[derive(Debug, Clone, Copy)]
pub struct MarketView<'a> {
    universe: &'a Universe,
    snapshot: &'a QuoteSnapshot,
    marks: &'a PriceMarks,
}

impl<'a> MarketView<'a> {
    pub fn new(universe: &'a Universe, snapshot: &'a QuoteSnapshot, marks: &'a PriceMarks) -> Self {
        MarketView {
            universe,
            snapshot,
            marks,
        }
    }

    pub fn universe(&self) -> &'a Universe {
        self.universe
    }

    pub fn step(&self) -> usize {
        self.snapshot.step
    }

    pub fn timestep(&self) -> Timestep {
        self.snapshot.timestep
    }

    /// Price quoted this step, if any. Trades require one.
    pub fn price(&self, product: &str) -> Option<f64> {
        self.snapshot.price(product)
    }

    pub fn quotes(&self) -> &'a BTreeMap<String, f64> {
        &self.snapshot.prices
    }

    /// Valuation price: this step's quote, else the last carried mark.
    pub fn mark(&self, product: &str) -> Option<f64> {
        self.snapshot
            .price(product)
            .or_else(|| self.marks.get(product))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(step: usize, prices: &[(&str, f64)]) -> QuoteSnapshot {
        QuoteSnapshot {
            step,
            timestep: Timestep(step as i64),
            prices: prices.iter().map(|(p, v)| (p.to_string(), *v)).collect(),
        }
    }

    #[test]
    fn marks_carry_forward_missing_products() {
        let mut marks = PriceMarks::default();
        marks.apply(&snapshot(0, &[("A", 10.0), ("B", 5.0)]));
        marks.apply(&snapshot(1, &[("A", 11.0)]));

        assert_eq!(marks.get("A"), Some(11.0));
        assert_eq!(marks.get("B"), Some(5.0));
        assert_eq!(marks.len(), 2);
    }

    #[test]
    fn view_separates_quote_from_mark() {
        let universe = Universe::new(["A", "B"]);
        let mut marks = PriceMarks::default();
        marks.apply(&snapshot(0, &[("A", 10.0), ("B", 5.0)]));
        let current = snapshot(1, &[("A", 12.0)]);
        marks.apply(&current);

        let view = MarketView::new(&universe, &current, &marks);
        assert_eq!(view.step(), 1);
        assert_eq!(view.price("A"), Some(12.0));
        assert_eq!(view.price("B"), None);
        assert_eq!(view.mark("B"), Some(5.0));
        assert_eq!(view.mark("C"), None);
        assert_eq!(view.quotes().len(), 1);
        assert_eq!(view.universe().count(), 2);
    }
}
