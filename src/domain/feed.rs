//! Quote feed: groups source rows into per-timestep snapshots.
//!
//! The feed is a lazy, single-pass iterator. Rows sharing a timestep are
//! merged into one [`QuoteSnapshot`]; the next snapshot must carry a strictly
//! later timestep. Any malformed input ends the feed with a
//! [`QuotevalError::DataFormat`].

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::iter::Peekable;

use super::error::QuotevalError;
use super::quote::{QuoteRow, QuoteSnapshot, Timestep};
use super::universe::Universe;
use crate::ports::data_port::{QuoteRows, QuoteSource};

pub struct QuoteFeed<I>
where
    I: Iterator<Item = Result<QuoteRow, QuotevalError>>,
{
    rows: Peekable<I>,
    universe: Option<Universe>,
    last: Option<Timestep>,
    step: usize,
    done: bool,
}

impl<I> QuoteFeed<I>
where
    I: Iterator<Item = Result<QuoteRow, QuotevalError>>,
{
    pub fn new(rows: I) -> Self {
        QuoteFeed {
            rows: rows.peekable(),
            universe: None,
            last: None,
            step: 0,
            done: false,
        }
    }

    /// Reject rows whose product is outside `universe`.
    pub fn with_universe(mut self, universe: Universe) -> Self {
        self.universe = Some(universe);
        self
    }

    fn fail(&mut self, err: QuotevalError) -> Option<Result<QuoteSnapshot, QuotevalError>> {
        self.done = true;
        Some(Err(err))
    }

    fn check_row(&self, row: &QuoteRow, prices: &BTreeMap<String, f64>) -> Result<(), QuotevalError> {
        if !row.price.is_finite() {
            return Err(QuotevalError::data_format(format!(
                "non-finite price for {} at timestep {}",
                row.product, row.timestep
            )));
        }
        if row.price <= 0.0 {
            return Err(QuotevalError::data_format(format!(
                "non-positive price {} for {} at timestep {}",
                row.price, row.product, row.timestep
            )));
        }
        if let Some(universe) = &self.universe {
            if !universe.contains(&row.product) {
                return Err(QuotevalError::data_format(format!(
                    "product {} at timestep {} is not in the universe",
                    row.product, row.timestep
                )));
            }
        }
        if prices.contains_key(&row.product) {
            return Err(QuotevalError::data_format(format!(
                "duplicate quote for {} at timestep {}",
                row.product, row.timestep
            )));
        }
        Ok(())
    }
}

impl<I> Iterator for QuoteFeed<I>
where
    I: Iterator<Item = Result<QuoteRow, QuotevalError>>,
{
    type Item = Result<QuoteSnapshot, QuotevalError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let first = match self.rows.next() {
            None => {
                self.done = true;
                return None;
            }
            Some(Err(e)) => return self.fail(e),
            Some(Ok(row)) => row,
        };

        let timestep = first.timestep;
        if let Some(last) = self.last {
            if timestep <= last {
                return self.fail(QuotevalError::data_format(format!(
                    "non-monotonic timestep {timestep} after {last}"
                )));
            }
        }

        let mut prices = BTreeMap::new();
        if let Err(e) = self.check_row(&first, &prices) {
            return self.fail(e);
        }
        prices.insert(first.product, first.price);

        loop {
            let same_step = match self.rows.peek() {
                Some(Ok(next)) => next.timestep == timestep,
                Some(Err(_)) => true,
                None => false,
            };
            if !same_step {
                break;
            }
            match self.rows.next() {
                Some(Ok(row)) => {
                    if let Err(e) = self.check_row(&row, &prices) {
                        return self.fail(e);
                    }
                    prices.insert(row.product, row.price);
                }
                Some(Err(e)) => return self.fail(e),
                None => break,
            }
        }

        let snapshot = QuoteSnapshot {
            step: self.step,
            timestep,
            prices,
        };
        self.last = Some(timestep);
        self.step += 1;
        Some(Ok(snapshot))
    }
}

/// Result of a validation pass over a quote source.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedSummary {
    pub universe: Universe,
    pub steps: usize,
    pub first: Timestep,
    pub last: Timestep,
}

/// Run the whole source through an unconstrained feed, collecting the
/// universe and step count. Surfaces every data format error up front.
pub fn scan(source: &dyn QuoteSource) -> Result<FeedSummary, QuotevalError> {
    let mut products = BTreeSet::new();
    let mut steps = 0usize;
    let mut first = None;
    let mut last = None;

    for snapshot in QuoteFeed::new(source.rows()?) {
        let snapshot = snapshot?;
        if first.is_none() {
            first = Some(snapshot.timestep);
        }
        last = Some(snapshot.timestep);
        for product in snapshot.prices.keys() {
            if !products.contains(product) {
                products.insert(product.clone());
            }
        }
        steps += 1;
    }

    match (first, last) {
        (Some(first), Some(last)) => Ok(FeedSummary {
            universe: Universe::new(products),
            steps,
            first,
            last,
        }),
        _ => Err(QuotevalError::data_format(format!(
            "{} contains no quotes",
            source.describe()
        ))),
    }
}

/// Open the feed an evaluation run consumes.
pub fn open<'a>(
    source: &'a dyn QuoteSource,
    universe: &Universe,
) -> Result<QuoteFeed<QuoteRows<'a>>, QuotevalError> {
    Ok(QuoteFeed::new(source.rows()?).with_universe(universe.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(data: &[(i64, &str, f64)]) -> Vec<Result<QuoteRow, QuotevalError>> {
        data.iter()
            .map(|&(ts, p, price)| Ok(QuoteRow::new(ts, p, price)))
            .collect()
    }

    struct VecSource(Vec<(i64, &'static str, f64)>);

    impl QuoteSource for VecSource {
        fn rows(&self) -> Result<QuoteRows<'_>, QuotevalError> {
            Ok(Box::new(
                self.0
                    .iter()
                    .map(|&(ts, p, price)| Ok(QuoteRow::new(ts, p, price))),
            ))
        }
    }

    #[test]
    fn groups_rows_by_timestep() {
        let feed = QuoteFeed::new(rows(&[(1, "A", 10.0), (1, "B", 5.0), (2, "A", 11.0)]).into_iter());
        let snaps: Vec<_> = feed.map(Result::unwrap).collect();

        assert_eq!(snaps.len(), 2);
        assert_eq!(snaps[0].step, 0);
        assert_eq!(snaps[0].timestep, Timestep(1));
        assert_eq!(snaps[0].len(), 2);
        assert_eq!(snaps[1].step, 1);
        assert_eq!(snaps[1].price("A"), Some(11.0));
        assert_eq!(snaps[1].price("B"), None);
    }

    #[test]
    fn rejects_non_monotonic_timesteps() {
        let mut feed = QuoteFeed::new(rows(&[(2, "A", 10.0), (1, "A", 11.0)]).into_iter());
        assert!(feed.next().unwrap().is_ok());
        let err = feed.next().unwrap().unwrap_err();
        assert!(matches!(err, QuotevalError::DataFormat { .. }));
        assert!(feed.next().is_none());
    }

    #[test]
    fn rejects_repeated_timestep_after_gap() {
        let feed = QuoteFeed::new(
            rows(&[(1, "A", 10.0), (2, "A", 11.0), (1, "B", 3.0)]).into_iter(),
        );
        let results: Vec<_> = feed.collect();
        assert_eq!(results.len(), 3);
        assert!(results[2].is_err());
    }

    #[test]
    fn rejects_duplicate_product_in_step() {
        let mut feed = QuoteFeed::new(rows(&[(1, "A", 10.0), (1, "A", 10.5)]).into_iter());
        assert!(matches!(
            feed.next(),
            Some(Err(QuotevalError::DataFormat { .. }))
        ));
    }

    #[test]
    fn rejects_zero_and_negative_prices() {
        for price in [0.0, -3.5] {
            let mut feed = QuoteFeed::new(rows(&[(1, "A", 10.0), (2, "A", price)]).into_iter());
            assert!(feed.next().unwrap().is_ok());
            match feed.next() {
                Some(Err(QuotevalError::DataFormat { reason })) => {
                    assert!(reason.contains("non-positive"), "{reason}")
                }
                other => panic!("expected a data format error, got {other:?}"),
            }
        }
    }

    #[test]
    fn rejects_products_outside_universe() {
        let mut feed = QuoteFeed::new(rows(&[(1, "A", 10.0), (1, "Z", 1.0)]).into_iter())
            .with_universe(Universe::new(["A"]));
        assert!(feed.next().unwrap().is_err());
    }

    #[test]
    fn propagates_row_errors_and_stops() {
        let data = vec![
            Ok(QuoteRow::new(1, "A", 10.0)),
            Err(QuotevalError::data_format("line 3: bad price")),
            Ok(QuoteRow::new(2, "A", 11.0)),
        ];
        let results: Vec<_> = QuoteFeed::new(data.into_iter()).collect();
        assert_eq!(results.len(), 1);
        assert!(results[0].is_err());
    }

    #[test]
    fn scan_collects_universe_and_range() {
        let source = VecSource(vec![(5, "B", 1.0), (5, "A", 2.0), (9, "C", 3.0)]);
        let summary = scan(&source).unwrap();

        assert_eq!(summary.universe.products(), ["A", "B", "C"]);
        assert_eq!(summary.steps, 2);
        assert_eq!(summary.first, Timestep(5));
        assert_eq!(summary.last, Timestep(9));
    }

    #[test]
    fn scan_empty_source_is_data_error() {
        let source = VecSource(vec![]);
        assert!(matches!(
            scan(&source),
            Err(QuotevalError::DataFormat { .. })
        ));
    }

    #[test]
    fn open_replays_from_start() {
        let source = VecSource(vec![(1, "A", 1.0), (2, "A", 2.0)]);
        let summary = scan(&source).unwrap();
        let steps: Vec<_> = open(&source, &summary.universe)
            .unwrap()
            .map(Result::unwrap)
            .collect();
        assert_eq!(steps.len(), summary.steps);
    }
}
