//! Quote rows, timesteps and per-step snapshots.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Position of a snapshot on the evaluation clock.
///
/// Integer timesteps are used as-is; date-time stamps are converted to Unix
/// seconds so both orderings compare the same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Timestep(pub i64);

impl Timestep {
    pub fn parse(raw: &str) -> Option<Timestep> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        if let Ok(n) = raw.parse::<i64>() {
            return Some(Timestep(n));
        }
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(Timestep(dt.timestamp()));
        }
        for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
            if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
                return Some(Timestep(dt.and_utc().timestamp()));
            }
        }
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|dt| Timestep(dt.and_utc().timestamp()))
    }
}

impl fmt::Display for Timestep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One (timestep, product, price) observation from a quote source.
#[derive(Debug, Clone, PartialEq)]
pub struct QuoteRow {
    pub timestep: Timestep,
    pub product: String,
    pub price: f64,
}

impl QuoteRow {
    pub fn new(timestep: i64, product: &str, price: f64) -> Self {
        QuoteRow {
            timestep: Timestep(timestep),
            product: product.to_string(),
            price,
        }
    }
}

/// All quotes observed at a single timestep.
#[derive(Debug, Clone, PartialEq)]
pub struct QuoteSnapshot {
    /// Zero-based position in the feed.
    pub step: usize,
    pub timestep: Timestep,
    pub prices: BTreeMap<String, f64>,
}

impl QuoteSnapshot {
    pub fn price(&self, product: &str) -> Option<f64> {
        self.prices.get(product).copied()
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }
}
