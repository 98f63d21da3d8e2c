//! CSV file quote source.
//!
//! Two layouts are accepted, chosen from the header row:
//! - long: `timestep|timestamp`, `product|product_id`, `price|mid_price`
//! - wide: `timestep|timestamp` plus one price column per product
//!
//! Empty and `NaN` price cells mean "no quote". Anything else that does not
//! parse is a data format error carrying the line number.

use crate::domain::error::QuotevalError;
use crate::domain::quote::{QuoteRow, Timestep};
use crate::ports::data_port::{QuoteRows, QuoteSource};
use csv::{StringRecord, StringRecordsIntoIter, Trim};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::vec;

const TIMESTEP_COLUMNS: &[&str] = &["timestep", "timestamp"];
const PRODUCT_COLUMNS: &[&str] = &["product", "product_id"];
const PRICE_COLUMNS: &[&str] = &["price", "mid_price"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuoteLayout {
    Long {
        timestep: usize,
        product: usize,
        price: usize,
    },
    Wide {
        timestep: usize,
        products: Vec<(usize, String)>,
    },
}

impl QuoteLayout {
    pub fn detect(headers: &StringRecord) -> Result<Self, QuotevalError> {
        let timestep = find_column(headers, TIMESTEP_COLUMNS).ok_or_else(|| {
            QuotevalError::data_format("missing timestep column (timestep or timestamp)")
        })?;

        if let Some(product) = find_column(headers, PRODUCT_COLUMNS) {
            let price = find_column(headers, PRICE_COLUMNS).ok_or_else(|| {
                QuotevalError::data_format("missing price column (price or mid_price)")
            })?;
            return Ok(QuoteLayout::Long {
                timestep,
                product,
                price,
            });
        }

        let mut products = Vec::new();
        for (idx, name) in headers.iter().enumerate() {
            if idx == timestep {
                continue;
            }
            if name.is_empty() {
                return Err(QuotevalError::data_format(format!(
                    "column {} has an empty header",
                    idx + 1
                )));
            }
            if products.iter().any(|(_, p)| p == name) {
                return Err(QuotevalError::data_format(format!(
                    "duplicate product column {name}"
                )));
            }
            products.push((idx, name.to_string()));
        }
        if products.is_empty() {
            return Err(QuotevalError::data_format("no product columns"));
        }
        Ok(QuoteLayout::Wide { timestep, products })
    }

    pub fn name(&self) -> &'static str {
        match self {
            QuoteLayout::Long { .. } => "long",
            QuoteLayout::Wide { .. } => "wide",
        }
    }
}

fn find_column(headers: &StringRecord, aliases: &[&str]) -> Option<usize> {
    aliases.iter().find_map(|alias| {
        headers
            .iter()
            .position(|h| h.eq_ignore_ascii_case(alias))
    })
}

/// `None` for an empty or NaN cell.
fn parse_price(cell: &str, line: u64) -> Result<Option<f64>, QuotevalError> {
    if cell.is_empty() || cell.eq_ignore_ascii_case("nan") {
        return Ok(None);
    }
    cell.parse::<f64>()
        .map(Some)
        .map_err(|_| QuotevalError::data_format(format!("line {line}: invalid price {cell:?}")))
}

fn parse_timestep(cell: &str, line: u64) -> Result<Timestep, QuotevalError> {
    Timestep::parse(cell).ok_or_else(|| {
        QuotevalError::data_format(format!("line {line}: invalid timestep {cell:?}"))
    })
}

fn field<'r>(record: &'r StringRecord, idx: usize, line: u64) -> Result<&'r str, QuotevalError> {
    record
        .get(idx)
        .ok_or_else(|| QuotevalError::data_format(format!("line {line}: missing column {}", idx + 1)))
}

pub struct CsvQuoteSource {
    path: PathBuf,
}

impl CsvQuoteSource {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open(&self) -> Result<(csv::Reader<File>, QuoteLayout), QuotevalError> {
        let file = File::open(&self.path)?;
        let mut reader = csv::ReaderBuilder::new()
            .trim(Trim::All)
            .from_reader(file);
        let headers = reader
            .headers()
            .map_err(|e| {
                QuotevalError::data_format(format!("{}: {e}", self.path.display()))
            })?
            .clone();
        let layout = QuoteLayout::detect(&headers).map_err(|e| match e {
            QuotevalError::DataFormat { reason } => {
                QuotevalError::data_format(format!("{}: {reason}", self.path.display()))
            }
            other => other,
        })?;
        Ok((reader, layout))
    }

    /// Header-only peek at the layout.
    pub fn layout(&self) -> Result<QuoteLayout, QuotevalError> {
        self.open().map(|(_, layout)| layout)
    }
}

impl QuoteSource for CsvQuoteSource {
    fn rows(&self) -> Result<QuoteRows<'_>, QuotevalError> {
        let (reader, layout) = self.open()?;
        tracing::debug!(path = %self.path.display(), layout = layout.name(), "reading quotes");
        Ok(Box::new(CsvRows {
            records: reader.into_records(),
            layout,
            last: None,
            pending: Vec::new().into_iter(),
            done: false,
        }))
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

struct CsvRows {
    records: StringRecordsIntoIter<File>,
    layout: QuoteLayout,
    /// Timestep of the previous record, including records with no quotes.
    last: Option<Timestep>,
    pending: vec::IntoIter<QuoteRow>,
    done: bool,
}

impl CsvRows {
    /// Long rows may repeat the previous timestep; wide rows are one step each.
    fn check_order(&mut self, ts: Timestep, line: u64) -> Result<(), QuotevalError> {
        if let Some(last) = self.last {
            let repeats_allowed = matches!(self.layout, QuoteLayout::Long { .. });
            if ts < last || (ts == last && !repeats_allowed) {
                return Err(QuotevalError::data_format(format!(
                    "line {line}: non-monotonic timestep {ts} after {last}"
                )));
            }
        }
        self.last = Some(ts);
        Ok(())
    }

    fn decode(&mut self, record: &StringRecord) -> Result<Vec<QuoteRow>, QuotevalError> {
        let line = record.position().map_or(0, |p| p.line());
        let ts_column = match &self.layout {
            QuoteLayout::Long { timestep, .. } | QuoteLayout::Wide { timestep, .. } => *timestep,
        };
        let ts = parse_timestep(field(record, ts_column, line)?, line)?;
        self.check_order(ts, line)?;

        match &self.layout {
            QuoteLayout::Long { product, price, .. } => {
                let product = field(record, *product, line)?;
                if product.is_empty() {
                    return Err(QuotevalError::data_format(format!("line {line}: empty product")));
                }
                Ok(parse_price(field(record, *price, line)?, line)?
                    .map(|price| QuoteRow {
                        timestep: ts,
                        product: product.to_string(),
                        price,
                    })
                    .into_iter()
                    .collect())
            }
            QuoteLayout::Wide { products, .. } => {
                let mut rows = Vec::with_capacity(products.len());
                for (idx, product) in products {
                    let cell = record.get(*idx).unwrap_or("");
                    if let Some(price) = parse_price(cell, line)? {
                        rows.push(QuoteRow {
                            timestep: ts,
                            product: product.clone(),
                            price,
                        });
                    }
                }
                Ok(rows)
            }
        }
    }
}

impl Iterator for CsvRows {
    type Item = Result<QuoteRow, QuotevalError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(row) = self.pending.next() {
                return Some(Ok(row));
            }
            if self.done {
                return None;
            }
            let record = match self.records.next() {
                None => {
                    self.done = true;
                    return None;
                }
                Some(Err(e)) => {
                    self.done = true;
                    return Some(Err(QuotevalError::data_format(format!("CSV parse error: {e}"))));
                }
                Some(Ok(record)) => record,
            };
            match self.decode(&record) {
                Ok(rows) => self.pending = rows.into_iter(),
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
    }
}
