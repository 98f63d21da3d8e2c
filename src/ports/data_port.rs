//! Quote data access port trait.

use crate::domain::error::QuotevalError;
use crate::domain::quote::QuoteRow;

/// A single pass over a source's quote rows, in source order.
pub type QuoteRows<'a> = Box<dyn Iterator<Item = Result<QuoteRow, QuotevalError>> + 'a>;

pub trait QuoteSource {
    /// Opens a fresh pass over the rows. Each call starts from the beginning.
    fn rows(&self) -> Result<QuoteRows<'_>, QuotevalError>;

    /// Human-readable origin, for logs.
    fn describe(&self) -> String {
        "quote source".to_string()
    }
}
