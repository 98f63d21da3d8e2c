//! Report output port trait.

use std::path::Path;

use crate::domain::error::QuotevalError;
use crate::domain::metrics::ScoreReport;

/// Port for writing score reports.
pub trait ReportPort {
    fn write(&self, report: &ScoreReport, output_path: &Path) -> Result<(), QuotevalError>;
}
