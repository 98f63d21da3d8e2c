//! JSON score report adapter implementing ReportPort.

use std::fs;
use std::path::Path;

use crate::domain::error::QuotevalError;
use crate::domain::metrics::ScoreReport;
use crate::ports::report_port::ReportPort;

pub struct JsonReportAdapter;

impl JsonReportAdapter {
    pub fn render(report: &ScoreReport) -> Result<String, QuotevalError> {
        serde_json::to_string_pretty(report).map_err(|e| QuotevalError::Report {
            reason: format!("failed to serialise report: {e}"),
        })
    }
}

impl ReportPort for JsonReportAdapter {
    fn write(&self, report: &ScoreReport, output_path: &Path) -> Result<(), QuotevalError> {
        let json = Self::render(report)?;

        if let Some(parent) = output_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(output_path, json)?;
        tracing::info!(path = %output_path.display(), "report written");
        Ok(())
    }
}
