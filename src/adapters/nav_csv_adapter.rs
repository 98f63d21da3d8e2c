//! NAV series CSV adapter implementing ReportPort.

use std::fs;
use std::path::Path;

use crate::domain::error::QuotevalError;
use crate::domain::metrics::ScoreReport;
use crate::ports::report_port::ReportPort;

/// Writes one `step,timestep,nav` row per evaluation step.
pub struct NavCsvAdapter;

impl ReportPort for NavCsvAdapter {
    fn write(&self, report: &ScoreReport, output_path: &Path) -> Result<(), QuotevalError> {
        if let Some(parent) = output_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let csv_err = |e: csv::Error| QuotevalError::Report {
            reason: format!("failed to write {}: {e}", output_path.display()),
        };
        let mut writer = csv::Writer::from_path(output_path).map_err(csv_err)?;
        for point in &report.nav_series {
            writer.serialize(point).map_err(csv_err)?;
        }
        writer.flush()?;
        tracing::info!(path = %output_path.display(), rows = report.nav_series.len(), "NAV series written");
        Ok(())
    }
}
