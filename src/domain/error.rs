//! Domain error types.
//!
//! Only the fatal kinds live here. Per-step strategy faults are recorded by
//! [`crate::domain::runner`] and trade rejections are plain values returned
//! by the ledger.

/// Top-level error type for quoteval.
#[derive(Debug, thiserror::Error)]
pub enum QuotevalError {
    #[error("data format error: {reason}")]
    DataFormat { reason: String },

    #[error("strategy construction failed: {reason}")]
    Construction { reason: String },

    #[error("unknown strategy: {name}")]
    UnknownStrategy { name: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("report error: {reason}")]
    Report { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl QuotevalError {
    pub fn data_format(reason: impl Into<String>) -> Self {
        QuotevalError::DataFormat {
            reason: reason.into(),
        }
    }
}

impl From<&QuotevalError> for std::process::ExitCode {
    fn from(err: &QuotevalError) -> Self {
        let code: u8 = match err {
            QuotevalError::Io(_) | QuotevalError::Report { .. } => 1,
            QuotevalError::ConfigParse { .. }
            | QuotevalError::ConfigMissing { .. }
            | QuotevalError::ConfigInvalid { .. } => 2,
            QuotevalError::DataFormat { .. } => 3,
            QuotevalError::Construction { .. } | QuotevalError::UnknownStrategy { .. } => 4,
        };
        std::process::ExitCode::from(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_data_format() {
        let err = QuotevalError::data_format("missing column 'price'");
        assert_eq!(err.to_string(), "data format error: missing column 'price'");
    }

    #[test]
    fn display_config_invalid() {
        let err = QuotevalError::ConfigInvalid {
            section: "evaluation".into(),
            key: "initial_cash".into(),
            reason: "must be positive".into(),
        };
        assert_eq!(
            err.to_string(),
            "invalid config value [evaluation] initial_cash: must be positive"
        );
    }

    #[test]
    fn exit_codes_by_kind() {
        let code = |e: &QuotevalError| format!("{:?}", std::process::ExitCode::from(e));
        assert_eq!(
            code(&QuotevalError::data_format("x")),
            format!("{:?}", std::process::ExitCode::from(3))
        );
        assert_eq!(
            code(&QuotevalError::Construction {
                reason: "boom".into()
            }),
            format!("{:?}", std::process::ExitCode::from(4))
        );
        assert_eq!(
            code(&QuotevalError::Report {
                reason: "disk full".into()
            }),
            format!("{:?}", std::process::ExitCode::from(1))
        );
    }

    #[test]
    fn io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "nope");
        let err: QuotevalError = io.into();
        assert!(matches!(err, QuotevalError::Io(_)));
    }
}
