//! Configuration validation.
//!
//! Validates config fields before anything is loaded or run. An absent key
//! takes its default; a present but unparsable one is an error.

use crate::domain::error::QuotevalError;
use crate::ports::config_port::ConfigPort;

pub const EVALUATION_SECTION: &str = "evaluation";

pub fn validate_eval_config(config: &dyn ConfigPort) -> Result<(), QuotevalError> {
    positive_double(config, EVALUATION_SECTION, "initial_cash", 100_000.0)?;
    positive_double(config, EVALUATION_SECTION, "leverage_limit", 10.0)?;
    positive_double(config, EVALUATION_SECTION, "periods_per_year", 252.0)?;
    Ok(())
}

/// A present, non-blank string value.
pub fn require_string(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<String, QuotevalError> {
    match config.get_string(section, key) {
        Some(s) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        _ => Err(QuotevalError::ConfigMissing {
            section: section.to_string(),
            key: key.to_string(),
        }),
    }
}

/// A finite number, or `default` when the key is absent.
pub fn optional_double(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: f64,
) -> Result<f64, QuotevalError> {
    let Some(raw) = config.get_string(section, key) else {
        return Ok(default);
    };
    match raw.trim().parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(QuotevalError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: format!("expected a number, got {:?}", raw.trim()),
        }),
    }
}

/// Like [`optional_double`] but the key must be present.
pub fn require_double(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<f64, QuotevalError> {
    require_string(config, section, key)?;
    optional_double(config, section, key, 0.0)
}

pub fn positive_double(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: f64,
) -> Result<f64, QuotevalError> {
    let value = optional_double(config, section, key, default)?;
    if value <= 0.0 {
        return Err(QuotevalError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: format!("{key} must be positive"),
        });
    }
    Ok(value)
}

/// A non-negative integer, or `default` when the key is absent.
pub fn optional_count(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: usize,
) -> Result<usize, QuotevalError> {
    let Some(raw) = config.get_string(section, key) else {
        return Ok(default);
    };
    raw.trim()
        .parse::<usize>()
        .map_err(|_| QuotevalError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: format!("expected a non-negative integer, got {:?}", raw.trim()),
        })
}
