//! Error type shared by ingestion, configuration and reporting.
//!
//! Malformed rows are not errors: they are excluded during cleaning and
//! counted in the ingestion summary. Everything here aborts the run.

use std::path::PathBuf;
use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, AnalysisError>;

#[derive(Error, Debug)]
pub enum AnalysisError {
    /// File system failure while reading inputs or writing reports
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// CSV decoding or encoding failure
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON decoding or encoding failure
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration file could not be parsed
    #[error("config error: {0}")]
    Toml(#[from] toml::de::Error),

    /// A source lacks columns every rental needs
    #[error("{source_name} is missing required columns: {}", missing.join(", "))]
    MissingColumns {
        source_name: String,
        missing: Vec<String>,
    },

    /// Buffers are minimum gaps: non-negative and at most one year
    #[error("invalid buffer: {0} minutes (buffers must be between 0 and 525600)")]
    InvalidBuffer(i64),

    /// Any other rejected configuration knob
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The input path contained nothing we can read
    #[error("no rental tables found under {0} (supported: csv, json)")]
    NoInput(PathBuf),
}

impl AnalysisError {
    /// Wrap an `io::Error` with the path it happened on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// True for errors caused by user-supplied settings rather than data.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            Self::InvalidBuffer(_) | Self::InvalidConfig(_) | Self::Toml(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_columns_message_lists_columns() {
        let err = AnalysisError::MissingColumns {
            source_name: "rentals.csv".to_string(),
            missing: vec!["vehicle_id".to_string(), "status".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("rentals.csv"));
        assert!(msg.contains("vehicle_id, status"), "got: {}", msg);
    }

    #[test]
    fn test_config_errors_are_classified() {
        assert!(AnalysisError::InvalidBuffer(-5).is_config());
        assert!(AnalysisError::config("empty sweep").is_config());
        assert!(!AnalysisError::NoInput(PathBuf::from("/tmp")).is_config());
    }

    #[test]
    fn test_invalid_buffer_message() {
        let err = AnalysisError::InvalidBuffer(-15);
        assert_eq!(
            err.to_string(),
            "invalid buffer: -15 minutes (buffers must be between 0 and 525600)"
        );
    }
}
