use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the data layer.
#[derive(Error, Debug)]
pub enum DataError {
    /// Invalid inputs or an operation applied to the wrong kind of data.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The file header does not carry the expected columns.
    #[error("format error in {}: {message}", path.display())]
    Format { path: PathBuf, message: String },

    /// Degenerate input to a numerical routine (fit, derivative, extraction).
    #[error("numerical error: {0}")]
    Numerical(String),

    /// The series-resistance fit window does not fit around the zero-current sample.
    #[error("fit window of ±{window} samples around index {center} exceeds trace length {len}")]
    WindowOutOfRange {
        center: usize,
        window: usize,
        len: usize,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DataError {
    pub(crate) fn format(path: &std::path::Path, message: impl Into<String>) -> Self {
        DataError::Format {
            path: path.to_path_buf(),
            message: message.into(),
        }
    }
}

/// Result type for data-layer operations.
pub type Result<T> = std::result::Result<T, DataError>;
