//! Dataset loading for the exploration server

pub mod config;
pub mod sources;

use arrow::error::ArrowError;
use thiserror::Error;
use tokio::task::JoinError;

// Re-exports
pub use config::{DatasetConfig, FieldSelection, NullConfig};
pub use sources::CsvSource;

/// Errors that can occur while loading a dataset
#[derive(Error, Debug)]
pub enum DataError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Arrow error: {0}")]
    Arrow(#[from] ArrowError),

    #[error("CSV parsing error: {0}")]
    Csv(String),

    #[error("column '{0}' not found in dataset")]
    MissingColumn(String),

    #[error("column '{column}' row {row}: '{value}' is not a number")]
    NonNumeric {
        column: String,
        row: usize,
        value: String,
    },

    #[error("column '{0}' appears more than once")]
    DuplicateColumn(String),

    #[error("dataset has no numeric columns")]
    NoNumericColumns,

    #[error("delimiter '{0}' must be a single ASCII character")]
    InvalidDelimiter(char),

    #[error("Join error: {0}")]
    Join(#[from] JoinError),
}

impl From<csv::Error> for DataError {
    fn from(error: csv::Error) -> Self {
        match error.kind() {
            csv::ErrorKind::Io(io_err) => DataError::Io(std::io::Error::new(io_err.kind(), error.to_string())),
            _ => DataError::Csv(error.to_string()),
        }
    }
}
