//! Dataset configuration: which columns become fields, and how to parse them

use std::path::PathBuf;
use serde::{Serialize, Deserialize};

use super::null_handling::NullConfig;
use crate::DataError;

/// One column to expose as a field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSelection {
    /// Column name in the file
    pub name: String,

    /// Display label; the column name when absent
    #[serde(default)]
    pub label: Option<String>,
}

impl FieldSelection {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label: None,
        }
    }

    pub fn label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.name)
    }
}

/// Configuration for the dataset file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    /// Path to the file
    pub path: PathBuf,

    /// Fields in registration order. Empty means every numeric column.
    pub fields: Vec<FieldSelection>,

    /// Whether the first row holds column names
    pub has_headers: bool,

    /// Field delimiter
    pub delimiter: char,

    /// Rows inspected to decide which columns are numeric
    pub sample_size: usize,

    /// Null handling configuration
    pub null_config: NullConfig,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::new(),
            fields: Vec::new(),
            has_headers: true,
            delimiter: ',',
            sample_size: 1000,
            null_config: NullConfig::default(),
        }
    }
}

impl DatasetConfig {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            ..Self::default()
        }
    }

    /// Restrict the dataset to the given columns, in order
    pub fn with_fields<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = names.into_iter().map(FieldSelection::new).collect();
        self
    }

    /// Delimiter as the byte the CSV reader expects
    pub fn delimiter_byte(&self) -> Result<u8, DataError> {
        if self.delimiter.is_ascii() {
            Ok(self.delimiter as u8)
        } else {
            Err(DataError::InvalidDelimiter(self.delimiter))
        }
    }

    /// Get the file name
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown")
            .to_string()
    }
}
