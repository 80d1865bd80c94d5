use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use csv::{ReaderBuilder, StringRecord};
use lb_core::data::{ColumnData, DatasetLoader, Table};
use rayon::prelude::*;
use tracing::{debug, info};

use crate::config::{DatasetConfig, FieldSelection, NullConfig};
use crate::DataError;

/// A column picked for loading: position in the file plus field naming
struct SelectedColumn {
    index: usize,
    name: String,
    label: String,
}

/// CSV dataset loader producing float columns
pub struct CsvSource {
    config: DatasetConfig,
}

impl CsvSource {
    pub fn new(config: DatasetConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DatasetConfig {
        &self.config
    }

    /// Read and parse the whole file. Blocking.
    pub fn read_table(path: &Path, config: &DatasetConfig) -> Result<Table, DataError> {
        let file = File::open(path)?;
        let mut csv_reader = ReaderBuilder::new()
            .has_headers(config.has_headers)
            .delimiter(config.delimiter_byte()?)
            .from_reader(BufReader::new(file));

        let mut headers: Vec<String> = if config.has_headers {
            csv_reader.headers()?.iter().map(|h| h.trim().to_string()).collect()
        } else {
            Vec::new()
        };

        let records = csv_reader
            .records()
            .collect::<Result<Vec<StringRecord>, _>>()?;

        if !config.has_headers {
            let width = records.first().map(|r| r.len()).unwrap_or(0);
            headers = (0..width).map(|i| format!("column_{i}")).collect();
        }

        let selected = Self::select_columns(&headers, &records, config)?;
        if selected.is_empty() {
            return Err(DataError::NoNumericColumns);
        }
        for (i, column) in selected.iter().enumerate() {
            if selected[..i].iter().any(|c| c.name == column.name) {
                return Err(DataError::DuplicateColumn(column.name.clone()));
            }
        }
        debug!(
            columns = ?selected.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
            "Selected dataset columns"
        );

        // Row numbers in errors are 1-based file lines
        let first_line = if config.has_headers { 2 } else { 1 };
        let columns = selected
            .into_par_iter()
            .map(|column| Self::parse_column(&records, column, &config.null_config, first_line))
            .collect::<Result<Vec<_>, _>>()?;

        let table = Table::from_columns(columns)?;
        info!(
            rows = table.num_rows(),
            columns = table.num_columns(),
            "Parsed CSV dataset"
        );
        Ok(table)
    }

    /// Resolve the configured field list, or detect numeric columns when it is empty
    fn select_columns(
        headers: &[String],
        records: &[StringRecord],
        config: &DatasetConfig,
    ) -> Result<Vec<SelectedColumn>, DataError> {
        if !config.fields.is_empty() {
            return config
                .fields
                .iter()
                .map(|field: &FieldSelection| {
                    let index = headers
                        .iter()
                        .position(|h| h == &field.name)
                        .ok_or_else(|| DataError::MissingColumn(field.name.clone()))?;
                    Ok(SelectedColumn {
                        index,
                        name: field.name.clone(),
                        label: field.label().to_string(),
                    })
                })
                .collect();
        }

        let samples = &records[..records.len().min(config.sample_size)];
        Ok(headers
            .iter()
            .enumerate()
            .filter(|(idx, _)| Self::is_numeric_column(samples, *idx, &config.null_config))
            .map(|(index, name)| SelectedColumn {
                index,
                name: name.clone(),
                label: name.clone(),
            })
            .collect())
    }

    /// A column is numeric when every sampled non-null cell parses and at
    /// least one cell is not null
    fn is_numeric_column(samples: &[StringRecord], col_idx: usize, nulls: &NullConfig) -> bool {
        let mut seen_value = false;
        for row in samples {
            let value = row.get(col_idx).unwrap_or("");
            if nulls.is_null(value) {
                continue;
            }
            if value.trim().parse::<f64>().is_err() {
                return false;
            }
            seen_value = true;
        }
        seen_value
    }

    fn parse_column(
        records: &[StringRecord],
        column: SelectedColumn,
        nulls: &NullConfig,
        first_line: usize,
    ) -> Result<ColumnData, DataError> {
        let values = records
            .iter()
            .enumerate()
            .map(|(row, record)| {
                let raw = record.get(column.index).unwrap_or("");
                nulls.parse(raw).ok_or_else(|| DataError::NonNumeric {
                    column: column.name.clone(),
                    row: row + first_line,
                    value: raw.to_string(),
                })
            })
            .collect::<Result<Vec<f64>, _>>()?;

        Ok(ColumnData {
            name: column.name,
            label: column.label,
            values,
        })
    }
}

#[async_trait]
impl DatasetLoader for CsvSource {
    async fn load(&self, path: &Path) -> anyhow::Result<Table> {
        let path: PathBuf = path.to_path_buf();
        let config = self.config.clone();
        info!(path = %path.display(), "Loading CSV dataset");

        let table = tokio::task::spawn_blocking(move || Self::read_table(&path, &config))
            .await
            .map_err(DataError::from)??;
        Ok(table)
    }
}
