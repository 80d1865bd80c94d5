//! Columnar dataset shared by the session and the engine

use std::path::Path;
use std::sync::Arc;

use arrow::array::{ArrayRef, AsArray, Float64Array};
use arrow::datatypes::{DataType, Field as ArrowField, Float64Type, Schema};
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;

use crate::field::Extent;

/// Trait for dataset loaders
#[async_trait::async_trait]
pub trait DatasetLoader: Send + Sync {
    /// Parse the source at `path` into a table of float columns
    async fn load(&self, path: &Path) -> anyhow::Result<Table>;
}

/// One parsed column, before it is packed into a [`Table`]
#[derive(Debug, Clone)]
pub struct ColumnData {
    pub name: String,
    pub label: String,
    /// Missing cells are NaN
    pub values: Vec<f64>,
}

/// Float columns with labels and precomputed extents
#[derive(Debug, Clone)]
pub struct Table {
    batch: RecordBatch,
    labels: Vec<String>,
    extents: Vec<Option<Extent>>,
}

impl Table {
    pub fn from_columns(columns: Vec<ColumnData>) -> Result<Self, ArrowError> {
        let mut fields = Vec::with_capacity(columns.len());
        let mut arrays: Vec<ArrayRef> = Vec::with_capacity(columns.len());
        let mut labels = Vec::with_capacity(columns.len());
        let mut extents = Vec::with_capacity(columns.len());

        for column in columns {
            extents.push(column.values.iter().copied().fold(None, Extent::include));
            fields.push(ArrowField::new(&column.name, DataType::Float64, false));
            arrays.push(Arc::new(Float64Array::from(column.values)));
            labels.push(column.label);
        }

        let batch = RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)?;
        Ok(Self {
            batch,
            labels,
            extents,
        })
    }

    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }

    pub fn num_columns(&self) -> usize {
        self.batch.num_columns()
    }

    pub fn column_name(&self, index: usize) -> &str {
        self.batch.schema_ref().field(index).name()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.batch.schema_ref().index_of(name).ok()
    }

    pub fn column(&self, index: usize) -> &Float64Array {
        self.batch.column(index).as_primitive::<Float64Type>()
    }

    pub fn label(&self, index: usize) -> &str {
        &self.labels[index]
    }

    pub fn extent(&self, index: usize) -> Option<Extent> {
        self.extents[index]
    }
}
