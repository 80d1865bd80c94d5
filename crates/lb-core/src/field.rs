//! Field registry: the catalog of plottable dataset columns

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::error::SessionError;

/// Stable handle for a registered field (its registration position)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FieldId(pub usize);

/// Storage type of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldKind {
    Float,
}

/// Observed numeric range of a field
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Extent {
    pub min: f64,
    pub max: f64,
}

impl Extent {
    /// Range reported for axes that have no bound field
    pub const PLACEHOLDER: Extent = Extent { min: -1.0, max: 1.0 };

    pub fn new(min: f64, max: f64) -> Self {
        if min <= max {
            Self { min, max }
        } else {
            Self { min: max, max: min }
        }
    }

    pub fn span(&self) -> f64 {
        self.max - self.min
    }

    /// Map a fraction of the extent back to field units
    pub fn lerp(&self, t: f64) -> f64 {
        self.min + self.span() * t
    }

    /// Position of `value` within the extent, 0 at `min` and 1 at `max`
    pub fn fraction(&self, value: f64) -> f64 {
        let span = self.span();
        if span > 0.0 {
            (value - self.min) / span
        } else {
            0.5
        }
    }

    /// Extend the extent to cover `value`; NaN is ignored
    pub fn include(extent: Option<Extent>, value: f64) -> Option<Extent> {
        if value.is_nan() {
            return extent;
        }
        Some(match extent {
            Some(e) => Extent {
                min: e.min.min(value),
                max: e.max.max(value),
            },
            None => Extent {
                min: value,
                max: value,
            },
        })
    }
}

/// Immutable descriptor of a registered field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub id: FieldId,
    pub name: String,
    pub kind: FieldKind,
    pub label: String,
    /// Min/max precomputed by the dataset loader, if the column had values
    pub extent: Option<Extent>,
}

/// Append-only catalog of fields, in registration order
#[derive(Debug, Default)]
pub struct FieldRegistry {
    fields: Vec<Field>,
    by_name: AHashMap<String, FieldId>,
}

impl FieldRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a field with no observed extent
    pub fn register(
        &mut self,
        name: &str,
        kind: FieldKind,
        label: &str,
    ) -> Result<FieldId, SessionError> {
        self.register_with_extent(name, kind, label, None)
    }

    /// Register a field together with the extent observed by the loader.
    ///
    /// An empty label falls back to the field name.
    pub fn register_with_extent(
        &mut self,
        name: &str,
        kind: FieldKind,
        label: &str,
        extent: Option<Extent>,
    ) -> Result<FieldId, SessionError> {
        if self.by_name.contains_key(name) {
            return Err(SessionError::DuplicateField(name.to_string()));
        }

        let id = FieldId(self.fields.len());
        let label = if label.is_empty() { name } else { label };
        self.fields.push(Field {
            id,
            name: name.to_string(),
            kind,
            label: label.to_string(),
            extent,
        });
        self.by_name.insert(name.to_string(), id);
        Ok(id)
    }

    /// All fields in insertion order
    pub fn list(&self) -> &[Field] {
        &self.fields
    }

    pub fn resolve(&self, name: &str) -> Result<&Field, SessionError> {
        self.by_name
            .get(name)
            .map(|id| &self.fields[id.0])
            .ok_or_else(|| SessionError::UnknownField(name.to_string()))
    }

    pub fn get(&self, id: FieldId) -> Option<&Field> {
        self.fields.get(id.0)
    }

    pub fn extent(&self, id: FieldId) -> Option<Extent> {
        self.get(id).and_then(|f| f.extent)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
