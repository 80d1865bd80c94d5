//! Range filters over registered fields
//!
//! A [`Filter`] is a passive value object: an ordered list of slots, each of
//! which may bind a field and a range. Marking the plots that depend on a
//! filter as dirty is the session's job, not the filter's.

use serde::{Deserialize, Serialize};

use crate::error::SessionError;
use crate::field::{Extent, FieldId, FieldRegistry};

/// A slot range together with the unit it was expressed in
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SlotRange {
    /// Field units, used as given
    Absolute { min: f64, max: f64 },
    /// Fractions of the bound field's observed extent
    Normalized { min: f64, max: f64 },
}

impl SlotRange {
    /// Resolve to field units. Normalized ranges need the field's extent.
    pub fn resolve(&self, extent: Option<Extent>) -> Option<(f64, f64)> {
        match *self {
            SlotRange::Absolute { min, max } => Some((min, max)),
            SlotRange::Normalized { min, max } => {
                extent.map(|e| (e.lerp(min), e.lerp(max)))
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterSlot {
    pub field: Option<FieldId>,
    pub range: Option<SlotRange>,
}

/// One resolved bound: `min <= value <= max` on `field`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Constraint {
    pub field: FieldId,
    pub min: f64,
    pub max: f64,
}

impl Constraint {
    pub fn admits(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// A filter with every range resolved to field units.
///
/// This is what crosses the engine boundary; it no longer needs the registry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterSnapshot {
    constraints: Vec<Constraint>,
}

impl FilterSnapshot {
    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    /// True when the snapshot passes every row
    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    /// Evaluate one row. `value_of` yields the row's value for a field;
    /// a missing value never satisfies a constraint.
    pub fn admits<F>(&self, value_of: F) -> bool
    where
        F: Fn(FieldId) -> Option<f64>,
    {
        self.constraints
            .iter()
            .all(|c| value_of(c.field).map(|v| c.admits(v)).unwrap_or(false))
    }
}

/// Ordered, explicitly addressed set of range constraints
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    slots: Vec<FilterSlot>,
}

impl Filter {
    /// Create a filter with a fixed number of slots
    pub fn with_slots(count: usize) -> Self {
        Self {
            slots: vec![FilterSlot::default(); count],
        }
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub fn slots(&self) -> &[FilterSlot] {
        &self.slots
    }

    fn slot_mut(&mut self, index: usize) -> Result<&mut FilterSlot, SessionError> {
        let capacity = self.slots.len();
        self.slots.get_mut(index).ok_or(SessionError::InvalidSlot {
            index: index as i64,
            capacity,
        })
    }

    /// Bind a field to a slot. The slot's range is kept as is.
    pub fn set_field(&mut self, index: usize, field: FieldId) -> Result<(), SessionError> {
        self.slot_mut(index)?.field = Some(field);
        Ok(())
    }

    /// Unbind a slot, dropping its range as well
    pub fn clear_slot(&mut self, index: usize) -> Result<(), SessionError> {
        *self.slot_mut(index)? = FilterSlot::default();
        Ok(())
    }

    /// Set a range in field units
    pub fn set_range(&mut self, index: usize, min: f64, max: f64) -> Result<(), SessionError> {
        let (min, max) = ordered(min, max);
        self.slot_mut(index)?.range = Some(SlotRange::Absolute { min, max });
        Ok(())
    }

    /// Set a range as fractions (0..=1) of the bound field's observed extent
    pub fn set_normalized_range(
        &mut self,
        index: usize,
        min: f64,
        max: f64,
    ) -> Result<(), SessionError> {
        let (min, max) = ordered(min, max);
        self.slot_mut(index)?.range = Some(SlotRange::Normalized { min, max });
        Ok(())
    }

    /// A filter with no bound slot passes everything
    pub fn is_unconstrained(&self) -> bool {
        self.slots.iter().all(|s| s.field.is_none())
    }

    pub fn bound_fields(&self) -> impl Iterator<Item = FieldId> + '_ {
        self.slots.iter().filter_map(|s| s.field)
    }

    /// Resolve every bound, ranged slot into field units.
    ///
    /// Unbound slots and bound slots without a range impose nothing.
    pub fn snapshot(&self, fields: &FieldRegistry) -> FilterSnapshot {
        let constraints = self
            .slots
            .iter()
            .filter_map(|slot| {
                let field = slot.field?;
                let (min, max) = slot.range?.resolve(fields.extent(field))?;
                Some(Constraint { field, min, max })
            })
            .collect();
        FilterSnapshot { constraints }
    }

    /// Evaluate a single row against this filter
    pub fn evaluate<F>(&self, fields: &FieldRegistry, value_of: F) -> bool
    where
        F: Fn(FieldId) -> Option<f64>,
    {
        self.snapshot(fields).admits(value_of)
    }
}

fn ordered(a: f64, b: f64) -> (f64, f64) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}
