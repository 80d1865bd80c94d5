//! Selection brushes and the per-plot brush slot that references them

use serde::{Deserialize, Serialize};

use crate::error::SessionError;
use crate::field::FieldId;
use crate::filter::Filter;

/// Index into the session's selection sequence (parallel to plot ids)
pub type SelectionId = usize;

/// A rectangle in the source plot's axis units
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SelectionRect {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

/// Two-dimensional filter holding the rectangle last committed on a plot
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionBrush {
    filter: Filter,
    committed: bool,
}

impl SelectionBrush {
    pub const SLOTS: usize = 2;
    const X: usize = 0;
    const Y: usize = 1;

    pub fn new() -> Self {
        Self {
            filter: Filter::with_slots(Self::SLOTS),
            committed: false,
        }
    }

    /// Commit a rectangle. The axis fields are copied as they are now; an
    /// axis without a field keeps whatever binding the brush already had.
    pub fn commit(
        &mut self,
        x: Option<FieldId>,
        y: Option<FieldId>,
        rect: SelectionRect,
    ) -> Result<(), SessionError> {
        let mut next = self.filter.clone();
        if let Some(x) = x {
            next.set_field(Self::X, x)?;
        }
        next.set_range(Self::X, rect.min_x, rect.max_x)?;
        if let Some(y) = y {
            next.set_field(Self::Y, y)?;
        }
        next.set_range(Self::Y, rect.min_y, rect.max_y)?;

        self.filter = next;
        self.committed = true;
        Ok(())
    }

    pub fn filter(&self) -> &Filter {
        &self.filter
    }

    /// Whether a rectangle has ever been committed
    pub fn is_committed(&self) -> bool {
        self.committed
    }
}

impl Default for SelectionBrush {
    fn default() -> Self {
        Self::new()
    }
}

/// Slot 1 of a plot: which selection feeds it and how it is drawn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrushSlot {
    pub source: SelectionId,
    pub enabled: bool,
    /// `false`: the brush intersects with the base filter.
    /// `true`: base-filtered rows stay visible and brushed rows are highlighted.
    pub blend: bool,
}

impl BrushSlot {
    /// Slot wired to the plot's own selection, disabled
    pub fn own(source: SelectionId) -> Self {
        Self {
            source,
            enabled: false,
            blend: false,
        }
    }
}

/// Linked-brushing state of a plot's brush slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkState {
    UnlinkedDisabled,
    SelfEnabled,
    RelinkedEnabled,
    RelinkedDisabled,
}

impl LinkState {
    pub fn of(owner: SelectionId, slot: &BrushSlot) -> Self {
        match (slot.source == owner, slot.enabled) {
            (true, false) => LinkState::UnlinkedDisabled,
            (true, true) => LinkState::SelfEnabled,
            (false, true) => LinkState::RelinkedEnabled,
            (false, false) => LinkState::RelinkedDisabled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RECT: SelectionRect = SelectionRect {
        min_x: 1.0,
        max_x: 2.0,
        min_y: 3.0,
        max_y: 4.0,
    };

    #[test]
    fn test_commit_copies_axes() {
        let mut brush = SelectionBrush::new();
        brush.commit(Some(FieldId(3)), Some(FieldId(7)), RECT).unwrap();

        let slots = brush.filter().slots();
        assert_eq!(slots[0].field, Some(FieldId(3)));
        assert_eq!(slots[1].field, Some(FieldId(7)));
        assert!(brush.is_committed());
    }

    #[test]
    fn test_commit_without_axes_binds_nothing() {
        let mut brush = SelectionBrush::new();
        brush.commit(None, None, RECT).unwrap();

        assert!(brush.filter().is_unconstrained());
        assert!(brush.is_committed());
    }

    #[test]
    fn test_link_states() {
        let mut slot = BrushSlot::own(2);
        assert_eq!(LinkState::of(2, &slot), LinkState::UnlinkedDisabled);
        slot.enabled = true;
        assert_eq!(LinkState::of(2, &slot), LinkState::SelfEnabled);
        slot.source = 0;
        assert_eq!(LinkState::of(2, &slot), LinkState::RelinkedEnabled);
        slot.enabled = false;
        assert_eq!(LinkState::of(2, &slot), LinkState::RelinkedDisabled);
    }
}
