//! Plots: two axis fields, the shared base filter, one brush slot and a dirty flag

use serde::{Deserialize, Serialize};

use crate::brush::{BrushSlot, LinkState};
use crate::field::{Extent, FieldId, FieldRegistry};

/// Position of a plot in the session's append-only plot sequence
pub type PlotId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    X,
    Y,
}

impl Axis {
    fn placeholder_label(self) -> &'static str {
        match self {
            Axis::X => "X",
            Axis::Y => "Y",
        }
    }
}

/// Range and label of one axis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AxisDescriptor {
    pub min: f64,
    pub max: f64,
    pub label: String,
}

impl AxisDescriptor {
    fn placeholder(axis: Axis) -> Self {
        Self {
            min: Extent::PLACEHOLDER.min,
            max: Extent::PLACEHOLDER.max,
            label: axis.placeholder_label().to_string(),
        }
    }

    pub fn extent(&self) -> Extent {
        Extent::new(self.min, self.max)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AxisInfo {
    pub x: AxisDescriptor,
    pub y: AxisDescriptor,
}

#[derive(Debug, Clone)]
pub struct Plot {
    id: PlotId,
    width: u32,
    height: u32,
    x: Option<FieldId>,
    y: Option<FieldId>,
    brush: BrushSlot,
    dirty: bool,
    /// Bumped on every change that dirties the plot
    revision: u64,
}

impl Plot {
    /// New plot wired to its own selection brush. Starts dirty.
    pub fn new(id: PlotId, width: u32, height: u32) -> Self {
        Self {
            id,
            width,
            height,
            x: None,
            y: None,
            brush: BrushSlot::own(id),
            dirty: true,
            revision: 0,
        }
    }

    pub fn id(&self) -> PlotId {
        self.id
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Change the pixel size. Zero dimensions and same-size requests are
    /// ignored; an actual change invalidates the cached raster.
    pub fn resize(&mut self, width: u32, height: u32) -> bool {
        if width == 0 || height == 0 || (width == self.width && height == self.height) {
            return false;
        }
        self.width = width;
        self.height = height;
        self.mark_dirty();
        true
    }

    pub fn axis(&self, axis: Axis) -> Option<FieldId> {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
        }
    }

    pub fn set_axis(&mut self, axis: Axis, field: FieldId) {
        match axis {
            Axis::X => self.x = Some(field),
            Axis::Y => self.y = Some(field),
        }
        self.mark_dirty();
    }

    pub fn brush(&self) -> &BrushSlot {
        &self.brush
    }

    pub(crate) fn brush_mut(&mut self) -> &mut BrushSlot {
        &mut self.brush
    }

    pub fn link_state(&self) -> LinkState {
        LinkState::of(self.id, &self.brush)
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
        self.revision += 1;
    }

    pub(crate) fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    /// Axis ranges and labels from the bound fields, placeholders otherwise
    pub fn axis_info(&self, fields: &FieldRegistry) -> AxisInfo {
        AxisInfo {
            x: Self::describe(Axis::X, self.x, fields),
            y: Self::describe(Axis::Y, self.y, fields),
        }
    }

    fn describe(axis: Axis, field: Option<FieldId>, fields: &FieldRegistry) -> AxisDescriptor {
        let Some(field) = field.and_then(|id| fields.get(id)) else {
            return AxisDescriptor::placeholder(axis);
        };
        let extent = field.extent.unwrap_or(Extent::PLACEHOLDER);
        AxisDescriptor {
            min: extent.min,
            max: extent.max,
            label: field.label.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::FieldKind;

    #[test]
    fn test_new_plot_is_dirty_and_self_linked() {
        let plot = Plot::new(3, 400, 400);
        assert!(plot.is_dirty());
        assert_eq!(plot.brush().source, 3);
        assert!(!plot.brush().enabled);
        assert!(!plot.brush().blend);
        assert_eq!(plot.link_state(), LinkState::UnlinkedDisabled);
    }

    #[test]
    fn test_resize_only_dirties_on_change() {
        let mut plot = Plot::new(0, 400, 400);
        plot.clear_dirty();

        assert!(!plot.resize(400, 400));
        assert!(!plot.resize(0, 300));
        assert!(!plot.is_dirty());

        assert!(plot.resize(640, 480));
        assert!(plot.is_dirty());
        assert_eq!(plot.size(), (640, 480));
    }

    #[test]
    fn test_axis_info_placeholders_and_bound_fields() {
        let mut fields = FieldRegistry::new();
        let mass = fields
            .register_with_extent("ZMass", FieldKind::Float, "Z mass", Some(Extent::new(60.0, 120.0)))
            .unwrap();
        let mut plot = Plot::new(0, 400, 400);

        let info = plot.axis_info(&fields);
        assert_eq!((info.x.min, info.x.max, info.x.label.as_str()), (-1.0, 1.0, "X"));
        assert_eq!((info.y.min, info.y.max, info.y.label.as_str()), (-1.0, 1.0, "Y"));

        let before = plot.revision();
        plot.set_axis(Axis::X, mass);
        assert!(plot.revision() > before);
        let info = plot.axis_info(&fields);
        assert_eq!((info.x.min, info.x.max, info.x.label.as_str()), (60.0, 120.0, "Z mass"));
        assert_eq!(info.y.label, "Y");
    }
}
