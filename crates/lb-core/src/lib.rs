//! Core session model for the linked-brushing exploration server
//!
//! This crate owns the field registry, filters, selection brushes and plots,
//! the session that routes client requests across them, and the ordered
//! command queue through which the session drives the rendering engine.

pub mod brush;
pub mod data;
pub mod engine;
pub mod error;
pub mod events;
pub mod field;
pub mod filter;
pub mod plot;
pub mod session;
pub mod state;

// Re-export commonly used types
pub use brush::{BrushSlot, LinkState, SelectionBrush, SelectionId, SelectionRect};
pub use data::{ColumnData, DatasetLoader, Table};
pub use engine::{BrushLayer, EngineBackend, EngineQueue, RenderRequest, RenderedImage};
pub use error::{EngineError, SessionError};
pub use field::{Extent, Field, FieldId, FieldKind, FieldRegistry};
pub use filter::{Constraint, Filter, FilterSnapshot, SlotRange};
pub use plot::{Axis, AxisDescriptor, AxisInfo, Plot, PlotId};
pub use session::{ImageResponse, NewPlot, Session};
pub use state::SessionSettings;
