//! Rendering engine backend
//!
//! This crate provides the CPU scatter rasterizer that turns a plot's axes and
//! active filters into a PNG, and the [`RasterEngine`] that serves it behind
//! the session's engine queue.

pub mod engine;
pub mod mask;
pub mod scatter;

use image::RgbaImage;
use lb_core::data::Table;
use lb_core::field::Extent;

pub use engine::RasterEngine;
pub use mask::Mark;
pub use scatter::{Palette, ScatterRenderer};

/// One axis of a scene: the table column it reads and the range it spans
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneAxis {
    pub column: usize,
    pub extent: Extent,
}

/// A fully resolved frame, ready to rasterize
#[derive(Debug, Clone)]
pub struct Scene {
    pub width: u32,
    pub height: u32,
    pub x: Option<SceneAxis>,
    pub y: Option<SceneAxis>,
    /// Per-row visibility, parallel to the table rows
    pub marks: Vec<Mark>,
}

/// Trait for renderers
pub trait PlotRenderer: Send + Sync + 'static {
    /// Rasterize a scene over `table`
    fn draw(&self, table: &Table, scene: &Scene) -> RgbaImage;

    /// Get renderer capabilities
    fn capabilities(&self) -> RendererCapabilities;
}

/// Renderer capabilities
#[derive(Debug, Clone)]
pub struct RendererCapabilities {
    /// Largest width or height the renderer will produce
    pub max_image_size: u32,
}

impl RendererCapabilities {
    /// Clamp a requested size into what the renderer supports
    pub fn clamp(&self, width: u32, height: u32) -> (u32, u32) {
        let max = self.max_image_size.max(1);
        (width.clamp(1, max), height.clamp(1, max))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capabilities_clamp() {
        let caps = RendererCapabilities { max_image_size: 64 };
        assert_eq!(caps.clamp(0, 500), (1, 64));
        assert_eq!(caps.clamp(32, 16), (32, 16));
    }
}
