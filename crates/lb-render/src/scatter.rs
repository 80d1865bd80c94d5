//! CPU scatter rasterizer

use image::{Pixel, Rgba, RgbaImage};
use lb_core::data::Table;
use lb_core::field::Extent;

use crate::mask::Mark;
use crate::{PlotRenderer, RendererCapabilities, Scene, SceneAxis};

/// Colours used by the scatter renderer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Palette {
    pub background: Rgba<u8>,
    pub base: Rgba<u8>,
    pub highlight: Rgba<u8>,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            background: Rgba([16, 16, 20, 255]),
            base: Rgba([90, 140, 220, 160]),
            highlight: Rgba([255, 170, 40, 220]),
        }
    }
}

/// Draws one square marker per visible row
#[derive(Debug, Clone)]
pub struct ScatterRenderer {
    palette: Palette,
    /// Marker half-width in pixels; 0 draws single pixels
    point_radius: u32,
    max_image_size: u32,
}

impl Default for ScatterRenderer {
    fn default() -> Self {
        Self {
            palette: Palette::default(),
            point_radius: 1,
            max_image_size: 4096,
        }
    }
}

impl ScatterRenderer {
    pub fn new(palette: Palette, point_radius: u32) -> Self {
        Self {
            palette,
            point_radius,
            ..Self::default()
        }
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    fn plot_layer(&self, image: &mut RgbaImage, points: &[(f64, f64)], color: Rgba<u8>) {
        let (width, height) = image.dimensions();
        let r = self.point_radius as i64;

        for &(px, py) in points {
            let (cx, cy) = (px.round() as i64, py.round() as i64);
            for y in (cy - r)..=(cy + r) {
                if y < 0 || y >= height as i64 {
                    continue;
                }
                for x in (cx - r)..=(cx + r) {
                    if x < 0 || x >= width as i64 {
                        continue;
                    }
                    image.get_pixel_mut(x as u32, y as u32).blend(&color);
                }
            }
        }
    }
}

/// Pixel position of a value along an axis of `pixels` length.
/// `flip` puts the extent's minimum at the far end (image y grows downwards).
fn to_pixel(extent: &Extent, value: f64, pixels: u32, flip: bool) -> f64 {
    let t = extent.fraction(value);
    let t = if flip { 1.0 - t } else { t };
    t * pixels.saturating_sub(1) as f64
}

impl PlotRenderer for ScatterRenderer {
    fn draw(&self, table: &Table, scene: &Scene) -> RgbaImage {
        let (width, height) = self.capabilities().clamp(scene.width, scene.height);
        let mut image = RgbaImage::from_pixel(width, height, self.palette.background);

        // Without both axes there is nothing to place: blank frame
        let (Some(x), Some(y)) = (scene.x, scene.y) else {
            return image;
        };
        let SceneAxis { column: x_col, extent: x_extent } = x;
        let SceneAxis { column: y_col, extent: y_extent } = y;
        let xs = table.column(x_col);
        let ys = table.column(y_col);

        let mut base = Vec::new();
        let mut highlight = Vec::new();
        for (row, mark) in scene.marks.iter().enumerate() {
            let layer = match mark {
                Mark::Hidden => continue,
                Mark::Base => &mut base,
                Mark::Highlight => &mut highlight,
            };
            let (vx, vy) = (xs.value(row), ys.value(row));
            if vx.is_nan() || vy.is_nan() {
                continue;
            }
            layer.push((
                to_pixel(&x_extent, vx, width, false),
                to_pixel(&y_extent, vy, height, true),
            ));
        }

        // Highlights go last so they sit on top of the base layer
        self.plot_layer(&mut image, &base, self.palette.base);
        self.plot_layer(&mut image, &highlight, self.palette.highlight);
        image
    }

    fn capabilities(&self) -> RendererCapabilities {
        RendererCapabilities {
            max_image_size: self.max_image_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lb_core::data::ColumnData;

    fn table() -> Table {
        Table::from_columns(vec![
            ColumnData {
                name: "x".into(),
                label: "x".into(),
                values: vec![0.0, 10.0, 5.0, f64::NAN],
            },
            ColumnData {
                name: "y".into(),
                label: "y".into(),
                values: vec![0.0, 10.0, 5.0, 5.0],
            },
        ])
        .unwrap()
    }

    fn scene(marks: Vec<Mark>) -> Scene {
        let extent = Extent::new(0.0, 10.0);
        Scene {
            width: 11,
            height: 11,
            x: Some(SceneAxis { column: 0, extent }),
            y: Some(SceneAxis { column: 1, extent }),
            marks,
        }
    }

    fn single_pixel() -> ScatterRenderer {
        let palette = Palette {
            background: Rgba([0, 0, 0, 255]),
            base: Rgba([0, 0, 255, 255]),
            highlight: Rgba([255, 0, 0, 255]),
        };
        ScatterRenderer::new(palette, 0)
    }

    #[test]
    fn test_points_land_with_y_flipped() {
        let renderer = single_pixel();
        let image = renderer.draw(&table(), &scene(vec![Mark::Base; 4]));

        assert_eq!(image.dimensions(), (11, 11));
        // (0, 0) is the bottom-left corner, (10, 10) the top-right one
        assert_eq!(*image.get_pixel(0, 10), Rgba([0, 0, 255, 255]));
        assert_eq!(*image.get_pixel(10, 0), Rgba([0, 0, 255, 255]));
        assert_eq!(*image.get_pixel(5, 5), Rgba([0, 0, 255, 255]));
        assert_eq!(*image.get_pixel(0, 0), Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn test_hidden_rows_and_highlight_layer() {
        let renderer = single_pixel();
        let image = renderer.draw(
            &table(),
            &scene(vec![Mark::Hidden, Mark::Highlight, Mark::Base, Mark::Base]),
        );

        assert_eq!(*image.get_pixel(0, 10), Rgba([0, 0, 0, 255]));
        assert_eq!(*image.get_pixel(10, 0), Rgba([255, 0, 0, 255]));
        assert_eq!(*image.get_pixel(5, 5), Rgba([0, 0, 255, 255]));
    }

    #[test]
    fn test_missing_axis_renders_blank_frame() {
        let renderer = ScatterRenderer::default();
        let mut frame = scene(vec![Mark::Base; 4]);
        frame.y = None;

        let image = renderer.draw(&table(), &frame);
        let background = renderer.palette().background;
        assert!(image.pixels().all(|p| *p == background));
    }
}
