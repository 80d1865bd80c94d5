//! Engine backend that rasterizes plots from an in-memory table

use std::io::Cursor;
use std::sync::Arc;

use ahash::AHashMap;
use async_trait::async_trait;
use image::ImageFormat;
use lb_core::data::Table;
use lb_core::engine::{EngineBackend, RenderRequest, RenderedImage};
use lb_core::error::EngineError;
use lb_core::field::{Extent, Field, FieldId};
use lb_core::filter::FilterSnapshot;
use tracing::{debug, info};

use crate::mask::classify;
use crate::scatter::ScatterRenderer;
use crate::{PlotRenderer, Scene, SceneAxis};

/// Serves render requests against the dataset table.
///
/// Fields become drawable once their registration command has run: the
/// engine maps each field id to the table column of the same name.
pub struct RasterEngine<R = ScatterRenderer> {
    table: Arc<Table>,
    columns: AHashMap<FieldId, usize>,
    renderer: Arc<R>,
}

impl RasterEngine<ScatterRenderer> {
    pub fn new(table: Arc<Table>) -> Self {
        Self::with_renderer(table, ScatterRenderer::default())
    }
}

impl<R: PlotRenderer> RasterEngine<R> {
    pub fn with_renderer(table: Arc<Table>, renderer: R) -> Self {
        Self {
            table,
            columns: AHashMap::new(),
            renderer: Arc::new(renderer),
        }
    }

    fn column_of(&self, field: FieldId) -> Result<usize, EngineError> {
        self.columns
            .get(&field)
            .copied()
            .ok_or_else(|| EngineError::UnknownField(format!("#{}", field.0)))
    }

    fn check_snapshot(&self, snapshot: &FilterSnapshot) -> Result<(), EngineError> {
        snapshot
            .constraints()
            .iter()
            .try_for_each(|c| self.column_of(c.field).map(|_| ()))
    }

    fn scene_axis(
        &self,
        field: Option<FieldId>,
        extent: Extent,
    ) -> Result<Option<SceneAxis>, EngineError> {
        field
            .map(|f| self.column_of(f).map(|column| SceneAxis { column, extent }))
            .transpose()
    }
}

/// Encode an RGBA raster as PNG
pub fn encode_png(image: &image::RgbaImage) -> Result<Vec<u8>, EngineError> {
    let mut out = Cursor::new(Vec::new());
    image
        .write_to(&mut out, ImageFormat::Png)
        .map_err(|e| EngineError::Encode(e.to_string()))?;
    Ok(out.into_inner())
}

#[async_trait]
impl<R: PlotRenderer> EngineBackend for RasterEngine<R> {
    async fn register_field(&mut self, field: &Field) -> Result<(), EngineError> {
        let column = self
            .table
            .column_index(&field.name)
            .ok_or_else(|| EngineError::UnknownField(field.name.clone()))?;
        self.columns.insert(field.id, column);
        debug!(field = %field.name, column, "Field bound to table column");
        Ok(())
    }

    async fn render(&mut self, request: RenderRequest) -> Result<RenderedImage, EngineError> {
        // Resolve every field up front so the blocking task cannot hit an unknown one
        let x = self.scene_axis(request.x, request.axis.x.extent())?;
        let y = self.scene_axis(request.y, request.axis.y.extent())?;
        self.check_snapshot(&request.base)?;
        if let Some(layer) = &request.brush {
            self.check_snapshot(&layer.filter)?;
        }

        let table = Arc::clone(&self.table);
        let columns = self.columns.clone();
        let renderer = Arc::clone(&self.renderer);
        let plot = request.plot;

        let (width, height, data) = tokio::task::spawn_blocking(move || {
            let marks = classify(&table, &columns, &request.base, request.brush.as_ref());
            let scene = Scene {
                width: request.width,
                height: request.height,
                x,
                y,
                marks,
            };
            let image = renderer.draw(&table, &scene);
            encode_png(&image).map(|data| (image.width(), image.height(), data))
        })
        .await
        .map_err(|e| EngineError::Internal(e.to_string()))??;

        info!(plot, width, height, bytes = data.len(), "Rendered plot");
        Ok(RenderedImage {
            width,
            height,
            data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lb_core::data::ColumnData;
    use lb_core::field::FieldKind;
    use lb_core::plot::{AxisDescriptor, AxisInfo};

    fn table() -> Arc<Table> {
        Arc::new(
            Table::from_columns(vec![
                ColumnData {
                    name: "ZMass".into(),
                    label: "Z mass".into(),
                    values: vec![80.0, 91.0, 100.0],
                },
                ColumnData {
                    name: "ZPt".into(),
                    label: "ZPt".into(),
                    values: vec![1.0, 2.0, 3.0],
                },
            ])
            .unwrap(),
        )
    }

    fn field(id: usize, name: &str) -> Field {
        Field {
            id: FieldId(id),
            name: name.into(),
            kind: FieldKind::Float,
            label: name.into(),
            extent: None,
        }
    }

    fn axis(extent: Extent, label: &str) -> AxisDescriptor {
        AxisDescriptor {
            min: extent.min,
            max: extent.max,
            label: label.into(),
        }
    }

    fn request(x: Option<FieldId>, y: Option<FieldId>) -> RenderRequest {
        RenderRequest {
            plot: 0,
            width: 32,
            height: 24,
            x,
            y,
            axis: AxisInfo {
                x: axis(Extent::new(80.0, 100.0), "Z mass"),
                y: axis(Extent::new(1.0, 3.0), "ZPt"),
            },
            base: FilterSnapshot::default(),
            brush: None,
        }
    }

    #[tokio::test]
    async fn test_renders_png_of_requested_size() {
        let mut engine = RasterEngine::new(table());
        engine.register_field(&field(0, "ZMass")).await.unwrap();
        engine.register_field(&field(1, "ZPt")).await.unwrap();

        let image = engine
            .render(request(Some(FieldId(0)), Some(FieldId(1))))
            .await
            .unwrap();

        assert_eq!((image.width, image.height), (32, 24));
        assert_eq!(&image.data[..8], b"\x89PNG\r\n\x1a\n");
        let decoded = image::load_from_memory(&image.data).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (32, 24));
    }

    #[tokio::test]
    async fn test_unbound_axes_still_render() {
        let mut engine = RasterEngine::new(table());
        let image = engine.render(request(None, None)).await.unwrap();
        assert_eq!((image.width, image.height), (32, 24));
    }

    #[tokio::test]
    async fn test_unknown_fields_are_rejected() {
        let mut engine = RasterEngine::new(table());
        let err = engine.register_field(&field(0, "Met")).await.unwrap_err();
        assert_eq!(err, EngineError::UnknownField("Met".into()));

        // Never registered with the engine
        let err = engine
            .render(request(Some(FieldId(3)), None))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::UnknownField(_)));
    }
}
