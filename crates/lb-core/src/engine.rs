//! Ordered command queue to the rendering engine
//!
//! Field registrations and render requests are sent over one bounded channel
//! and executed by a single consumer task, so the engine sees them in the
//! order they were enqueued.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{EngineError, SessionError};
use crate::field::{Field, FieldId};
use crate::filter::FilterSnapshot;
use crate::plot::{AxisInfo, PlotId};

/// Brush layer of a render, present only when the plot's brush slot is enabled
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrushLayer {
    pub filter: FilterSnapshot,
    pub blend: bool,
}

/// Everything the engine needs to rasterize one plot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderRequest {
    pub plot: PlotId,
    pub width: u32,
    pub height: u32,
    pub x: Option<FieldId>,
    pub y: Option<FieldId>,
    pub axis: AxisInfo,
    pub base: FilterSnapshot,
    pub brush: Option<BrushLayer>,
}

/// An encoded raster produced by the engine
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedImage {
    pub width: u32,
    pub height: u32,
    /// PNG bytes
    pub data: Vec<u8>,
}

pub enum EngineCommand {
    RegisterField(Field),
    Render {
        request: RenderRequest,
        reply: oneshot::Sender<Result<RenderedImage, EngineError>>,
    },
}

/// The engine side of the queue
#[async_trait]
pub trait EngineBackend: Send + 'static {
    /// Make a field known to the engine
    async fn register_field(&mut self, field: &Field) -> Result<(), EngineError>;

    /// Rasterize a plot
    async fn render(&mut self, request: RenderRequest) -> Result<RenderedImage, EngineError>;
}

/// Producer handle for the engine queue
#[derive(Clone)]
pub struct EngineQueue {
    tx: mpsc::Sender<EngineCommand>,
}

impl EngineQueue {
    /// Start the single consumer task for `backend`
    pub fn spawn<B: EngineBackend>(backend: B, capacity: usize) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let worker = tokio::spawn(run_engine(backend, rx));
        (Self { tx }, worker)
    }

    /// Enqueue a field registration without waiting for the engine to run it
    pub async fn register_field(&self, field: Field) -> Result<(), SessionError> {
        self.reserve_field().await?.register(field);
        Ok(())
    }

    /// Claim queue space for one field registration.
    ///
    /// Fails only if the engine has stopped. Holding the permit guarantees
    /// the registration will be enqueued.
    pub async fn reserve_field(&self) -> Result<FieldPermit<'_>, SessionError> {
        self.tx
            .reserve()
            .await
            .map(FieldPermit)
            .map_err(|_| EngineError::Unavailable.into())
    }

    /// Enqueue a render and wait for its result
    pub async fn render(&self, request: RenderRequest) -> Result<RenderedImage, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(EngineCommand::Render { request, reply })
            .await
            .map_err(|_| SessionError::from(EngineError::Unavailable))?;
        rx.await
            .map_err(|_| SessionError::from(EngineError::Unavailable))?
            .map_err(SessionError::from)
    }
}

/// Reserved slot on the engine queue for a field registration
pub struct FieldPermit<'a>(mpsc::Permit<'a, EngineCommand>);

impl FieldPermit<'_> {
    /// Enqueue the registration. Cannot fail once the slot is held.
    pub fn register(self, field: Field) {
        self.0.send(EngineCommand::RegisterField(field));
    }
}

async fn run_engine<B: EngineBackend>(mut backend: B, mut rx: mpsc::Receiver<EngineCommand>) {
    info!("Engine queue started");
    while let Some(command) = rx.recv().await {
        match command {
            EngineCommand::RegisterField(field) => {
                debug!(field = %field.name, "engine: register field");
                if let Err(e) = backend.register_field(&field).await {
                    warn!(field = %field.name, error = %e, "engine rejected field registration");
                }
            }
            EngineCommand::Render { request, reply } => {
                let plot = request.plot;
                debug!(plot, width = request.width, height = request.height, "engine: render");
                let result = backend.render(request).await;
                if let Err(e) = &result {
                    warn!(plot, error = %e, "render failed");
                }
                // The requester may have gone away; nothing to do then.
                let _ = reply.send(result);
            }
        }
    }
    info!("Engine queue closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::FieldKind;
    use crate::plot::AxisDescriptor;
    use std::sync::{Arc, Mutex};

    struct Journal(Arc<Mutex<Vec<String>>>);

    #[async_trait]
    impl EngineBackend for Journal {
        async fn register_field(&mut self, field: &Field) -> Result<(), EngineError> {
            self.0.lock().unwrap().push(format!("field {}", field.name));
            Ok(())
        }

        async fn render(&mut self, request: RenderRequest) -> Result<RenderedImage, EngineError> {
            self.0.lock().unwrap().push(format!("render {}", request.plot));
            Ok(RenderedImage {
                width: request.width,
                height: request.height,
                data: vec![1, 2, 3],
            })
        }
    }

    fn request(plot: PlotId) -> RenderRequest {
        let placeholder = AxisDescriptor {
            min: -1.0,
            max: 1.0,
            label: "X".into(),
        };
        RenderRequest {
            plot,
            width: 10,
            height: 20,
            x: None,
            y: None,
            axis: AxisInfo {
                x: placeholder.clone(),
                y: placeholder,
            },
            base: FilterSnapshot::default(),
            brush: None,
        }
    }

    fn field(name: &str) -> Field {
        Field {
            id: FieldId(0),
            name: name.into(),
            kind: FieldKind::Float,
            label: name.into(),
            extent: None,
        }
    }

    #[tokio::test]
    async fn test_commands_run_in_enqueue_order() {
        let journal = Arc::new(Mutex::new(Vec::new()));
        let (queue, _worker) = EngineQueue::spawn(Journal(journal.clone()), 4);

        queue.register_field(field("ZMass")).await.unwrap();
        queue.register_field(field("ZPt")).await.unwrap();
        let image = queue.render(request(7)).await.unwrap();

        assert_eq!((image.width, image.height), (10, 20));
        assert_eq!(
            *journal.lock().unwrap(),
            vec!["field ZMass", "field ZPt", "render 7"]
        );
    }

    #[tokio::test]
    async fn test_stopped_engine_is_unavailable() {
        let (queue, worker) = EngineQueue::spawn(Journal(Arc::new(Mutex::new(Vec::new()))), 1);
        worker.abort();
        let _ = worker.await;

        let err = queue.render(request(0)).await.unwrap_err();
        assert!(matches!(err, SessionError::EngineUnavailable(_)));
        assert!(matches!(
            queue.reserve_field().await,
            Err(SessionError::EngineUnavailable(_))
        ));
    }
}
