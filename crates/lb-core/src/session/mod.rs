//! The session: owner of fields, filters, plots and selection brushes
//!
//! All mutations go through a single write lock, so requests from any
//! number of clients are applied one at a time and each one is applied
//! completely or not at all. Rendering happens outside the lock: the render
//! request is snapshotted under the lock, and the result is only delivered
//! if the plot did not change while the engine was working.
//!
//! Events are published after a mutation commits but before the next writer
//! gets the lock, so subscribers see them in commit order.

use std::path::Path;
use std::sync::Arc;

use parking_lot::{RwLock, RwLockWriteGuard};
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::brush::{BrushSlot, LinkState, SelectionBrush, SelectionId, SelectionRect};
use crate::data::{DatasetLoader, Table};
use crate::engine::{BrushLayer, EngineBackend, EngineQueue, RenderRequest, RenderedImage};
use crate::error::SessionError;
use crate::events::{
    BrushRelinked, EventBus, FieldRegistered, FilterChanged, FilterTarget, PlotCreated,
    PlotsDirtied, SelectionCommitted,
};
use crate::field::{Extent, Field, FieldId, FieldKind, FieldRegistry};
use crate::filter::Filter;
use crate::plot::{Axis, AxisInfo, Plot, PlotId};
use crate::state::SessionSettings;

/// Reply to `create_plot`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NewPlot {
    pub id: PlotId,
    pub width: u32,
    pub height: u32,
}

/// Reply to `request_image`
#[derive(Debug, Clone, PartialEq)]
pub enum ImageResponse {
    /// The last delivered image is still current
    Unchanged { plot: PlotId },
    Rendered {
        plot: PlotId,
        image: RenderedImage,
        axis: AxisInfo,
    },
}

struct SessionState {
    fields: FieldRegistry,
    base: Filter,
    plots: Vec<Plot>,
    /// One per plot, same index
    selections: Vec<SelectionBrush>,
}

impl SessionState {
    fn plot(&self, id: PlotId) -> Result<&Plot, SessionError> {
        self.plots.get(id).ok_or(SessionError::IndexOutOfRange {
            kind: "plot",
            index: id as i64,
            len: self.plots.len(),
        })
    }

    fn plot_mut(&mut self, id: PlotId) -> Result<&mut Plot, SessionError> {
        let len = self.plots.len();
        self.plots.get_mut(id).ok_or(SessionError::IndexOutOfRange {
            kind: "plot",
            index: id as i64,
            len,
        })
    }

    fn check_selection(&self, id: SelectionId) -> Result<(), SessionError> {
        if id < self.selections.len() {
            Ok(())
        } else {
            Err(SessionError::IndexOutOfRange {
                kind: "selection filter",
                index: id as i64,
                len: self.selections.len(),
            })
        }
    }

    /// Plots whose rendered image depends on `target`
    fn dependents(&self, target: FilterTarget) -> Vec<PlotId> {
        match target {
            FilterTarget::Base => self.plots.iter().map(Plot::id).collect(),
            FilterTarget::Selection(source) => self
                .plots
                .iter()
                .filter(|p| p.brush().enabled && p.brush().source == source)
                .map(Plot::id)
                .collect(),
        }
    }

    fn mark_dirty(&mut self, plots: &[PlotId]) {
        for &id in plots {
            if let Some(plot) = self.plots.get_mut(id) {
                plot.mark_dirty();
            }
        }
    }

    fn render_request(&self, plot: &Plot) -> RenderRequest {
        let (width, height) = plot.size();
        let slot: &BrushSlot = plot.brush();
        let brush = slot.enabled.then(|| BrushLayer {
            filter: self.selections[slot.source].filter().snapshot(&self.fields),
            blend: slot.blend,
        });

        RenderRequest {
            plot: plot.id(),
            width,
            height,
            x: plot.axis(Axis::X),
            y: plot.axis(Axis::Y),
            axis: plot.axis_info(&self.fields),
            base: self.base.snapshot(&self.fields),
            brush,
        }
    }
}

pub struct Session {
    state: RwLock<SessionState>,
    engine: EngineQueue,
    events: Arc<EventBus>,
    settings: SessionSettings,
}

impl Session {
    /// Create an empty session on top of a running engine queue
    pub fn new(settings: SessionSettings, engine: EngineQueue) -> Self {
        let state = SessionState {
            fields: FieldRegistry::new(),
            base: Filter::with_slots(settings.base_filter_slots),
            plots: Vec::new(),
            selections: Vec::new(),
        };

        Self {
            state: RwLock::new(state),
            engine,
            events: Arc::new(EventBus::new()),
            settings,
        }
    }

    /// Load the dataset, start the engine on it and register every column.
    ///
    /// Nothing is returned unless the whole startup succeeded.
    pub async fn init<L, F, B>(
        settings: SessionSettings,
        loader: &L,
        path: &Path,
        make_backend: F,
    ) -> Result<(Self, JoinHandle<()>), SessionError>
    where
        L: DatasetLoader + ?Sized,
        F: FnOnce(Arc<Table>) -> B,
        B: EngineBackend,
    {
        let table = loader
            .load(path)
            .await
            .map_err(|e| SessionError::DatasetLoad(format!("{e:#}")))?;
        let table = Arc::new(table);
        info!(
            path = %path.display(),
            rows = table.num_rows(),
            columns = table.num_columns(),
            "Dataset loaded"
        );

        let capacity = settings.engine_queue_capacity;
        let (engine, worker) = EngineQueue::spawn(make_backend(table.clone()), capacity);
        let session = Self::new(settings, engine);

        for index in 0..table.num_columns() {
            session
                .register_field(
                    table.column_name(index),
                    FieldKind::Float,
                    table.label(index),
                    table.extent(index),
                )
                .await
                .map_err(|e| {
                    SessionError::DatasetLoad(format!("registering dataset columns: {e}"))
                })?;
        }

        Ok((session, worker))
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// Add a field to the registry and queue its registration on the engine.
    ///
    /// The field is listed immediately; the engine picks it up when it
    /// reaches the command. Queue space is claimed first, so a stopped engine
    /// leaves the registry untouched.
    pub async fn register_field(
        &self,
        name: &str,
        kind: FieldKind,
        label: &str,
        extent: Option<Extent>,
    ) -> Result<FieldId, SessionError> {
        let permit = self.engine.reserve_field().await?;

        let mut state = self.state.write();
        let id = state.fields.register_with_extent(name, kind, label, extent)?;
        let field: Field = state.fields.list()[id.0].clone();
        debug!(field = %field.name, ?extent, "Registering field");
        permit.register(field);

        let _state = RwLockWriteGuard::downgrade(state);
        self.events.publish(FieldRegistered {
            field: id,
            name: name.to_string(),
        });
        Ok(id)
    }

    /// Every registered field, in registration order
    pub fn list_fields(&self) -> Vec<Field> {
        self.state.read().fields.list().to_vec()
    }

    pub fn plot_count(&self) -> usize {
        self.state.read().plots.len()
    }

    pub fn base_filter_slots(&self) -> usize {
        self.state.read().base.slot_count()
    }

    /// Append a plot and its selection brush
    pub fn create_plot(&self) -> Result<NewPlot, SessionError> {
        let mut state = self.state.write();
        if let Some(limit) = self.settings.max_plots {
            if state.plots.len() >= limit {
                return Err(SessionError::Capacity { limit });
            }
        }

        let id = state.plots.len();
        let (width, height) = (
            self.settings.default_plot_width,
            self.settings.default_plot_height,
        );
        state.plots.push(Plot::new(id, width, height));
        state.selections.push(SelectionBrush::new());
        let created = NewPlot { id, width, height };

        let _state = RwLockWriteGuard::downgrade(state);
        info!(plot = created.id, "Plot created");
        self.events.publish(PlotCreated {
            plot: created.id,
            width: created.width,
            height: created.height,
        });
        Ok(created)
    }

    /// Bind one axis of a plot to a field
    pub fn set_plot_axis(
        &self,
        plot: PlotId,
        axis: Axis,
        field_name: &str,
    ) -> Result<(), SessionError> {
        let mut state = self.state.write();
        state.plot(plot)?;
        let field = state.fields.resolve(field_name)?.id;
        state.plot_mut(plot)?.set_axis(axis, field);

        let _state = RwLockWriteGuard::downgrade(state);
        info!(plot, ?axis, field = field_name, "Axis bound");
        self.events.publish(PlotsDirtied { plots: vec![plot] });
        Ok(())
    }

    /// Bind a base filter slot to a field
    pub fn set_filter(&self, slot: usize, field_name: &str) -> Result<(), SessionError> {
        info!(slot, field = field_name, "setFilter");
        self.mutate_base(slot, |base, fields| {
            let field = fields.resolve(field_name)?.id;
            base.set_field(slot, field)
        })
    }

    /// Unbind a base filter slot
    pub fn clear_filter(&self, slot: usize) -> Result<(), SessionError> {
        info!(slot, "clearFilter");
        self.mutate_base(slot, |base, _| base.clear_slot(slot))
    }

    /// Set a base filter slot's range in percent (0-100) of the bound field's extent
    pub fn set_filter_range(
        &self,
        slot: usize,
        min_pct: f64,
        max_pct: f64,
    ) -> Result<(), SessionError> {
        debug!(slot, min_pct, max_pct, "setFilterRange");
        self.mutate_base(slot, |base, _| {
            base.set_normalized_range(slot, min_pct / 100.0, max_pct / 100.0)
        })
    }

    fn mutate_base<F>(&self, slot: usize, apply: F) -> Result<(), SessionError>
    where
        F: FnOnce(&mut Filter, &FieldRegistry) -> Result<(), SessionError>,
    {
        let mut state = self.state.write();
        let locked = &mut *state;
        apply(&mut locked.base, &locked.fields)?;
        let dirtied = locked.dependents(FilterTarget::Base);
        locked.mark_dirty(&dirtied);

        let _state = RwLockWriteGuard::downgrade(state);
        self.events.publish(FilterChanged {
            target: FilterTarget::Base,
            slot,
        });
        self.events.publish(PlotsDirtied { plots: dirtied });
        Ok(())
    }

    /// Commit a rectangle drawn on `plot`, in the plot's axis units.
    ///
    /// The plot's selection brush takes the plot's current axis fields. A plot
    /// still wired to its own brush starts using it.
    pub fn set_selection(&self, plot: PlotId, rect: SelectionRect) -> Result<(), SessionError> {
        let mut state = self.state.write();
        let target = state.plot(plot)?;
        let (x, y) = (target.axis(Axis::X), target.axis(Axis::Y));
        let self_linked = target.brush().source == plot;
        if x.is_none() || y.is_none() {
            debug!(plot, "Selection on a plot without both axes bound");
        }

        state.selections[plot].commit(x, y, rect)?;
        if self_linked {
            state.plot_mut(plot)?.brush_mut().enabled = true;
        }

        let dirtied = state.dependents(FilterTarget::Selection(plot));
        state.mark_dirty(&dirtied);

        let _state = RwLockWriteGuard::downgrade(state);
        info!(
            plot,
            min_x = rect.min_x,
            max_x = rect.max_x,
            min_y = rect.min_y,
            max_y = rect.max_y,
            "Selection committed"
        );
        self.events.publish(SelectionCommitted { plot });
        self.events.publish(FilterChanged {
            target: FilterTarget::Selection(plot),
            slot: 0,
        });
        self.events.publish(PlotsDirtied { plots: dirtied });
        Ok(())
    }

    /// Point `plot`'s brush slot at another plot's selection brush and enable it.
    ///
    /// The plot's own brush stays allocated but is no longer used by it.
    pub fn set_brush_filter(&self, plot: PlotId, source: SelectionId) -> Result<(), SessionError> {
        let mut state = self.state.write();
        state.plot(plot)?;
        state.check_selection(source)?;

        let target = state.plot_mut(plot)?;
        let slot = target.brush_mut();
        slot.source = source;
        slot.enabled = true;
        target.mark_dirty();

        let _state = RwLockWriteGuard::downgrade(state);
        info!(plot, source, "Brush relinked");
        self.events.publish(BrushRelinked { plot, source });
        self.events.publish(PlotsDirtied { plots: vec![plot] });
        Ok(())
    }

    /// Enable or disable a plot's brush slot without touching its link
    pub fn set_brush_enabled(&self, plot: PlotId, enabled: bool) -> Result<(), SessionError> {
        self.update_brush(plot, |slot| {
            let changed = slot.enabled != enabled;
            slot.enabled = enabled;
            changed
        })
    }

    /// Choose between intersecting (`false`) and highlighting (`true`)
    pub fn set_brush_blend(&self, plot: PlotId, blend: bool) -> Result<(), SessionError> {
        self.update_brush(plot, |slot| {
            let changed = slot.blend != blend && slot.enabled;
            slot.blend = blend;
            changed
        })
    }

    fn update_brush<F>(&self, plot: PlotId, apply: F) -> Result<(), SessionError>
    where
        F: FnOnce(&mut BrushSlot) -> bool,
    {
        let mut state = self.state.write();
        let target = state.plot_mut(plot)?;
        let changed = apply(target.brush_mut());
        if changed {
            target.mark_dirty();
        }

        let _state = RwLockWriteGuard::downgrade(state);
        if changed {
            debug!(plot, "Brush slot updated");
            self.events.publish(PlotsDirtied { plots: vec![plot] });
        }
        Ok(())
    }

    pub fn axis_info(&self, plot: PlotId) -> Result<AxisInfo, SessionError> {
        let state = self.state.read();
        Ok(state.plot(plot)?.axis_info(&state.fields))
    }

    pub fn is_dirty(&self, plot: PlotId) -> Result<bool, SessionError> {
        Ok(self.state.read().plot(plot)?.is_dirty())
    }

    pub fn link_state(&self, plot: PlotId) -> Result<LinkState, SessionError> {
        Ok(self.state.read().plot(plot)?.link_state())
    }

    /// Resize the plot and return a fresh image if its last one went stale.
    ///
    /// If the plot changes while the engine is rendering, the result is
    /// dropped and the plot is rendered again from the new state. The dirty
    /// flag is only cleared once an image reflecting the latest state is in
    /// hand, so any failure leaves the request safe to retry.
    pub async fn request_image(
        &self,
        plot: PlotId,
        width: u32,
        height: u32,
    ) -> Result<ImageResponse, SessionError> {
        let mut attempts = 0;
        loop {
            let (request, revision) = {
                let mut state = self.state.write();
                let target = state.plot_mut(plot)?;
                target.resize(width, height);
                if !target.is_dirty() {
                    debug!(plot, "Image unchanged");
                    return Ok(ImageResponse::Unchanged { plot });
                }
                let revision = target.revision();
                (state.render_request(&state.plots[plot]), revision)
            };

            attempts += 1;
            let image = self.engine.render(request).await?;

            {
                let mut state = self.state.write();
                let target = state.plot_mut(plot)?;
                if target.revision() == revision {
                    target.clear_dirty();
                    let axis = state.plots[plot].axis_info(&state.fields);
                    debug!(plot, width = image.width, height = image.height, "Image delivered");
                    return Ok(ImageResponse::Rendered { plot, image, axis });
                }
            }

            if attempts >= self.settings.max_render_attempts.max(1) {
                warn!(plot, attempts, "Plot kept changing during render");
                return Err(SessionError::RenderSuperseded(plot));
            }
            debug!(plot, "Plot changed during render, rendering again");
        }
    }
}
