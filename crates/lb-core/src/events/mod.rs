//! In-process notifications about session changes

use std::any::{Any, TypeId};

use ahash::AHashMap;
use parking_lot::Mutex;

use crate::brush::SelectionId;
use crate::field::FieldId;
use crate::plot::PlotId;

/// Marker for types that can travel over the [`EventBus`]
pub trait Event: Any + Send + Sync {}

type Handler = Box<dyn FnMut(&dyn Any) + Send + Sync>;

/// Session-wide event bus, keyed by event type
#[derive(Default)]
pub struct EventBus {
    handlers: Mutex<AHashMap<TypeId, Vec<Handler>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Call `handler` for every published `E`
    pub fn subscribe<E, F>(&self, mut handler: F)
    where
        E: Event,
        F: FnMut(&E) + Send + Sync + 'static,
    {
        let erased: Handler = Box::new(move |event: &dyn Any| {
            if let Some(event) = event.downcast_ref::<E>() {
                handler(event);
            }
        });
        self.handlers
            .lock()
            .entry(TypeId::of::<E>())
            .or_default()
            .push(erased);
    }

    /// Publish an event. Handlers must not publish from inside their callback.
    ///
    /// The session publishes while still holding its state lock for reading,
    /// so handlers must not call back into session mutations.
    pub fn publish<E: Event>(&self, event: E) {
        let mut handlers = self.handlers.lock();
        if let Some(subscribed) = handlers.get_mut(&TypeId::of::<E>()) {
            for handler in subscribed.iter_mut() {
                handler(&event);
            }
        }
    }

    pub fn subscriber_count<E: Event>(&self) -> usize {
        self.handlers
            .lock()
            .get(&TypeId::of::<E>())
            .map_or(0, Vec::len)
    }
}

/// Which filter a mutation touched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterTarget {
    Base,
    Selection(SelectionId),
}

#[derive(Debug, Clone)]
pub struct FieldRegistered {
    pub field: FieldId,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct PlotCreated {
    pub plot: PlotId,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone)]
pub struct FilterChanged {
    pub target: FilterTarget,
    pub slot: usize,
}

#[derive(Debug, Clone)]
pub struct SelectionCommitted {
    pub plot: PlotId,
}

#[derive(Debug, Clone)]
pub struct BrushRelinked {
    pub plot: PlotId,
    pub source: SelectionId,
}

/// Plots whose cached image went stale because of one request
#[derive(Debug, Clone)]
pub struct PlotsDirtied {
    pub plots: Vec<PlotId>,
}

macro_rules! impl_event {
    ($($t:ty),*) => {
        $(impl Event for $t {})*
    }
}

impl_event!(
    FieldRegistered,
    PlotCreated,
    FilterChanged,
    SelectionCommitted,
    BrushRelinked,
    PlotsDirtied
);

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_handlers_only_see_their_event_type() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = seen.clone();
        bus.subscribe(move |created: &PlotCreated| sink.lock().push(created.plot));
        assert_eq!(bus.subscriber_count::<PlotCreated>(), 1);
        assert_eq!(bus.subscriber_count::<SelectionCommitted>(), 0);

        bus.publish(PlotCreated { plot: 4, width: 400, height: 400 });
        bus.publish(SelectionCommitted { plot: 9 });

        assert_eq!(*seen.lock(), vec![4]);
    }
}
