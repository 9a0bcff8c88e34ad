//! Change notifications raised after successful writes.
//!
//! Events are published only once the database transaction has committed,
//! so a handler never observes a change that was later rolled back.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

bitflags! {
    /// Kinds of change, combinable into a registration mask.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct EventKind: u8 {
        const INSERT = 1;
        const UPDATE = 2;
        const DELETE = 4;
    }
}

/// A committed change to one entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityEvent {
    pub kind: EventKind,
    pub entity: String,
    /// Primary key of the changed row.
    pub id: i64,
    /// Columns written by an insert, or whose stored value differed on update.
    pub changed_properties: Vec<String>,
}

/// Callback invoked for matching events.
pub type EventCallback = Arc<dyn Fn(&EntityEvent) + Send + Sync>;

/// Receiver of committed change events.
///
/// # Implementations
///
/// - `NoopEventSink` - discards everything
/// - `EventHub` - dispatches to registered callbacks
pub trait EventSink: Send + Sync {
    /// Deliver an event. Must not block.
    fn publish(&self, event: &EntityEvent);
}

/// A sink that drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEventSink;

impl EventSink for NoopEventSink {
    fn publish(&self, _event: &EntityEvent) {}
}

/// Handle returned by [`EventHub::register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegistrationId(u64);

struct Registration {
    id: RegistrationId,
    kinds: EventKind,
    entity: Option<String>,
    callback: EventCallback,
}

#[derive(Default)]
struct GlobalCallbacks {
    insert: Option<EventCallback>,
    update: Option<EventCallback>,
    delete: Option<EventCallback>,
}

/// Dispatches committed events to registered callbacks and attached sinks.
#[derive(Default)]
pub struct EventHub {
    registrations: RwLock<Vec<Registration>>,
    globals: RwLock<GlobalCallbacks>,
    sinks: RwLock<Vec<Arc<dyn EventSink>>>,
    next_id: AtomicU64,
}

impl EventHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `callback` for the given kinds, optionally restricted to
    /// one entity name.
    pub fn register(
        &self,
        kinds: EventKind,
        entity: Option<&str>,
        callback: impl Fn(&EntityEvent) + Send + Sync + 'static,
    ) -> RegistrationId {
        let id = RegistrationId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.registrations
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Registration {
                id,
                kinds,
                entity: entity.map(str::to_string),
                callback: Arc::new(callback),
            });
        id
    }

    /// Removes one registration. Returns false if it was already gone.
    pub fn unregister(&self, id: RegistrationId) -> bool {
        let mut registrations = self
            .registrations
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let before = registrations.len();
        registrations.retain(|r| r.id != id);
        registrations.len() != before
    }

    /// Drops every registration and global callback. Attached sinks stay.
    pub fn clear_all(&self) {
        self.registrations
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        *self.globals.write().unwrap_or_else(PoisonError::into_inner) = GlobalCallbacks::default();
    }

    pub fn set_insert_callback(&self, callback: impl Fn(&EntityEvent) + Send + Sync + 'static) {
        self.globals
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert = Some(Arc::new(callback));
    }

    pub fn set_update_callback(&self, callback: impl Fn(&EntityEvent) + Send + Sync + 'static) {
        self.globals
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .update = Some(Arc::new(callback));
    }

    pub fn set_delete_callback(&self, callback: impl Fn(&EntityEvent) + Send + Sync + 'static) {
        self.globals
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .delete = Some(Arc::new(callback));
    }

    /// Forwards every event to `sink` as well.
    pub fn attach_sink(&self, sink: Arc<dyn EventSink>) {
        self.sinks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(sink);
    }

    pub fn registration_count(&self) -> usize {
        self.registrations
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Callbacks matching `event`, collected so that no lock is held while
    /// user code runs.
    fn matching(&self, event: &EntityEvent) -> Vec<EventCallback> {
        let mut callbacks: Vec<EventCallback> = self
            .registrations
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|r| r.kinds.intersects(event.kind))
            .filter(|r| r.entity.as_deref().is_none_or(|e| e == event.entity))
            .map(|r| Arc::clone(&r.callback))
            .collect();

        let globals = self.globals.read().unwrap_or_else(PoisonError::into_inner);
        let global = if event.kind.contains(EventKind::INSERT) {
            globals.insert.clone()
        } else if event.kind.contains(EventKind::UPDATE) {
            globals.update.clone()
        } else {
            globals.delete.clone()
        };
        callbacks.extend(global);
        callbacks
    }
}

impl EventSink for EventHub {
    fn publish(&self, event: &EntityEvent) {
        tracing::trace!(entity = %event.entity, id = event.id, kind = ?event.kind, "publishing entity event");

        for callback in self.matching(event) {
            callback(event);
        }

        let sinks: Vec<Arc<dyn EventSink>> = self
            .sinks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for sink in sinks {
            sink.publish(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn event(kind: EventKind, entity: &str) -> EntityEvent {
        EntityEvent {
            kind,
            entity: entity.to_string(),
            id: 1,
            changed_properties: vec!["name".to_string()],
        }
    }

    #[test]
    fn test_kind_bits_match_wire_values() {
        assert_eq!(EventKind::INSERT.bits(), 1);
        assert_eq!(EventKind::UPDATE.bits(), 2);
        assert_eq!(EventKind::DELETE.bits(), 4);
    }

    #[test]
    fn test_registration_filters_by_kind_and_entity() {
        let hub = EventHub::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&seen);
        hub.register(EventKind::INSERT | EventKind::DELETE, Some("Person"), move |e| {
            sink.lock().unwrap().push((e.kind, e.entity.clone()));
        });

        hub.publish(&event(EventKind::INSERT, "Person"));
        hub.publish(&event(EventKind::UPDATE, "Person"));
        hub.publish(&event(EventKind::INSERT, "Department"));
        hub.publish(&event(EventKind::DELETE, "Person"));

        let seen = seen.lock().unwrap();
        assert_eq!(
            *seen,
            vec![
                (EventKind::INSERT, "Person".to_string()),
                (EventKind::DELETE, "Person".to_string()),
            ]
        );
    }

    #[test]
    fn test_unregister_and_clear() {
        let hub = EventHub::new();
        let first = hub.register(EventKind::all(), None, |_| {});
        hub.register(EventKind::all(), None, |_| {});
        assert_eq!(hub.registration_count(), 2);

        assert!(hub.unregister(first));
        assert!(!hub.unregister(first));
        assert_eq!(hub.registration_count(), 1);

        hub.clear_all();
        assert_eq!(hub.registration_count(), 0);
    }

    #[test]
    fn test_global_callbacks() {
        let hub = EventHub::new();
        let count = Arc::new(AtomicU64::new(0));

        let inserts = Arc::clone(&count);
        hub.set_insert_callback(move |_| {
            inserts.fetch_add(1, Ordering::SeqCst);
        });
        let deletes = Arc::clone(&count);
        hub.set_delete_callback(move |_| {
            deletes.fetch_add(10, Ordering::SeqCst);
        });

        hub.publish(&event(EventKind::INSERT, "Person"));
        hub.publish(&event(EventKind::UPDATE, "Person"));
        hub.publish(&event(EventKind::DELETE, "Person"));
        assert_eq!(count.load(Ordering::SeqCst), 11);
    }

    #[test]
    fn test_attached_sink_receives_events() {
        struct Counting(AtomicU64);
        impl EventSink for Counting {
            fn publish(&self, _event: &EntityEvent) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let hub = EventHub::new();
        let sink = Arc::new(Counting(AtomicU64::new(0)));
        hub.attach_sink(sink.clone());
        hub.clear_all();

        hub.publish(&event(EventKind::UPDATE, "Department"));
        NoopEventSink.publish(&event(EventKind::UPDATE, "Department"));
        assert_eq!(sink.0.load(Ordering::SeqCst), 1);
    }
}
