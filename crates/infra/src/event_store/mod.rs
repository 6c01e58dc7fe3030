//! Append-only event store boundary.
//!
//! Storage-agnostic: the trait describes streams, atomic multi-stream commits
//! and a global read order; `InMemoryEventStore` is the implementation used by
//! sessions and tests.

pub mod in_memory;
pub mod r#trait;

use std::sync::Mutex;

use serde_json::Value as JsonValue;
use tracing::warn;

use backoffice_core::AggregateId;
use backoffice_events::{EventBus, EventEnvelope};

pub use in_memory::InMemoryEventStore;
pub use r#trait::{EventStore, EventStoreError, StoredEvent, StreamAppend, UncommittedEvent};

/// Adapter that publishes committed events to an `EventBus` after a successful append.
///
/// Publication happens only after the append succeeds, and envelopes reach
/// the bus in global position order. A failed publish is logged and does not
/// fail the append; consumers catch up with `read_all`.
pub struct PublishingEventStore<S, B> {
    store: S,
    bus: B,
    publish_order: Mutex<()>,
}

impl<S, B> PublishingEventStore<S, B> {
    pub fn new(store: S, bus: B) -> Self {
        Self {
            store,
            bus,
            publish_order: Mutex::new(()),
        }
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn into_parts(self) -> (S, B) {
        (self.store, self.bus)
    }
}

impl<S, B> EventStore for PublishingEventStore<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    fn append_streams(&self, appends: Vec<StreamAppend>) -> Result<Vec<StoredEvent>, EventStoreError> {
        // Held across append and publish so bus order matches commit order.
        let _order = self
            .publish_order
            .lock()
            .map_err(|_| EventStoreError::Storage("publish lock poisoned".to_string()))?;
        let committed = self.store.append_streams(appends)?;

        for e in &committed {
            if let Err(err) = self.bus.publish(e.to_envelope()) {
                warn!(
                    global_position = e.global_position,
                    event_type = %e.event_type,
                    error = ?err,
                    "event publication failed; append kept"
                );
            }
        }

        Ok(committed)
    }

    fn load_stream(&self, aggregate_id: AggregateId) -> Result<Vec<StoredEvent>, EventStoreError> {
        self.store.load_stream(aggregate_id)
    }

    fn read_all(&self, after: u64) -> Result<Vec<StoredEvent>, EventStoreError> {
        self.store.read_all(after)
    }
}
