use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use backoffice_core::AggregateId;

use super::r#trait::{EventStore, EventStoreError, StoredEvent, StreamAppend};

#[derive(Debug, Default)]
struct Inner {
    streams: HashMap<AggregateId, Vec<StoredEvent>>,
    log: Vec<StoredEvent>,
}

impl Inner {
    fn current_version(&self, aggregate_id: &AggregateId) -> u64 {
        self.streams
            .get(aggregate_id)
            .and_then(|s| s.last())
            .map(|e| e.sequence_number)
            .unwrap_or(0)
    }

    fn stream_type(&self, aggregate_id: &AggregateId) -> Option<&str> {
        self.streams
            .get(aggregate_id)
            .and_then(|s| s.first())
            .map(|e| e.aggregate_type.as_str())
    }
}

/// In-memory append-only event store.
///
/// A single lock guards every stream and the global log, so a multi-stream
/// commit is visible all at once or not at all.
#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    inner: RwLock<Inner>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Global position of the most recent commit (0 when empty).
    pub fn head(&self) -> Result<u64, EventStoreError> {
        let inner = self.inner.read().map_err(|_| poisoned())?;
        Ok(inner.log.len() as u64)
    }
}

fn poisoned() -> EventStoreError {
    EventStoreError::Storage("lock poisoned".to_string())
}

fn validate_batch(append: &StreamAppend) -> Result<(), EventStoreError> {
    let Some(first) = append.events.first() else {
        return Err(EventStoreError::InvalidAppend(format!(
            "empty batch for stream {}",
            append.aggregate_id
        )));
    };

    for (idx, e) in append.events.iter().enumerate() {
        if e.aggregate_id != append.aggregate_id {
            return Err(EventStoreError::InvalidAppend(format!(
                "batch for stream {} contains event for {} (index {idx})",
                append.aggregate_id, e.aggregate_id
            )));
        }
        if e.aggregate_type != first.aggregate_type {
            return Err(EventStoreError::AggregateTypeMismatch(format!(
                "batch contains multiple aggregate_types (index {idx})"
            )));
        }
    }
    Ok(())
}

impl EventStore for InMemoryEventStore {
    fn append_streams(&self, appends: Vec<StreamAppend>) -> Result<Vec<StoredEvent>, EventStoreError> {
        if appends.is_empty() {
            return Ok(vec![]);
        }

        let mut seen = HashSet::new();
        for append in &appends {
            validate_batch(append)?;
            if !seen.insert(append.aggregate_id) {
                return Err(EventStoreError::InvalidAppend(format!(
                    "stream {} appears twice in one commit",
                    append.aggregate_id
                )));
            }
        }

        let mut inner = self.inner.write().map_err(|_| poisoned())?;

        // Check every stream before writing to any of them.
        for append in &appends {
            let current = inner.current_version(&append.aggregate_id);
            if !append.expected_version.matches(current) {
                return Err(EventStoreError::Concurrency(format!(
                    "stream {}: expected {:?}, found {current}",
                    append.aggregate_id, append.expected_version
                )));
            }

            let incoming = &append.events[0].aggregate_type;
            if let Some(existing) = inner.stream_type(&append.aggregate_id) {
                if existing != incoming {
                    return Err(EventStoreError::AggregateTypeMismatch(format!(
                        "stream aggregate_type is '{existing}', attempted append with '{incoming}'"
                    )));
                }
            }
        }

        let mut global = inner.log.len() as u64;
        let mut committed = Vec::new();
        for append in appends {
            let mut next = inner.current_version(&append.aggregate_id) + 1;
            for e in append.events {
                global += 1;
                let stored = StoredEvent {
                    event_id: e.event_id,
                    aggregate_id: e.aggregate_id,
                    aggregate_type: e.aggregate_type,
                    sequence_number: next,
                    global_position: global,
                    event_type: e.event_type,
                    event_version: e.event_version,
                    occurred_at: e.occurred_at,
                    payload: e.payload,
                };
                next += 1;
                inner.streams.entry(stored.aggregate_id).or_default().push(stored.clone());
                inner.log.push(stored.clone());
                committed.push(stored);
            }
        }

        Ok(committed)
    }

    fn load_stream(&self, aggregate_id: AggregateId) -> Result<Vec<StoredEvent>, EventStoreError> {
        let inner = self.inner.read().map_err(|_| poisoned())?;
        Ok(inner.streams.get(&aggregate_id).cloned().unwrap_or_default())
    }

    fn read_all(&self, after: u64) -> Result<Vec<StoredEvent>, EventStoreError> {
        let inner = self.inner.read().map_err(|_| poisoned())?;
        let start = usize::try_from(after).unwrap_or(usize::MAX).min(inner.log.len());
        Ok(inner.log[start..].to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use backoffice_core::ExpectedVersion;
    use chrono::Utc;
    use serde_json::json;
    use uuid::Uuid;

    use crate::event_store::UncommittedEvent;

    fn event(aggregate_id: AggregateId, aggregate_type: &str) -> UncommittedEvent {
        UncommittedEvent {
            event_id: Uuid::now_v7(),
            aggregate_id,
            aggregate_type: aggregate_type.to_string(),
            event_type: "test.happened".to_string(),
            event_version: 1,
            occurred_at: Utc::now(),
            payload: json!({ "n": 1 }),
        }
    }

    #[test]
    fn sequence_numbers_are_per_stream_and_positions_global() {
        let store = InMemoryEventStore::new();
        let a = AggregateId::new();
        let b = AggregateId::new();

        store.append(vec![event(a, "t"), event(a, "t")], ExpectedVersion::Exact(0)).unwrap();
        let committed = store.append(vec![event(b, "t")], ExpectedVersion::Any).unwrap();

        assert_eq!(committed[0].sequence_number, 1);
        assert_eq!(committed[0].global_position, 3);
        assert_eq!(store.load_stream(a).unwrap().len(), 2);
        assert_eq!(store.head().unwrap(), 3);
    }

    #[test]
    fn multi_stream_commit_is_all_or_nothing() {
        let store = InMemoryEventStore::new();
        let item = AggregateId::new();
        let journal = AggregateId::new();
        store.append(vec![event(item, "item")], ExpectedVersion::Exact(0)).unwrap();

        let stale = store.append_streams(vec![
            StreamAppend::new(journal, ExpectedVersion::Any, vec![event(journal, "journal")]),
            StreamAppend::new(item, ExpectedVersion::Exact(0), vec![event(item, "item")]),
        ]);
        assert!(matches!(stale, Err(EventStoreError::Concurrency(_))));
        assert!(store.load_stream(journal).unwrap().is_empty());
        assert_eq!(store.head().unwrap(), 1);

        let ok = store
            .append_streams(vec![
                StreamAppend::new(item, ExpectedVersion::Exact(1), vec![event(item, "item")]),
                StreamAppend::new(journal, ExpectedVersion::Any, vec![event(journal, "journal")]),
            ])
            .unwrap();
        assert_eq!(ok.iter().map(|e| e.global_position).collect::<Vec<_>>(), vec![2, 3]);
        assert_eq!(ok[1].sequence_number, 1);
    }

    #[test]
    fn stream_type_is_stable() {
        let store = InMemoryEventStore::new();
        let id = AggregateId::new();
        store.append(vec![event(id, "item")], ExpectedVersion::Any).unwrap();

        let err = store.append(vec![event(id, "journal")], ExpectedVersion::Any).unwrap_err();
        assert!(matches!(err, EventStoreError::AggregateTypeMismatch(_)));
    }

    #[test]
    fn duplicate_or_empty_streams_are_rejected() {
        let store = InMemoryEventStore::new();
        let id = AggregateId::new();

        let dup = store.append_streams(vec![
            StreamAppend::new(id, ExpectedVersion::Any, vec![event(id, "t")]),
            StreamAppend::new(id, ExpectedVersion::Any, vec![event(id, "t")]),
        ]);
        assert!(matches!(dup, Err(EventStoreError::InvalidAppend(_))));

        let empty = store.append_streams(vec![StreamAppend::new(id, ExpectedVersion::Any, vec![])]);
        assert!(matches!(empty, Err(EventStoreError::InvalidAppend(_))));
    }

    #[test]
    fn read_all_resumes_after_a_position() {
        let store = InMemoryEventStore::new();
        for _ in 0..4 {
            let id = AggregateId::new();
            store.append(vec![event(id, "t")], ExpectedVersion::Exact(0)).unwrap();
        }

        let tail = store.read_all(2).unwrap();
        assert_eq!(tail.iter().map(|e| e.global_position).collect::<Vec<_>>(), vec![3, 4]);
        assert!(store.read_all(10).unwrap().is_empty());
    }
}
