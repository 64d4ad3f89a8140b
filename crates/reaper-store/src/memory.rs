//! In-memory record store with a watch feed

use crate::StoreError;
use reaper_domain::traits::DeleteOutcome;
use reaper_domain::{EventKind, Record, RecordKey, RecordStore, RecordUid, WatchEvent};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::SystemTime;
use tokio::sync::broadcast;

/// Capacity of the watch feed before slow subscribers start lagging
const EVENT_BUFFER: usize = 1024;

/// Record store backed by a map, cheap to clone and share
///
/// Every clone sees the same records. Each mutation is published to
/// subscribers of [`MemoryStore::subscribe`].
#[derive(Debug, Clone)]
pub struct MemoryStore {
    records: Arc<RwLock<BTreeMap<RecordKey, Record>>>,
    events: broadcast::Sender<WatchEvent>,
    unavailable: Arc<AtomicBool>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            records: Arc::new(RwLock::new(BTreeMap::new())),
            events,
            unavailable: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Create a store seeded with records (no events are published)
    pub fn with_records(records: impl IntoIterator<Item = Record>) -> Self {
        let store = Self::new();
        if let Ok(mut map) = store.records.write() {
            for record in records {
                map.insert(record.key.clone(), record);
            }
        }
        store
    }

    /// Subscribe to the watch feed
    pub fn subscribe(&self) -> broadcast::Receiver<WatchEvent> {
        self.events.subscribe()
    }

    /// Create or replace a record
    pub fn insert(&self, record: Record) -> Result<(), StoreError> {
        self.check_available()?;
        let previous = {
            let mut map = self.records.write().map_err(|_| StoreError::Poisoned)?;
            map.insert(record.key.clone(), record.clone())
        };
        let kind = if previous.is_some() {
            EventKind::Modified
        } else {
            EventKind::Added
        };
        self.publish(kind, record);
        Ok(())
    }

    /// Flag a record as terminating
    pub fn mark_terminating(&self, key: &RecordKey, at: SystemTime) -> Result<bool, StoreError> {
        self.check_available()?;
        let updated = {
            let mut map = self.records.write().map_err(|_| StoreError::Poisoned)?;
            match map.get_mut(key) {
                Some(record) => {
                    record.deletion_timestamp = Some(at);
                    Some(record.clone())
                }
                None => None,
            }
        };
        match updated {
            Some(record) => {
                self.publish(EventKind::Modified, record);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Remove a record regardless of its incarnation
    pub fn remove(&self, key: &RecordKey) -> Result<Option<Record>, StoreError> {
        self.check_available()?;
        let removed = {
            let mut map = self.records.write().map_err(|_| StoreError::Poisoned)?;
            map.remove(key)
        };
        if let Some(record) = &removed {
            self.publish(EventKind::Deleted, record.clone());
        }
        Ok(removed)
    }

    /// Snapshot of every record, in key order
    pub fn list(&self) -> Result<Vec<Record>, StoreError> {
        self.check_available()?;
        let map = self.records.read().map_err(|_| StoreError::Poisoned)?;
        Ok(map.values().cloned().collect())
    }

    /// Number of records held
    pub fn len(&self) -> usize {
        self.records.read().map(|map| map.len()).unwrap_or(0)
    }

    /// Whether the store is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Make every operation fail with [`StoreError::Unavailable`]
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("store marked unavailable".to_string()));
        }
        Ok(())
    }

    fn publish(&self, kind: EventKind, record: Record) {
        // No subscribers is fine
        let _ = self.events.send(WatchEvent::new(kind, record));
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordStore for MemoryStore {
    type Error = StoreError;

    fn get(&self, key: &RecordKey) -> Result<Option<Record>, Self::Error> {
        self.check_available()?;
        let map = self.records.read().map_err(|_| StoreError::Poisoned)?;
        Ok(map.get(key).cloned())
    }

    fn list(&self) -> Result<Vec<Record>, Self::Error> {
        MemoryStore::list(self)
    }

    fn delete(&self, key: &RecordKey, uid: RecordUid) -> Result<DeleteOutcome, Self::Error> {
        self.check_available()?;
        let removed = {
            let mut map = self.records.write().map_err(|_| StoreError::Poisoned)?;
            match map.get(key) {
                Some(current) if current.uid == uid => map.remove(key),
                _ => None,
            }
        };
        match removed {
            Some(record) => {
                tracing::debug!(key = %key, "Record deleted");
                self.publish(EventKind::Deleted, record);
                Ok(DeleteOutcome::Deleted)
            }
            None => Ok(DeleteOutcome::NotFound),
        }
    }
}
