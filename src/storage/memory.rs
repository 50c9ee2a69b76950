use core::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use super::{RecordBuffer, Storage};
use crate::history::MeasurementRecord;

/// In-memory record storage (the default).
///
/// This is a thin wrapper around `Arc<RwLock<Vec<Arc<MeasurementRecord>>>>`.
pub struct MemoryStorage {
    records: RecordBuffer,
    next_id: AtomicU64,
}

impl MemoryStorage {
    /// Creates a new, empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            records: Arc::new(RwLock::new(Vec::new())),
            next_id: AtomicU64::new(0),
        }
    }

    /// Creates an in-memory store pre-populated with `records`.
    #[must_use]
    pub fn with_records(records: Vec<MeasurementRecord>) -> Self {
        let next_id = records.iter().map(|r| r.id).max().map_or(0, |id| id + 1);
        Self {
            records: Arc::new(RwLock::new(records.into_iter().map(Arc::new).collect())),
            next_id: AtomicU64::new(next_id),
        }
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl Storage for MemoryStorage {
    fn push(&self, record: MeasurementRecord) {
        self.next_id.fetch_max(record.id + 1, Ordering::SeqCst);
        self.records.write().push(Arc::new(record));
    }

    fn records_arc(&self) -> &RecordBuffer {
        &self.records
    }

    fn next_record_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }
}
