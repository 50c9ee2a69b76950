//! History storage backends.
//!
//! The [`Storage`] trait defines how measurement records are appended and
//! read back. Every [`Tuner`](crate::Tuner) owns an `Arc<dyn Storage>`; the
//! tuner is the only writer, and refits read through
//! [`snapshot`](Storage::snapshot) so they always see a consistent prefix of
//! the history.
//!
//! # Available backends
//!
//! | Backend | Description | Feature flag |
//! |---------|-------------|-------------|
//! | [`MemoryStorage`] | In-memory `Vec` behind a read-write lock (the default) | — |
//! | `JournalStorage` | JSONL file with `fs2` file locking; reopen to resume a run | `journal` |
//!
//! Inject a backend through the builder:
//!
//! ```
//! use autotuner::prelude::*;
//! use autotuner::storage::MemoryStorage;
//!
//! let space = KnobSpace::new(vec![Knob::range("x", 0, 9)]).unwrap();
//! let tuner = Tuner::builder(space)
//!     .storage(MemoryStorage::new())
//!     .num_threads(1)
//!     .build()
//!     .unwrap();
//! assert!(tuner.history().is_empty());
//! ```

#[cfg(feature = "journal")]
mod journal;

use std::sync::Arc;

#[cfg(feature = "journal")]
pub use journal::JournalStorage;
use parking_lot::RwLock;

mod memory;
pub use memory::MemoryStorage;

use crate::history::{HistorySnapshot, MeasurementRecord};

/// Shared, append-only record buffer.
pub type RecordBuffer = Arc<RwLock<Vec<Arc<MeasurementRecord>>>>;

/// Trait for storing and retrieving measurement records.
///
/// Implementations must be `Send + Sync` because snapshots may be taken
/// while worker threads are busy with the next plan.
pub trait Storage: Send + Sync {
    /// Append a record to the store.
    fn push(&self, record: MeasurementRecord);

    /// Return a reference to the in-memory record buffer.
    fn records_arc(&self) -> &RecordBuffer;

    /// Atomically return the next record id.
    fn next_record_id(&self) -> u64;

    /// Number of stored records.
    fn len(&self) -> usize {
        self.records_arc().read().len()
    }

    /// Returns `true` if nothing has been stored yet.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Take a consistent snapshot of the current records.
    ///
    /// Only the `Arc` handles are copied; the records themselves are shared.
    fn snapshot(&self) -> HistorySnapshot {
        HistorySnapshot::new(self.records_arc().read().clone())
    }
}
