//! JSONL-based journal storage backend.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use parking_lot::Mutex;

use super::{MemoryStorage, RecordBuffer, Storage};
use crate::error::{Error, Result};
use crate::history::MeasurementRecord;

/// A storage backend that appends measurement records as JSON lines.
///
/// Records are kept in memory for fast snapshots and simultaneously
/// persisted to a JSONL file. Writes take an exclusive file lock, reads a
/// shared one, so a second process can tail the same file safely.
///
/// Reopening the file with [`JournalStorage::open`] and handing the storage
/// to a new [`Tuner`](crate::Tuner) resumes a previous run: the loaded
/// records count as already measured and seed the first model fit.
///
/// # Examples
///
/// ```no_run
/// use autotuner::storage::JournalStorage;
///
/// let storage = JournalStorage::open("tuning.jsonl").unwrap();
/// ```
pub struct JournalStorage {
    memory: MemoryStorage,
    path: PathBuf,
    /// Serialise in-process writes so we only hold the file lock briefly.
    write_lock: Mutex<()>,
}

impl JournalStorage {
    /// Creates a journal that writes to `path`, ignoring anything already
    /// in the file.
    ///
    /// The file does not need to exist yet; it is created on the first
    /// write. Use [`JournalStorage::open`] to load existing records.
    #[must_use]
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            memory: MemoryStorage::new(),
            path: path.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    /// Opens a journal file and loads all stored records.
    ///
    /// If the file does not exist, returns an empty storage (no error).
    ///
    /// # Errors
    ///
    /// Returns a [`Storage`](crate::Error::Storage) error if the file
    /// exists but cannot be read or parsed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let records = read_journal(&path)?;
        Ok(Self {
            memory: MemoryStorage::with_records(records),
            path,
            write_lock: Mutex::new(()),
        })
    }

    /// The journal file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append `record` as one line while holding an exclusive lock.
    fn append(&self, record: &MeasurementRecord) -> Result<()> {
        let line = serde_json::to_string(record).map_err(storage_err)?;
        let _guard = self.write_lock.lock();

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(storage_err)?;
        file.lock_exclusive().map_err(storage_err)?;
        let written = writeln!(file, "{line}").and_then(|()| file.flush());
        let unlocked = FileExt::unlock(&file);
        written.map_err(storage_err)?;
        unlocked.map_err(storage_err)
    }
}

impl Storage for JournalStorage {
    fn push(&self, record: MeasurementRecord) {
        // Best-effort persist; the record stays in memory regardless.
        if let Err(_e) = self.append(&record) {
            trace_warn!(error = %_e, path = %self.path.display(), "journal write failed");
        }
        self.memory.push(record);
    }

    fn records_arc(&self) -> &RecordBuffer {
        self.memory.records_arc()
    }

    fn next_record_id(&self) -> u64 {
        self.memory.next_record_id()
    }
}

/// Every record in the journal at `path`; a missing file holds none.
fn read_journal(path: &Path) -> Result<Vec<MeasurementRecord>> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(storage_err(e)),
    };
    file.lock_shared().map_err(storage_err)?;

    let records = BufReader::new(&file)
        .lines()
        .filter(|line| !matches!(line, Ok(l) if l.trim().is_empty()))
        .map(|line| {
            let line = line.map_err(storage_err)?;
            serde_json::from_str(line.trim()).map_err(storage_err)
        })
        .collect::<Result<Vec<_>>>();

    FileExt::unlock(&file).map_err(storage_err)?;
    records
}

fn storage_err(e: impl core::fmt::Display) -> Error {
    Error::Storage(e.to_string())
}
