//! Integration tests for the journal storage backend.

#[allow(dead_code)]
#[path = "../benches/test_spaces.rs"]
mod test_spaces;

use core::time::Duration;
use std::collections::HashSet;
use std::io::Write;
use std::sync::Arc;

use autotuner::prelude::*;
use test_spaces::{cube, measurer, unimodal};

fn temp_path() -> std::path::PathBuf {
    use std::sync::atomic::{AtomicU64, Ordering};
    static COUNTER: AtomicU64 = AtomicU64::new(0);

    let mut path = std::env::temp_dir();
    path.push(format!(
        "autotuner_journal_test_{}_{}.jsonl",
        std::process::id(),
        COUNTER.fetch_add(1, Ordering::Relaxed)
    ));
    path
}

fn success(id: u64, index: usize, score: f64) -> MeasurementRecord {
    MeasurementRecord::new(
        id,
        index,
        Arc::from(vec![index as f64, 1.5]),
        Outcome::Success { score },
        Duration::from_millis(4),
    )
}

#[test]
fn roundtrip_single_record() {
    let path = temp_path();
    let storage = JournalStorage::new(&path);

    storage.push(success(0, 17, 42.0));
    assert_eq!(storage.len(), 1);

    let reopened = JournalStorage::open(&path).unwrap();
    let loaded = reopened.snapshot();
    assert_eq!(loaded.len(), 1);
    assert_eq!(*loaded.records()[0], success(0, 17, 42.0));

    std::fs::remove_file(&path).ok();
}

#[test]
fn failures_keep_kind_and_message() {
    let path = temp_path();
    let storage = JournalStorage::new(&path);
    let record = MeasurementRecord::new(
        0,
        3,
        Arc::from(vec![3.0]),
        Outcome::Failure {
            kind: FailureKind::RuntimeError,
            message: "illegal memory access".into(),
        },
        Duration::from_secs(1),
    );
    storage.push(record.clone());

    let loaded = JournalStorage::open(&path).unwrap().snapshot();
    assert_eq!(*loaded.records()[0], record);
    assert!(loaded.best().is_none());

    std::fs::remove_file(&path).ok();
}

#[test]
fn appends_accumulate_and_ids_continue() {
    let path = temp_path();
    {
        let storage = JournalStorage::new(&path);
        for i in 0..5 {
            let id = storage.next_record_id();
            storage.push(success(id, i, i as f64));
        }
    }

    let storage = JournalStorage::open(&path).unwrap();
    assert_eq!(storage.len(), 5);
    assert_eq!(storage.next_record_id(), 5);

    let content = std::fs::read_to_string(&path).unwrap();
    assert_eq!(content.lines().count(), 5);

    std::fs::remove_file(&path).ok();
}

#[test]
fn missing_file_opens_empty() {
    let path = temp_path();
    let storage = JournalStorage::open(&path).unwrap();
    assert!(storage.is_empty());
    assert!(!path.exists());
}

#[test]
fn blank_lines_are_skipped() {
    let path = temp_path();
    let storage = JournalStorage::new(&path);
    storage.push(success(0, 1, 1.0));
    {
        let mut file = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(file).unwrap();
        writeln!(file, "   ").unwrap();
    }
    storage.push(success(1, 2, 2.0));

    assert_eq!(JournalStorage::open(&path).unwrap().len(), 2);
    std::fs::remove_file(&path).ok();
}

#[test]
fn corrupt_line_is_a_storage_error() {
    let path = temp_path();
    std::fs::write(&path, "{\"id\": 0, \"index\": \n").unwrap();

    assert!(matches!(JournalStorage::open(&path), Err(Error::Storage(_))));
    std::fs::remove_file(&path).ok();
}

#[test]
fn resumed_tuner_never_remeasures() {
    let path = temp_path();
    let space = cube(6, 3);
    let optimum = [1, 4, 2];
    let score = |p: &[i64]| unimodal(p, &optimum);

    let mut first = Tuner::builder(space.clone())
        .storage(JournalStorage::new(&path))
        .plan_size(8)
        .num_threads(1)
        .seed(3)
        .build()
        .unwrap();
    first.tune(32, &mut measurer(&space, score)).unwrap();
    let first_best = first.best().and_then(|b| b.score()).unwrap();

    let mut second = Tuner::builder(space.clone())
        .storage(JournalStorage::open(&path).unwrap())
        .plan_size(8)
        .num_threads(1)
        .seed(4)
        .build()
        .unwrap();
    assert_eq!(second.n_trials(), 32);
    assert_eq!(second.best().and_then(|b| b.score()), Some(first_best));

    let summary = second.tune(32, &mut measurer(&space, score)).unwrap();
    assert_eq!(summary.trials, 32);
    assert!(summary.best.and_then(|b| b.score()).unwrap() >= first_best);

    let history = JournalStorage::open(&path).unwrap().snapshot();
    assert_eq!(history.len(), 64);
    let indices: HashSet<usize> = history.records().iter().map(|r| r.index).collect();
    assert_eq!(indices.len(), 64, "a configuration was measured twice");
    let ids: HashSet<u64> = history.records().iter().map(|r| r.id).collect();
    assert_eq!(ids.len(), 64);

    std::fs::remove_file(&path).ok();
}
