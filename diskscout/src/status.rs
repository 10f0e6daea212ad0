//! Progress reporting between the scan core and whatever renders it.
//!
//! Workers overwrite their own slot on a [`StatusBoard`]; the coordinator
//! periodically copies the board into a [`StatusSnapshot`] and hands it to a
//! [`StatusSink`]. Snapshots are point-in-time and may lag the counters.
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use crate::errors::ScanError;
use crate::results::{MatchRecord, ScanSummary};

/// What a worker is doing right now
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerState {
    Init,
    Idle,
    Listing(String),
    Filtering(String),
    Reading(String),
}

impl WorkerState {
    fn short_name(path: &Path) -> String {
        path.file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string())
    }

    pub fn listing(path: &Path) -> Self {
        Self::Listing(Self::short_name(path))
    }

    pub fn filtering(path: &Path) -> Self {
        Self::Filtering(Self::short_name(path))
    }

    pub fn reading(path: &Path) -> Self {
        Self::Reading(Self::short_name(path))
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerState::Init => f.write_str("init"),
            WorkerState::Idle => f.write_str("> Idle"),
            WorkerState::Listing(name) => write!(f, "[INFO] Listing {}", name),
            WorkerState::Filtering(name) => write!(f, "[INFO] Checking {}", name),
            WorkerState::Reading(name) => write!(f, "[INFO] Scanning {}", name),
        }
    }
}

/// One slot per worker, last writer wins
#[derive(Debug, Default)]
pub struct StatusBoard {
    slots: DashMap<usize, WorkerState>,
}

impl StatusBoard {
    pub fn new(worker_count: usize) -> Self {
        let slots = DashMap::with_capacity(worker_count);
        for id in 0..worker_count {
            slots.insert(id, WorkerState::Init);
        }
        Self { slots }
    }

    pub fn set(&self, worker_id: usize, state: WorkerState) {
        self.slots.insert(worker_id, state);
    }

    pub fn get(&self, worker_id: usize) -> Option<WorkerState> {
        self.slots.get(&worker_id).map(|entry| entry.value().clone())
    }

    /// Renders every slot, ordered by worker id
    pub fn render(&self) -> BTreeMap<usize, String> {
        self.slots
            .iter()
            .map(|entry| (*entry.key(), entry.value().to_string()))
            .collect()
    }
}

/// Periodic view of a running scan
#[derive(Debug, Clone, PartialEq)]
pub struct StatusSnapshot {
    pub workers: BTreeMap<usize, String>,
    pub files_scanned: u64,
    pub matched: usize,
    pub elapsed: Duration,
}

impl StatusSnapshot {
    /// Files scanned per second so far
    pub fn rate(&self) -> Option<f64> {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 && self.files_scanned > 0 {
            Some(self.files_scanned as f64 / secs)
        } else {
            None
        }
    }
}

/// Receives progress events from a scan.
///
/// `on_match` and `on_error` are called from worker threads, the others from
/// the coordinator thread.
pub trait StatusSink: Send + Sync {
    fn on_snapshot(&self, _snapshot: &StatusSnapshot) {}

    fn on_match(&self, record: &MatchRecord);

    /// Only called for errors the configuration asks to surface
    fn on_error(&self, _error: &ScanError) {}

    fn on_summary(&self, _summary: &ScanSummary) {}
}

/// Discards every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl StatusSink for NullSink {
    fn on_match(&self, _record: &MatchRecord) {}
}

/// Keeps every event in memory
#[derive(Debug, Default)]
pub struct CollectingSink {
    snapshots: Mutex<Vec<StatusSnapshot>>,
    matches: Mutex<Vec<MatchRecord>>,
    errors: Mutex<Vec<String>>,
    summaries: Mutex<Vec<ScanSummary>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshots(&self) -> Vec<StatusSnapshot> {
        self.snapshots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn matches(&self) -> Vec<MatchRecord> {
        self.matches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn errors(&self) -> Vec<String> {
        self.errors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn summaries(&self) -> Vec<ScanSummary> {
        self.summaries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl StatusSink for CollectingSink {
    fn on_snapshot(&self, snapshot: &StatusSnapshot) {
        self.snapshots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(snapshot.clone());
    }

    fn on_match(&self, record: &MatchRecord) {
        self.matches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record.clone());
    }

    fn on_error(&self, error: &ScanError) {
        self.errors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(error.to_string());
    }

    fn on_summary(&self, summary: &ScanSummary) {
        self.summaries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(*summary);
    }
}
