//! Match records and the aggregate produced by a scan.
use serde::{Serialize, Serializer};
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use crate::metrics::ScanStats;

/// Which part of the match policy recorded a file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchReason {
    /// The name equals the filename focus (and the content predicate held, if any)
    FilenameMatch,
    /// The content predicate held
    ContentMatch,
    /// No name or content predicate is configured; every surviving file is listed
    Enumerated,
}

impl fmt::Display for MatchReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            MatchReason::FilenameMatch => "filename match",
            MatchReason::ContentMatch => "content match",
            MatchReason::Enumerated => "enumerated",
        };
        f.write_str(label)
    }
}

/// A file that satisfied the active match policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchRecord {
    pub path: PathBuf,
    pub reason: MatchReason,
}

impl MatchRecord {
    pub fn new(path: impl Into<PathBuf>, reason: MatchReason) -> Self {
        Self {
            path: path.into(),
            reason,
        }
    }
}

impl fmt::Display for MatchRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.reason {
            MatchReason::Enumerated => write!(f, "[FILE] {}", self.path.display()),
            reason => write!(f, "[MATCH] {} ({})", self.path.display(), reason),
        }
    }
}

/// Results collection and scanned-file counter shared by all workers.
///
/// Both only grow while a scan runs.
#[derive(Debug, Default)]
pub struct SharedResults {
    matches: Mutex<Vec<MatchRecord>>,
    files_scanned: AtomicU64,
}

impl SharedResults {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_match(&self, record: MatchRecord) {
        self.matches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record);
    }

    pub fn record_scanned(&self) {
        self.files_scanned.fetch_add(1, Ordering::SeqCst);
    }

    pub fn files_scanned(&self) -> u64 {
        self.files_scanned.load(Ordering::SeqCst)
    }

    pub fn matched_count(&self) -> usize {
        self.matches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Copies the matches recorded so far
    pub fn matches(&self) -> Vec<MatchRecord> {
        self.matches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

fn as_secs_f64<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(duration.as_secs_f64())
}

/// End-of-scan totals
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScanSummary {
    #[serde(rename = "elapsed_seconds", serialize_with = "as_secs_f64")]
    pub elapsed: Duration,
    pub matched_count: usize,
    pub scanned_count: u64,
}

impl fmt::Display for ScanSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Done in {:.2}s. Files matched: {} | Scanned: {}",
            self.elapsed.as_secs_f64(),
            self.matched_count,
            self.scanned_count
        )
    }
}

/// Everything a finished (or cancelled) scan produced.
///
/// The order of `matches` follows worker interleaving and carries no meaning.
#[derive(Debug, Clone, Serialize)]
pub struct ScanOutput {
    pub matches: Vec<MatchRecord>,
    pub files_scanned: u64,
    #[serde(rename = "elapsed_seconds", serialize_with = "as_secs_f64")]
    pub elapsed: Duration,
    pub cancelled: bool,
    pub stats: ScanStats,
}

impl ScanOutput {
    pub fn summary(&self) -> ScanSummary {
        ScanSummary {
            elapsed: self.elapsed,
            matched_count: self.matches.len(),
            scanned_count: self.files_scanned,
        }
    }

    /// Matched paths as an ordered set, for order-independent comparison
    pub fn matched_paths(&self) -> BTreeSet<PathBuf> {
        self.matches.iter().map(|m| m.path.clone()).collect()
    }

    pub fn is_match(&self, path: &Path) -> bool {
        self.matches.iter().any(|m| m.path == path)
    }
}
