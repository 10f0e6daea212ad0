use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::info;

/// Lock-free counters shared by every worker of a scan.
///
/// Cloning is cheap and every clone updates the same counters.
#[derive(Debug, Clone)]
pub struct ScanMetrics {
    // Traversal
    dirs_listed: Arc<AtomicU64>,
    listing_errors: Arc<AtomicU64>,
    system_folders_skipped: Arc<AtomicU64>,

    // Filters
    filtered_by_name: Arc<AtomicU64>,
    filtered_by_extension: Arc<AtomicU64>,
    filtered_by_size: Arc<AtomicU64>,

    // File errors
    stat_errors: Arc<AtomicU64>,
    read_errors: Arc<AtomicU64>,

    // Content evaluation
    bytes_read: Arc<AtomicU64>,
    chunks_scanned: Arc<AtomicU64>,
    accelerated_chunks: Arc<AtomicU64>,
    accelerator_fallbacks: Arc<AtomicU64>,
}

/// Why a file was dropped before its content was read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterReason {
    Filename,
    Extension,
    Size,
}

impl ScanMetrics {
    /// Creates a new ScanMetrics instance
    pub fn new() -> Self {
        Self {
            dirs_listed: Arc::new(AtomicU64::new(0)),
            listing_errors: Arc::new(AtomicU64::new(0)),
            system_folders_skipped: Arc::new(AtomicU64::new(0)),
            filtered_by_name: Arc::new(AtomicU64::new(0)),
            filtered_by_extension: Arc::new(AtomicU64::new(0)),
            filtered_by_size: Arc::new(AtomicU64::new(0)),
            stat_errors: Arc::new(AtomicU64::new(0)),
            read_errors: Arc::new(AtomicU64::new(0)),
            bytes_read: Arc::new(AtomicU64::new(0)),
            chunks_scanned: Arc::new(AtomicU64::new(0)),
            accelerated_chunks: Arc::new(AtomicU64::new(0)),
            accelerator_fallbacks: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn record_dir_listed(&self) {
        self.dirs_listed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_listing_error(&self) {
        self.listing_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_system_folder_skipped(&self) {
        self.system_folders_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_filtered(&self, reason: FilterReason) {
        let counter = match reason {
            FilterReason::Filename => &self.filtered_by_name,
            FilterReason::Extension => &self.filtered_by_extension,
            FilterReason::Size => &self.filtered_by_size,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_stat_error(&self) {
        self.stat_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_read_error(&self) {
        self.read_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_bytes_read(&self, bytes: u64) {
        self.bytes_read.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Records one chunk handed to the pattern matcher
    pub fn record_chunk(&self) {
        self.chunks_scanned.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_accelerated_chunk(&self) {
        self.accelerated_chunks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_accelerator_fallback(&self) {
        self.accelerator_fallbacks.fetch_add(1, Ordering::Relaxed);
    }

    /// Gets a point-in-time copy of every counter
    pub fn get_stats(&self) -> ScanStats {
        ScanStats {
            dirs_listed: self.dirs_listed.load(Ordering::Relaxed),
            listing_errors: self.listing_errors.load(Ordering::Relaxed),
            system_folders_skipped: self.system_folders_skipped.load(Ordering::Relaxed),
            filtered_by_name: self.filtered_by_name.load(Ordering::Relaxed),
            filtered_by_extension: self.filtered_by_extension.load(Ordering::Relaxed),
            filtered_by_size: self.filtered_by_size.load(Ordering::Relaxed),
            stat_errors: self.stat_errors.load(Ordering::Relaxed),
            read_errors: self.read_errors.load(Ordering::Relaxed),
            bytes_read: self.bytes_read.load(Ordering::Relaxed),
            chunks_scanned: self.chunks_scanned.load(Ordering::Relaxed),
            accelerated_chunks: self.accelerated_chunks.load(Ordering::Relaxed),
            accelerator_fallbacks: self.accelerator_fallbacks.load(Ordering::Relaxed),
        }
    }

    /// Logs current scan statistics
    pub fn log_stats(&self) {
        let stats = self.get_stats();
        info!(
            "Scan stats:\n\
             Directories listed: {} ({} errors, {} system folders skipped)\n\
             Files filtered (name/extension/size): {}/{}/{}\n\
             Stat/read errors: {}/{}\n\
             Bytes read: {}\n\
             Chunks scanned: {} ({} accelerated, {} fallbacks)",
            stats.dirs_listed,
            stats.listing_errors,
            stats.system_folders_skipped,
            stats.filtered_by_name,
            stats.filtered_by_extension,
            stats.filtered_by_size,
            stats.stat_errors,
            stats.read_errors,
            stats.bytes_read,
            stats.chunks_scanned,
            stats.accelerated_chunks,
            stats.accelerator_fallbacks
        );
    }
}

impl Default for ScanMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Statistics gathered during a scan
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScanStats {
    pub dirs_listed: u64,
    pub listing_errors: u64,
    pub system_folders_skipped: u64,
    pub filtered_by_name: u64,
    pub filtered_by_extension: u64,
    pub filtered_by_size: u64,
    pub stat_errors: u64,
    pub read_errors: u64,
    pub bytes_read: u64,
    pub chunks_scanned: u64,
    pub accelerated_chunks: u64,
    pub accelerator_fallbacks: u64,
}
