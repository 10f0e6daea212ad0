use std::fs::{self, DirEntry};
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, trace, warn};

use super::evaluator::{Disposition, FileEvaluator};
use super::matcher::ContentPattern;
use super::queue::{Dequeued, ScanTask, TaskKind, WorkQueue};
use crate::config::ScanConfig;
use crate::errors::ScanError;
use crate::filters::is_system_folder;
use crate::metrics::ScanMetrics;
use crate::results::{MatchReason, MatchRecord, SharedResults};
use crate::status::{StatusBoard, StatusSink, StatusSnapshot, WorkerState};

/// Cloneable flag that asks a running scan to stop
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// State shared by the coordinator and every worker of one scan
pub struct ScanContext {
    pub config: Arc<ScanConfig>,
    pub queue: WorkQueue,
    pub results: SharedResults,
    pub board: StatusBoard,
    pub metrics: ScanMetrics,
    pub sink: Arc<dyn StatusSink>,
    pub cancel: CancelHandle,
}

impl ScanContext {
    pub fn new(config: Arc<ScanConfig>, sink: Arc<dyn StatusSink>, cancel: CancelHandle) -> Self {
        let board = StatusBoard::new(config.worker_count.get());
        Self {
            config,
            queue: WorkQueue::new(),
            results: SharedResults::new(),
            board,
            metrics: ScanMetrics::new(),
            sink,
            cancel,
        }
    }

    /// Logs a recoverable error, and hands it to the sink when errors are surfaced
    pub fn report_error(&self, error: ScanError) {
        if self.config.surface_errors {
            warn!("{}", error);
            self.sink.on_error(&error);
        } else {
            debug!("{}", error);
        }
    }

    pub fn report_listing_error(&self, path: &Path, source: io::Error) {
        self.metrics.record_listing_error();
        self.report_error(ScanError::directory_listing(path, source));
    }

    pub fn snapshot(&self, elapsed: Duration) -> StatusSnapshot {
        StatusSnapshot {
            workers: self.board.render(),
            files_scanned: self.results.files_scanned(),
            matched: self.results.matched_count(),
            elapsed,
        }
    }
}

/// One worker thread: drains the queue, lists directories and evaluates files
/// until the queue is exhausted, closed or the scan is cancelled.
pub struct ScanWorker {
    id: usize,
    ctx: Arc<ScanContext>,
    evaluator: FileEvaluator,
}

impl ScanWorker {
    pub fn new(id: usize, ctx: Arc<ScanContext>, pattern: Option<ContentPattern>) -> Self {
        let evaluator =
            FileEvaluator::new(Arc::clone(&ctx.config), pattern, ctx.metrics.clone());
        Self { id, ctx, evaluator }
    }

    fn set_state(&self, state: WorkerState) {
        self.ctx.board.set(self.id, state);
    }

    pub fn run(mut self) {
        debug!("Worker {} started", self.id);
        let ctx = Arc::clone(&self.ctx);
        let timeout = ctx.config.dequeue_timeout();
        let delay = ctx.config.inter_task_delay();

        while !ctx.cancel.is_cancelled() {
            match ctx.queue.dequeue(timeout) {
                Dequeued::Task(task) => {
                    trace!("Worker {} took {}", self.id, task.path.display());
                    let kind = task.kind;
                    match kind {
                        TaskKind::Directory => self.expand(&task),
                        TaskKind::File => self.process_file(&task),
                    }
                    self.set_state(WorkerState::Idle);
                    task.finish();

                    if kind == TaskKind::File {
                        if let Some(delay) = delay {
                            thread::sleep(delay);
                        }
                    }
                }
                Dequeued::TimedOut => self.set_state(WorkerState::Idle),
                Dequeued::Exhausted | Dequeued::Closed => break,
            }
        }

        self.set_state(WorkerState::Idle);
        debug!("Worker {} finished", self.id);
    }

    /// Lists one directory and enqueues what it contains
    fn expand(&self, task: &ScanTask) {
        self.set_state(WorkerState::listing(&task.path));
        let config = &self.ctx.config;

        let entries = match fs::read_dir(&task.path) {
            Ok(entries) => entries,
            Err(e) => {
                self.ctx.report_listing_error(&task.path, e);
                return;
            }
        };
        self.ctx.metrics.record_dir_listed();

        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    self.ctx.report_listing_error(&task.path, e);
                    continue;
                }
            };
            let Some(kind) = entry_kind(&entry) else {
                continue;
            };
            if kind == TaskKind::Directory && !config.recurse {
                continue;
            }

            let path = entry.path();
            if config.recurse
                && config.skip_system_folders
                && is_system_folder(&path, &config.system_folders)
            {
                trace!("Skipping system folder {}", path.display());
                self.ctx.metrics.record_system_folder_skipped();
                continue;
            }
            self.ctx.queue.enqueue(ScanTask::new(path, kind));
        }
    }

    fn process_file(&mut self, task: &ScanTask) {
        let ctx = &self.ctx;
        let id = self.id;
        ctx.board.set(id, WorkerState::filtering(&task.path));

        let disposition = self
            .evaluator
            .evaluate(&task.path, |state| ctx.board.set(id, state));

        if disposition.counts_as_scanned() {
            ctx.results.record_scanned();
        }
        match disposition {
            Disposition::Evaluated(Some(reason)) => {
                let record = MatchRecord::new(task.path.clone(), reason);
                if reason != MatchReason::Enumerated || ctx.config.announce_every_file {
                    ctx.sink.on_match(&record);
                }
                ctx.results.record_match(record);
            }
            Disposition::Abandoned(error) => ctx.report_error(error),
            Disposition::Evaluated(None) | Disposition::Filtered(_) => {}
        }
    }
}

/// Classifies a directory entry without following directory symlinks.
///
/// Symlinks to files are evaluated; symlinks to directories and special files
/// are skipped. A dangling link is handed on as a file so its stat failure is
/// reported like any other.
fn entry_kind(entry: &DirEntry) -> Option<TaskKind> {
    let file_type = match entry.file_type() {
        Ok(file_type) => file_type,
        Err(_) => return Some(TaskKind::File),
    };
    if file_type.is_dir() {
        Some(TaskKind::Directory)
    } else if file_type.is_file() {
        Some(TaskKind::File)
    } else if file_type.is_symlink() {
        match fs::metadata(entry.path()) {
            Ok(metadata) if metadata.is_file() => Some(TaskKind::File),
            Ok(_) => None,
            Err(_) => Some(TaskKind::File),
        }
    } else {
        None
    }
}
