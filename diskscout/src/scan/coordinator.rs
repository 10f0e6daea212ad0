use std::fs;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;
use tracing::{debug, error, info};

use super::matcher::ContentPattern;
use super::queue::{ScanTask, TaskKind};
use super::worker::{CancelHandle, ScanContext, ScanWorker};
use crate::config::ScanConfig;
use crate::errors::{ScanError, ScanResult};
use crate::filters::is_system_folder;
use crate::results::ScanOutput;
use crate::roots::seed_roots;
use crate::status::StatusSink;

/// Runs a scan: seeds the queue, starts the worker pool and reports progress
/// until every worker has left its loop.
#[derive(Debug)]
pub struct ScanCoordinator {
    config: Arc<ScanConfig>,
    pattern: Option<ContentPattern>,
    cancel: CancelHandle,
}

impl ScanCoordinator {
    /// Validates the configuration. Malformed content patterns and conflicting
    /// content filters are rejected here, before any file is touched.
    pub fn new(config: ScanConfig) -> ScanResult<Self> {
        let pattern = config.validate()?;
        Ok(Self {
            config: Arc::new(config),
            pattern,
            cancel: CancelHandle::new(),
        })
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// A handle that stops the scan from another thread
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Runs the scan to completion (or cancellation) on the calling thread
    pub fn run(&self, sink: Arc<dyn StatusSink>) -> ScanResult<ScanOutput> {
        let started = Instant::now();
        let worker_count = self.config.worker_count.get();
        let ctx = Arc::new(ScanContext::new(
            Arc::clone(&self.config),
            sink,
            self.cancel.clone(),
        ));

        match &self.pattern {
            Some(pattern) => info!("Starting scan for {} with {} workers", pattern, worker_count),
            None => info!("Starting scan with {} workers", worker_count),
        }
        self.seed(&ctx);

        let handles = self.spawn_workers(&ctx, worker_count)?;
        let cancelled = self.poll(&ctx, &handles, started);

        if cancelled {
            info!("Scan cancelled, not waiting for workers");
            ctx.queue.close();
        } else {
            for (id, handle) in handles.into_iter().enumerate() {
                if handle.join().is_err() {
                    error!("Worker {} panicked", id);
                }
            }
        }

        let output = ScanOutput {
            matches: ctx.results.matches(),
            files_scanned: ctx.results.files_scanned(),
            elapsed: started.elapsed(),
            cancelled,
            stats: ctx.metrics.get_stats(),
        };

        ctx.metrics.log_stats();
        info!(
            "Scan complete. {} matches in {} scanned files",
            output.matches.len(),
            output.files_scanned
        );
        if self.config.show_stats {
            ctx.sink.on_summary(&output.summary());
        }

        Ok(output)
    }

    fn seed(&self, ctx: &ScanContext) {
        for root in seed_roots(&self.config) {
            if self.config.skip_system_folders
                && is_system_folder(&root, &self.config.system_folders)
            {
                debug!("Seed {} is a system folder, skipping", root.display());
                ctx.metrics.record_system_folder_skipped();
                continue;
            }

            // Seeds are followed even when they are symlinks
            match fs::metadata(&root) {
                Ok(metadata) => {
                    let kind = if metadata.is_dir() {
                        TaskKind::Directory
                    } else {
                        TaskKind::File
                    };
                    debug!("Seeding {} ({:?})", root.display(), kind);
                    ctx.queue.enqueue(ScanTask::new(root, kind));
                }
                Err(e) => ctx.report_listing_error(&root, e),
            }
        }
    }

    fn spawn_workers(
        &self,
        ctx: &Arc<ScanContext>,
        worker_count: usize,
    ) -> ScanResult<Vec<JoinHandle<()>>> {
        let mut handles = Vec::with_capacity(worker_count);
        for id in 0..worker_count {
            let worker = ScanWorker::new(id, Arc::clone(ctx), self.pattern.clone());
            let spawned = thread::Builder::new()
                .name(format!("diskscout-worker-{}", id))
                .spawn(move || worker.run());

            match spawned {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    // Started workers see the closed queue and exit
                    ctx.queue.close();
                    return Err(ScanError::WorkerSpawn(e));
                }
            }
        }
        Ok(handles)
    }

    /// Forwards snapshots until every worker has finished. Returns whether the
    /// scan was cancelled instead.
    fn poll(&self, ctx: &ScanContext, handles: &[JoinHandle<()>], started: Instant) -> bool {
        let interval = self.config.poll_interval();
        loop {
            let finished = handles.iter().all(JoinHandle::is_finished);
            if !self.config.quiet {
                ctx.sink.on_snapshot(&ctx.snapshot(started.elapsed()));
            }
            if self.cancel.is_cancelled() {
                return true;
            }
            if finished {
                return false;
            }
            thread::sleep(interval);
        }
    }
}
