use std::fs;
use std::path::Path;
use std::sync::Arc;

use super::accelerator;
use super::matcher::{ContentPattern, PatternMatcher, SearchStrategy};
use super::reader::ChunkedReader;
use crate::config::ScanConfig;
use crate::errors::ScanError;
use crate::filters::{has_valid_extension, matches_filename, SizeBounds};
use crate::metrics::{FilterReason, ScanMetrics};
use crate::results::MatchReason;
use crate::status::WorkerState;

/// Terminal state of one file task
#[derive(Debug)]
pub enum Disposition {
    /// Rejected by a filter before any content was read
    Filtered(FilterReason),
    /// All filters passed; carries the match reason if the file matched
    Evaluated(Option<MatchReason>),
    /// An I/O failure ended the task early
    Abandoned(ScanError),
}

impl Disposition {
    /// Whether the file reached the counting point.
    ///
    /// The size check is the first step that touches the file, so a file the
    /// size bounds reject has been scanned; name and extension rejections have not.
    pub fn counts_as_scanned(&self) -> bool {
        matches!(
            self,
            Disposition::Filtered(FilterReason::Size) | Disposition::Evaluated(_)
        )
    }

    pub fn match_reason(&self) -> Option<MatchReason> {
        match self {
            Disposition::Evaluated(reason) => *reason,
            _ => None,
        }
    }
}

/// Runs the per-file pipeline: name, extension and size filters, then the
/// content predicate, then the match policy.
///
/// Owned by a single worker because the matcher keeps a reusable buffer.
#[derive(Debug)]
pub struct FileEvaluator {
    config: Arc<ScanConfig>,
    bounds: SizeBounds,
    matcher: Option<PatternMatcher>,
    metrics: ScanMetrics,
}

impl FileEvaluator {
    pub fn new(
        config: Arc<ScanConfig>,
        pattern: Option<ContentPattern>,
        metrics: ScanMetrics,
    ) -> Self {
        let matcher = pattern.map(|pattern| {
            let device = accelerator::probe(config.acceleration)
                .map(|device| device as Arc<dyn SearchStrategy>);
            PatternMatcher::with_metrics(pattern, device, metrics.clone())
        });
        Self {
            bounds: config.size_bounds(),
            config,
            matcher,
            metrics,
        }
    }

    /// Evaluates one file. `on_state` is told when the evaluator starts
    /// reading file content.
    pub fn evaluate(&mut self, path: &Path, mut on_state: impl FnMut(WorkerState)) -> Disposition {
        if !matches_filename(path, self.config.filename_focus.as_deref()) {
            return self.filtered(FilterReason::Filename);
        }
        if !has_valid_extension(path, self.config.extension_filter.as_deref()) {
            return self.filtered(FilterReason::Extension);
        }

        let size = match fs::metadata(path) {
            Ok(metadata) => metadata.len(),
            Err(e) => {
                self.metrics.record_stat_error();
                return Disposition::Abandoned(ScanError::stat(path, e));
            }
        };
        if !self.bounds.contains(size) {
            return self.filtered(FilterReason::Size);
        }

        let content_matched = if self.config.simulate_only {
            true
        } else {
            on_state(WorkerState::reading(path));
            match self.scan_content(path) {
                Ok(found) => found,
                Err(e) => {
                    self.metrics.record_read_error();
                    return Disposition::Abandoned(e);
                }
            }
        };

        Disposition::Evaluated(self.resolve(content_matched))
    }

    fn filtered(&self, reason: FilterReason) -> Disposition {
        self.metrics.record_filtered(reason);
        Disposition::Filtered(reason)
    }

    /// Streams the file and stops at the first chunk containing the needle.
    ///
    /// Without a content predicate the file is only opened, so a file that
    /// cannot be opened is abandoned rather than enumerated.
    fn scan_content(&mut self, path: &Path) -> Result<bool, ScanError> {
        let mut reader = ChunkedReader::open(path, self.config.chunk_size)
            .map_err(|e| ScanError::file_open(path, e))?;
        let Some(matcher) = self.matcher.as_mut() else {
            return Ok(true);
        };

        while let Some(chunk) = reader
            .next_chunk()
            .map_err(|e| ScanError::file_read(path, e))?
        {
            self.metrics.record_bytes_read(chunk.len() as u64);
            if matcher.matches(chunk) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Applies the match policy to a file that passed every filter
    fn resolve(&self, content_matched: bool) -> Option<MatchReason> {
        let has_content = self.matcher.is_some();
        if self.config.filename_focus.is_some() {
            // The name already matched; content only counts when configured
            (!has_content || content_matched).then_some(MatchReason::FilenameMatch)
        } else if has_content {
            content_matched.then_some(MatchReason::ContentMatch)
        } else {
            Some(MatchReason::Enumerated)
        }
    }
}
