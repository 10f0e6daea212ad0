/// The scan engine: a work queue drained by a fixed pool of worker threads.
///
/// ```text
/// ScanCoordinator ──seeds──▶ WorkQueue ◀──subdirectories── ScanWorker ×N
///        │                                                     │
///        └──polls StatusBoard / counters──▶ StatusSink ◀──matches┘
/// ```
///
/// Workers take one task at a time. A directory task is listed and its entries
/// are pushed back onto the queue; a file task runs through the
/// [`evaluator::FileEvaluator`] which applies the cheap filters first and only
/// then streams the file through a [`matcher::PatternMatcher`] chunk by chunk.
///
/// The scan ends when the queue is empty and no task is still being processed
/// (see [`queue::WorkQueue`]). At that point every worker leaves its loop and
/// the coordinator joins them.
///
/// # Matching strategies
///
/// The content predicate is applied per chunk by one of two strategies:
/// - [`matcher::ReferenceSearch`]: `memchr::memmem`, used for small chunks and as
///   the fallback
/// - [`accelerator::AcceleratedSearch`]: one lane per start offset on a dedicated
///   rayon pool, used for large chunks when the host has the cores for it
///
/// Both are exact byte searches. Text patterns are made case-insensitive by
/// lowercasing the needle and the chunk before either strategy sees them.
pub mod accelerator;
pub mod coordinator;
pub mod evaluator;
pub mod matcher;
pub mod queue;
pub mod reader;
pub mod worker;

pub use coordinator::ScanCoordinator;
pub use evaluator::{Disposition, FileEvaluator};
pub use matcher::{ContentKind, ContentPattern, PatternMatcher, ReferenceSearch, SearchStrategy};
pub use queue::{ScanTask, TaskKind, WorkQueue};
pub use reader::ChunkedReader;
pub use worker::CancelHandle;
