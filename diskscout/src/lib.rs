pub mod config;
pub mod errors;
pub mod filters;
pub mod metrics;
pub mod results;
pub mod roots;
pub mod scan;
pub mod status;

pub use config::{Acceleration, ScanConfig};
pub use errors::{ScanError, ScanResult};
pub use metrics::{ScanMetrics, ScanStats};
pub use results::{MatchReason, MatchRecord, ScanOutput, ScanSummary};
pub use scan::{CancelHandle, ContentPattern, ScanCoordinator};
pub use status::{CollectingSink, NullSink, StatusSink, StatusSnapshot};

use std::sync::Arc;

/// Runs a scan with the given configuration and reports progress to `sink`
pub fn scan(config: ScanConfig, sink: Arc<dyn StatusSink>) -> ScanResult<ScanOutput> {
    ScanCoordinator::new(config)?.run(sink)
}
