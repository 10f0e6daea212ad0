//! Data-parallel substring search.
//!
//! Every start offset of the haystack is compared against the needle
//! independently, the way a GPU kernel would assign one lane per offset. The
//! lanes run on a dedicated rayon pool that stands in for the device; probing
//! for the device means building that pool once per process.
use once_cell::sync::OnceCell;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, info};

use super::matcher::SearchStrategy;
use crate::config::Acceleration;
use crate::errors::{ScanError, ScanResult};

/// Chunks shorter than this are searched with the reference strategy
pub const ACCELERATED_MIN_LEN: usize = 64 * 1024;

/// Offsets handed to one lane group at a time
const LANE_BLOCK: usize = 4096;

static DEVICE: OnceCell<Result<Arc<AcceleratedSearch>, String>> = OnceCell::new();

/// Per-offset parallel matcher running on its own thread pool
#[derive(Debug)]
pub struct AcceleratedSearch {
    pool: ThreadPool,
    lanes: usize,
}

impl AcceleratedSearch {
    /// Builds a device with `lanes` threads. Fewer than two lanes is no device.
    pub fn with_lanes(lanes: usize) -> ScanResult<Self> {
        if lanes < 2 {
            return Err(ScanError::accelerator(format!(
                "{} lane(s) available, parallel search needs at least 2",
                lanes
            )));
        }
        let pool = ThreadPoolBuilder::new()
            .num_threads(lanes)
            .thread_name(|i| format!("diskscout-accel-{}", i))
            .build()
            .map_err(|e| ScanError::accelerator(e.to_string()))?;
        Ok(Self { pool, lanes })
    }

    pub fn lanes(&self) -> usize {
        self.lanes
    }
}

impl SearchStrategy for AcceleratedSearch {
    fn name(&self) -> &'static str {
        "accelerated"
    }

    fn contains(&self, haystack: &[u8], needle: &[u8]) -> ScanResult<bool> {
        if needle.is_empty() {
            return Ok(true);
        }
        if needle.len() > haystack.len() {
            return Ok(false);
        }
        let last = haystack.len() - needle.len();
        let first = needle[0];

        panic::catch_unwind(AssertUnwindSafe(|| {
            self.pool.install(|| {
                (0..last + 1)
                    .into_par_iter()
                    .with_min_len(LANE_BLOCK)
                    .any(|i| haystack[i] == first && &haystack[i..i + needle.len()] == needle)
            })
        }))
        .map_err(|_| ScanError::accelerator("parallel search lane panicked"))
    }
}

/// Probes for the shared accelerated device.
///
/// The probe runs once per process; later calls return the cached outcome.
/// `None` means workers must use the reference strategy.
pub fn probe(mode: Acceleration) -> Option<Arc<AcceleratedSearch>> {
    if mode == Acceleration::Disabled {
        debug!("Accelerated search disabled by configuration");
        return None;
    }

    let outcome = DEVICE.get_or_init(|| {
        AcceleratedSearch::with_lanes(num_cpus::get())
            .map(|device| {
                info!("Accelerated search available with {} lanes", device.lanes());
                Arc::new(device)
            })
            .map_err(|e| e.to_string())
    });

    match outcome {
        Ok(device) => Some(Arc::clone(device)),
        Err(reason) => {
            debug!("Accelerated search unavailable: {}", reason);
            None
        }
    }
}
