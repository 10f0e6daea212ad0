use config::{Config as ConfigBuilder, ConfigError, File};
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::errors::{ScanError, ScanResult};
use crate::filters::SizeBounds;
use crate::scan::matcher::ContentPattern;

/// Default size of the windows read from each file during content evaluation
pub const DEFAULT_CHUNK_SIZE: usize = 2 * 1024 * 1024;

/// Folder names skipped when `skip_system_folders` is enabled
pub const DEFAULT_SYSTEM_FOLDERS: &[&str] = &[
    "AppData",
    "Local",
    "Microsoft",
    "Windows",
    "ProgramData",
    "Program Files",
    "Program Files (x86)",
];

/// Configuration for a scan, shared read-only by every worker.
///
/// # Configuration Locations
///
/// The configuration can be loaded from multiple locations in order of precedence:
/// 1. Custom config file specified via `--config` flag
/// 2. Local `.diskscout.yaml` in the current directory
/// 3. Global `$HOME/.config/diskscout/config.yaml`
///
/// # Configuration Format
///
/// ```yaml
/// # Directory to start from
/// root_path: "/var/log"
///
/// # Descend into subdirectories
/// recurse: true
///
/// # Only files whose name ends with this (case-insensitive)
/// extension_filter: "log"
///
/// # Size bounds in bytes, both inclusive
/// min_size: 1024
/// max_size: 10485760
///
/// # At most one of content_text, content_hex, content_base64
/// content_text: "panic"
///
/// # Worker threads (default: CPU cores)
/// worker_count: 8
///
/// # Skip AppData, Windows, Program Files, ...
/// skip_system_folders: true
/// ```
///
/// When using the CLI, command-line arguments take precedence over config file
/// values. See [`ScanConfig::merge_with_cli`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Directory (or file) to start scanning from
    pub root_path: PathBuf,

    /// Seed every fixed disk of the host instead of `root_path`
    pub all_disks: bool,

    /// Scan this disk root instead of `root_path`
    pub explicit_disk: Option<PathBuf>,

    /// Seed the filesystem root that contains the start path
    pub roots_are_drive_letters_only: bool,

    /// Expand subdirectories below the seed roots
    pub recurse: bool,

    /// Only files with exactly this name
    pub filename_focus: Option<String>,

    /// Case-insensitive literal text to look for inside files
    pub content_text: Option<String>,

    /// Hex-encoded bytes to look for inside files
    pub content_hex: Option<String>,

    /// Base64-encoded bytes to look for inside files
    pub content_base64: Option<String>,

    /// Case-insensitive filename suffix, with or without the leading dot
    pub extension_filter: Option<String>,

    /// Files smaller than this many bytes are skipped
    pub min_size: Option<u64>,

    /// Files larger than this many bytes are skipped
    pub max_size: Option<u64>,

    /// Number of worker threads.
    /// Defaults to number of CPU cores if not specified
    pub worker_count: NonZeroUsize,

    /// Report every enumerated file to the status sink, not just matches
    pub announce_every_file: bool,

    /// Suppress live worker status
    pub quiet: bool,

    /// Treat every file passing the non-content filters as a match without reading it
    pub simulate_only: bool,

    /// Pause after each file task
    pub inter_task_delay_seconds: Option<f64>,

    /// Report listing, stat and read failures
    pub surface_errors: bool,

    /// Skip paths containing one of `system_folders` as a component
    pub skip_system_folders: bool,

    /// Component names considered system folders
    pub system_folders: Vec<String>,

    /// Emit the end-of-scan summary
    pub show_stats: bool,

    /// Bytes read per chunk during content evaluation
    pub chunk_size: usize,

    /// How long a worker waits for work before checking for exhaustion
    pub dequeue_timeout_ms: u64,

    /// Cadence of status snapshots
    pub poll_interval_ms: u64,

    /// Whether workers may use the accelerated substring search
    pub acceleration: Acceleration,

    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

/// Selects whether the accelerated matcher is probed at worker startup
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Acceleration {
    #[default]
    Auto,
    Disabled,
}

fn default_worker_count() -> NonZeroUsize {
    NonZeroUsize::new(num_cpus::get()).unwrap_or(NonZeroUsize::MIN)
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            root_path: PathBuf::from("."),
            all_disks: false,
            explicit_disk: None,
            roots_are_drive_letters_only: false,
            recurse: true,
            filename_focus: None,
            content_text: None,
            content_hex: None,
            content_base64: None,
            extension_filter: None,
            min_size: None,
            max_size: None,
            worker_count: default_worker_count(),
            announce_every_file: false,
            quiet: false,
            simulate_only: false,
            inter_task_delay_seconds: None,
            surface_errors: false,
            skip_system_folders: false,
            system_folders: DEFAULT_SYSTEM_FOLDERS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            show_stats: false,
            chunk_size: DEFAULT_CHUNK_SIZE,
            dequeue_timeout_ms: 1000,
            poll_interval_ms: 200,
            acceleration: Acceleration::Auto,
            log_level: default_log_level(),
        }
    }
}

impl ScanConfig {
    /// Creates a default configuration rooted at `root_path`
    pub fn new(root_path: impl Into<PathBuf>) -> Self {
        Self {
            root_path: root_path.into(),
            ..Self::default()
        }
    }

    /// Loads configuration from the default locations
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Loads configuration from the default locations plus a specific file.
    /// A missing default file is ignored, a missing explicit file is an error.
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = ConfigBuilder::builder();

        let default_files = [
            // Global config
            dirs::config_dir().map(|p| p.join("diskscout/config.yaml")),
            // Local config
            Some(PathBuf::from(".diskscout.yaml")),
        ];

        for path in default_files.iter().flatten() {
            if path.exists() {
                builder = builder.add_source(File::from(path.as_path()).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::from(path).required(true));
        }

        builder.build()?.try_deserialize()
    }

    /// Merges CLI arguments with configuration file values
    pub fn merge_with_cli(mut self, cli_config: ScanConfig) -> Self {
        let defaults = ScanConfig::default();
        let cli_has_content_filter = cli_config.has_content_filter();

        // CLI values take precedence over config file values
        if cli_config.root_path != defaults.root_path {
            self.root_path = cli_config.root_path;
        }
        self.all_disks |= cli_config.all_disks;
        if cli_config.explicit_disk.is_some() {
            self.explicit_disk = cli_config.explicit_disk;
        }
        self.roots_are_drive_letters_only |= cli_config.roots_are_drive_letters_only;
        if !cli_config.recurse {
            self.recurse = false;
        }
        if cli_config.filename_focus.is_some() {
            self.filename_focus = cli_config.filename_focus;
        }
        if cli_has_content_filter {
            // A content filter on the command line replaces the file's one
            self.content_text = cli_config.content_text;
            self.content_hex = cli_config.content_hex;
            self.content_base64 = cli_config.content_base64;
        }
        if cli_config.extension_filter.is_some() {
            self.extension_filter = cli_config.extension_filter;
        }
        if cli_config.min_size.is_some() {
            self.min_size = cli_config.min_size;
        }
        if cli_config.max_size.is_some() {
            self.max_size = cli_config.max_size;
        }
        if cli_config.worker_count != defaults.worker_count {
            self.worker_count = cli_config.worker_count;
        }
        self.announce_every_file |= cli_config.announce_every_file;
        self.quiet |= cli_config.quiet;
        self.simulate_only |= cli_config.simulate_only;
        if cli_config.inter_task_delay_seconds.is_some() {
            self.inter_task_delay_seconds = cli_config.inter_task_delay_seconds;
        }
        self.surface_errors |= cli_config.surface_errors;
        self.skip_system_folders |= cli_config.skip_system_folders;
        self.show_stats |= cli_config.show_stats;
        if cli_config.chunk_size != defaults.chunk_size {
            self.chunk_size = cli_config.chunk_size;
        }
        if cli_config.acceleration != defaults.acceleration {
            self.acceleration = cli_config.acceleration;
        }
        if cli_config.log_level != defaults.log_level {
            self.log_level = cli_config.log_level;
        }
        self
    }

    /// Checks the configuration and compiles the content predicate, if any.
    ///
    /// Runs once before the scan starts so that malformed hex or base64 input
    /// is reported instead of silently never matching.
    pub fn validate(&self) -> ScanResult<Option<ContentPattern>> {
        if self.chunk_size == 0 {
            return Err(ScanError::config_error("chunk_size must be greater than 0"));
        }
        if self.dequeue_timeout_ms == 0 {
            return Err(ScanError::config_error(
                "dequeue_timeout_ms must be greater than 0",
            ));
        }
        if self.poll_interval_ms == 0 {
            return Err(ScanError::config_error(
                "poll_interval_ms must be greater than 0",
            ));
        }
        if let Some(delay) = self.inter_task_delay_seconds {
            if !delay.is_finite() || delay < 0.0 {
                return Err(ScanError::config_error(format!(
                    "inter_task_delay_seconds must be a non-negative number, got {}",
                    delay
                )));
            }
        }

        let supplied = [
            self.content_text.is_some(),
            self.content_hex.is_some(),
            self.content_base64.is_some(),
        ]
        .iter()
        .filter(|&&set| set)
        .count();
        if supplied > 1 {
            return Err(ScanError::config_error(
                "only one of content_text, content_hex and content_base64 may be set",
            ));
        }

        if let Some(text) = &self.content_text {
            return ContentPattern::text(text).map(Some);
        }
        if let Some(hex) = &self.content_hex {
            return ContentPattern::from_hex(hex).map(Some);
        }
        if let Some(b64) = &self.content_base64 {
            return ContentPattern::from_base64(b64).map(Some);
        }
        Ok(None)
    }

    /// Whether any content predicate is configured
    pub fn has_content_filter(&self) -> bool {
        self.content_text.is_some() || self.content_hex.is_some() || self.content_base64.is_some()
    }

    pub fn size_bounds(&self) -> SizeBounds {
        SizeBounds {
            min: self.min_size,
            max: self.max_size,
        }
    }

    /// The pause applied after each file task, if any
    pub fn inter_task_delay(&self) -> Option<Duration> {
        self.inter_task_delay_seconds
            .filter(|d| d.is_finite() && *d > 0.0)
            .map(Duration::from_secs_f64)
    }

    pub fn dequeue_timeout(&self) -> Duration {
        Duration::from_millis(self.dequeue_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}
