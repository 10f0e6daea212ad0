use clap::{Parser, Subcommand};
use colored::Colorize;
use diskscout::{
    roots::all_disk_roots, scan, Acceleration, MatchReason, MatchRecord, ScanConfig, ScanError,
    ScanOutput, ScanSummary, StatusSink, StatusSnapshot,
};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use std::{io, num::NonZeroUsize, path::PathBuf};
use tracing::debug;
use tracing_subscriber::EnvFilter;

type Result<T> = std::result::Result<T, ScanError>;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Parser)]
struct CliScanConfig {
    /// Directory or file to scan [default: .]
    #[arg(short = 'd', long)]
    root: Option<PathBuf>,

    /// Scan every fixed disk of this machine
    #[arg(long)]
    all_disks: bool,

    /// Scan this disk root instead of --root
    #[arg(long)]
    disk: Option<PathBuf>,

    /// Scan the drive (filesystem root) that contains --root
    #[arg(long)]
    drive_root: bool,

    /// Only scan the top level, do not descend into subdirectories
    #[arg(long)]
    no_recurse: bool,

    /// Only files with exactly this name
    #[arg(short = 'n', long)]
    name: Option<String>,

    /// Text to look for inside files (case-insensitive)
    #[arg(short = 't', long)]
    text: Option<String>,

    /// Hex-encoded bytes to look for inside files
    #[arg(long)]
    hex: Option<String>,

    /// Base64-encoded bytes to look for inside files
    #[arg(long)]
    base64: Option<String>,

    /// Only files with this extension (e.g. log)
    #[arg(short = 'e', long)]
    ext: Option<String>,

    /// Skip files smaller than this many bytes
    #[arg(long)]
    min_size: Option<u64>,

    /// Skip files larger than this many bytes
    #[arg(long)]
    max_size: Option<u64>,

    /// Number of worker threads
    #[arg(short = 'j', long)]
    threads: Option<NonZeroUsize>,

    /// Print every scanned file, not only matches
    #[arg(short = 'a', long)]
    all: bool,

    /// Hide the live worker status
    #[arg(short = 'q', long)]
    quiet: bool,

    /// Report files passing the filters as matches without reading them
    #[arg(long)]
    simulate: bool,

    /// Seconds to pause after each file
    #[arg(long)]
    delay: Option<f64>,

    /// Report directories and files that could not be read
    #[arg(long)]
    errors: bool,

    /// Skip AppData, Windows, Program Files and similar folders
    #[arg(long)]
    skip_system: bool,

    /// Print elapsed time and totals when done
    #[arg(short = 's', long)]
    stats: bool,

    /// Bytes read per chunk
    #[arg(long)]
    chunk_size: Option<usize>,

    /// Never use the parallel substring search
    #[arg(long)]
    no_accel: bool,

    /// Print the result as JSON instead of one line per match
    #[arg(long)]
    json: bool,

    /// Configuration file (YAML)
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,
}

impl CliScanConfig {
    /// The command line as a configuration; unset options keep their defaults
    fn to_scan_config(&self) -> ScanConfig {
        let defaults = ScanConfig::default();
        ScanConfig {
            root_path: self.root.clone().unwrap_or(defaults.root_path.clone()),
            all_disks: self.all_disks,
            explicit_disk: self.disk.clone(),
            roots_are_drive_letters_only: self.drive_root,
            recurse: !self.no_recurse,
            filename_focus: self.name.clone(),
            content_text: self.text.clone(),
            content_hex: self.hex.clone(),
            content_base64: self.base64.clone(),
            extension_filter: self.ext.clone(),
            min_size: self.min_size,
            max_size: self.max_size,
            worker_count: self.threads.unwrap_or(defaults.worker_count),
            announce_every_file: self.all,
            quiet: self.quiet,
            simulate_only: self.simulate,
            inter_task_delay_seconds: self.delay,
            surface_errors: self.errors,
            skip_system_folders: self.skip_system,
            show_stats: self.stats,
            chunk_size: self.chunk_size.unwrap_or(defaults.chunk_size),
            acceleration: if self.no_accel {
                Acceleration::Disabled
            } else {
                defaults.acceleration
            },
            log_level: self.log_level.clone().unwrap_or(defaults.log_level.clone()),
            ..defaults
        }
    }

    /// Layers the command line over a configuration loaded from files.
    ///
    /// Options given on the command line always win, including those whose
    /// value equals the built-in default.
    fn merge_into(&self, file_config: ScanConfig) -> ScanConfig {
        let mut config = file_config.merge_with_cli(self.to_scan_config());
        if let Some(root) = &self.root {
            config.root_path = root.clone();
        }
        if let Some(threads) = self.threads {
            config.worker_count = threads;
        }
        if let Some(chunk_size) = self.chunk_size {
            config.chunk_size = chunk_size;
        }
        if let Some(level) = &self.log_level {
            config.log_level = level.clone();
        }
        config
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Scan files by name, size or content
    Scan(Box<CliScanConfig>),

    /// List the disk roots --all-disks would scan
    Roots,
}

fn main() {
    if let Err(e) = run() {
        eprintln!("{} {}", "error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Scan(args) => {
            let config = args.merge_into(
                ScanConfig::load_from(args.config.as_deref())
                    .map_err(|e| ScanError::config_error(e.to_string()))?,
            );
            init_logging(&config.log_level);
            debug!("Effective configuration: {:?}", config);

            let sink = Arc::new(TerminalSink::new(config.quiet || args.json, args.json));
            let output = scan(config, sink.clone())?;
            sink.finish();

            if args.json {
                print_json(&output)?;
            }
            Ok(())
        }
        Commands::Roots => {
            for root in all_disk_roots() {
                println!("{}", root.display());
            }
            Ok(())
        }
    }
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    // Logs go to stderr so stdout only carries results
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn print_json(output: &ScanOutput) -> Result<()> {
    let json = serde_json::to_string_pretty(output).map_err(io::Error::from)?;
    println!("{}", json);
    Ok(())
}

/// Live view on stderr: one spinner per worker plus a totals line.
/// Matches and the summary go to stdout.
struct TerminalSink {
    progress: MultiProgress,
    workers: Mutex<Vec<ProgressBar>>,
    totals: ProgressBar,
    hide_status: bool,
    json: bool,
}

impl TerminalSink {
    fn new(hide_status: bool, json: bool) -> Self {
        let progress = MultiProgress::new();
        let totals = if hide_status {
            ProgressBar::hidden()
        } else {
            let bar = progress.add(ProgressBar::new_spinner());
            bar.set_style(style("{spinner:.cyan} {msg}"));
            bar
        };
        Self {
            progress,
            workers: Mutex::new(Vec::new()),
            totals,
            hide_status,
            json,
        }
    }

    fn finish(&self) {
        for bar in self
            .workers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
        {
            bar.finish_and_clear();
        }
        self.totals.finish_and_clear();
    }
}

fn style(template: &str) -> ProgressStyle {
    ProgressStyle::with_template(template).unwrap_or_else(|_| ProgressStyle::default_spinner())
}

impl StatusSink for TerminalSink {
    fn on_snapshot(&self, snapshot: &StatusSnapshot) {
        if self.hide_status {
            return;
        }

        let mut workers = self.workers.lock().unwrap_or_else(PoisonError::into_inner);
        for (id, state) in &snapshot.workers {
            while workers.len() <= *id {
                let bar = self.progress.add(ProgressBar::new_spinner());
                bar.set_style(style("{prefix:>10.bold} {msg}"));
                bar.set_prefix(format!("worker {}", workers.len()));
                workers.push(bar);
            }
            workers[*id].set_message(state.clone());
        }

        let rate = snapshot
            .rate()
            .map(|rate| format!(" | {:.0} files/s", rate))
            .unwrap_or_default();
        self.totals.set_message(format!(
            "Scanned: {} | Matched: {}{} | {}",
            snapshot.files_scanned,
            snapshot.matched,
            rate,
            humantime::format_duration(Duration::from_secs(snapshot.elapsed.as_secs()))
        ));
        self.totals.tick();
    }

    fn on_match(&self, record: &MatchRecord) {
        if self.json {
            return;
        }
        let line = match record.reason {
            MatchReason::Enumerated => format!("{} {}", "[FILE]".dimmed(), record.path.display()),
            reason => format!(
                "{} {} ({})",
                "[MATCH]".green().bold(),
                record.path.display().to_string().blue(),
                reason
            ),
        };
        self.progress.suspend(|| println!("{}", line));
    }

    fn on_error(&self, error: &ScanError) {
        self.progress
            .suspend(|| eprintln!("{} {}", "[ERROR]".red().bold(), error));
    }

    fn on_summary(&self, summary: &ScanSummary) {
        if self.json {
            return;
        }
        self.progress.suspend(|| println!("\n{}", summary.to_string().bold()));
    }
}
