/// Error types for diskscout.
///
/// Most errors raised while scanning are local to a single task: the worker that
/// hit them records the failure, optionally surfaces it, and moves on to the next
/// path. Only configuration problems and failing to start workers abort a scan,
/// and both happen before any file is touched.
///
/// ```rust,ignore
/// match coordinator.run(sink) {
///     Ok(output) => println!("{} matches", output.matches.len()),
///     Err(ScanError::Config(msg)) => eprintln!("bad configuration: {}", msg),
///     Err(e) => eprintln!("scan failed: {}", e),
/// }
/// ```
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for scan operations
pub type ScanResult<T> = Result<T, ScanError>;

/// Errors that can occur while configuring or running a scan
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Cannot list {path}: {source}")]
    DirectoryListing { path: PathBuf, source: io::Error },
    #[error("Cannot get size {path}: {source}")]
    Stat { path: PathBuf, source: io::Error },
    #[error("Cannot open {path}: {source}")]
    FileOpen { path: PathBuf, source: io::Error },
    #[error("Cannot read {path}: {source}")]
    FileRead { path: PathBuf, source: io::Error },
    #[error("Invalid content pattern: {0}")]
    PatternDecode(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Accelerator error: {0}")]
    Accelerator(String),
    #[error("Failed to spawn worker: {0}")]
    WorkerSpawn(#[source] io::Error),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl ScanError {
    pub fn directory_listing(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::DirectoryListing {
            path: path.into(),
            source,
        }
    }

    pub fn stat(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Stat {
            path: path.into(),
            source,
        }
    }

    pub fn file_open(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::FileOpen {
            path: path.into(),
            source,
        }
    }

    pub fn file_read(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::FileRead {
            path: path.into(),
            source,
        }
    }

    pub fn pattern_decode(msg: impl Into<String>) -> Self {
        Self::PatternDecode(msg.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn accelerator(msg: impl Into<String>) -> Self {
        Self::Accelerator(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn denied() -> io::Error {
        io::Error::new(io::ErrorKind::PermissionDenied, "access denied")
    }

    #[test]
    fn test_error_creation() {
        let err = ScanError::directory_listing("dir", denied());
        assert!(matches!(err, ScanError::DirectoryListing { .. }));

        let err = ScanError::stat("a.bin", denied());
        assert!(matches!(err, ScanError::Stat { .. }));

        let err = ScanError::file_open("a.bin", denied());
        assert!(matches!(err, ScanError::FileOpen { .. }));

        let err = ScanError::pattern_decode("odd number of hex digits");
        assert!(matches!(err, ScanError::PatternDecode(_)));

        let err = ScanError::config_error("zero chunk size");
        assert!(matches!(err, ScanError::Config(_)));
    }

    #[test]
    fn test_error_messages() {
        let err = ScanError::directory_listing("secret", denied());
        assert_eq!(err.to_string(), "Cannot list secret: access denied");

        let err = ScanError::stat("big.iso", denied());
        assert_eq!(err.to_string(), "Cannot get size big.iso: access denied");

        let err = ScanError::pattern_decode("invalid hex digit 'z'");
        assert_eq!(
            err.to_string(),
            "Invalid content pattern: invalid hex digit 'z'"
        );

        let err = ScanError::config_error("only one content filter may be set");
        assert_eq!(
            err.to_string(),
            "Configuration error: only one content filter may be set"
        );
    }
}
