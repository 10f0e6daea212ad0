//! Choosing the paths a scan starts from.
use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::config::ScanConfig;

/// Top-level roots of every mounted fixed disk.
///
/// On Windows these are the existing drive roots `C:\` through `Z:\`. Unix
/// hosts have a single root.
pub fn all_disk_roots() -> Vec<PathBuf> {
    #[cfg(windows)]
    {
        (b'C'..=b'Z')
            .map(|letter| PathBuf::from(format!("{}:\\", letter as char)))
            .filter(|root| root.exists())
            .collect()
    }
    #[cfg(not(windows))]
    {
        vec![PathBuf::from("/")]
    }
}

/// The filesystem root containing `path`: its drive root on Windows, `/` elsewhere.
///
/// Relative paths are resolved against the current directory first; a path that
/// cannot be resolved is returned unchanged.
pub fn filesystem_root(path: &Path) -> PathBuf {
    let resolved = if path.is_absolute() {
        path.to_path_buf()
    } else {
        fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
    };

    let root: PathBuf = resolved
        .components()
        .take_while(|c| matches!(c, Component::Prefix(_) | Component::RootDir))
        .collect();

    if root.as_os_str().is_empty() {
        path.to_path_buf()
    } else {
        root
    }
}

/// The seed paths for a scan, in precedence order:
/// `explicit_disk`, then `all_disks`, then the root of `root_path` when
/// `roots_are_drive_letters_only` is set, then `root_path` itself.
pub fn seed_roots(config: &ScanConfig) -> Vec<PathBuf> {
    if let Some(disk) = &config.explicit_disk {
        return vec![disk.clone()];
    }
    if config.all_disks {
        return all_disk_roots();
    }
    if config.roots_are_drive_letters_only {
        return vec![filesystem_root(&config.root_path)];
    }
    vec![config.root_path.clone()]
}
