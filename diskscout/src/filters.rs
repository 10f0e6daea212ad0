/// Cheap per-file predicates applied before any content is read.
///
/// Each check is a free function so the evaluator can run them in a fixed
/// order and stop at the first one that rejects a file.
use serde::{Deserialize, Serialize};
use std::path::{Component, Path};

/// Inclusive size window in bytes. A missing bound does not constrain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeBounds {
    pub min: Option<u64>,
    pub max: Option<u64>,
}

impl SizeBounds {
    /// `min <= size <= max`. Inverted bounds reject every size.
    pub fn contains(&self, size: u64) -> bool {
        self.min.map_or(true, |min| size >= min) && self.max.map_or(true, |max| size <= max)
    }
}

/// Checks the file name against an exact, case-sensitive name
pub fn matches_filename(path: &Path, focus: Option<&str>) -> bool {
    match focus {
        None => true,
        Some(name) => path
            .file_name()
            .is_some_and(|file_name| file_name.to_string_lossy() == name),
    }
}

/// Checks that the file name ends with the extension, ignoring ASCII case.
///
/// `"log"` and `".log"` are equivalent; multi-part suffixes such as `"tar.gz"`
/// work as well.
pub fn has_valid_extension(path: &Path, extension: Option<&str>) -> bool {
    let Some(ext) = extension else {
        return true;
    };
    let ext = ext.trim_start_matches('.');
    if ext.is_empty() {
        return true;
    }

    let Some(file_name) = path.file_name() else {
        return false;
    };
    let file_name = file_name.to_string_lossy().to_ascii_lowercase();
    let suffix = format!(".{}", ext.to_ascii_lowercase());
    file_name.len() > suffix.len() && file_name.ends_with(&suffix)
}

/// Checks whether any component of the path is one of the named system folders
pub fn is_system_folder<S: AsRef<str>>(path: &Path, system_folders: &[S]) -> bool {
    path.components().any(|component| match component {
        Component::Normal(part) => {
            let part = part.to_string_lossy();
            system_folders.iter().any(|name| name.as_ref() == part)
        }
        _ => false,
    })
}
