use anyhow::Result;
use diskscout::{
    scan, Acceleration, CollectingSink, MatchReason, NullSink, ScanConfig, ScanError, ScanOutput,
};
use std::collections::BTreeSet;
use std::fs;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::{tempdir, TempDir};

// Writes one file below the test directory, creating parent directories as needed
fn write_file(dir: &TempDir, name: &str, content: impl AsRef<[u8]>) -> Result<()> {
    let path = dir.path().join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, content)?;
    Ok(())
}

// Helper function to create test files
fn create_test_files(dir: &TempDir, files: &[(&str, &str)]) -> Result<()> {
    for (name, content) in files {
        write_file(dir, name, content)?;
    }
    Ok(())
}

fn test_config(root: &Path, workers: usize) -> ScanConfig {
    ScanConfig {
        worker_count: NonZeroUsize::new(workers).unwrap(),
        dequeue_timeout_ms: 50,
        poll_interval_ms: 10,
        ..ScanConfig::new(root)
    }
}

fn run(config: ScanConfig) -> Result<ScanOutput> {
    Ok(scan(config, Arc::new(NullSink))?)
}

fn paths(dir: &TempDir, names: &[&str]) -> BTreeSet<PathBuf> {
    names.iter().map(|name| dir.path().join(name)).collect()
}

/// 3 levels deep, 4 subdirectories and 5 files per directory
fn create_tree(dir: &TempDir) -> Result<usize> {
    let mut count = 0;
    let mut stack = vec![(dir.path().to_path_buf(), 0)];
    while let Some((path, depth)) = stack.pop() {
        for f in 0..5 {
            fs::write(path.join(format!("file_{}.dat", f)), format!("{}:{}", depth, f))?;
            count += 1;
        }
        if depth < 3 {
            for d in 0..4 {
                let sub = path.join(format!("dir_{}", d));
                fs::create_dir(&sub)?;
                stack.push((sub, depth + 1));
            }
        }
    }
    Ok(count)
}

#[test]
fn test_content_scenario() -> Result<()> {
    let dir = tempdir()?;
    create_test_files(
        &dir,
        &[("a.txt", "hello"), ("sub/b.txt", "this file holds a secret")],
    )?;

    let output = run(ScanConfig {
        content_text: Some("secret".to_string()),
        ..test_config(dir.path(), 4)
    })?;

    assert_eq!(output.matched_paths(), paths(&dir, &["sub/b.txt"]));
    assert_eq!(output.matches[0].reason, MatchReason::ContentMatch);
    assert_eq!(output.files_scanned, 2);
    assert!(!output.cancelled);
    Ok(())
}

#[test]
fn test_every_file_visited_exactly_once() -> Result<()> {
    let dir = tempdir()?;
    let total = create_tree(&dir)?;

    for workers in [1, 3, 8] {
        let output = run(test_config(dir.path(), workers))?;
        assert_eq!(output.files_scanned as usize, total, "workers = {}", workers);
        assert_eq!(output.matches.len(), total);
        assert_eq!(output.matched_paths().len(), total, "duplicate match records");
        assert!(output
            .matches
            .iter()
            .all(|m| m.reason == MatchReason::Enumerated));
    }
    Ok(())
}

#[test]
fn test_scan_is_idempotent() -> Result<()> {
    let dir = tempdir()?;
    create_tree(&dir)?;
    let config = ScanConfig {
        content_text: Some("2:".to_string()),
        ..test_config(dir.path(), 4)
    };

    let first = run(config.clone())?;
    let second = run(config)?;
    assert!(!first.matches.is_empty());
    assert_eq!(first.matched_paths(), second.matched_paths());
    assert_eq!(first.files_scanned, second.files_scanned);
    Ok(())
}

#[test]
fn test_filename_focus_needs_content_when_configured() -> Result<()> {
    let dir = tempdir()?;
    create_test_files(
        &dir,
        &[
            ("logs/target.log", "all systems nominal"),
            ("old/target.log", "ERROR: disk full"),
            ("old/other.log", "ERROR: ignored, wrong name"),
        ],
    )?;

    let output = run(ScanConfig {
        filename_focus: Some("target.log".to_string()),
        content_text: Some("ERROR".to_string()),
        ..test_config(dir.path(), 2)
    })?;

    assert_eq!(output.matched_paths(), paths(&dir, &["old/target.log"]));
    assert_eq!(output.matches[0].reason, MatchReason::FilenameMatch);
    // other.log never reaches the counting point
    assert_eq!(output.files_scanned, 2);
    Ok(())
}

#[test]
fn test_inverted_size_bounds_filter_everything() -> Result<()> {
    let dir = tempdir()?;
    write_file(&dir, "a.bin", [0u8; 10])?;
    write_file(&dir, "b.bin", [0u8; 75])?;

    let output = run(ScanConfig {
        min_size: Some(100),
        max_size: Some(50),
        ..test_config(dir.path(), 2)
    })?;

    assert!(output.matches.is_empty());
    assert_eq!(output.files_scanned, 2);
    assert_eq!(output.stats.filtered_by_size, 2);
    Ok(())
}

#[test]
fn test_size_filtered_files_are_never_read() -> Result<()> {
    let dir = tempdir()?;
    create_test_files(&dir, &[("small.txt", "key"), ("fits.txt", "the key is here")])?;
    write_file(&dir, "large.txt", [b'k'; 4096])?;

    let output = run(ScanConfig {
        content_text: Some("key".to_string()),
        min_size: Some(5),
        max_size: Some(100),
        ..test_config(dir.path(), 2)
    })?;

    assert_eq!(output.matched_paths(), paths(&dir, &["fits.txt"]));
    assert_eq!(output.stats.bytes_read, 15);
    Ok(())
}

#[test]
fn test_simulate_matches_without_reading() -> Result<()> {
    let dir = tempdir()?;
    create_test_files(
        &dir,
        &[("a.txt", "nothing"), ("b.txt", ""), ("c.log", "skip me")],
    )?;

    let output = run(ScanConfig {
        content_base64: Some("c2VjcmV0".to_string()),
        extension_filter: Some("txt".to_string()),
        simulate_only: true,
        ..test_config(dir.path(), 2)
    })?;

    assert_eq!(output.matched_paths(), paths(&dir, &["a.txt", "b.txt"]));
    assert_eq!(output.stats.bytes_read, 0);
    assert_eq!(output.stats.chunks_scanned, 0);
    Ok(())
}

#[test]
fn test_hex_and_base64_are_exact() -> Result<()> {
    let dir = tempdir()?;
    write_file(&dir, "upper.bin", b"\x00\x01SECRET\xff")?;
    write_file(&dir, "lower.bin", b"\x00\x01secret\xff")?;

    // "secret" in hex and base64
    for (hex, b64) in [(Some("736563726574"), None), (None, Some("c2VjcmV0"))] {
        let output = run(ScanConfig {
            content_hex: hex.map(str::to_string),
            content_base64: b64.map(str::to_string),
            ..test_config(dir.path(), 2)
        })?;
        assert_eq!(output.matched_paths(), paths(&dir, &["lower.bin"]));
    }

    let output = run(ScanConfig {
        content_text: Some("secret".to_string()),
        ..test_config(dir.path(), 2)
    })?;
    assert_eq!(
        output.matched_paths(),
        paths(&dir, &["lower.bin", "upper.bin"])
    );
    Ok(())
}

#[test]
fn test_chunk_boundary() -> Result<()> {
    let dir = tempdir()?;
    // With 8-byte chunks "needle" at offset 5 straddles the first boundary,
    // at offset 8 it sits entirely in the second chunk.
    create_test_files(
        &dir,
        &[
            ("split.txt", ".....needle......"),
            ("whole.txt", "........needle.."),
        ],
    )?;

    let output = run(ScanConfig {
        content_text: Some("needle".to_string()),
        chunk_size: 8,
        ..test_config(dir.path(), 2)
    })?;

    assert!(output.is_match(&dir.path().join("whole.txt")));
    // Chunks are searched independently, so a straddling needle is missed
    assert!(!output.is_match(&dir.path().join("split.txt")));
    Ok(())
}

#[test]
fn test_accelerated_and_reference_agree() -> Result<()> {
    let dir = tempdir()?;
    let mut big = vec![b'.'; 512 * 1024];
    big[300_000..300_006].copy_from_slice(b"NeEdLe");
    let mut miss = vec![b'.'; 512 * 1024];
    miss[100..105].copy_from_slice(b"needl");
    write_file(&dir, "big.bin", &big)?;
    write_file(&dir, "miss.bin", &miss)?;

    let mut results = Vec::new();
    for acceleration in [Acceleration::Auto, Acceleration::Disabled] {
        let output = run(ScanConfig {
            content_text: Some("needle".to_string()),
            chunk_size: 256 * 1024,
            acceleration,
            ..test_config(dir.path(), 2)
        })?;
        results.push(output.matched_paths());
    }

    assert_eq!(results[0], paths(&dir, &["big.bin"]));
    assert_eq!(results[0], results[1]);
    Ok(())
}

#[test]
fn test_non_recursive_lists_only_the_root() -> Result<()> {
    let dir = tempdir()?;
    create_test_files(&dir, &[("top.txt", "1"), ("nested/deep.txt", "2")])?;

    let output = run(ScanConfig {
        recurse: false,
        ..test_config(dir.path(), 2)
    })?;

    assert_eq!(output.matched_paths(), paths(&dir, &["top.txt"]));
    assert_eq!(output.stats.dirs_listed, 1);
    Ok(())
}

// The temp directory itself lives under AppData on Windows
#[cfg(unix)]
#[test]
fn test_system_folders_are_skipped() -> Result<()> {
    let dir = tempdir()?;
    create_test_files(
        &dir,
        &[
            ("keep.txt", "1"),
            ("AppData/cache.txt", "2"),
            ("projects/Windows/skip.txt", "3"),
            ("projects/kept.txt", "4"),
        ],
    )?;

    let config = test_config(dir.path(), 2);
    let unfiltered = run(config.clone())?;
    assert_eq!(unfiltered.matches.len(), 4);

    let output = run(ScanConfig {
        skip_system_folders: true,
        ..config
    })?;
    assert_eq!(
        output.matched_paths(),
        paths(&dir, &["keep.txt", "projects/kept.txt"])
    );
    assert_eq!(output.stats.system_folders_skipped, 2);
    Ok(())
}

#[test]
fn test_extension_filter_is_case_insensitive() -> Result<()> {
    let dir = tempdir()?;
    create_test_files(
        &dir,
        &[("a.LOG", "1"), ("b.log", "2"), ("c.txt", "3"), ("log", "4")],
    )?;

    let output = run(ScanConfig {
        extension_filter: Some(".log".to_string()),
        ..test_config(dir.path(), 2)
    })?;

    assert_eq!(output.matched_paths(), paths(&dir, &["a.LOG", "b.log"]));
    assert_eq!(output.files_scanned, 2);
    Ok(())
}

#[test]
fn test_configuration_errors_abort_before_scanning() {
    let dir = tempdir().unwrap();

    let result = scan(
        ScanConfig {
            content_text: Some("a".to_string()),
            content_hex: Some("61".to_string()),
            ..test_config(dir.path(), 1)
        },
        Arc::new(NullSink),
    );
    assert!(matches!(result, Err(ScanError::Config(_))));

    let result = scan(
        ScanConfig {
            content_hex: Some("6".to_string()),
            ..test_config(dir.path(), 1)
        },
        Arc::new(NullSink),
    );
    assert!(matches!(result, Err(ScanError::PatternDecode(_))));
}

#[test]
fn test_sink_receives_events() -> Result<()> {
    let dir = tempdir()?;
    create_test_files(&dir, &[("a.txt", "match me"), ("b.txt", "no")])?;

    let sink = Arc::new(CollectingSink::new());
    let output = scan(
        ScanConfig {
            content_text: Some("match".to_string()),
            show_stats: true,
            ..test_config(dir.path(), 2)
        },
        sink.clone(),
    )?;

    assert_eq!(sink.matches(), output.matches);
    let summaries = sink.summaries();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].matched_count, 1);
    assert_eq!(summaries[0].scanned_count, 2);

    let last = sink.snapshots().pop().expect("at least one snapshot");
    assert_eq!(last.workers.len(), 2);
    assert!(last.workers.values().all(|state| state == "> Idle"));
    Ok(())
}

// A socket seed passes the stat but cannot be opened, even by root
#[cfg(unix)]
#[test]
fn test_unreadable_files_are_abandoned() -> Result<()> {
    use std::os::unix::net::UnixListener;

    let dir = tempdir()?;
    let socket = dir.path().join("service.sock");
    let _listener = UnixListener::bind(&socket)?;

    for content_text in [None, Some("token".to_string())] {
        let sink = Arc::new(CollectingSink::new());
        let output = scan(
            ScanConfig {
                content_text,
                surface_errors: true,
                ..test_config(&socket, 2)
            },
            sink.clone(),
        )?;

        assert!(output.matches.is_empty());
        assert_eq!(output.files_scanned, 0);
        assert_eq!(output.stats.read_errors, 1);
        assert_eq!(sink.errors().len(), 1);
        assert!(sink.errors()[0].starts_with("Cannot open"));
    }
    Ok(())
}
