//! Timestamp-based staleness checks for the bootstrap pipeline

use std::fs;
use std::path::Path;
use std::time::SystemTime;

fn modified(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// An output is fresh when it exists and is strictly newer than its input
pub fn is_fresh(input: &Path, output: &Path) -> bool {
    match (modified(input), modified(output)) {
        (Some(input), Some(output)) => output > input,
        _ => false,
    }
}

/// Inverse of [`is_fresh`]
pub fn needs_rebuild(input: &Path, output: &Path) -> bool {
    !is_fresh(input, output)
}
