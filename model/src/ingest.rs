use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::NaiveDateTime;

/// Finds every file under `dir` (recursively) whose name contains `marker`.
/// The monthly exports land in nested per-route/per-month directories, so we
/// make no assumption about depth.
pub fn find_files(dir: &Path, marker: &str) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    let mut pending = vec![dir.to_path_buf()];
    while let Some(dir) = pending.pop() {
        for entry in fs_err::read_dir(&dir)? {
            let path = entry?.path();
            if path.is_dir() {
                pending.push(path);
            } else if path
                .file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.contains(marker))
                .unwrap_or(false)
            {
                found.push(path);
            }
        }
    }
    found.sort();
    Ok(found)
}

/// Stop event and assignment exports write timestamps to minute resolution.
pub fn parse_minutes(raw: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw.trim(), "%m/%d/%Y %H:%M")
        .map_err(|err| anyhow!("Bad timestamp {:?}: {}", raw, err))
}

/// Warning exports resolve to the second.
pub fn parse_seconds(raw: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw.trim(), "%m/%d/%Y %H:%M:%S")
        .map_err(|err| anyhow!("Bad timestamp {:?}: {}", raw, err))
}
