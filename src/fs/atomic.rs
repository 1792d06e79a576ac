//! Atomic filesystem writes.
//!
//! The file store commits a script's result by replacing the keyspace file in
//! one step, so a crash mid-write never leaves a torn keyspace behind.
//!
//! # Implementation Strategy
//!
//! 1. Write content to a temporary file in the same directory
//! 2. Sync the file to disk (fsync)
//! 3. Rename it over the target (atomic on the same filesystem; on Windows
//!    `std::fs::rename` replaces an existing target)
//! 4. Sync the parent directory where the platform allows it
//!
//! On crash, a temporary file named `.{filename}.{pid}.tmp` may remain; it is
//! never read.

use crate::error::{Result, UniqueJobsError};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Atomically write bytes to a file.
///
/// The target is either left untouched or fully replaced with `content`.
pub fn atomic_write<P: AsRef<Path>>(path: P, content: &[u8]) -> Result<()> {
    let path = path.as_ref();

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        fs::create_dir_all(parent).map_err(|e| {
            store_error(format!(
                "failed to create parent directory '{}': {}",
                parent.display(),
                e
            ))
        })?;
    }

    let temp_path = generate_temp_path(path)?;
    write_and_sync(&temp_path, content)?;
    atomic_replace(&temp_path, path)?;

    Ok(())
}

/// Generate a temporary file path in the same directory as the target.
fn generate_temp_path(target: &Path) -> Result<PathBuf> {
    let parent = target.parent().unwrap_or(Path::new("."));
    let filename = target
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| store_error(format!("invalid file path '{}'", target.display())))?;

    let temp_name = format!(".{}.{}.tmp", filename, std::process::id());
    Ok(parent.join(temp_name))
}

/// Write content to a file and sync to disk.
fn write_and_sync(path: &Path, content: &[u8]) -> Result<()> {
    let mut file = File::create(path).map_err(|e| {
        store_error(format!(
            "failed to create temporary file '{}': {}",
            path.display(),
            e
        ))
    })?;

    file.write_all(content).map_err(|e| {
        let _ = fs::remove_file(path);
        store_error(format!("failed to write to temporary file: {}", e))
    })?;

    file.sync_all().map_err(|e| {
        let _ = fs::remove_file(path);
        store_error(format!("failed to sync temporary file to disk: {}", e))
    })?;

    Ok(())
}

/// Replace the target file with the source file.
fn atomic_replace(source: &Path, target: &Path) -> Result<()> {
    fs::rename(source, target).map_err(|e| {
        let _ = fs::remove_file(source);
        store_error(format!(
            "failed to atomically replace '{}': {}",
            target.display(),
            e
        ))
    })?;

    sync_parent_dir(target);
    Ok(())
}

#[cfg(unix)]
fn sync_parent_dir(target: &Path) {
    if let Some(parent) = target.parent()
        && let Ok(dir) = File::open(parent)
    {
        let _ = dir.sync_all();
    }
}

#[cfg(not(unix))]
fn sync_parent_dir(_target: &Path) {}

fn store_error(message: String) -> UniqueJobsError {
    UniqueJobsError::StoreUnavailable(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn creates_new_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("keyspace.json");

        atomic_write(&path, b"{}").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "{}");
    }

    #[test]
    fn replaces_existing_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("keyspace.json");
        fs::write(&path, "old content that is longer").unwrap();

        atomic_write(&path, b"new").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "new");
    }

    #[test]
    fn creates_missing_parent_directories() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("a").join("b").join("keyspace.json");

        atomic_write(&path, b"[]").unwrap();

        assert!(path.exists());
    }

    #[test]
    fn leaves_no_temp_file_behind() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("keyspace.json");

        atomic_write(&path, b"1").unwrap();
        atomic_write(&path, b"2").unwrap();

        let names: Vec<String> = fs::read_dir(temp_dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["keyspace.json".to_string()]);
    }
}
