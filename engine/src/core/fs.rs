//! Filesystem utilities.
//!
//! Crash-tolerant writes for project documents, settings and exported
//! subtitle files, plus an advisory lock for files shared between
//! processes.
//!
//! A partial write (power loss, crash) must never leave a truncated file
//! in place of a good one. Windows refuses rename-over-existing on some
//! filesystems, so replacement goes through a `.bak` swap.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use tracing::warn;

use crate::core::{CoreError, CoreResult};

// =============================================================================
// Path Validation
// =============================================================================

/// Validates a user-supplied output path.
///
/// Rejects empty paths, paths containing NUL, and existing directories.
pub fn validate_output_path(path: &str, label: &'static str) -> CoreResult<PathBuf> {
    let trimmed = path.trim();
    if trimmed.is_empty() {
        return Err(CoreError::invalid(label, "path is empty"));
    }
    if trimmed.contains('\0') {
        return Err(CoreError::invalid(label, "path contains a NUL byte"));
    }

    let pb = PathBuf::from(trimmed);
    if pb.is_dir() {
        return Err(CoreError::invalid(
            label,
            format!("{} is a directory", pb.display()),
        ));
    }
    Ok(pb)
}

// =============================================================================
// Atomic Writes
// =============================================================================

/// Write bytes to `path` using an atomic replace pattern.
///
/// - Write to a sibling temporary file.
/// - Flush and sync the temp file.
/// - Swap into place by renaming.
/// - If the destination exists, it is first moved aside as a `.bak` file, then removed.
pub fn atomic_write_bytes(path: &Path, bytes: &[u8]) -> CoreResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let tmp_path = sibling_path(path, "tmp");
    {
        let file = File::create(&tmp_path)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(bytes)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
    }

    atomic_replace(path, &tmp_path)
}

/// Write UTF-8 text atomically.
pub fn atomic_write_text(path: &Path, text: &str) -> CoreResult<()> {
    atomic_write_bytes(path, text.as_bytes())
}

/// Write a JSON file atomically with pretty formatting.
pub fn atomic_write_json_pretty<T: serde::Serialize>(path: &Path, value: &T) -> CoreResult<()> {
    let bytes = serde_json::to_vec_pretty(value)?;
    atomic_write_bytes(path, &bytes)
}

/// Read and deserialize a JSON file.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> CoreResult<T> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

fn sibling_path(path: &Path, suffix: &str) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| suffix.to_string());
    path.with_file_name(format!("{file_name}.{suffix}"))
}

fn atomic_replace(dest: &Path, src_tmp: &Path) -> CoreResult<()> {
    if !dest.exists() {
        std::fs::rename(src_tmp, dest)?;
        return Ok(());
    }

    let bak = sibling_path(dest, "bak");
    if bak.exists() {
        let _ = std::fs::remove_file(&bak);
    }

    std::fs::rename(dest, &bak)?;
    match std::fs::rename(src_tmp, dest) {
        Ok(()) => {
            let _ = std::fs::remove_file(&bak);
            Ok(())
        }
        Err(e) => {
            // Restore the previous file.
            let _ = std::fs::rename(&bak, dest);
            let _ = std::fs::remove_file(src_tmp);
            Err(CoreError::IoError(e))
        }
    }
}

// =============================================================================
// Advisory Lock
// =============================================================================

/// Runs `op` while holding an advisory lock on `lock_path`.
///
/// Readers take a shared lock, writers an exclusive one.
pub fn with_file_lock<T>(
    lock_path: &Path,
    exclusive: bool,
    op: impl FnOnce() -> CoreResult<T>,
) -> CoreResult<T> {
    if let Some(parent) = lock_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let lock_file = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(false)
        .open(lock_path)?;

    if exclusive {
        fs2::FileExt::lock_exclusive(&lock_file)?;
    } else {
        fs2::FileExt::lock_shared(&lock_file)?;
    }

    let result = op();

    if let Err(e) = fs2::FileExt::unlock(&lock_file) {
        warn!("Failed to unlock {}: {}", lock_path.display(), e);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_atomic_write_bytes_creates_and_replaces() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("captions.srt");

        atomic_write_bytes(&path, b"one").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "one");

        atomic_write_text(&path, "two").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "two");

        assert!(!dir.path().join("nested").join("captions.srt.tmp").exists());
        assert!(!dir.path().join("nested").join("captions.srt.bak").exists());
    }

    #[test]
    fn test_json_write_then_read() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("value.json");

        atomic_write_json_pretty(&path, &vec![1, 2, 3]).unwrap();
        let value: Vec<u32> = read_json(&path).unwrap();
        assert_eq!(value, vec![1, 2, 3]);

        assert!(matches!(
            read_json::<Vec<u32>>(&dir.path().join("missing.json")),
            Err(CoreError::IoError(_))
        ));
    }

    #[test]
    fn test_validate_output_path() {
        let dir = TempDir::new().unwrap();
        assert!(validate_output_path("", "output").is_err());
        assert!(validate_output_path("a\0b", "output").is_err());
        assert!(validate_output_path(&dir.path().display().to_string(), "output").is_err());
        assert!(validate_output_path("out/captions.vtt", "output").is_ok());
    }

    #[test]
    fn test_with_file_lock_returns_op_result() {
        let dir = TempDir::new().unwrap();
        let lock = dir.path().join("state.lock");

        let value = with_file_lock(&lock, true, || Ok(7)).unwrap();
        assert_eq!(value, 7);

        let err = with_file_lock::<()>(&lock, false, || Err(CoreError::VideoNotLoaded));
        assert!(matches!(err, Err(CoreError::VideoNotLoaded)));
    }
}
