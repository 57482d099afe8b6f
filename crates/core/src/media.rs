//! Upload validation and temporary video ownership.
//!
//! An upload is checked against the extension allow-list and the size
//! limit before anything touches the disk. Accepted bytes are written to a
//! uniquely named file that a [`TempVideo`] guard owns until it is cleaned
//! up, explicitly or on drop.

use std::path::{Path, PathBuf};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Video container extensions accepted for hook analysis (lowercase, no dot).
pub const ALLOWED_EXTENSIONS: &[&str] = &["mp4", "mov", "avi", "webm", "mkv"];

/// Default maximum upload size (100 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 100 * 1024 * 1024;

/// Prefix for temp file names so stray files are easy to identify.
const TEMP_FILE_PREFIX: &str = "hook-";

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Return the lowercased extension of `filename` if it is on the allow-list.
pub fn extension_of(filename: &str) -> Result<String, CoreError> {
    let ext = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();

    if ALLOWED_EXTENSIONS.contains(&ext.as_str()) {
        Ok(ext)
    } else {
        Err(CoreError::InvalidInput(format!(
            "Invalid file type '{filename}'. Allowed: .{}",
            ALLOWED_EXTENSIONS.join(", .")
        )))
    }
}

/// Validate an upload's name and size, returning its normalised extension.
pub fn validate_upload(filename: &str, len: usize, max_bytes: usize) -> Result<String, CoreError> {
    let ext = extension_of(filename)?;
    if len > max_bytes {
        return Err(CoreError::PayloadTooLarge {
            size: len,
            limit: max_bytes,
        });
    }
    Ok(ext)
}

// ---------------------------------------------------------------------------
// TempVideo
// ---------------------------------------------------------------------------

/// Exclusively owned temporary copy of an uploaded video.
///
/// The file is removed exactly once: by [`TempVideo::cleanup`] or, if that
/// was never called, when the guard is dropped. Removal failures are logged
/// and swallowed.
#[derive(Debug)]
pub struct TempVideo {
    path: PathBuf,
    removed: bool,
}

impl TempVideo {
    /// Write `bytes` to `<dir>/hook-<uuid>.<ext>`.
    pub async fn persist(dir: &Path, bytes: &[u8], ext: &str) -> Result<Self, CoreError> {
        // Guard first: a partial write is removed when it drops.
        let video = Self::reserve(dir, ext);

        tokio::fs::write(&video.path, bytes)
            .await
            .map_err(|e| CoreError::Internal(format!("Error saving video: {e}")))?;

        tracing::debug!(path = %video.path.display(), size = bytes.len(), "Persisted upload to temp file");
        Ok(video)
    }

    /// Guard for a fresh `hook-<uuid>.<ext>` path; nothing is written yet.
    fn reserve(dir: &Path, ext: &str) -> Self {
        let filename = format!("{TEMP_FILE_PREFIX}{}.{ext}", uuid::Uuid::new_v4());
        Self {
            path: dir.join(filename),
            removed: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete the temp file. Safe to call any number of times.
    pub fn cleanup(&mut self) {
        if self.removed {
            return;
        }
        self.removed = true;

        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                tracing::debug!(path = %self.path.display(), "Removed temp video");
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Failed to remove temp video"
                );
            }
        }
    }
}

impl Drop for TempVideo {
    fn drop(&mut self) {
        self.cleanup();
    }
}
