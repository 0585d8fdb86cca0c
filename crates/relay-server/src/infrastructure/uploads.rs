//! Payload files on disk: predefined payloads and staged uploads.
//!
//! Predefined payloads live in `payloads_dir` and are referenced by bare file
//! name.  Uploaded payloads are written to `uploads_dir/<file name>` for the
//! duration of one delivery and removed when it finalizes.
//!
//! A [`StagedPayload`] is removed exactly once: explicitly through
//! [`StagedPayload::remove`], or on drop if the delivery was abandoned.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};

use crate::domain::config::ServerConfig;

/// Errors reading or staging payload files.
#[derive(Debug, Error)]
pub enum PayloadError {
    /// The payload file could not be read.
    #[error("{source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// An upload could not be written to the uploads directory.
    #[error("could not stage upload at {path}: {source}")]
    Staging {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Returns `true` if `name` is a plain file name that cannot escape its
/// directory.
pub fn is_bare_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\'])
        && !name.contains('\0')
}

/// Reads a whole payload file.
///
/// # Errors
///
/// Returns [`PayloadError::Unreadable`] if the file cannot be read.
pub async fn read_payload(path: &Path) -> Result<Vec<u8>, PayloadError> {
    tokio::fs::read(path)
        .await
        .map_err(|source| PayloadError::Unreadable {
            path: path.to_path_buf(),
            source,
        })
}

/// Locates predefined payloads and stages uploads.
#[derive(Debug, Clone)]
pub struct PayloadStore {
    uploads_dir: PathBuf,
    payloads_dir: PathBuf,
}

impl PayloadStore {
    pub fn new(uploads_dir: impl Into<PathBuf>, payloads_dir: impl Into<PathBuf>) -> Self {
        Self {
            uploads_dir: uploads_dir.into(),
            payloads_dir: payloads_dir.into(),
        }
    }

    pub fn from_config(config: &ServerConfig) -> Self {
        Self::new(&config.uploads_dir, &config.payloads_dir)
    }

    /// Path of the predefined payload `name`, if such a file exists.
    ///
    /// `name` must already be a bare file name.
    pub async fn predefined(&self, name: &str) -> Option<PathBuf> {
        let path = self.payloads_dir.join(name);
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Some(path),
            _ => None,
        }
    }

    /// Writes `bytes` to `uploads_dir/<name>`.
    ///
    /// # Errors
    ///
    /// Returns [`PayloadError::Staging`] if the directory cannot be created
    /// or the file cannot be written.
    pub async fn stage_upload(&self, name: &str, bytes: &[u8]) -> Result<StagedPayload, PayloadError> {
        tokio::fs::create_dir_all(&self.uploads_dir)
            .await
            .map_err(|source| PayloadError::Staging {
                path: self.uploads_dir.clone(),
                source,
            })?;

        let path = self.uploads_dir.join(name);
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|source| PayloadError::Staging {
                path: path.clone(),
                source,
            })?;
        debug!("staged upload {} ({} bytes)", path.display(), bytes.len());

        Ok(StagedPayload {
            path,
            removed: false,
        })
    }
}

/// An uploaded payload written to disk for one delivery.
#[derive(Debug)]
pub struct StagedPayload {
    path: PathBuf,
    removed: bool,
}

impl StagedPayload {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Deletes the staged file.  A file that is already gone counts as
    /// removed.  On failure the drop fallback still gets its attempt.
    pub async fn remove(mut self) -> io::Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
        self.removed = true;
        Ok(())
    }
}

impl Drop for StagedPayload {
    fn drop(&mut self) {
        if self.removed {
            return;
        }
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != io::ErrorKind::NotFound {
                warn!("could not remove staged upload {}: {e}", self.path.display());
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
