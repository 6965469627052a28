//! Overwrite guard.
//!
//! Before the cropper runs, the destination is checked so an existing file is
//! never clobbered by accident. The check is a single `stat` on the calling
//! thread.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GuardError {
    #[error("output file already exists: {0}")]
    AlreadyExists(PathBuf),
    #[error("cannot inspect {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Why the guard let a job through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Clearance {
    /// Nothing exists at the destination.
    Vacant,
    /// A file exists but `force` was requested.
    Overwrite,
}

/// Decide whether writing to `path` may proceed.
///
/// Symlinks are followed: a dangling link counts as vacant, a link loop or a
/// permission failure is an I/O error.
pub fn check_destination(path: &Path, force: bool) -> Result<Clearance, GuardError> {
    match fs::metadata(path) {
        Ok(_) if force => {
            tracing::debug!(path = %path.display(), "overwriting existing output");
            Ok(Clearance::Overwrite)
        }
        Ok(_) => Err(GuardError::AlreadyExists(path.to_path_buf())),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(Clearance::Vacant),
        Err(source) => Err(GuardError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}
