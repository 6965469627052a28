//! Source image catalog.
//!
//! The catalog directory is a flat folder of images. Every file becomes a
//! selectable type named after its stem:
//!
//! ```text
//! images/
//! ├── user.jpg        → "user"
//! ├── landscape.jpg   → "landscape"
//! └── random1.png     → "random1"
//! ```
//!
//! The directory is read once, when the catalog is built, and the result never
//! changes afterwards. A [`Catalog`] is plain immutable data: share it behind an
//! `Arc` and read it from as many threads as needed.
//!
//! ## Scanning rules
//!
//! - Non-recursive: subdirectories are ignored.
//! - Hidden files (`.DS_Store`, `.gitkeep`) are ignored.
//! - Entries are sorted by type name.
//! - When two files share a stem, the first by file name wins and the other is
//!   logged and dropped.
//! - Directory entries that cannot be read, and files whose names are not
//!   valid UTF-8, are logged and skipped.

use crate::types::CatalogEntry;
use rand::Rng;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("cannot read catalog directory {path}: {source}")]
    Unreadable {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Immutable mapping from type name to source image.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    entries: Vec<CatalogEntry>,
}

impl Catalog {
    /// Read `dir` and build a catalog from the files it contains.
    ///
    /// Relative directories are made absolute against the current working
    /// directory so that every `source_path` is absolute.
    pub fn scan(dir: &Path) -> Result<Self, CatalogError> {
        let unreadable = |source| CatalogError::Unreadable {
            path: dir.to_path_buf(),
            source,
        };
        let dir = std::path::absolute(dir).map_err(unreadable)?;

        let mut files: Vec<PathBuf> = Vec::new();
        for entry in fs::read_dir(&dir).map_err(|source| CatalogError::Unreadable {
            path: dir.clone(),
            source,
        })? {
            match entry {
                Ok(entry) => files.push(entry.path()),
                Err(err) => {
                    tracing::warn!(dir = %dir.display(), %err, "skipping unreadable catalog entry")
                }
            }
        }
        files.retain(|p| p.is_file() && !is_hidden(p));
        files.sort();

        let entries = files.into_iter().filter_map(|path| {
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                tracing::warn!(path = %path.display(), "skipping image with non-UTF-8 name");
                return None;
            };
            Some(CatalogEntry {
                type_name: stem.to_string(),
                source_path: path,
            })
        });
        let catalog = Self::from_entries(entries);

        tracing::debug!(
            dir = %dir.display(),
            types = catalog.len(),
            "scanned image catalog"
        );
        Ok(catalog)
    }

    /// Build a catalog from explicit entries without touching the filesystem.
    ///
    /// Later entries with an already-seen type name are dropped.
    pub fn from_entries(entries: impl IntoIterator<Item = CatalogEntry>) -> Self {
        let mut kept: Vec<CatalogEntry> = Vec::new();
        for entry in entries {
            if let Some(existing) = kept.iter().find(|e| e.type_name == entry.type_name) {
                tracing::warn!(
                    type_name = %entry.type_name,
                    kept = %existing.source_path.display(),
                    dropped = %entry.source_path.display(),
                    "duplicate catalog type"
                );
                continue;
            }
            kept.push(entry);
        }
        kept.sort_by(|a, b| a.type_name.cmp(&b.type_name));
        Self { entries: kept }
    }

    pub fn get(&self, type_name: &str) -> Option<&CatalogEntry> {
        self.entries.iter().find(|e| e.type_name == type_name)
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.get(type_name).is_some()
    }

    /// All entries, sorted by type name.
    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.type_name.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Pick one entry uniformly at random. `None` for an empty catalog.
    pub fn choose(&self, rng: &mut impl Rng) -> Option<&CatalogEntry> {
        if self.entries.is_empty() {
            return None;
        }
        let index = rng.random_range(0..self.entries.len());
        self.entries.get(index)
    }
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .map(|n| n.to_string_lossy().starts_with('.'))
        .unwrap_or(true)
}
