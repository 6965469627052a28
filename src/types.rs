//! Shared types passed between the pipeline stages.
//!
//! The catalog produces [`CatalogEntry`] values, the resolver turns a request
//! into a [`ResolvedJob`], and the cropper consumes that job. Both derive
//! `Serialize` so the CLI can emit them as JSON.

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// Type name that selects a catalog entry at random.
pub const RANDOM_TYPE: &str = "random";

/// Type used when a request names no type, or one the catalog doesn't know.
pub const DEFAULT_TYPE: &str = "user";

/// A selectable source image.
///
/// `type_name` is the file stem (`user.jpg` → `user`), `source_path` the
/// absolute path of the file inside the catalog directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogEntry {
    pub type_name: String,
    pub source_path: PathBuf,
}

/// Fully resolved parameters for one invocation of the cropper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedJob {
    pub input_file: PathBuf,
    pub output_file: PathBuf,
    pub width: u32,
    pub height: u32,
}

impl fmt::Display for ResolvedJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} → {} ({}x{})",
            self.input_file.display(),
            self.output_file.display(),
            self.width,
            self.height
        )
    }
}
