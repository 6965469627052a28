//! Option resolution: request + catalog → concrete paths.
//!
//! Resolution is pure. It reads the in-memory [`Catalog`] and the request and
//! never touches the filesystem; the only external input is the random number
//! generator used for `type = "random"`, which callers inject.
//!
//! ## Rules
//!
//! | Step | Outcome |
//! |---|---|
//! | type | catalog name or `random` is kept, anything else becomes the default type |
//! | `random` | one catalog entry, chosen uniformly; the type becomes its name |
//! | source | explicit `input_path`, else the catalog entry for the type |
//! | destination | explicit `output_path`, else `{output_dir}/{type}-{w}x{h}.{ext}` |

use crate::catalog::Catalog;
use crate::config::{ConfigError, CropRequest};
use crate::types::{DEFAULT_TYPE, RANDOM_TYPE, ResolvedJob};
use rand::Rng;
use std::path::{Path, PathBuf};

const DEFAULT_EXTENSION: &str = "jpg";

/// A request after defaults, type coercion and path derivation.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedRequest {
    /// Concrete catalog type (never `"random"`).
    pub type_name: String,
    pub quality: u32,
    pub force: bool,
    pub job: ResolvedJob,
}

/// Turns requests into jobs against a fixed catalog.
#[derive(Debug, Clone)]
pub struct Resolver<'a> {
    catalog: &'a Catalog,
    default_type: &'a str,
}

impl<'a> Resolver<'a> {
    pub fn new(catalog: &'a Catalog) -> Self {
        Self {
            catalog,
            default_type: DEFAULT_TYPE,
        }
    }

    /// Use a different fallback type for unknown type names.
    pub fn with_default_type(mut self, default_type: &'a str) -> Self {
        self.default_type = default_type;
        self
    }

    /// Coerce a requested type into one the catalog can serve.
    ///
    /// Returns the name unchanged if it is a catalog type or `"random"`, and
    /// the default type otherwise.
    pub fn select_type<'t>(&self, requested: &'t str) -> &'t str
    where
        'a: 't,
    {
        if requested == RANDOM_TYPE || self.catalog.contains(requested) {
            requested
        } else {
            tracing::debug!(requested, fallback = self.default_type, "unknown type");
            self.default_type
        }
    }

    pub fn resolve(
        &self,
        request: &CropRequest,
        rng: &mut impl Rng,
    ) -> Result<ResolvedRequest, ConfigError> {
        request.validate()?;

        let selected = self.select_type(&request.type_name);
        let entry = if selected == RANDOM_TYPE {
            self.catalog.choose(rng)
        } else {
            self.catalog.get(selected)
        };

        let (type_name, input_file) = match (&request.input_path, entry) {
            (Some(input), entry) => {
                let name = entry.map_or(selected, |e| e.type_name.as_str());
                (name.to_string(), input.clone())
            }
            (None, Some(entry)) => (entry.type_name.clone(), entry.source_path.clone()),
            (None, None) => {
                return Err(ConfigError::Validation(format!(
                    "catalog has no source image for type '{selected}'"
                )));
            }
        };

        let output_file = match &request.output_path {
            Some(path) => path.clone(),
            None => {
                let dir = match &request.output_dir {
                    Some(dir) => dir.clone(),
                    None => std::env::current_dir()?,
                };
                synthesize_output_path(
                    &dir,
                    &type_name,
                    request.width,
                    request.height,
                    request.extension.as_deref(),
                )
            }
        };

        let resolved = ResolvedRequest {
            type_name,
            quality: request.quality,
            force: request.force,
            job: ResolvedJob {
                input_file,
                output_file,
                width: request.width,
                height: request.height,
            },
        };
        tracing::debug!(
            type_name = %resolved.type_name,
            job = %resolved.job,
            "resolved request"
        );
        Ok(resolved)
    }
}

/// `{dir}/{type}-{width}x{height}.{extension}`, extension defaulting to `jpg`.
pub fn synthesize_output_path(
    dir: &Path,
    type_name: &str,
    width: u32,
    height: u32,
    extension: Option<&str>,
) -> PathBuf {
    let extension = extension.unwrap_or(DEFAULT_EXTENSION);
    dir.join(format!("{type_name}-{width}x{height}.{extension}"))
}
