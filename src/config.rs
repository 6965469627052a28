//! Request configuration and installation layout.
//!
//! A [`CropRequest`] describes one placeholder to generate. Every field has a
//! default, so an empty request is valid:
//!
//! ```toml
//! width = 128          # Output width in pixels
//! height = 128         # Output height in pixels
//! type = "user"        # Catalog type, or "random"
//! quality = 90         # Encoding quality (0-100)
//! force = false        # Overwrite an existing output file
//! # output_dir = "."   # Defaults to the current working directory
//! # output_path = "/tmp/avatar.jpg"
//! # input_path = "/photos/me.jpg"
//! # extension = "png"
//! ```
//!
//! ## Layering
//!
//! Requests are assembled the same way at every entry point: an optional TOML
//! request file is the base, command-line flags are merged on top with
//! [`merge_toml`], and the merged table is deserialized. Keys missing from
//! every layer take the defaults above. Unknown keys are rejected to catch
//! typos early.
//!
//! ## Installation layout
//!
//! The catalog and the cropper live under an installation root:
//!
//! ```text
//! <root>/
//! ├── bin/cropper      # External cropping executable
//! └── images/          # Catalog directory
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Parameters for a single placeholder crop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CropRequest {
    pub width: u32,
    pub height: u32,
    /// Catalog type name, or `"random"`. Unknown names fall back to the
    /// default type during resolution.
    #[serde(rename = "type")]
    pub type_name: String,
    pub quality: u32,
    /// Directory for synthesized output names. `None` means the current
    /// working directory at resolution time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,
    /// Explicit destination, used verbatim.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<PathBuf>,
    /// Explicit source image; bypasses the catalog.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_path: Option<PathBuf>,
    /// Extension for synthesized output names (default `jpg`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extension: Option<String>,
    pub force: bool,
}

impl Default for CropRequest {
    fn default() -> Self {
        Self {
            width: 128,
            height: 128,
            type_name: crate::types::DEFAULT_TYPE.to_string(),
            quality: 90,
            output_dir: None,
            output_path: None,
            input_path: None,
            extension: None,
            force: false,
        }
    }
}

impl CropRequest {
    /// Reject requests that cannot produce a usable path or job.
    ///
    /// The type name is deliberately not checked here: unknown types are
    /// coerced, not rejected.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::Validation(
                "width and height must be non-zero".into(),
            ));
        }
        if self.quality > 100 {
            return Err(ConfigError::Validation("quality must be 0-100".into()));
        }
        check_path("output_dir", self.output_dir.as_deref())?;
        check_path("output_path", self.output_path.as_deref())?;
        check_path("input_path", self.input_path.as_deref())?;
        if let Some(ext) = &self.extension {
            if ext.is_empty() {
                return Err(ConfigError::Validation("extension must not be empty".into()));
            }
            if ext.contains(['/', '\\', '\0']) {
                return Err(ConfigError::Validation(format!(
                    "extension {ext:?} must not contain path separators"
                )));
            }
        }
        Ok(())
    }
}

fn check_path(field: &str, path: Option<&Path>) -> Result<(), ConfigError> {
    let Some(path) = path else {
        return Ok(());
    };
    if path.as_os_str().is_empty() {
        return Err(ConfigError::Validation(format!("{field} must not be empty")));
    }
    if path.as_os_str().as_encoded_bytes().contains(&0) {
        return Err(ConfigError::Validation(format!(
            "{field} contains a NUL byte"
        )));
    }
    Ok(())
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a request file as a raw TOML value.
pub fn load_raw_request(path: &Path) -> Result<toml::Value, ConfigError> {
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(value)
}

/// Merge an optional file layer with an overlay, then deserialize and validate.
pub fn resolve_request(
    base: Option<toml::Value>,
    overlay: toml::Value,
) -> Result<CropRequest, ConfigError> {
    let merged = match base {
        Some(base) => merge_toml(base, overlay),
        None => overlay,
    };
    let request: CropRequest = merged.try_into()?;
    request.validate()?;
    Ok(request)
}

/// Where the catalog directory and cropper executable live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Installation {
    pub images_dir: PathBuf,
    pub cropper: PathBuf,
}

impl Installation {
    pub fn from_root(root: &Path) -> Self {
        Self {
            images_dir: root.join("images"),
            cropper: root.join("bin").join("cropper"),
        }
    }

    /// Installation root inferred from the running executable: the parent of
    /// the directory holding it (`<root>/bin/placeholder-image`).
    pub fn detect() -> Result<Self, ConfigError> {
        let exe = std::env::current_exe()?;
        let root = exe
            .parent()
            .and_then(Path::parent)
            .ok_or_else(|| {
                ConfigError::Validation(format!(
                    "cannot infer installation root from {}",
                    exe.display()
                ))
            })?;
        Ok(Self::from_root(root))
    }
}

/// Returns a fully-commented stock request file.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Placeholder Image Request
# =========================
# All settings are optional. Values shown below are the defaults.
# Command-line flags override anything set here.
# Unknown keys will cause an error.

# Output dimensions in pixels. Both must be non-zero.
width = 128
height = 128

# Source image type: the stem of any file in the catalog directory
# (run `placeholder-image types` to list them), or "random" to pick one.
# Unknown types fall back to "user".
type = "user"

# Encoding quality (0 = worst, 100 = best).
quality = 90

# Overwrite the output file if it already exists.
force = false

# Directory for generated files, named "<type>-<width>x<height>.<extension>".
# Defaults to the current working directory.
# output_dir = "placeholders"

# Extension for generated file names.
# extension = "jpg"

# Write to this exact path instead (output_dir and extension are ignored).
# output_path = "public/avatar.jpg"

# Crop this image instead of a catalog entry.
# input_path = "photos/portrait.jpg"
"##
}
