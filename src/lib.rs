//! # Placeholder Image
//!
//! Generates placeholder images by cropping a source from a fixed catalog to
//! the requested size. The pixel work is delegated to an external `cropper`
//! executable; this crate decides *what* to crop and *where* to put it.
//!
//! # Architecture: Resolve → Guard → Crop
//!
//! ```text
//! 1. Resolve   request + catalog  →  ResolvedJob   (pure, calling thread)
//! 2. Guard     ResolvedJob.output →  go / skip     (one stat, calling thread)
//! 3. Crop      ResolvedJob        →  output file   (child process, worker thread)
//! ```
//!
//! The destination path is known after step 1, so [`Pipeline::run`] returns it
//! immediately and reports the final outcome through a callback once the
//! cropper exits.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`catalog`] | One-time scan of the images directory into type name → source path |
//! | [`config`] | `CropRequest` defaults, TOML layering, validation, installation layout |
//! | [`resolve`] | Type coercion, random selection, input and output path derivation |
//! | [`guard`] | Existing-output check honoring `force` |
//! | [`cropper`] | [`Cropper`] trait and the subprocess implementation |
//! | [`pipeline`] | The public entry point, completion callback, progress events |
//! | [`types`] | Shared types (`CatalogEntry`, `ResolvedJob`) and type-name constants |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Unknown Types Fall Back, They Don't Fail
//!
//! Asking for a type the catalog doesn't have yields the default type
//! (`user`). Callers rely on always getting *some* image back, so a typo in a
//! type name is not an error. Malformed requests (zero dimensions, empty
//! paths) are.
//!
//! ## The Exit Code Is The Contract
//!
//! The cropper is a black box. Its exit status decides success; its output
//! streams are passed through to the terminal and never parsed.
//!
//! ## Explicit Catalog
//!
//! The catalog is a value built once and handed to the [`Pipeline`], not
//! hidden module state. Tests build synthetic catalogs with
//! [`Catalog::from_entries`] and never touch the filesystem.

pub mod catalog;
pub mod config;
pub mod cropper;
pub mod guard;
pub mod output;
pub mod pipeline;
pub mod resolve;
pub mod types;

pub use catalog::Catalog;
pub use config::CropRequest;
pub use cropper::{CommandCropper, Cropper};
pub use pipeline::{CropHandle, Pipeline, PipelineError};

#[cfg(test)]
pub(crate) mod test_helpers;
