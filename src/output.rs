//! CLI output formatting.
//!
//! Output leads with what the user asked about (a type, a destination) and
//! shows filesystem sources as indented context lines:
//!
//! ```text
//! Types
//! 001 landscape
//!     Source: landscape.jpg
//! 002 user (default)
//!     Source: user.jpg
//! random → any of the above
//! ```
//!
//! ```text
//! user → /tmp/user-200x300.jpg
//!     Source: /opt/placeholder/images/user.jpg
//!     Cropping 200x300
//! Created /tmp/user-200x300.jpg
//! ```
//!
//! Each `format_*` function returns `Vec<String>` and is pure; the `print_*`
//! wrappers write to stdout. The `*_json` functions build the `--json`
//! equivalents, one JSON document per line:
//!
//! ```text
//! {"event":"resolved","type":"user","job":{"input_file":"…","output_file":"/tmp/user-200x300.jpg","width":200,"height":300}}
//! {"status":"created","path":"/tmp/user-200x300.jpg","request":{…}}
//! ```

use crate::catalog::Catalog;
use crate::config::CropRequest;
use crate::cropper::CropError;
use crate::pipeline::{CropEvent, CropResult, PipelineError};
use crate::types::RANDOM_TYPE;
use serde_json::{Value, json};
use std::path::Path;

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Format the catalog listing for the `types` command.
pub fn format_catalog(catalog: &Catalog, default_type: &str) -> Vec<String> {
    let mut lines = vec!["Types".to_string()];
    if catalog.is_empty() {
        lines.push("    (catalog is empty)".to_string());
        return lines;
    }
    for (i, entry) in catalog.entries().iter().enumerate() {
        let marker = if entry.type_name == default_type {
            " (default)"
        } else {
            ""
        };
        lines.push(format!("{} {}{}", format_index(i + 1), entry.type_name, marker));
        lines.push(format!("    Source: {}", file_name(&entry.source_path)));
    }
    lines.push(format!("{RANDOM_TYPE} → any of the above"));
    lines
}

pub fn print_catalog(catalog: &Catalog, default_type: &str) {
    for line in format_catalog(catalog, default_type) {
        println!("{}", line);
    }
}

/// Format a progress event from a pipeline run.
pub fn format_crop_event(event: &CropEvent) -> Vec<String> {
    match event {
        CropEvent::Resolved { type_name, job } => vec![
            format!("{} → {}", type_name, job.output_file.display()),
            format!("    Source: {}", job.input_file.display()),
        ],
        CropEvent::Skipped { output } => {
            vec![format!("    Exists, skipping (use --force to overwrite): {}", output.display())]
        }
        CropEvent::Started { job, overwrite } => {
            let verb = if *overwrite { "Re-cropping" } else { "Cropping" };
            vec![format!("    {} {}x{}", verb, job.width, job.height)]
        }
        // The outcome line reports both of these.
        CropEvent::Finished { .. } | CropEvent::Failed { .. } => Vec::new(),
    }
}

/// Format the terminal outcome of a run.
pub fn format_outcome(result: &CropResult) -> Vec<String> {
    match result {
        Ok(path) => vec![format!("Created {}", path.display())],
        Err(PipelineError::AlreadyExists(path)) => {
            vec![format!("Unchanged {}", path.display())]
        }
        Err(err) => vec![format!("Error: {}", err)],
    }
}

pub fn print_outcome(result: &CropResult) {
    for line in format_outcome(result) {
        println!("{}", line);
    }
}

/// The catalog as JSON for `types --json`.
pub fn catalog_json(catalog: &Catalog, default_type: &str) -> Value {
    json!({ "default": default_type, "types": catalog.entries() })
}

/// JSON line for a progress event. Only resolution is reported; the outcome
/// covers the rest.
pub fn crop_event_json(event: &CropEvent) -> Option<Value> {
    match event {
        CropEvent::Resolved { type_name, job } => {
            Some(json!({ "event": "resolved", "type": type_name, "job": job }))
        }
        _ => None,
    }
}

/// Terminal outcome of a run as JSON, echoing the effective request.
pub fn outcome_json(result: &CropResult, request: &CropRequest) -> Value {
    match result {
        Ok(path) => json!({ "status": "created", "path": path, "request": request }),
        Err(PipelineError::AlreadyExists(path)) => {
            json!({ "status": "exists", "path": path, "request": request })
        }
        Err(err) => {
            let mut value = json!({
                "status": "failed",
                "error": err.to_string(),
                "request": request,
            });
            if let PipelineError::CropExecution(
                CropError::Failed { job, .. } | CropError::TimedOut { job, .. },
            ) = err
            {
                value["job"] = json!(job);
            }
            value
        }
    }
}
