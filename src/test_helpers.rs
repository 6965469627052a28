//! Shared test utilities for the placeholder-image test suite.
//!
//! Provides catalog fixtures (on disk and in memory) and fake cropper
//! executables that honor the command-line contract.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let images = setup_catalog(&["user.jpg", "random1.jpg"]);
//! let catalog = Catalog::scan(images.path()).unwrap();
//!
//! let bin = tempfile::TempDir::new().unwrap();
//! let cropper = CommandCropper::new(fake_cropper(bin.path(), 0));
//! ```

use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::catalog::Catalog;
use crate::types::CatalogEntry;

// =========================================================================
// Catalog fixtures
// =========================================================================

/// Create a temp catalog directory holding empty files with the given names.
pub fn setup_catalog(files: &[&str]) -> TempDir {
    let tmp = TempDir::new().unwrap();
    for name in files {
        std::fs::write(tmp.path().join(name), b"").unwrap();
    }
    tmp
}

/// In-memory catalog whose entries point at `/catalog/<type>.jpg`.
pub fn synthetic_catalog(types: &[&str]) -> Catalog {
    Catalog::from_entries(types.iter().map(|t| CatalogEntry {
        type_name: t.to_string(),
        source_path: PathBuf::from(format!("/catalog/{t}.jpg")),
    }))
}

// =========================================================================
// Fake cropper executables
// =========================================================================

/// Write a shell script cropper into `dir` that exits with `exit_code`.
///
/// On success it writes `"<input> <width>x<height>\n"` to `--output`. Every
/// invocation appends a line to `dir/calls.log`, see [`cropper_calls`].
#[cfg(unix)]
pub fn fake_cropper(dir: &Path, exit_code: i32) -> PathBuf {
    let log = dir.join("calls.log");
    let script = format!(
        r#"#!/bin/sh
echo "$@" >> '{log}'
while [ $# -gt 0 ]; do
  case "$1" in
    --input) input="$2"; shift 2 ;;
    --output) output="$2"; shift 2 ;;
    --width) width="$2"; shift 2 ;;
    --height) height="$2"; shift 2 ;;
    *) exit 64 ;;
  esac
done
[ {exit_code} -eq 0 ] || exit {exit_code}
printf '%s %sx%s\n' "$input" "$width" "$height" > "$output"
"#,
        log = log.display(),
    );
    write_script(dir, "cropper", &script)
}

/// Write a cropper that sleeps for `seconds` before succeeding.
#[cfg(unix)]
pub fn sleeping_cropper(dir: &Path, seconds: u32) -> PathBuf {
    write_script(dir, "slow-cropper", &format!("#!/bin/sh\nexec sleep {seconds}\n"))
}

/// Write a cropper that hands the work to a child shell, which writes
/// `--output` after `seconds`. The writer is a grandchild of the caller.
#[cfg(unix)]
pub fn late_writing_cropper(dir: &Path, seconds: u32) -> PathBuf {
    let script = format!(
        r#"#!/bin/sh
while [ $# -gt 0 ]; do
  case "$1" in
    --output) output="$2"; shift 2 ;;
    *) shift ;;
  esac
done
sh -c 'sleep {seconds}; echo late > "$1"' writer "$output"
"#
    );
    write_script(dir, "late-cropper", &script)
}

/// Number of times the cropper in `dir` has been invoked.
#[cfg(unix)]
pub fn cropper_calls(dir: &Path) -> usize {
    std::fs::read_to_string(dir.join("calls.log"))
        .map(|log| log.lines().count())
        .unwrap_or(0)
}

#[cfg(unix)]
fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    std::fs::write(&path, body).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}
