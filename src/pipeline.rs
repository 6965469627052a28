//! The crop pipeline: resolve → guard → crop.
//!
//! [`Pipeline::run`] is the single entry point. It returns the destination
//! path straight away and reports the outcome through a completion callback,
//! which is invoked exactly once:
//!
//! ```text
//! run(request, cb)
//!   ├─ resolve        (calling thread)  ── fails → cb(Err(Configuration)), returns ""
//!   ├─ guard          (calling thread)  ── exists → cb(Err(AlreadyExists)), returns path
//!   │                                   ── stat fails → cb(Err(Io)), returns path
//!   └─ crop           (worker thread)   ── cb(Ok(path)) or cb(Err(CropExecution | Io))
//!      returns path immediately
//! ```
//!
//! Resolution and the existence check are cheap metadata work and stay on the
//! caller's thread; only the wait on the child process moves to a worker. The
//! catalog is shared read-only between all runs, so concurrent runs are
//! independent. Two runs writing the same destination race, and the last
//! cropper to finish wins.
//!
//! [`Pipeline::submit`] wraps the same flow in a [`CropHandle`] for callers
//! that prefer to block on the result instead of passing a callback.

use crate::catalog::Catalog;
use crate::config::{ConfigError, CropRequest};
use crate::cropper::{CropError, Cropper};
use crate::guard::{self, Clearance, GuardError};
use crate::resolve::Resolver;
use crate::types::{DEFAULT_TYPE, ResolvedJob};
use rand::Rng;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};
use thiserror::Error;

/// Terminal failure of a pipeline run.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("invalid configuration: {0}")]
    Configuration(#[from] ConfigError),
    /// The destination exists and `force` was not set. Callers that only need
    /// the file to exist can treat this as success, see
    /// [`PipelineError::existing_path`].
    #[error("output file already exists: {0}")]
    AlreadyExists(PathBuf),
    #[error("IO error on {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("crop failed: {0}")]
    CropExecution(CropError),
}

impl PipelineError {
    /// The existing destination, if this is an already-exists outcome.
    pub fn existing_path(&self) -> Option<&Path> {
        match self {
            Self::AlreadyExists(path) => Some(path),
            _ => None,
        }
    }
}

impl From<GuardError> for PipelineError {
    fn from(err: GuardError) -> Self {
        match err {
            GuardError::AlreadyExists(path) => Self::AlreadyExists(path),
            GuardError::Io { path, source } => Self::Io { path, source },
        }
    }
}

impl From<CropError> for PipelineError {
    fn from(err: CropError) -> Self {
        match err {
            CropError::Io { program, source } => Self::Io {
                path: program,
                source,
            },
            other => Self::CropExecution(other),
        }
    }
}

pub type CropResult = Result<PathBuf, PipelineError>;

/// Progress notifications for a run, in the order they occur.
#[derive(Debug, Clone, PartialEq)]
pub enum CropEvent {
    Resolved { type_name: String, job: ResolvedJob },
    /// The destination already existed; the cropper was not run.
    Skipped { output: PathBuf },
    Started { job: ResolvedJob, overwrite: bool },
    Finished { output: PathBuf },
    Failed { message: String },
}

/// Resolves requests against a catalog and drives the cropper.
#[derive(Clone)]
pub struct Pipeline {
    catalog: Arc<Catalog>,
    cropper: Arc<dyn Cropper>,
    default_type: String,
    events: Option<Sender<CropEvent>>,
}

impl Pipeline {
    pub fn new(catalog: Arc<Catalog>, cropper: Arc<dyn Cropper>) -> Self {
        Self {
            catalog,
            cropper,
            default_type: DEFAULT_TYPE.to_string(),
            events: None,
        }
    }

    /// Fallback for unknown type names (default `"user"`).
    pub fn with_default_type(mut self, default_type: impl Into<String>) -> Self {
        self.default_type = default_type.into();
        self
    }

    /// Stream [`CropEvent`]s to `tx` for every run.
    pub fn with_events(mut self, tx: Sender<CropEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Run a request, reporting the outcome to `on_complete`.
    ///
    /// Returns the destination path without waiting for the cropper, or an
    /// empty path if the request could not be resolved.
    pub fn run<F>(&self, request: &CropRequest, on_complete: F) -> PathBuf
    where
        F: FnOnce(CropResult) + Send + 'static,
    {
        self.run_with_rng(request, &mut rand::rng(), on_complete)
    }

    /// [`run`](Self::run) with an explicit source of randomness for
    /// `type = "random"`.
    pub fn run_with_rng<F>(
        &self,
        request: &CropRequest,
        rng: &mut impl Rng,
        on_complete: F,
    ) -> PathBuf
    where
        F: FnOnce(CropResult) + Send + 'static,
    {
        let resolver = Resolver::new(&self.catalog).with_default_type(&self.default_type);
        let resolved = match resolver.resolve(request, rng) {
            Ok(resolved) => resolved,
            Err(err) => {
                self.fail(err.into(), on_complete);
                return PathBuf::new();
            }
        };
        let job = resolved.job;
        let output = job.output_file.clone();
        self.emit(CropEvent::Resolved {
            type_name: resolved.type_name,
            job: job.clone(),
        });

        let clearance = match guard::check_destination(&output, resolved.force) {
            Ok(clearance) => clearance,
            Err(err) => {
                let err = PipelineError::from(err);
                if err.existing_path().is_some() {
                    self.emit(CropEvent::Skipped {
                        output: output.clone(),
                    });
                    on_complete(Err(err));
                } else {
                    self.fail(err, on_complete);
                }
                return output;
            }
        };

        self.emit(CropEvent::Started {
            job: job.clone(),
            overwrite: clearance == Clearance::Overwrite,
        });
        let cropper = Arc::clone(&self.cropper);
        let events = self.events.clone();
        std::thread::spawn(move || {
            let result = cropper
                .crop(&job)
                .map(|()| job.output_file.clone())
                .map_err(PipelineError::from);
            if let Some(tx) = events {
                let event = match &result {
                    Ok(output) => CropEvent::Finished {
                        output: output.clone(),
                    },
                    Err(err) => CropEvent::Failed {
                        message: err.to_string(),
                    },
                };
                let _ = tx.send(event);
            }
            on_complete(result);
        });

        output
    }

    /// Run a request and return a handle to wait on instead of a callback.
    pub fn submit(&self, request: &CropRequest) -> CropHandle {
        let (tx, rx) = mpsc::channel();
        let path = self.run(request, move |result| {
            let _ = tx.send(result);
        });
        CropHandle { path, rx }
    }

    fn fail<F>(&self, err: PipelineError, on_complete: F)
    where
        F: FnOnce(CropResult),
    {
        self.emit(CropEvent::Failed {
            message: err.to_string(),
        });
        on_complete(Err(err));
    }

    fn emit(&self, event: CropEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }
}

/// Pending outcome of a [`Pipeline::submit`] call.
pub struct CropHandle {
    path: PathBuf,
    rx: Receiver<CropResult>,
}

impl CropHandle {
    /// Destination path, available before the crop finishes. Empty if the
    /// request failed to resolve.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Block until the run completes.
    pub fn wait(self) -> CropResult {
        self.rx.recv().unwrap_or_else(|_| {
            Err(PipelineError::Io {
                path: self.path,
                source: io::Error::other("crop worker exited without reporting"),
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cropper::CommandCropper;
    use crate::cropper::tests::MockCropper;
    use crate::test_helpers::*;
    use std::time::Duration;
    use tempfile::TempDir;

    const WAIT: Duration = Duration::from_secs(10);

    fn mock_pipeline(types: &[&str]) -> (Pipeline, Arc<MockCropper>) {
        let cropper = Arc::new(MockCropper::new());
        let pipeline = Pipeline::new(Arc::new(synthetic_catalog(types)), cropper.clone());
        (pipeline, cropper)
    }

    fn request_in(dir: &Path) -> CropRequest {
        CropRequest {
            output_dir: Some(dir.to_path_buf()),
            ..Default::default()
        }
    }

    /// Run with a channel-backed callback, returning the path and receiver.
    fn run_collecting(
        pipeline: &Pipeline,
        request: &CropRequest,
    ) -> (PathBuf, Receiver<CropResult>) {
        let (tx, rx) = mpsc::channel();
        let path = pipeline.run(request, move |result| tx.send(result).unwrap());
        (path, rx)
    }

    #[test]
    fn success_returns_path_and_reports_it() {
        let out = TempDir::new().unwrap();
        let (pipeline, cropper) = mock_pipeline(&["user"]);

        let (path, rx) = run_collecting(&pipeline, &request_in(out.path()));
        assert_eq!(path, out.path().join("user-128x128.jpg"));

        let result = rx.recv_timeout(WAIT).unwrap();
        assert_eq!(result.unwrap(), path);
        assert_eq!(cropper.get_jobs().len(), 1);
        assert_eq!(cropper.get_jobs()[0].input_file, PathBuf::from("/catalog/user.jpg"));
    }

    #[test]
    fn resolution_failure_reports_before_returning() {
        let out = TempDir::new().unwrap();
        let (pipeline, cropper) = mock_pipeline(&["user"]);
        let request = CropRequest {
            width: 0,
            ..request_in(out.path())
        };

        let (path, rx) = run_collecting(&pipeline, &request);
        assert_eq!(path, PathBuf::new());
        let result = rx.try_recv().expect("callback must run synchronously");
        assert!(matches!(result, Err(PipelineError::Configuration(_))));
        assert!(cropper.get_jobs().is_empty());
    }

    #[test]
    fn second_identical_run_reports_already_exists() {
        let out = TempDir::new().unwrap();
        let (pipeline, cropper) = mock_pipeline(&["user"]);
        let request = request_in(out.path());

        let first = pipeline.submit(&request).wait().unwrap();

        let (path, rx) = run_collecting(&pipeline, &request);
        assert_eq!(path, first);
        let err = rx.try_recv().expect("guard outcome is synchronous").unwrap_err();
        assert_eq!(err.existing_path(), Some(first.as_path()));
        assert_eq!(cropper.get_jobs().len(), 1);
    }

    #[test]
    fn force_overwrites_existing_output() {
        let out = TempDir::new().unwrap();
        let (pipeline, cropper) = mock_pipeline(&["user"]);
        let existing = out.path().join("user-128x128.jpg");
        std::fs::write(&existing, b"stale").unwrap();
        let request = CropRequest {
            force: true,
            ..request_in(out.path())
        };

        let result = pipeline.submit(&request).wait().unwrap();
        assert_eq!(result, existing);
        assert_eq!(std::fs::read(&existing).unwrap(), b"cropped");
        assert_eq!(cropper.get_jobs().len(), 1);
    }

    #[test]
    fn nonzero_exit_reports_crop_execution_error() {
        let out = TempDir::new().unwrap();
        let cropper = Arc::new(MockCropper::failing_with(2));
        let pipeline = Pipeline::new(Arc::new(synthetic_catalog(&["user"])), cropper);

        let handle = pipeline.submit(&request_in(out.path()));
        let expected = handle.path().to_path_buf();
        match handle.wait() {
            Err(PipelineError::CropExecution(CropError::Failed { job, code })) => {
                assert_eq!(code, Some(2));
                assert_eq!(job.output_file, expected);
            }
            other => panic!("expected crop failure, got {other:?}"),
        }
    }

    #[test]
    fn explicit_output_path_returned_verbatim() {
        let out = TempDir::new().unwrap();
        let (pipeline, _) = mock_pipeline(&["user", "landscape"]);
        let target = out.path().join("avatar.png");
        let request = CropRequest {
            width: 999,
            height: 1,
            type_name: "landscape".into(),
            output_path: Some(target.clone()),
            ..Default::default()
        };

        let handle = pipeline.submit(&request);
        assert_eq!(handle.path(), target);
        assert_eq!(handle.wait().unwrap(), target);
    }

    #[test]
    fn unknown_type_uses_user_image_from_scanned_catalog() {
        let images = setup_catalog(&["user.jpg", "random1.jpg"]);
        let out = TempDir::new().unwrap();
        let cropper = Arc::new(MockCropper::new());
        let catalog = Catalog::scan(images.path()).unwrap();
        let pipeline = Pipeline::new(Arc::new(catalog), cropper.clone());
        let request = CropRequest {
            type_name: "doesnotexist".into(),
            ..request_in(out.path())
        };

        let path = pipeline.submit(&request).wait().unwrap();
        assert_eq!(path, out.path().join("user-128x128.jpg"));
        assert_eq!(cropper.get_jobs()[0].input_file, images.path().join("user.jpg"));
    }

    #[cfg(unix)]
    #[test]
    fn guard_io_failure_reported_synchronously() {
        let out = TempDir::new().unwrap();
        let blocker = out.path().join("file");
        std::fs::write(&blocker, b"").unwrap();
        let (pipeline, cropper) = mock_pipeline(&["user"]);
        let request = CropRequest {
            output_path: Some(blocker.join("nested.jpg")),
            ..Default::default()
        };

        let (_, rx) = run_collecting(&pipeline, &request);
        let result = rx.try_recv().expect("guard outcome is synchronous");
        assert!(matches!(result, Err(PipelineError::Io { .. })));
        assert!(cropper.get_jobs().is_empty());
    }

    #[test]
    fn events_follow_run_order() {
        let out = TempDir::new().unwrap();
        let (tx, rx) = mpsc::channel();
        let (pipeline, _) = mock_pipeline(&["user"]);
        let pipeline = pipeline.with_events(tx);

        let path = pipeline.submit(&request_in(out.path())).wait().unwrap();
        drop(pipeline);
        let events: Vec<CropEvent> = rx.iter().collect();

        assert_eq!(events.len(), 3);
        assert!(matches!(&events[0], CropEvent::Resolved { type_name, .. } if type_name == "user"));
        assert!(matches!(&events[1], CropEvent::Started { overwrite: false, .. }));
        assert_eq!(events[2], CropEvent::Finished { output: path });
    }

    #[test]
    fn skipped_event_when_destination_exists() {
        let out = TempDir::new().unwrap();
        std::fs::write(out.path().join("user-128x128.jpg"), b"").unwrap();
        let (tx, rx) = mpsc::channel();
        let (pipeline, _) = mock_pipeline(&["user"]);
        let pipeline = pipeline.with_events(tx);

        let result = pipeline.submit(&request_in(out.path())).wait();
        assert!(result.unwrap_err().existing_path().is_some());
        drop(pipeline);
        let events: Vec<CropEvent> = rx.iter().collect();
        assert!(matches!(events.last(), Some(CropEvent::Skipped { .. })));
    }

    #[test]
    fn custom_default_type_applies_to_unknown_types() {
        let out = TempDir::new().unwrap();
        let (pipeline, cropper) = mock_pipeline(&["avatar"]);
        let pipeline = pipeline.with_default_type("avatar");
        let request = CropRequest {
            type_name: "nope".into(),
            ..request_in(out.path())
        };

        let path = pipeline.submit(&request).wait().unwrap();
        assert_eq!(path, out.path().join("avatar-128x128.jpg"));
        assert_eq!(cropper.get_jobs()[0].input_file, PathBuf::from("/catalog/avatar.jpg"));
    }

    #[test]
    fn random_type_crops_a_catalog_entry() {
        use rand::SeedableRng;

        let out = TempDir::new().unwrap();
        let (pipeline, cropper) = mock_pipeline(&["user", "landscape", "portrait"]);
        let request = CropRequest {
            type_name: "random".into(),
            force: true,
            ..request_in(out.path())
        };
        let mut rng = rand::rngs::StdRng::seed_from_u64(5);

        for _ in 0..10 {
            let (tx, rx) = mpsc::channel();
            let path = pipeline.run_with_rng(&request, &mut rng, move |r| tx.send(r).unwrap());
            assert_eq!(rx.recv_timeout(WAIT).unwrap().unwrap(), path);
        }
        for job in cropper.get_jobs() {
            let stem = job.input_file.file_stem().unwrap().to_str().unwrap().to_string();
            assert!(pipeline.catalog().contains(&stem));
            assert_eq!(job.output_file, out.path().join(format!("{stem}-128x128.jpg")));
        }
    }

    #[test]
    fn concurrent_runs_are_independent() {
        let out = TempDir::new().unwrap();
        let (pipeline, cropper) = mock_pipeline(&["user"]);

        let handles: Vec<CropHandle> = (1..=8)
            .map(|i| {
                pipeline.submit(&CropRequest {
                    width: i * 10,
                    ..request_in(out.path())
                })
            })
            .collect();
        let paths: Vec<PathBuf> = handles.into_iter().map(|h| h.wait().unwrap()).collect();

        assert_eq!(cropper.get_jobs().len(), 8);
        for (i, path) in paths.iter().enumerate() {
            let width = (i as u32 + 1) * 10;
            assert_eq!(*path, out.path().join(format!("user-{width}x128.jpg")));
            assert!(path.exists());
        }
    }

    #[cfg(unix)]
    #[test]
    fn end_to_end_with_external_cropper() {
        let images = setup_catalog(&["user.jpg", "random1.jpg"]);
        let bin = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let catalog = Arc::new(Catalog::scan(images.path()).unwrap());
        let cropper = CommandCropper::new(fake_cropper(bin.path(), 0));
        let pipeline = Pipeline::new(catalog, Arc::new(cropper));
        let request = CropRequest {
            width: 200,
            height: 300,
            ..request_in(out.path())
        };

        let path = pipeline.submit(&request).wait().unwrap();
        assert_eq!(path, out.path().join("user-200x300.jpg"));
        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, format!("{} 200x300\n", images.path().join("user.jpg").display()));

        // Not forced: the cropper must not run again.
        let again = pipeline.submit(&request).wait();
        assert!(again.unwrap_err().existing_path().is_some());
        assert_eq!(cropper_calls(bin.path()), 1);

        // Forced: it runs and reports the same path.
        let forced = CropRequest {
            force: true,
            ..request
        };
        assert_eq!(pipeline.submit(&forced).wait().unwrap(), path);
        assert_eq!(cropper_calls(bin.path()), 2);
    }

    #[cfg(unix)]
    #[test]
    fn missing_cropper_is_io_error() {
        let out = TempDir::new().unwrap();
        let pipeline = Pipeline::new(
            Arc::new(synthetic_catalog(&["user"])),
            Arc::new(CommandCropper::new(out.path().join("bin/cropper"))),
        );

        let result = pipeline.submit(&request_in(out.path())).wait();
        assert!(matches!(result, Err(PipelineError::Io { .. })));
    }
}
