//! Crop invocation.
//!
//! The pixel work is done by an external executable with a narrow contract:
//!
//! ```text
//! cropper --input <path> --output <path> --width <int> --height <int>
//! ```
//!
//! It must create or overwrite `--output` and exit 0 on success. The exit
//! status is the only signal read back; stdout and stderr are inherited so
//! its diagnostics reach the user untouched.
//!
//! [`Cropper`] is the seam between the pipeline and the process:
//! [`CommandCropper`] spawns the real executable, and tests substitute a
//! recording mock.

use crate::types::ResolvedJob;
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};
use thiserror::Error;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

#[derive(Error, Debug)]
pub enum CropError {
    #[error("cannot run cropper {program}: {source}")]
    Io { program: PathBuf, source: io::Error },
    #[error("cropper {} for {job}", describe_exit(.code))]
    Failed { job: ResolvedJob, code: Option<i32> },
    #[error("cropper timed out after {timeout:?} for {job}")]
    TimedOut { job: ResolvedJob, timeout: Duration },
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exited with status {code}"),
        None => "was terminated by a signal".to_string(),
    }
}

/// Runs one crop job to completion.
///
/// Implementations block until the job is finished; the pipeline calls them
/// from a worker thread.
pub trait Cropper: Send + Sync {
    fn crop(&self, job: &ResolvedJob) -> Result<(), CropError>;
}

/// Argument vector for a job, passed to the executable without a shell.
pub fn crop_args(job: &ResolvedJob) -> Vec<OsString> {
    vec![
        "--input".into(),
        job.input_file.clone().into_os_string(),
        "--output".into(),
        job.output_file.clone().into_os_string(),
        "--width".into(),
        job.width.to_string().into(),
        "--height".into(),
        job.height.to_string().into(),
    ]
}

/// Spawns the external cropper executable.
#[derive(Debug, Clone)]
pub struct CommandCropper {
    program: PathBuf,
    timeout: Option<Duration>,
}

impl CommandCropper {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            timeout: None,
        }
    }

    /// Kill the cropper and fail the job if it runs longer than `timeout`.
    ///
    /// On Unix the cropper runs in its own process group so that anything it
    /// spawned is killed with it.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    fn io_error(&self, source: io::Error) -> CropError {
        CropError::Io {
            program: self.program.clone(),
            source,
        }
    }
}

impl Cropper for CommandCropper {
    fn crop(&self, job: &ResolvedJob) -> Result<(), CropError> {
        tracing::debug!(program = %self.program.display(), %job, "launching cropper");

        let mut command = Command::new(&self.program);
        command.args(crop_args(job)).stdin(Stdio::null());
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            if self.timeout.is_some() {
                command.process_group(0);
            }
        }
        let mut child = command.spawn().map_err(|e| self.io_error(e))?;

        let status = match self.timeout {
            None => child.wait().map_err(|e| self.io_error(e))?,
            Some(timeout) => match wait_with_timeout(&mut child, timeout)
                .map_err(|e| self.io_error(e))?
            {
                Some(status) => status,
                None => {
                    return Err(CropError::TimedOut {
                        job: job.clone(),
                        timeout,
                    });
                }
            },
        };

        if status.success() {
            Ok(())
        } else {
            Err(CropError::Failed {
                job: job.clone(),
                code: status.code(),
            })
        }
    }
}

/// Poll until the child exits or `timeout` elapses. On timeout the child and
/// its process group are killed, the child is reaped, and `None` is returned.
fn wait_with_timeout(child: &mut Child, timeout: Duration) -> io::Result<Option<ExitStatus>> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            kill_tree(child)?;
            child.wait()?;
            return Ok(None);
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}

/// The child leads its own process group (see `with_timeout`), so signalling
/// the group reaches every process it started.
#[cfg(unix)]
fn kill_tree(child: &mut Child) -> io::Result<()> {
    let pgid = child.id() as libc::pid_t;
    if unsafe { libc::killpg(pgid, libc::SIGKILL) } == 0 {
        return Ok(());
    }
    let err = io::Error::last_os_error();
    tracing::warn!(pgid, %err, "killpg failed, killing cropper only");
    child.kill()
}

#[cfg(not(unix))]
fn kill_tree(child: &mut Child) -> io::Result<()> {
    child.kill()
}
