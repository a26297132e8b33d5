use std::ffi::OsStr;
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::process::Command;
use tracing::debug;

use crate::config::TranscoderConfig;
use crate::error::ProcessError;

/// Captured result of a successful run.
#[derive(Debug, Clone)]
pub struct SubprocessOutput {
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

/// Runs one external executable with argument vectors, never through a shell.
///
/// Output is buffered in full and the exit status is only inspected once the
/// process has terminated. Dropping the future returned by [`run`] kills the
/// child.
///
/// [`run`]: SubprocessRunner::run
#[derive(Debug, Clone)]
pub struct SubprocessRunner {
    executable_path: String,
    timeout: Option<Duration>,
}

impl SubprocessRunner {
    pub fn new(executable_path: impl Into<String>) -> Self {
        Self {
            executable_path: executable_path.into(),
            timeout: None,
        }
    }

    pub fn from_config(config: &TranscoderConfig) -> Self {
        let runner = Self::new(config.executable_path.clone());
        match config.timeout_secs {
            0 => runner,
            secs => runner.with_timeout(Duration::from_secs(secs)),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn program(&self) -> &str {
        &self.executable_path
    }

    pub async fn run<I, S>(&self, args: I) -> Result<SubprocessOutput, ProcessError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut command = Command::new(&self.executable_path);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!("[process] ▶️  {:?}", command.as_std());
        let started = Instant::now();

        let pending = command.output();
        let result = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, pending).await.map_err(|_| {
                ProcessError::TimedOut {
                    program: self.executable_path.clone(),
                    secs: limit.as_secs(),
                }
            })?,
            None => pending.await,
        };

        let output = result.map_err(|source| ProcessError::Spawn {
            program: self.executable_path.clone(),
            source,
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        debug!(
            "[process] ⏹️  {} exited with {:?} after {:.2}s",
            self.executable_path,
            output.status.code(),
            started.elapsed().as_secs_f64()
        );

        if !output.status.success() {
            return Err(ProcessError::Failed {
                program: self.executable_path.clone(),
                code: output.status.code(),
                stderr,
            });
        }

        Ok(SubprocessOutput {
            code: output.status.code().unwrap_or(0),
            stdout,
            stderr,
        })
    }
}
