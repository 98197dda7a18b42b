use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::error::{HarnessError, Result};

/// Captured result of one trial invocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrialOutput {
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
    pub exit_code: Option<i32>,
    pub elapsed: Duration,
}

impl TrialOutput {
    /// A successful trial that printed `stdout` and nothing else.
    pub fn from_stdout(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: String::new(),
            success: true,
            exit_code: Some(0),
            elapsed: Duration::ZERO,
        }
    }
}

/// Something that can execute one trial at a given test size.
pub trait Benchmark {
    fn run_trial(&mut self, test_size: u64) -> Result<TrialOutput>;
}

impl<F> Benchmark for F
where
    F: FnMut(u64) -> Result<TrialOutput>,
{
    fn run_trial(&mut self, test_size: u64) -> Result<TrialOutput> {
        self(test_size)
    }
}

/// The external timing executable, invoked once per trial as
/// `<program> [leading args...] <test_size> <data_file>`.
#[derive(Clone, Debug)]
pub struct ExternalBenchmark {
    program: PathBuf,
    leading_args: Vec<String>,
    data_file: PathBuf,
}

impl ExternalBenchmark {
    pub fn new(program: impl Into<PathBuf>, data_file: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            leading_args: Vec::new(),
            data_file: data_file.into(),
        }
    }

    /// Arguments placed before the size and data file, e.g. an interpreter
    /// script or a `taskset` mask.
    pub fn with_leading_args(mut self, args: impl IntoIterator<Item = String>) -> Self {
        self.leading_args.extend(args);
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn data_file(&self) -> &Path {
        &self.data_file
    }

    fn command(&self, test_size: u64) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.leading_args)
            .arg(test_size.to_string())
            .arg(&self.data_file)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        cmd
    }
}

impl Benchmark for ExternalBenchmark {
    fn run_trial(&mut self, test_size: u64) -> Result<TrialOutput> {
        let start = Instant::now();
        let output = self
            .command(test_size)
            .output()
            .map_err(|source| HarnessError::Spawn {
                program: self.program.clone(),
                source,
            })?;
        let elapsed = start.elapsed();

        let trial = TrialOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            success: output.status.success(),
            exit_code: output.status.code(),
            elapsed,
        };

        // Not fatal here: a crashed run normally leaves no payload and the
        // parser rejects it.
        if !trial.success {
            warn!(
                program = %self.program.display(),
                test_size,
                exit_code = ?trial.exit_code,
                stderr = trial.stderr.trim_end(),
                "benchmark exited unsuccessfully"
            );
        }
        debug!(
            test_size,
            elapsed_ms = elapsed.as_secs_f64() * 1000.0,
            stdout_bytes = trial.stdout.len(),
            stderr_bytes = trial.stderr.len(),
            "trial finished"
        );

        Ok(trial)
    }
}
