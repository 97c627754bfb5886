//! External tester invocation.
//!
//! The actual liveness-testing algorithm lives in an external tool; the
//! launcher only spawns it against the refreshed input file. The [`Tester`]
//! trait decouples orchestration from the real subprocess so tests can
//! script tester behavior without spawning anything.

use std::path::PathBuf;
use std::process::Command;

use anyhow::{anyhow, Context, Result};
use tracing::info;

/// Parameters for one tester invocation.
#[derive(Debug, Clone)]
pub struct TestRequest {
    /// Working directory for the tester process (the workspace root).
    pub workdir: PathBuf,
    /// Input list the tester consumes.
    pub input_path: PathBuf,
}

/// Abstraction over the external liveness tester.
pub trait Tester {
    /// Run the tester to completion. A non-zero exit is an error.
    fn run(&self, request: &TestRequest) -> Result<()>;
}

/// Tester that spawns the external program as a subprocess.
///
/// The child inherits the launcher's stdout/stderr so its progress shows in
/// the CI log in real time, and no launcher-side timeout is applied: the CI
/// platform's wall-clock limit is what forces a part boundary.
#[derive(Debug, Clone)]
pub struct ProcessTester {
    program: String,
}

impl ProcessTester {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Tester for ProcessTester {
    fn run(&self, request: &TestRequest) -> Result<()> {
        info!(
            program = %self.program,
            input = %request.input_path.display(),
            "starting tester subprocess"
        );

        let status = Command::new(&self.program)
            .arg("-f")
            .arg(&request.input_path)
            .current_dir(&request.workdir)
            .stdin(std::process::Stdio::null())
            .status()
            .with_context(|| format!("spawn tester {}", self.program))?;

        if !status.success() {
            // Diagnostics already streamed to the CI log via inherited stdio.
            return Err(anyhow!(
                "tester {} failed with status {:?}",
                self.program,
                status.code()
            ));
        }

        info!("tester subprocess finished");
        Ok(())
    }
}
