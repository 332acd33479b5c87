//! Process execution boundary.
//!
//! Everything mgit does to the outside world goes through an external
//! binary: `ssh-keygen`, `ssh-add`, `ssh`, `git`. The [`CommandRunner`]
//! trait is the single seam for all of it, so the store/SSH/Git components
//! can be driven by a deterministic double in tests.

use std::path::Path;
use std::process::Command;

use crate::errors::{Error, Result};

/// Captured result of one external command
#[derive(Debug, Clone, Default)]
pub struct Output {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl Output {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// stdout followed by stderr, for callers that scan both
    pub fn combined(&self) -> String {
        format!("{}{}", self.stdout, self.stderr)
    }
}

/// Narrow abstraction over running an external process to completion.
///
/// Calls block for the duration of the child process; there is no timeout
/// or cancellation. A missing binary is an `ExternalTool` error, a non-zero
/// exit is not — callers decide what exit codes mean.
pub trait CommandRunner {
    fn run(&self, program: &str, args: &[&str], cwd: Option<&Path>) -> Result<Output>;
}

/// Runs commands with `std::process::Command`, capturing output.
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, program: &str, args: &[&str], cwd: Option<&Path>) -> Result<Output> {
        let mut cmd = Command::new(program);
        cmd.args(args);
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }

        let out = cmd.output().map_err(|e| {
            Error::external(program, format!("failed to start: {}", e))
        })?;

        Ok(Output {
            exit_code: out.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&out.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&out.stderr).into_owned(),
        })
    }
}

/// Run a command and treat a non-zero exit as an `ExternalTool` error.
pub fn run_checked(
    runner: &dyn CommandRunner,
    program: &str,
    args: &[&str],
    cwd: Option<&Path>,
) -> Result<Output> {
    let out = runner.run(program, args, cwd)?;
    if !out.success() {
        return Err(Error::external(
            format!("{} {}", program, args.join(" ")),
            format!("exit code {}: {}", out.exit_code, out.stderr.trim()),
        ));
    }
    Ok(out)
}
