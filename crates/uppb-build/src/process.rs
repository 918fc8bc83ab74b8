//! Blocking child-process execution
//!
//! Compilers, linkers, `make` and the build driver all run through here:
//! - one child at a time, waited on before returning
//! - environment and working directory come from the [`BuildContext`]
//! - output is either inherited (tool runs) or captured (probes such as `git`)

use crate::context::BuildContext;
use crate::error::{BuildError, BuildResult};
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::debug;

/// A program plus its arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    program: PathBuf,
    args: Vec<OsString>,
    working_dir: Option<PathBuf>,
}

impl ToolCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    /// Run in `dir` instead of the context's working directory
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn get_args(&self) -> &[OsString] {
        &self.args
    }

    /// Space-joined command line for logs and dry runs
    pub fn display_line(&self) -> String {
        std::iter::once(self.program.as_os_str())
            .chain(self.args.iter().map(OsString::as_os_str))
            .map(|part| part.to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn to_command(&self, ctx: &BuildContext) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .current_dir(self.working_dir.as_deref().unwrap_or(ctx.working_dir()))
            .env_clear()
            .envs(ctx.env());
        command
    }

    fn spawn_error(&self, error: std::io::Error) -> BuildError {
        BuildError::Spawn {
            program: self.program.display().to_string(),
            error,
        }
    }
}

/// Result of a captured run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Run with inherited stdio and return the exit code
pub fn run(ctx: &BuildContext, command: &ToolCommand) -> BuildResult<i32> {
    debug!(command = %command.display_line(), "running");
    let status = command
        .to_command(ctx)
        .stdin(Stdio::inherit())
        .status()
        .map_err(|e| command.spawn_error(e))?;
    Ok(status.code().unwrap_or(1))
}

/// Run with captured stdout/stderr
pub fn capture(ctx: &BuildContext, command: &ToolCommand) -> BuildResult<ProcessOutput> {
    debug!(command = %command.display_line(), "capturing");
    let output = command
        .to_command(ctx)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| command.spawn_error(e))?
        .wait_with_output()
        .map_err(|e| command.spawn_error(e))?;

    Ok(ProcessOutput {
        exit_code: output.status.code().unwrap_or(1),
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    })
}

/// Trimmed stdout of a successful capture, `None` on any failure
pub fn capture_line(ctx: &BuildContext, command: &ToolCommand) -> Option<String> {
    match capture(ctx, command) {
        Ok(output) if output.success() => Some(output.stdout.trim().to_string()),
        _ => None,
    }
}
