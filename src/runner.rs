// src/runner.rs

//! External process execution
//!
//! Every external tool the generator touches (git, autogen, configure, make,
//! cargo) goes through a [`ToolRunner`]. Output is always captured so that a
//! failing command can be reported verbatim alongside the generator's error.

use crate::error::CommandOutput;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

/// A command to run, with its working directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
}

impl ToolCommand {
    pub fn new(program: impl Into<String>, cwd: impl AsRef<Path>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: cwd.as_ref().to_path_buf(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Command line as a single string
    pub fn command_line(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

/// Executes external commands
///
/// Implementations must be shareable across component pipelines running on
/// different threads.
pub trait ToolRunner: Send + Sync {
    /// Run the command to completion, capturing its output
    ///
    /// A non-zero exit status is not an error at this level; callers decide
    /// which stage failure it represents. `Err` means the command could not
    /// be started at all.
    fn run(&self, command: &ToolCommand) -> io::Result<CommandOutput>;
}

/// Runs commands on the host with `std::process::Command`
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl ToolRunner for SystemRunner {
    fn run(&self, command: &ToolCommand) -> io::Result<CommandOutput> {
        debug!("Running `{}` in {}", command.command_line(), command.cwd.display());

        let output = Command::new(&command.program)
            .args(&command.args)
            .current_dir(&command.cwd)
            .output()?;

        let captured = CommandOutput {
            command: command.command_line(),
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        };

        log_output(&command.program, &captured);
        Ok(captured)
    }
}

/// Log both captured streams at debug level
fn log_output(program: &str, output: &CommandOutput) {
    for (stream, text) in [("stdout", &output.stdout), ("stderr", &output.stderr)] {
        if !text.is_empty() {
            debug!("{} {}:\n{}", program, stream, text.trim_end());
        }
    }
}
