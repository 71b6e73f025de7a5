// src/verify.rs

//! Build Verifier
//!
//! Compiles the fully assembled package with the target toolchain. This is
//! the only stage that runs the target toolchain; everything before it runs
//! upstream tooling only.

use crate::error::{Error, Result};
use crate::runner::{ToolCommand, ToolRunner};
use std::path::Path;
use tracing::info;

/// Command used when the configuration does not name one
pub const DEFAULT_VERIFY_COMMAND: &[&str] = &["cargo", "build"];

/// Run `command` inside `package_root`; any failure is surfaced verbatim
pub fn verify_package(runner: &dyn ToolRunner, package_root: &Path, command: &[String]) -> Result<()> {
    let Some((program, args)) = command.split_first() else {
        return Err(Error::Config("verify_command is empty".to_string()));
    };

    let cmd = ToolCommand::new(program.as_str(), package_root).args(args.iter().map(String::as_str));
    info!("Verifying package: {}", cmd.command_line());

    let output = runner.run(&cmd).map_err(|e| Error::Verification {
        message: format!("failed to run `{}`: {}", cmd.command_line(), e),
        output: None,
    })?;
    if !output.success() {
        return Err(Error::Verification {
            message: "the assembled package does not compile".to_string(),
            output: Some(output),
        });
    }

    info!("Package compiled cleanly");
    Ok(())
}
