// src/probe.rs

//! Build-System Prober
//!
//! Runs the upstream's own configuration steps and then its build tool in
//! dry-run mode. The dry-run transcript is the only source of truth for which
//! files a native build would compile on this configuration.

use crate::acquire::AcquiredTree;
use crate::component::{ComponentSpec, ToolStep};
use crate::error::{CommandOutput, Error, Result};
use crate::runner::{ToolCommand, ToolRunner};
use tracing::{debug, info};

/// Captured dry-run transcript, stdout and stderr combined
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DryRunOutput {
    pub transcript: String,
}

pub struct Prober<'a> {
    runner: &'a dyn ToolRunner,
}

impl<'a> Prober<'a> {
    pub fn new(runner: &'a dyn ToolRunner) -> Self {
        Self { runner }
    }

    /// Configure the tree and capture the dry-run transcript
    ///
    /// Components without a dry-run step yield `None`.
    pub fn probe(&self, spec: &ComponentSpec, tree: &AcquiredTree) -> Result<Option<DryRunOutput>> {
        for step in &spec.configure {
            info!("Configuring {}: {}", spec.name, step);
            let output = self.run_step(tree, step).map_err(|e| Error::Configuration {
                component: spec.name.clone(),
                message: format!("failed to run `{}`: {}", step, e),
                output: None,
            })?;
            if !output.success() {
                return Err(Error::Configuration {
                    component: spec.name.clone(),
                    message: format!("`{}` failed", step),
                    output: Some(output),
                });
            }
        }

        let Some(dry_run) = &spec.dry_run else {
            debug!("{} has no dry-run step", spec.name);
            return Ok(None);
        };

        info!("Hooking {} build: {}", spec.name, dry_run);
        let output = self.run_step(tree, dry_run).map_err(|e| Error::Discovery {
            component: spec.name.clone(),
            message: format!("failed to run `{}`: {}", dry_run, e),
            output: None,
        })?;
        if !output.success() {
            return Err(Error::Discovery {
                component: spec.name.clone(),
                message: format!("`{}` failed", dry_run),
                output: Some(output),
            });
        }

        let mut transcript = output.stdout;
        if !output.stderr.is_empty() {
            transcript.push('\n');
            transcript.push_str(&output.stderr);
        }
        debug!("{} dry-run produced {} bytes", spec.name, transcript.len());

        Ok(Some(DryRunOutput { transcript }))
    }

    fn run_step(&self, tree: &AcquiredTree, step: &ToolStep) -> std::io::Result<CommandOutput> {
        let command = ToolCommand::new(step.program.as_str(), &tree.root).args(step.args.iter().cloned());
        self.runner.run(&command)
    }
}
