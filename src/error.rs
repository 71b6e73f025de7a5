// src/error.rs

//! Error types for the wrapper generator
//!
//! Every failure is fatal for the run. Variants follow the pipeline stage
//! that produced them so the operator can tell upstream tooling problems
//! (bad clone, broken configure, odd dry-run output) apart from problems in
//! the generator's own templates or output directory.

use std::fmt;
use thiserror::Error;

/// Result type used throughout the generator
pub type Result<T> = std::result::Result<T, Error>;

/// Captured result of an external command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Command line as it was executed
    pub command: String,
    /// Exit code, `None` if the process was killed by a signal
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// Whether the command exited with status zero
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }
}

impl fmt::Display for CommandOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(code) => writeln!(f, "$ {} (exit status {})", self.command, code)?,
            None => writeln!(f, "$ {} (terminated by signal)", self.command)?,
        }
        if !self.stdout.is_empty() {
            writeln!(f, "--- stdout ---")?;
            writeln!(f, "{}", self.stdout.trim_end())?;
        }
        if !self.stderr.is_empty() {
            writeln!(f, "--- stderr ---")?;
            writeln!(f, "{}", self.stderr.trim_end())?;
        }
        Ok(())
    }
}

/// Appends captured command output below the generator's own message
fn with_output(output: &Option<CommandOutput>) -> String {
    match output {
        Some(out) => format!("\n{}", out),
        None => String::new(),
    }
}

/// Errors produced while regenerating the wrapped package
#[derive(Debug, Error)]
pub enum Error {
    /// Clone, checkout or stable-branch selection failed
    #[error("{component}: acquisition failed: {message}{}", with_output(.output))]
    Acquisition {
        component: String,
        message: String,
        output: Option<CommandOutput>,
    },

    /// Upstream autogen/configure step failed
    #[error("{component}: configuration failed: {message}{}", with_output(.output))]
    Configuration {
        component: String,
        message: String,
        output: Option<CommandOutput>,
    },

    /// Dry-run invocation failed or produced no usable compilation units
    #[error("{component}: discovery failed: {message}{}", with_output(.output))]
    Discovery {
        component: String,
        message: String,
        output: Option<CommandOutput>,
    },

    /// Pruning removed something a generated module still needs
    #[error("{component}: pruning failed: {message}")]
    Prune { component: String, message: String },

    /// Template placeholder missing or unresolved, or a module name collision
    #[error("{component}: rendering failed: {message}")]
    Rendering { component: String, message: String },

    /// The assembled package did not compile
    #[error("verification failed: {message}{}", with_output(.output))]
    Verification {
        message: String,
        output: Option<CommandOutput>,
    },

    /// Invalid generator configuration
    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl Error {
    /// Name of the pipeline stage that failed
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Acquisition { .. } => "acquire",
            Self::Configuration { .. } => "configure",
            Self::Discovery { .. } => "discover",
            Self::Prune { .. } => "prune",
            Self::Rendering { .. } => "render",
            Self::Verification { .. } => "verify",
            Self::Config(_) => "config",
            Self::Io(_) | Self::TomlParse(_) | Self::TomlSerialize(_) => "io",
        }
    }

    /// Component the failure belongs to, if it is component-specific
    pub fn component(&self) -> Option<&str> {
        match self {
            Self::Acquisition { component, .. }
            | Self::Configuration { component, .. }
            | Self::Discovery { component, .. }
            | Self::Prune { component, .. }
            | Self::Rendering { component, .. } => Some(component),
            _ => None,
        }
    }

    pub(crate) fn rendering(component: &str, message: impl Into<String>) -> Self {
        Self::Rendering {
            component: component.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn discovery(component: &str, message: impl Into<String>) -> Self {
        Self::Discovery {
            component: component.to_string(),
            message: message.into(),
            output: None,
        }
    }
}
