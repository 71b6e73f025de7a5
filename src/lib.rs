// src/lib.rs

//! libtor-gen
//!
//! Regenerates a self-contained, statically wrapped Tor from unmodified
//! upstream sources of zlib, libevent, OpenSSL and Tor.
//!
//! # Architecture
//!
//! - Ground truth from upstream: compilation units come from each project's
//!   own configure + dry-run build, never from a hand-maintained list
//! - Untouched sources: every wrapper module just includes one upstream `.c`
//! - Declarative components: per-library rules live in [`ComponentSpec`]
//! - Externalized text: stubs, preambles and config headers are template
//!   assets with strict `{{placeholder}}` substitution
//! - All-or-nothing: output is staged and only committed when every
//!   component succeeded

pub mod acquire;
pub mod arch;
pub mod component;
pub mod config;
mod error;
pub mod extract;
pub mod headers;
pub mod lockfile;
pub mod package;
pub mod pipeline;
pub mod probe;
pub mod prune;
pub mod runner;
pub mod synth;
pub mod template;
pub mod verify;

pub use acquire::{AcquiredTree, Acquirer, ResolvedRevision};
pub use arch::{Arch, WordSize};
pub use component::{ComponentSpec, DryRunGrammar, RevisionSelector};
pub use config::{DEFAULT_CONFIG_FILE, DEFAULT_OUTPUT_DIR, GeneratorConfig, RevisionPolicy};
pub use error::{CommandOutput, Error, Result};
pub use extract::{CompilationUnit, SourceSet, UnitVariant, VersionMetadata};
pub use lockfile::{LOCK_FILE, UpstreamLock};
pub use pipeline::{ComponentReport, GenerateOptions, GenerateReport, Generator};
pub use runner::{SystemRunner, ToolCommand, ToolRunner};
pub use synth::WrapperModule;
pub use template::{AssetStore, Template, TemplateError};
