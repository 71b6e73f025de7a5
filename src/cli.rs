// src/cli.rs
//! CLI definitions for libtor-gen
//!
//! This module contains all command-line interface definitions using clap.
//! The actual command implementations are in the `commands` module.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "libtor-gen")]
#[command(author = "libtor-gen Contributors")]
#[command(version)]
#[command(about = "Regenerate a statically wrapped Tor from upstream sources", long_about = None)]
pub struct Cli {
    /// Log debug output (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Generator config file
    #[arg(short, long, global = true, default_value = libtor_gen::DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Acquire, probe, prune and wrap every component (default)
    Generate(GenerateArgs),

    /// List the built-in components and their rules
    Components,

    /// Extract compilation units from a captured dry-run log
    Units {
        /// Component name
        name: String,

        /// Captured dry-run output
        #[arg(long = "dry-run", value_name = "LOG")]
        dry_run: PathBuf,

        /// Upstream tree to check unit sources against
        #[arg(long, value_name = "DIR")]
        tree: Option<PathBuf>,

        /// Only show modules compiled for this architecture
        #[arg(long, value_name = "ARCH")]
        arch: Option<String>,
    },
}

#[derive(Args, Default)]
pub struct GenerateArgs {
    /// Root of the generated package (default: libtor)
    #[arg(short, long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Template asset directory
    #[arg(short, long, value_name = "DIR")]
    pub assets: Option<PathBuf>,

    /// Only regenerate the named component (repeatable)
    #[arg(long, value_name = "NAME")]
    pub only: Vec<String>,

    /// Skip compiling the assembled package
    #[arg(long)]
    pub nobuild: bool,

    /// Run component pipelines concurrently
    #[arg(long)]
    pub parallel: bool,

    /// Re-acquire the commits recorded in upstream.lock
    #[arg(long)]
    pub locked: bool,
}
