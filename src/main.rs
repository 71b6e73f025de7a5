// src/main.rs

use anyhow::Result;
use clap::Parser;

mod cli;
mod commands;

use cli::{Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Some(Commands::Generate(args)) => commands::cmd_generate(&cli.config, args),
        Some(Commands::Components) => commands::cmd_components(),
        Some(Commands::Units {
            name,
            dry_run,
            tree,
            arch,
        }) => commands::cmd_units(&name, &dry_run, tree.as_deref(), arch.as_deref()),
        None => commands::cmd_generate(&cli.config, cli::GenerateArgs::default()),
    }
}
