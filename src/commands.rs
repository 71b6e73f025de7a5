// src/commands.rs
//! Command handlers for the libtor-gen CLI

use crate::cli::GenerateArgs;
use anyhow::{Context, Result};
use libtor_gen::component::{self, ComponentSpec};
use libtor_gen::extract::units_from_transcript;
use libtor_gen::synth::module_name;
use libtor_gen::{Arch, GenerateOptions, Generator, GeneratorConfig, SystemRunner};
use std::fs;
use std::path::Path;
use tracing::info;

/// Regenerate the wrapped package
pub fn cmd_generate(config_path: &Path, args: GenerateArgs) -> Result<()> {
    let mut config = GeneratorConfig::load(config_path)
        .with_context(|| format!("Failed to load config {}", config_path.display()))?;

    if let Some(output) = args.output {
        config.output_dir = output;
    }
    if let Some(assets) = args.assets {
        config.assets_dir = assets;
    }
    if args.nobuild {
        config.verify = false;
    }
    if args.parallel {
        config.parallel = true;
    }
    info!(
        "Generating into {} (policy: {})",
        config.output_dir.display(),
        config.revision_policy
    );

    let runner = SystemRunner;
    let generator = Generator::new(config, &runner);
    let options = GenerateOptions {
        only: args.only,
        locked: args.locked,
    };
    let report = generator.generate(&options).map_err(|e| {
        let stage = e.stage();
        anyhow::Error::new(e).context(format!("Regeneration failed at the {} stage", stage))
    })?;

    println!("Regenerated {}:", report.output_dir.display());
    for c in &report.components {
        println!(
            "  {:<9} {:<16} {}  {} units ({} excluded), {} modules, {} headers",
            c.name,
            c.metadata.version,
            short_commit(&c.revision.commit),
            c.units,
            c.excluded,
            c.modules,
            c.headers
        );
    }
    if !report.verified {
        println!("Package was not compiled (--nobuild)");
    }
    Ok(())
}

/// Print every built-in component's rules
pub fn cmd_components() -> Result<()> {
    for spec in component::builtin_components() {
        print_component(&spec);
    }
    Ok(())
}

fn print_component(spec: &ComponentSpec) {
    println!("{}", spec.name);
    println!("  source:   {}", spec.source_url);
    println!("  revision: {}", spec.revision.describe());
    println!("  grammar:  {}", spec.grammar.name());
    for step in &spec.configure {
        println!("  configure: {}", step);
    }
    if let Some(dry_run) = &spec.dry_run {
        println!("  dry-run:  {}", dry_run);
    }
    for rule in &spec.exclusions {
        println!("  exclude:  {}", rule);
    }
    for variant in &spec.arch_variants {
        println!("  variant:  {}", variant.unit);
        for arch in Arch::ALL {
            println!("    {:<8} -> {}", arch.name(), variant.source_for(arch));
        }
    }
    println!();
}

/// Run the extractor over a captured dry-run log
pub fn cmd_units(name: &str, dry_run: &Path, tree: Option<&Path>, arch: Option<&str>) -> Result<()> {
    let spec = component::find_builtin(name)
        .with_context(|| format!("Unknown component: {}", name))?;
    let arch = match arch {
        Some(a) => Some(Arch::parse(a).with_context(|| format!("Unknown architecture: {}", a))?),
        None => None,
    };
    let transcript = fs::read_to_string(dry_run)
        .with_context(|| format!("Failed to read {}", dry_run.display()))?;

    let set = units_from_transcript(&spec, &transcript, tree)?;
    for variant in &set.variants {
        if arch.is_some() && variant.arch.is_some() && variant.arch != arch {
            continue;
        }
        println!(
            "{}\t{}",
            module_name(&spec.name, variant.unit.stem(), variant.arch),
            variant.source
        );
    }
    for (path, rule) in &set.excluded {
        println!("# excluded {} ({})", path, rule);
    }
    info!(
        "{}: {} units, {} variants, {} excluded",
        spec.name,
        set.units.len(),
        set.variants.len(),
        set.excluded.len()
    );
    Ok(())
}

fn short_commit(commit: &str) -> &str {
    commit.get(..12).unwrap_or(commit)
}
