// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

/// Common argument: component name
fn component_arg() -> Arg {
    Arg::new("name").required(true).help("Component name (zlib, libevent, openssl, tor)")
}

fn build_cli() -> Command {
    Command::new("libtor-gen")
        .version(env!("CARGO_PKG_VERSION"))
        .author("libtor-gen Contributors")
        .about("Regenerate a statically wrapped Tor from upstream sources")
        .subcommand_required(false)
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Log debug output (overridden by RUST_LOG)"),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .global(true)
                .value_name("FILE")
                .default_value("libtor-gen.toml")
                .help("Generator config file"),
        )
        .subcommand(
            Command::new("generate")
                .about("Acquire, probe, prune and wrap every component (default)")
                .arg(Arg::new("output").short('o').long("output").value_name("DIR").help("Root of the generated package (default: libtor)"))
                .arg(Arg::new("assets").short('a').long("assets").value_name("DIR").help("Template asset directory"))
                .arg(
                    Arg::new("only")
                        .long("only")
                        .value_name("NAME")
                        .action(ArgAction::Append)
                        .help("Only regenerate the named component (repeatable)"),
                )
                .arg(Arg::new("nobuild").long("nobuild").action(ArgAction::SetTrue).help("Skip compiling the assembled package"))
                .arg(Arg::new("parallel").long("parallel").action(ArgAction::SetTrue).help("Run component pipelines concurrently"))
                .arg(Arg::new("locked").long("locked").action(ArgAction::SetTrue).help("Re-acquire the commits recorded in upstream.lock")),
        )
        .subcommand(Command::new("components").about("List the built-in components and their rules"))
        .subcommand(
            Command::new("units")
                .about("Extract compilation units from a captured dry-run log")
                .arg(component_arg())
                .arg(Arg::new("dry_run").long("dry-run").value_name("LOG").required(true).help("Captured dry-run output"))
                .arg(Arg::new("tree").long("tree").value_name("DIR").help("Upstream tree to check unit sources against"))
                .arg(Arg::new("arch").long("arch").value_name("ARCH").help("Only show modules compiled for this architecture")),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    let out_dir = match env::var("OUT_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(e) => {
            println!("cargo:warning=OUT_DIR not set: {}", e);
            return;
        }
    };
    let man_dir = out_dir.join("man");

    if let Err(e) = fs::create_dir_all(&man_dir) {
        println!("cargo:warning=Failed to create man directory: {}", e);
        return;
    }

    let man = Man::new(build_cli());
    let mut buffer = Vec::new();
    if let Err(e) = man.render(&mut buffer) {
        println!("cargo:warning=Failed to render man page: {}", e);
        return;
    }

    let man_path = man_dir.join("libtor-gen.1");
    if let Err(e) = fs::write(&man_path, buffer) {
        println!("cargo:warning=Failed to write man page: {}", e);
    }
}
