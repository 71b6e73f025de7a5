// src/extract/mod.rs

//! Source Set Extractor
//!
//! Turns a dry-run transcript into the normalized list of compilation units
//! a component contributes, then fans architecture-tuned units out into one
//! variant per architecture class.
//!
//! Each upstream build-system family has its own output grammar (see
//! [`DryRunGrammar`]). A transcript that yields no units is an error, never
//! an empty wrapper set.

pub mod version;

pub use version::{VersionMetadata, extract_metadata};

use crate::arch::Arch;
use crate::component::{ComponentSpec, DryRunGrammar, SOURCE_SUFFIX};
use crate::error::{Error, Result};
use crate::probe::DryRunOutput;
use regex::Regex;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Component, Path};
use std::sync::LazyLock;
use tracing::{debug, info};

/// `echo "  CC      " buffer.lo;` as printed by automake silent rules
static LIBTOOL_OBJECT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s([A-Za-z0-9_/+-]+)\.lo;").expect("valid libtool pattern"));

/// A compiler invocation line whose last argument is the source file
static COMPILE_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)([A-Za-z0-9_/+.-]+)\.c[ \t\r]*$").expect("valid compile pattern"));

/// One upstream `.c` file that the native build compiles
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CompilationUnit {
    /// Path relative to the tree root, including the `.c` suffix
    pub path: String,
}

impl CompilationUnit {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    /// Path without the source suffix
    pub fn stem(&self) -> &str {
        self.path.strip_suffix(SOURCE_SUFFIX).unwrap_or(&self.path)
    }
}

/// A unit as compiled for one architecture class (or for all of them)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct UnitVariant {
    /// Logical unit the wrapper module is named after
    pub unit: CompilationUnit,
    /// Source file the module includes
    pub source: String,
    /// Architecture the module is restricted to, `None` for all
    pub arch: Option<Arch>,
}

/// Result of extraction for one component
#[derive(Debug, Clone, Default)]
pub struct SourceSet {
    pub component: String,
    /// Retained units, sorted
    pub units: Vec<CompilationUnit>,
    /// Retained variants, sorted; one per unit or one per arch for tuned units
    pub variants: Vec<UnitVariant>,
    /// Units dropped by exclusion rules, with the rule that matched
    pub excluded: Vec<(String, String)>,
}

/// Recover unit paths from a transcript in the given grammar
///
/// Paths are normalized (no leading `./`), deduplicated and sorted.
/// [`DryRunGrammar::SourceListing`] has no transcript and yields nothing.
pub fn parse_dry_run(grammar: DryRunGrammar, transcript: &str) -> Vec<String> {
    let found: BTreeSet<String> = match grammar {
        DryRunGrammar::SourceListing => BTreeSet::new(),
        DryRunGrammar::LibtoolObjects => LIBTOOL_OBJECT
            .captures_iter(transcript)
            .map(|c| format!("{}{}", normalize(&c[1]), SOURCE_SUFFIX))
            .collect(),
        DryRunGrammar::CompileLines => COMPILE_LINE
            .captures_iter(transcript)
            .map(|c| format!("{}{}", normalize(&c[1]), SOURCE_SUFFIX))
            .collect(),
    };
    found.into_iter().collect()
}

fn normalize(path: &str) -> &str {
    let mut path = path;
    while let Some(rest) = path.strip_prefix("./") {
        path = rest;
    }
    path
}

/// Every `.c` file directly in the tree root
pub fn list_root_sources(root: &Path) -> std::io::Result<Vec<String>> {
    let mut sources = Vec::new();
    for entry in fs::read_dir(root)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        if name.ends_with(SOURCE_SUFFIX) {
            sources.push(name);
        }
    }
    sources.sort();
    Ok(sources)
}

/// Build the filtered, variant-expanded source set for a component
///
/// `tree_root` is the acquired (not yet pruned) tree; every retained unit
/// and every variant source must exist in it.
pub fn extract_units(
    spec: &ComponentSpec,
    tree_root: &Path,
    dry_run: Option<&DryRunOutput>,
) -> Result<SourceSet> {
    let discovered = match (spec.grammar, dry_run) {
        (DryRunGrammar::SourceListing, _) => list_root_sources(tree_root)?,
        (grammar, Some(output)) => parse_dry_run(grammar, &output.transcript),
        (grammar, None) => {
            return Err(Error::discovery(
                &spec.name,
                format!("{} grammar needs a dry-run transcript", grammar.name()),
            ));
        }
    };
    select_units(spec, discovered, Some(tree_root))
}

/// Extract units from a captured transcript without running the pipeline
///
/// With no `tree_root`, source existence is not checked. Components whose
/// units come from a source listing need the tree.
pub fn units_from_transcript(
    spec: &ComponentSpec,
    transcript: &str,
    tree_root: Option<&Path>,
) -> Result<SourceSet> {
    let discovered = match (spec.grammar, tree_root) {
        (DryRunGrammar::SourceListing, Some(root)) => list_root_sources(root)?,
        (DryRunGrammar::SourceListing, None) => {
            return Err(Error::Config(format!(
                "{} units come from a source listing; pass the upstream tree",
                spec.name
            )));
        }
        (grammar, _) => parse_dry_run(grammar, transcript),
    };
    select_units(spec, discovered, tree_root)
}

fn select_units(
    spec: &ComponentSpec,
    discovered: Vec<String>,
    tree_root: Option<&Path>,
) -> Result<SourceSet> {
    if discovered.is_empty() {
        return Err(Error::Discovery {
            component: spec.name.clone(),
            message: format!("no compilation units found ({} grammar)", spec.grammar.name()),
            output: None,
        });
    }
    debug!("{}: {} units in dry-run output", spec.name, discovered.len());

    let mut set = SourceSet {
        component: spec.name.clone(),
        ..Default::default()
    };
    let mut variants = BTreeSet::new();

    for path in discovered {
        if escapes_tree(&path) {
            return Err(Error::discovery(
                &spec.name,
                format!("{} lies outside the component tree", path),
            ));
        }
        if let Some(rule) = spec.is_excluded(&path) {
            debug!("Excluding {} ({})", path, rule);
            set.excluded.push((path, rule.to_string()));
            continue;
        }

        if let Some(rule) = spec.variant_for(&path) {
            if let Some(root) = tree_root {
                for source in [&rule.tuned, &rule.fallback] {
                    require_source(spec, root, source)?;
                }
            }
            let unit = CompilationUnit::new(rule.unit.clone());
            for arch in Arch::ALL {
                variants.insert(UnitVariant {
                    unit: unit.clone(),
                    source: rule.source_for(arch).to_string(),
                    arch: Some(arch),
                });
            }
            if !set.units.contains(&unit) {
                set.units.push(unit);
            }
            continue;
        }

        if let Some(root) = tree_root {
            require_source(spec, root, &path)?;
        }
        let unit = CompilationUnit::new(path.clone());
        variants.insert(UnitVariant {
            unit: unit.clone(),
            source: path,
            arch: None,
        });
        set.units.push(unit);
    }

    if set.units.is_empty() {
        return Err(Error::discovery(
            &spec.name,
            format!("all {} discovered units were excluded", set.excluded.len()),
        ));
    }

    set.units.sort();
    set.variants = variants.into_iter().collect();
    info!(
        "{}: {} units retained, {} excluded, {} variants",
        spec.name,
        set.units.len(),
        set.excluded.len(),
        set.variants.len()
    );
    Ok(set)
}

/// Whether a unit path is absolute or climbs out of the tree
fn escapes_tree(path: &str) -> bool {
    Path::new(path)
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
}

fn require_source(spec: &ComponentSpec, tree_root: &Path, path: &str) -> Result<()> {
    if tree_root.join(path).is_file() {
        Ok(())
    } else {
        Err(Error::discovery(
            &spec.name,
            format!("{} is listed by the build but missing from the tree", path),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component;

    fn touch(root: &Path, path: &str) {
        let full = root.join(path);
        fs::create_dir_all(full.parent().unwrap()).unwrap();
        fs::write(full, "/* upstream */\n").unwrap();
    }

    #[test]
    fn test_parse_libtool_objects() {
        let transcript = "echo \"  CC      \" buffer.lo;depbase=`echo buffer.lo | sed 's|[^/]*$|.deps/&|;s|\\.lo$||'`;\\\n\
            echo \"  CC      \" event.lo;depbase=`echo event.lo | sed`;\\\n\
            echo \"  CCLD    \" libevent.la;\n";
        assert_eq!(
            parse_dry_run(DryRunGrammar::LibtoolObjects, transcript),
            vec!["buffer.c", "event.c"]
        );
    }

    #[test]
    fn test_parse_compile_lines() {
        let transcript = "gcc -I. -Iinclude -c -o crypto/aes/aes_cbc.o crypto/aes/aes_cbc.c\n\
            gcc -c -o ssl/s3_lib.o ./ssl/s3_lib.c\r\n\
            ar r libcrypto.a crypto/aes/aes_cbc.o\n\
            gcc -c -o crypto/aes/aes_cbc.o crypto/aes/aes_cbc.c\n";
        assert_eq!(
            parse_dry_run(DryRunGrammar::CompileLines, transcript),
            vec!["crypto/aes/aes_cbc.c", "ssl/s3_lib.c"]
        );
    }

    #[test]
    fn test_list_root_sources_skips_nested() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "adler32.c");
        touch(dir.path(), "zlib.h");
        touch(dir.path(), "contrib/minizip/zip.c");
        assert_eq!(list_root_sources(dir.path()).unwrap(), vec!["adler32.c"]);
    }

    #[test]
    fn test_empty_transcript_is_discovery_error() {
        let dir = tempfile::tempdir().unwrap();
        let out = DryRunOutput {
            transcript: "make: Nothing to be done for 'all'.\n".to_string(),
        };
        let err = extract_units(&component::openssl(), dir.path(), Some(&out)).unwrap_err();
        assert_eq!(err.stage(), "discover");
        assert!(err.to_string().contains("no compilation units"));
    }

    #[test]
    fn test_missing_source_is_discovery_error() {
        let dir = tempfile::tempdir().unwrap();
        let out = DryRunOutput {
            transcript: "gcc -c -o ssl/ghost.o ssl/ghost.c\n".to_string(),
        };
        let err = extract_units(&component::openssl(), dir.path(), Some(&out)).unwrap_err();
        assert!(err.to_string().contains("ssl/ghost.c"));
    }

    #[test]
    fn test_unit_outside_tree_is_discovery_error() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "ssl/ssl_lib.c");
        let out = DryRunOutput {
            transcript: "gcc -c -o ssl/ssl_lib.o ssl/ssl_lib.c\n\
                gcc -c -o x.o ../x.c\n\
                gcc -c -o y.o crypto/../../y.c\n"
                .to_string(),
        };
        let err = extract_units(&component::openssl(), dir.path(), Some(&out)).unwrap_err();
        assert_eq!(err.stage(), "discover");
        assert!(err.to_string().contains("outside the component tree"));

        // Offline extraction applies the same rule
        let err = units_from_transcript(&component::tor(), "cc -c -o z.o src/../../z.c\n", None)
            .unwrap_err();
        assert!(err.to_string().contains("src/../../z.c"));
    }

    #[test]
    fn test_tuned_unit_fans_out_per_arch() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "src/ext/curve25519_donna/curve25519-donna-c64.c");
        touch(dir.path(), "src/ext/curve25519_donna/curve25519-donna.c");
        touch(dir.path(), "src/core/or/relay.c");
        let out = DryRunOutput {
            transcript: "gcc -c -o a.o src/ext/curve25519_donna/curve25519-donna-c64.c\n\
                gcc -c -o b.o src/core/or/relay.c\n"
                .to_string(),
        };

        let set = extract_units(&component::tor(), dir.path(), Some(&out)).unwrap();
        assert_eq!(set.units.len(), 2);

        let donna: Vec<_> = set.variants.iter().filter(|v| v.arch.is_some()).collect();
        assert_eq!(donna.len(), Arch::ALL.len());
        for variant in donna {
            assert_eq!(variant.unit.path, "src/ext/curve25519_donna/curve25519-donna-c64.c");
            let tuned = variant.source.ends_with("-c64.c");
            assert_eq!(
                tuned,
                matches!(variant.arch, Some(Arch::X86_64) | Some(Arch::Aarch64))
            );
        }
    }

    #[test]
    fn test_fallback_listing_selects_same_rule() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "src/ext/curve25519_donna/curve25519-donna-c64.c");
        touch(dir.path(), "src/ext/curve25519_donna/curve25519-donna.c");
        let out = DryRunOutput {
            transcript: "gcc -c -o a.o src/ext/curve25519_donna/curve25519-donna.c\n".to_string(),
        };

        let set = extract_units(&component::tor(), dir.path(), Some(&out)).unwrap();
        assert_eq!(set.units, vec![CompilationUnit::new("src/ext/curve25519_donna/curve25519-donna-c64.c")]);
        assert_eq!(set.variants.len(), Arch::ALL.len());
    }

    #[test]
    fn test_renamed_variant_source_is_caught() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "src/ext/curve25519_donna/curve25519-donna-c64.c");
        let out = DryRunOutput {
            transcript: "gcc -c -o a.o src/ext/curve25519_donna/curve25519-donna-c64.c\n".to_string(),
        };
        let err = extract_units(&component::tor(), dir.path(), Some(&out)).unwrap_err();
        assert!(err.to_string().contains("curve25519-donna.c"));
    }

    #[test]
    fn test_units_from_transcript_without_tree() {
        let transcript = "gcc -c -o a.o src/core/or/relay.c\n\
            gcc -c -o b.o src/app/main/tor_main.c\n\
            gcc -c -o c.o src/test/test_util.c\n";
        let set = units_from_transcript(&component::tor(), transcript, None).unwrap();
        assert_eq!(set.units, vec![CompilationUnit::new("src/core/or/relay.c")]);
        assert_eq!(set.excluded.len(), 2);
    }

    #[test]
    fn test_source_listing_needs_tree() {
        let err = units_from_transcript(&component::zlib(), "", None).unwrap_err();
        assert_eq!(err.stage(), "config");
    }
}
