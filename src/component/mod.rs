// src/component/mod.rs

//! Static description of an upstream C library
//!
//! A [`ComponentSpec`] holds every per-library rule the pipeline needs:
//! where to fetch the sources, how to configure them, how to read the
//! dry-run output, what to exclude and retain, and which templates to
//! render. The pipeline itself is identical for all components; only these
//! rules differ.

mod builtin;

pub use builtin::{builtin_components, find_builtin, zlib, libevent, openssl, tor};

use crate::arch::Arch;
use serde::{Deserialize, Serialize};

/// Suffix of a native compilation unit
pub const SOURCE_SUFFIX: &str = ".c";

/// How the upstream revision is chosen
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "kebab-case")]
pub enum RevisionSelector {
    /// Whatever the remote's default branch points at
    DefaultBranch,
    /// A fixed tag or branch name
    Ref(String),
    /// The version-max remote branch whose name fully matches `pattern`
    ///
    /// The pattern is a regular expression with one capture group holding
    /// the version part of the branch name.
    LatestStable { pattern: String },
    /// An exact commit hash, used when replaying a previous run's pins
    Commit(String),
}

impl RevisionSelector {
    /// Whether the selection can be served by a `--depth 1` clone
    pub fn shallow(&self) -> bool {
        matches!(self, Self::DefaultBranch | Self::Ref(_))
    }

    /// Human-readable description for logs and the pin file
    pub fn describe(&self) -> String {
        match self {
            Self::DefaultBranch => "default branch".to_string(),
            Self::Ref(name) => format!("ref {}", name),
            Self::LatestStable { pattern } => format!("latest stable branch matching {}", pattern),
            Self::Commit(hash) => format!("commit {}", hash),
        }
    }
}

/// Where the release version string comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionRule {
    /// `#define <name> "<version>"` in a header
    Define { file: String, name: String },
    /// `AC_INIT(<package>,<version>)` and `AC_DEFINE(NUMERIC_VERSION, 0x...,`
    Autoconf { file: String, package: String },
    /// The selected branch name with `prefix` dropped and `_` mapped to `.`
    BranchName { prefix: String },
}

/// One external command run inside the acquired tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolStep {
    pub program: String,
    pub args: Vec<String>,
}

impl ToolStep {
    pub fn new(program: &str, args: &[&str]) -> Self {
        Self {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }
}

impl std::fmt::Display for ToolStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Output grammar of the upstream build tool's dry-run mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DryRunGrammar {
    /// No build tool involved: every `.c` file at the tree root is a unit
    SourceListing,
    /// Automake silent rules announcing libtool objects (`echo "  CC  " foo.lo;`)
    LibtoolObjects,
    /// Compiler invocations whose final argument is the source file
    CompileLines,
}

impl DryRunGrammar {
    pub fn name(&self) -> &'static str {
        match self {
            Self::SourceListing => "source-listing",
            Self::LibtoolObjects => "libtool-objects",
            Self::CompileLines => "compile-lines",
        }
    }
}

/// Filter removing units the wrapped library must not contain
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExclusionRule {
    /// Unit path starts with the prefix (test suites, tools, fuzzers)
    PathPrefix(String),
    /// Unit path without `.c` ends with the suffix (executable entry points)
    StemSuffix(String),
}

impl ExclusionRule {
    pub fn matches(&self, unit_path: &str) -> bool {
        match self {
            Self::PathPrefix(prefix) => unit_path.starts_with(prefix.as_str()),
            Self::StemSuffix(suffix) => unit_path
                .strip_suffix(SOURCE_SUFFIX)
                .unwrap_or(unit_path)
                .ends_with(suffix.as_str()),
        }
    }
}

impl std::fmt::Display for ExclusionRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PathPrefix(p) => write!(f, "path prefix {}", p),
            Self::StemSuffix(s) => write!(f, "entry point *{}", s),
        }
    }
}

/// Explicit architecture routing for one performance-tuned unit
///
/// `unit` is the logical unit path (what the module is named after).
/// Architectures in `tuned_archs` compile `tuned`; every other
/// architecture compiles `fallback`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchVariantRule {
    pub unit: String,
    pub tuned: String,
    pub fallback: String,
    pub tuned_archs: Vec<Arch>,
}

impl ArchVariantRule {
    /// Source file routed to `arch`
    pub fn source_for(&self, arch: Arch) -> &str {
        if self.tuned_archs.contains(&arch) {
            &self.tuned
        } else {
            &self.fallback
        }
    }

    /// Whether a discovered unit belongs to this rule
    ///
    /// Dry-runs on 64-bit hosts list the tuned file, on 32-bit hosts the
    /// fallback, so either one selects the rule.
    pub fn claims(&self, unit_path: &str) -> bool {
        unit_path == self.tuned || unit_path == self.fallback || unit_path == self.unit
    }
}

/// Directory allow-list below a retained directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NestedRetention {
    pub parent: String,
    pub keep: Vec<String>,
}

/// What survives pruning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetentionRule {
    /// Top-level directories that are kept
    pub keep_dirs: Vec<String>,
    /// Whether loose source files at the tree root are kept
    pub keep_root_sources: bool,
    /// Narrower allow-lists inside kept directories
    pub nested: Vec<NestedRetention>,
    /// License files kept at the tree root
    pub license_files: Vec<String>,
    /// File extensions counted as sources or headers
    pub source_extensions: Vec<String>,
    /// Directory names removed wherever they appear
    pub strip_dirs: Vec<String>,
}

impl RetentionRule {
    pub fn is_source_file(&self, name: &str) -> bool {
        name.rsplit_once('.')
            .is_some_and(|(_, ext)| self.source_extensions.iter().any(|e| e == ext))
    }

    pub fn is_license(&self, name: &str) -> bool {
        self.license_files.iter().any(|l| l == name)
    }
}

/// A one-line textual fix applied to a pruned source file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourcePatch {
    pub file: String,
    pub from: String,
    pub to: String,
}

/// Component-wide compiler settings written into the preamble module
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Preamble {
    /// Include directories, relative to the generated package root
    pub include_dirs: Vec<String>,
    /// Preprocessor definitions, `None` for a bare `-DNAME`
    pub defines: Vec<(String, Option<String>)>,
    /// Extra system libraries to link
    pub link_libs: Vec<String>,
}

/// Metadata value a config header template may reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Placeholder {
    Version,
    NumericVersion,
    BuildDate,
}

impl Placeholder {
    /// Name used inside `{{...}}`
    pub fn name(&self) -> &'static str {
        match self {
            Self::Version => "version",
            Self::NumericVersion => "numeric_version",
            Self::BuildDate => "build_date",
        }
    }
}

/// One platform configuration header to render
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigHeaderSpec {
    /// Template path relative to the assets' `config/` directory
    pub template: String,
    /// Output path relative to the component's config directory
    pub target: String,
    /// Placeholders the template must contain
    pub required: Vec<Placeholder>,
}

impl ConfigHeaderSpec {
    pub fn new(template: &str, target: &str, required: &[Placeholder]) -> Self {
        Self {
            template: template.to_string(),
            target: target.to_string(),
            required: required.to_vec(),
        }
    }
}

/// Complete rule set for one upstream library
#[derive(Debug, Clone)]
pub struct ComponentSpec {
    pub name: String,
    pub source_url: String,
    pub revision: RevisionSelector,
    pub version_rule: VersionRule,
    pub retention: RetentionRule,
    /// Configuration steps, run in order inside the tree
    pub configure: Vec<ToolStep>,
    /// Dry-run build invocation, absent for [`DryRunGrammar::SourceListing`]
    pub dry_run: Option<ToolStep>,
    pub grammar: DryRunGrammar,
    pub exclusions: Vec<ExclusionRule>,
    pub arch_variants: Vec<ArchVariantRule>,
    pub patches: Vec<SourcePatch>,
    /// Stub template path relative to the assets' `templates/` directory
    pub stub_template: String,
    /// Preamble template path relative to the assets' `templates/` directory
    pub preamble_template: String,
    pub preamble: Preamble,
    pub config_headers: Vec<ConfigHeaderSpec>,
}

impl ComponentSpec {
    /// Directory holding the rendered config headers
    pub fn config_dir(&self) -> String {
        format!("{}_config", self.name)
    }

    /// Whether a discovered unit is dropped by an exclusion rule
    pub fn is_excluded(&self, unit_path: &str) -> Option<&ExclusionRule> {
        self.exclusions.iter().find(|rule| rule.matches(unit_path))
    }

    pub fn variant_for(&self, unit_path: &str) -> Option<&ArchVariantRule> {
        self.arch_variants.iter().find(|rule| rule.claims(unit_path))
    }
}
