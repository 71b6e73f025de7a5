// src/extract/version.rs

//! Release metadata extraction
//!
//! Version strings come from a handful of known upstream files rather than
//! from the dry-run transcript, so they are read directly from the tree.

use crate::acquire::AcquiredTree;
use crate::component::{ComponentSpec, Placeholder, VersionRule};
use crate::error::{Error, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;

/// Values substituted into config header templates
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionMetadata {
    /// Release string, e.g. `1.2.11` or `0.3.5.8-rc-dev`
    pub version: String,
    /// Packed numeric version, e.g. `0x02020000`, where upstream defines one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub numeric_version: Option<String>,
    /// Committer date of the acquired revision
    pub build_date: String,
}

impl VersionMetadata {
    /// Value for a placeholder, if this component has one
    pub fn value(&self, placeholder: Placeholder) -> Option<&str> {
        match placeholder {
            Placeholder::Version => Some(&self.version),
            Placeholder::NumericVersion => self.numeric_version.as_deref(),
            Placeholder::BuildDate => Some(&self.build_date),
        }
    }
}

/// Read the release metadata `spec` declares from an acquired tree
pub fn extract_metadata(spec: &ComponentSpec, tree: &AcquiredTree) -> Result<VersionMetadata> {
    let (version, numeric_version) = match &spec.version_rule {
        VersionRule::Define { file, name } => {
            let content = read_upstream(spec, tree, file)?;
            let version = find_define(&content, name).ok_or_else(|| {
                Error::discovery(&spec.name, format!("#define {} not found in {}", name, file))
            })?;
            (version, None)
        }
        VersionRule::Autoconf { file, package } => {
            let content = read_upstream(spec, tree, file)?;
            let version = find_ac_init(&content, package).ok_or_else(|| {
                Error::discovery(&spec.name, format!("AC_INIT({}, ...) not found in {}", package, file))
            })?;
            let numeric = find_numeric_version(&content).ok_or_else(|| {
                Error::discovery(&spec.name, format!("NUMERIC_VERSION not defined in {}", file))
            })?;
            (version, Some(numeric))
        }
        VersionRule::BranchName { prefix } => {
            let branch = tree.revision.reference.as_deref().ok_or_else(|| {
                Error::discovery(&spec.name, "version comes from the branch name but no branch was selected")
            })?;
            (version_from_branch(branch, prefix), None)
        }
    };

    Ok(VersionMetadata {
        version,
        numeric_version,
        build_date: tree.revision.date.clone(),
    })
}

fn read_upstream(spec: &ComponentSpec, tree: &AcquiredTree, file: &str) -> Result<String> {
    fs::read_to_string(tree.root.join(file)).map_err(|e| {
        Error::discovery(&spec.name, format!("cannot read version source {}: {}", file, e))
    })
}

/// `#define NAME "value"`
pub fn find_define(content: &str, name: &str) -> Option<String> {
    let re = Regex::new(&format!(r#"#\s*define\s+{}\s+"([^"]+)""#, regex::escape(name))).ok()?;
    re.captures(content).map(|c| c[1].to_string())
}

/// `AC_INIT(package,version)`, with or without autoconf quoting
pub fn find_ac_init(content: &str, package: &str) -> Option<String> {
    let re = Regex::new(&format!(
        r"AC_INIT\(\s*\[?{}\]?\s*,\s*\[?([^\],)\s]+)",
        regex::escape(package)
    ))
    .ok()?;
    re.captures(content).map(|c| c[1].to_string())
}

/// `AC_DEFINE(NUMERIC_VERSION, 0x........,`
pub fn find_numeric_version(content: &str) -> Option<String> {
    let re = Regex::new(r"AC_DEFINE\(\s*NUMERIC_VERSION\s*,\s*(0x[0-9a-fA-F]{8})\s*,").ok()?;
    re.captures(content).map(|c| c[1].to_string())
}

/// `OpenSSL_1_1_1-stable` with prefix `OpenSSL_` becomes `1.1.1-stable`
pub fn version_from_branch(branch: &str, prefix: &str) -> String {
    branch
        .strip_prefix(prefix)
        .unwrap_or(branch)
        .replace('_', ".")
}
