// src/prune.rs

//! Tree Pruner
//!
//! Strips an acquired upstream tree down to the headers and sources the
//! wrapper modules compile, plus the license. Build machinery, docs, tests
//! and VCS metadata all go. This operates on the disposable staging copy.

use crate::component::{ComponentSpec, RetentionRule};
use crate::error::{Error, Result};
use crate::extract::UnitVariant;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

/// What pruning did to a tree
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PruneReport {
    pub removed_files: usize,
    pub removed_dirs: usize,
    /// License files that survived
    pub licenses: Vec<String>,
    /// Files that received a source patch
    pub patched: Vec<String>,
}

/// Prune `root` according to `spec.retention`, then apply `spec.patches`
pub fn prune_tree(spec: &ComponentSpec, root: &Path) -> Result<PruneReport> {
    let rule = &spec.retention;
    let mut report = PruneReport::default();

    // Tree root: allow-listed directories, root sources, license
    for entry in sorted_entries(root)? {
        let name = file_name(&entry);
        if entry.is_dir() {
            if rule.keep_dirs.contains(&name) {
                continue;
            }
            remove_dir(&entry, &mut report)?;
        } else if rule.is_license(&name) {
            report.licenses.push(name);
        } else if !(rule.keep_root_sources && rule.is_source_file(&name)) {
            remove_file(&entry, &mut report)?;
        }
    }

    // Narrower allow-lists inside kept directories drop loose files too
    for nested in &rule.nested {
        let parent = root.join(&nested.parent);
        if !parent.is_dir() {
            continue;
        }
        for entry in sorted_entries(&parent)? {
            if entry.is_dir() && nested.keep.contains(&file_name(&entry)) {
                continue;
            }
            if entry.is_dir() {
                remove_dir(&entry, &mut report)?;
            } else {
                remove_file(&entry, &mut report)?;
            }
        }
    }

    for dir in &rule.keep_dirs {
        let kept = root.join(dir);
        if kept.is_dir() {
            prune_inside(rule, &kept, &mut report)?;
        }
    }

    for patch in &spec.patches {
        let path = root.join(&patch.file);
        let content = fs::read_to_string(&path).map_err(|e| Error::Prune {
            component: spec.name.clone(),
            message: format!("cannot read {} for patching: {}", patch.file, e),
        })?;
        if !content.contains(&patch.from) {
            return Err(Error::Prune {
                component: spec.name.clone(),
                message: format!("{} no longer contains `{}`", patch.file, patch.from),
            });
        }
        fs::write(&path, content.replace(&patch.from, &patch.to))?;
        debug!("Patched {}: {} -> {}", patch.file, patch.from, patch.to);
        report.patched.push(patch.file.clone());
    }

    info!(
        "{}: pruned {} files and {} directories",
        spec.name, report.removed_files, report.removed_dirs
    );
    Ok(report)
}

/// Within a retained directory, drop stripped dirs and non-source files
fn prune_inside(rule: &RetentionRule, dir: &Path, report: &mut PruneReport) -> Result<()> {
    let mut doomed_dirs = Vec::new();
    let mut doomed_files = Vec::new();

    let walker = WalkDir::new(dir).sort_by_file_name().into_iter();
    for entry in walker.filter_entry(|e| {
        let strip = e.file_type().is_dir()
            && rule.strip_dirs.iter().any(|s| e.file_name().to_string_lossy() == s.as_str());
        if strip {
            doomed_dirs.push(e.path().to_path_buf());
        }
        !strip
    }) {
        let entry = entry.map_err(|e| std::io::Error::other(e.to_string()))?;
        if entry.file_type().is_file() && !rule.is_source_file(&entry.file_name().to_string_lossy()) {
            doomed_files.push(entry.path().to_path_buf());
        }
    }

    for path in doomed_dirs {
        remove_dir(&path, report)?;
    }
    for path in doomed_files {
        remove_file(&path, report)?;
    }
    Ok(())
}

/// Confirm pruning kept everything the generated modules reference
///
/// `package_root` is the generated package directory containing the tree;
/// include directories in the preamble are relative to it.
pub fn check_retained(
    spec: &ComponentSpec,
    tree_root: &Path,
    package_root: &Path,
    variants: &[UnitVariant],
) -> Result<()> {
    let config_dir = spec.config_dir();
    for include in &spec.preamble.include_dirs {
        // Config directories are rendered after pruning
        if include == &config_dir || include.starts_with(&format!("{}/", config_dir)) {
            continue;
        }
        if !package_root.join(include).is_dir() {
            return Err(Error::Prune {
                component: spec.name.clone(),
                message: format!("include directory {} was removed", include),
            });
        }
    }

    for variant in variants {
        if !tree_root.join(&variant.source).is_file() {
            return Err(Error::Prune {
                component: spec.name.clone(),
                message: format!("compilation unit {} was removed", variant.source),
            });
        }
    }
    Ok(())
}

fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = fs::read_dir(dir)?
        .map(|e| e.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()?;
    entries.sort();
    Ok(entries)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

fn remove_dir(path: &Path, report: &mut PruneReport) -> Result<()> {
    fs::remove_dir_all(path)?;
    report.removed_dirs += 1;
    Ok(())
}

fn remove_file(path: &Path, report: &mut PruneReport) -> Result<()> {
    fs::remove_file(path)?;
    report.removed_files += 1;
    Ok(())
}
