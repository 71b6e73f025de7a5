// src/acquire.rs

//! Repository Acquirer
//!
//! Clones an upstream repository at the revision its selector resolves to.
//! Any previous local copy is deleted first, and a failed acquisition deletes
//! whatever it managed to fetch, so later stages never see a partial tree.

use crate::component::{ComponentSpec, RevisionSelector};
use crate::error::{CommandOutput, Error, Result};
use crate::runner::{ToolCommand, ToolRunner};
use regex::Regex;
use std::cmp::Ordering;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Identity of the checked-out upstream revision
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRevision {
    /// Selector that produced this revision
    pub selector: RevisionSelector,
    /// Branch or tag that was checked out, if any
    pub reference: Option<String>,
    /// Full commit hash of HEAD
    pub commit: String,
    /// Committer date of HEAD as git prints it
    pub date: String,
}

/// An upstream source tree on disk at a resolved revision
#[derive(Debug, Clone)]
pub struct AcquiredTree {
    pub component: String,
    pub root: PathBuf,
    pub revision: ResolvedRevision,
}

/// Clones upstream repositories through a [`ToolRunner`]
pub struct Acquirer<'a> {
    runner: &'a dyn ToolRunner,
}

impl<'a> Acquirer<'a> {
    pub fn new(runner: &'a dyn ToolRunner) -> Self {
        Self { runner }
    }

    /// Fetch `spec`'s repository into `dest` at the revision `selector` picks
    pub fn acquire(
        &self,
        spec: &ComponentSpec,
        selector: &RevisionSelector,
        dest: &Path,
    ) -> Result<AcquiredTree> {
        if dest.exists() {
            debug!("Removing previous copy at {}", dest.display());
            fs::remove_dir_all(dest)?;
        }

        match self.acquire_into(spec, selector, dest) {
            Ok(tree) => Ok(tree),
            Err(e) => {
                if dest.exists() {
                    let _ = fs::remove_dir_all(dest);
                }
                Err(e)
            }
        }
    }

    fn acquire_into(
        &self,
        spec: &ComponentSpec,
        selector: &RevisionSelector,
        dest: &Path,
    ) -> Result<AcquiredTree> {
        let parent = dest.parent().unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent)?;

        info!("Cloning {} ({})", spec.source_url, selector.describe());
        let mut clone = ToolCommand::new("git", parent).arg("clone");
        if selector.shallow() {
            clone = clone.args(["--depth", "1"]);
        }
        if let RevisionSelector::Ref(name) = selector {
            clone = clone.args(["--branch", name.as_str()]);
        }
        let clone = clone
            .arg(spec.source_url.as_str())
            .arg(dest.to_string_lossy().to_string());
        self.git(spec, &clone)?;

        let reference = match selector {
            RevisionSelector::DefaultBranch => None,
            RevisionSelector::Ref(name) => Some(name.clone()),
            RevisionSelector::LatestStable { pattern } => {
                let listing = self.git(spec, &ToolCommand::new("git", dest).args(["branch", "-r"]))?;
                let branch = select_stable_branch(&listing.stdout, pattern)
                    .map_err(|e| Error::Config(format!("invalid stable branch pattern: {}", e)))?
                    .ok_or_else(|| Error::Acquisition {
                        component: spec.name.clone(),
                        message: format!("no remote branch matches {}", pattern),
                        output: Some(listing),
                    })?;

                info!("Selected stable branch {}", branch);
                self.git(spec, &ToolCommand::new("git", dest).args(["checkout", branch.as_str()]))?;
                Some(branch)
            }
            RevisionSelector::Commit(hash) => {
                self.git(
                    spec,
                    &ToolCommand::new("git", dest).args(["checkout", "--detach", hash.as_str()]),
                )?;
                None
            }
        };

        let commit = self
            .git(spec, &ToolCommand::new("git", dest).args(["rev-parse", "HEAD"]))?
            .stdout
            .trim()
            .to_string();
        let date = self
            .git(spec, &ToolCommand::new("git", dest).args(["show", "-s", "--format=%cd"]))?
            .stdout
            .trim()
            .to_string();

        if commit.is_empty() {
            return Err(Error::Acquisition {
                component: spec.name.clone(),
                message: "git rev-parse returned no commit hash".to_string(),
                output: None,
            });
        }
        if let RevisionSelector::Commit(pinned) = selector {
            if !commit.starts_with(pinned.as_str()) {
                return Err(Error::Acquisition {
                    component: spec.name.clone(),
                    message: format!("checked out {} but {} was pinned", commit, pinned),
                    output: None,
                });
            }
        }

        info!("{} at {} ({})", spec.name, commit, date);

        Ok(AcquiredTree {
            component: spec.name.clone(),
            root: dest.to_path_buf(),
            revision: ResolvedRevision {
                selector: selector.clone(),
                reference,
                commit,
                date,
            },
        })
    }

    fn git(&self, spec: &ComponentSpec, command: &ToolCommand) -> Result<CommandOutput> {
        let output = self.runner.run(command).map_err(|e| Error::Acquisition {
            component: spec.name.clone(),
            message: format!("failed to run `{}`: {}", command.command_line(), e),
            output: None,
        })?;

        if !output.success() {
            return Err(Error::Acquisition {
                component: spec.name.clone(),
                message: format!("`{}` failed", command.command_line()),
                output: Some(output),
            });
        }
        Ok(output)
    }
}

/// One run of digits or non-digits inside a version string
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum Segment {
    Number(u64),
    Text(String),
}

fn version_segments(version: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut in_digits = false;

    for ch in version.chars() {
        let is_digit = ch.is_ascii_digit();
        if !current.is_empty() && is_digit != in_digits {
            segments.push(finish_segment(&current, in_digits));
            current.clear();
        }
        in_digits = is_digit;
        current.push(ch);
    }
    if !current.is_empty() {
        segments.push(finish_segment(&current, in_digits));
    }
    segments
}

fn finish_segment(text: &str, digits: bool) -> Segment {
    if digits {
        // Overlong digit runs fall back to text comparison
        text.parse()
            .map(Segment::Number)
            .unwrap_or_else(|_| Segment::Text(text.to_string()))
    } else {
        Segment::Text(text.to_string())
    }
}

/// Compare two version strings numerically where they contain digits
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    version_segments(a)
        .cmp(&version_segments(b))
        .then_with(|| a.cmp(b))
}

/// Pick the version-max branch name matching `pattern` from `git branch -r`
///
/// The pattern must match the whole branch name (without the remote
/// prefix). When it has a capture group, versions are compared on the
/// captured text; otherwise on the whole name.
pub fn select_stable_branch(
    listing: &str,
    pattern: &str,
) -> std::result::Result<Option<String>, regex::Error> {
    let re = Regex::new(&format!("^(?:{})$", pattern))?;

    let best = listing
        .lines()
        .map(str::trim)
        .filter(|line| !line.contains("->"))
        .map(|line| line.split_once('/').map_or(line, |(_, branch)| branch))
        .filter_map(|branch| {
            re.captures(branch).map(|caps| {
                let key = caps
                    .get(1)
                    .map_or(branch, |m| m.as_str())
                    .to_string();
                (key, branch.to_string())
            })
        })
        .max_by(|(ka, _), (kb, _)| compare_versions(ka, kb))
        .map(|(_, branch)| branch);

    Ok(best)
}
