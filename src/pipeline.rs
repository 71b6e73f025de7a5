// src/pipeline.rs

//! End-to-end regeneration
//!
//! Each component runs through the stages in order:
//!
//! 1. acquire the upstream tree
//! 2. configure it and capture the dry-run
//! 3. read release metadata and extract compilation units
//! 4. prune the tree
//! 5. synthesize wrapper modules and render config headers
//!
//! Components are independent and may run concurrently. Everything is built
//! in a staging directory inside the output directory; the previous output
//! is only replaced once every component succeeded and the assembled
//! package (optionally) compiled. Any failure leaves the old output as it
//! was, including a failure while swapping the staged entries in.

use crate::acquire::{Acquirer, ResolvedRevision};
use crate::component::{self, ComponentSpec, RevisionSelector};
use crate::config::{GeneratorConfig, RevisionPolicy};
use crate::error::{Error, Result};
use crate::extract::{VersionMetadata, extract_metadata, extract_units};
use crate::headers::{render_headers, write_headers};
use crate::lockfile::{LOCK_FILE, LockedComponent, UpstreamLock};
use crate::package::{GLUE_FILES, PACKAGE_NAME, render_package, write_package};
use crate::probe::Prober;
use crate::prune::{check_retained, prune_tree};
use crate::runner::ToolRunner;
use crate::synth::{synthesize, write_synthesis};
use crate::template::AssetStore;
use crate::verify::verify_package;
use rayon::prelude::*;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Prefix of the staging directory created inside the output directory
const STAGING_PREFIX: &str = ".libtor-gen-staging-";

/// Prefix of the directory holding the live entries during a commit
const BACKUP_PREFIX: &str = ".libtor-gen-backup-";

/// Manifest whose presence marks the output directory as a Cargo package
const MANIFEST: &str = "Cargo.toml";

/// Per-run options that do not belong in the config file
#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    /// Restrict the run to these components
    pub only: Vec<String>,
    /// Re-acquire the commits recorded in the existing pin file
    pub locked: bool,
}

/// Outcome of one component's pipeline
#[derive(Debug, Clone)]
pub struct ComponentReport {
    pub name: String,
    pub revision: ResolvedRevision,
    pub metadata: VersionMetadata,
    pub units: usize,
    pub excluded: usize,
    pub modules: usize,
    pub headers: usize,
    pub licenses: Vec<String>,
    pub locked: LockedComponent,
}

#[derive(Debug, Clone)]
pub struct GenerateReport {
    pub output_dir: PathBuf,
    pub components: Vec<ComponentReport>,
    pub verified: bool,
}

/// Drives the component pipelines and commits the result
pub struct Generator<'a> {
    config: GeneratorConfig,
    runner: &'a dyn ToolRunner,
}

impl<'a> Generator<'a> {
    pub fn new(config: GeneratorConfig, runner: &'a dyn ToolRunner) -> Self {
        Self { config, runner }
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Regenerate the output directory
    pub fn generate(&self, options: &GenerateOptions) -> Result<GenerateReport> {
        self.config.validate()?;
        let specs = self.config.resolve_components(&options.only)?;
        let assets = AssetStore::new(&self.config.assets_dir);
        if !assets.root().is_dir() {
            return Err(Error::Config(format!(
                "assets directory {} does not exist",
                assets.root().display()
            )));
        }

        let output = &self.config.output_dir;
        check_output_owned(output)?;
        fs::create_dir_all(output)?;

        let previous = if options.locked {
            Some(UpstreamLock::from_file(&output.join(LOCK_FILE))?)
        } else {
            None
        };
        let selectors = specs
            .iter()
            .map(|spec| self.selector_for(spec, previous.as_ref()))
            .collect::<Result<Vec<_>>>()?;

        let staging = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempdir_in(output)?;
        info!("Staging regeneration in {}", staging.path().display());

        let jobs: Vec<_> = specs
            .iter()
            .zip(selectors.iter())
            .map(|(spec, selector)| {
                let pin = previous.as_ref().and_then(|lock| lock.get(&spec.name));
                (spec, selector, pin)
            })
            .collect();
        let reports = if self.config.parallel {
            jobs.par_iter()
                .map(|(spec, selector, pin)| {
                    self.run_component(spec, selector, *pin, staging.path(), &assets)
                })
                .collect::<Result<Vec<_>>>()?
        } else {
            jobs.iter()
                .map(|(spec, selector, pin)| {
                    self.run_component(spec, selector, *pin, staging.path(), &assets)
                })
                .collect::<Result<Vec<_>>>()?
        };

        let versions: Vec<_> = reports
            .iter()
            .map(|r| (r.name.clone(), r.metadata.clone()))
            .collect();
        let glue = render_package(&assets, &self.config.wrapper_dir, &versions)?;
        write_package(staging.path(), &glue)?;

        let mut lock = UpstreamLock::new();
        for report in &reports {
            lock.insert(&report.name, report.locked.clone());
        }
        lock.write_to_file(&staging.path().join(LOCK_FILE))?;

        if self.config.verify {
            verify_package(self.runner, staging.path(), &self.config.verify_command)?;
        } else {
            warn!("Verification disabled; the package was not compiled");
        }

        commit(
            staging.path(),
            output,
            &managed_entries(&self.config.wrapper_dir),
        )?;
        info!("Regenerated {} components into {}", reports.len(), output.display());

        Ok(GenerateReport {
            output_dir: output.clone(),
            components: reports,
            verified: self.config.verify,
        })
    }

    /// Selector to acquire `spec` with, after policy and pins
    fn selector_for(
        &self,
        spec: &ComponentSpec,
        previous: Option<&UpstreamLock>,
    ) -> Result<RevisionSelector> {
        if let Some(lock) = previous {
            let locked = lock.get(&spec.name).ok_or_else(|| {
                Error::Config(format!("{} has no entry in {}", spec.name, LOCK_FILE))
            })?;
            return Ok(RevisionSelector::Commit(locked.commit.clone()));
        }

        if self.config.revision_policy == RevisionPolicy::Pinned {
            if let RevisionSelector::LatestStable { .. } = &spec.revision {
                return Err(Error::Acquisition {
                    component: spec.name.clone(),
                    message: format!(
                        "revision policy is pinned but the selector is the {}; \
                         set [components.{}] revision or pass --locked",
                        spec.revision.describe(),
                        spec.name
                    ),
                    output: None,
                });
            }
        }
        Ok(spec.revision.clone())
    }

    fn run_component(
        &self,
        spec: &ComponentSpec,
        selector: &RevisionSelector,
        pin: Option<&LockedComponent>,
        package_root: &Path,
        assets: &AssetStore,
    ) -> Result<ComponentReport> {
        info!("Regenerating {}", spec.name);

        let mut tree =
            Acquirer::new(self.runner).acquire(spec, selector, &package_root.join(&spec.name))?;
        // A replayed commit keeps the branch it was originally selected from
        if let Some(pin) = pin {
            if tree.revision.reference.is_none() {
                tree.revision.reference = pin.reference.clone();
            }
        }
        let dry_run = Prober::new(self.runner).probe(spec, &tree)?;
        let metadata = extract_metadata(spec, &tree)?;
        let set = extract_units(spec, &tree.root, dry_run.as_ref())?;

        let pruned = prune_tree(spec, &tree.root)?;
        check_retained(spec, &tree.root, package_root, &set.variants)?;

        let synthesis = synthesize(spec, &set, assets, &self.config.wrapper_dir)?;
        write_synthesis(package_root, &synthesis)?;

        let headers = render_headers(spec, &metadata, assets)?;
        write_headers(package_root, &headers)?;

        let mut locked = LockedComponent::new(&spec.source_url, &tree, &metadata);
        if let Some(pin) = pin {
            locked.selector = pin.selector.clone();
        }

        info!("{} {} done", spec.name, metadata.version);
        Ok(ComponentReport {
            name: spec.name.clone(),
            locked,
            revision: tree.revision,
            metadata,
            units: set.units.len(),
            excluded: set.excluded.len(),
            modules: synthesis.modules.len(),
            headers: headers.len(),
            licenses: pruned.licenses,
        })
    }
}

/// Every top-level path the generator owns in the output directory
///
/// Components that were not part of this run are still listed, so a
/// regenerate leaves no stale trees behind.
pub fn managed_entries(wrapper_dir: &str) -> Vec<PathBuf> {
    let mut entries = Vec::new();
    for spec in component::builtin_components() {
        entries.push(PathBuf::from(spec.config_dir()));
        entries.push(PathBuf::from(spec.name));
    }
    entries.push(PathBuf::from(wrapper_dir));
    for (_, target, _) in GLUE_FILES {
        let top = Path::new(target)
            .components()
            .next()
            .map(|c| PathBuf::from(c.as_os_str()))
            .unwrap_or_else(|| PathBuf::from(target));
        if !entries.contains(&top) {
            entries.push(top);
        }
    }
    entries.push(PathBuf::from(LOCK_FILE));
    entries
}

/// Refuse an output directory holding a package this generator did not write
///
/// A previous output always has both the manifest and the pin file, and
/// its manifest names the generated package.
fn check_output_owned(output: &Path) -> Result<()> {
    let manifest = output.join(MANIFEST);
    if !manifest.exists() {
        return Ok(());
    }
    if !output.join(LOCK_FILE).is_file() {
        return Err(Error::Config(format!(
            "{} holds a Cargo package without {}; refusing to overwrite it",
            output.display(),
            LOCK_FILE
        )));
    }

    let table: toml::Table = toml::from_str(&fs::read_to_string(&manifest)?)?;
    let name = table
        .get("package")
        .and_then(|package| package.get("name"))
        .and_then(|name| name.as_str());
    if name != Some(PACKAGE_NAME) {
        return Err(Error::Config(format!(
            "{} holds package `{}`, not `{}`; refusing to overwrite it",
            output.display(),
            name.unwrap_or("<unnamed>"),
            PACKAGE_NAME
        )));
    }
    Ok(())
}

/// Replace the managed entries of `output` with their staged versions
///
/// Live entries are first moved into a backup directory inside `output`.
/// If any staged entry cannot be moved in, the entries installed so far are
/// removed and the backup is moved back, so `output` ends up as it was.
fn commit(staging: &Path, output: &Path, entries: &[PathBuf]) -> Result<()> {
    let backup = tempfile::Builder::new()
        .prefix(BACKUP_PREFIX)
        .tempdir_in(output)?;

    let mut moved = Vec::new();
    let mut installed = Vec::new();
    let swapped = swap_entries(staging, output, backup.path(), entries, &mut moved, &mut installed);
    let Err(err) = swapped else {
        return Ok(());
    };

    warn!("Commit failed ({}); restoring the previous output", err);
    if let Err(restore_err) = restore_entries(output, backup.path(), &moved, &installed) {
        let kept = backup.keep();
        return Err(Error::Io(io::Error::other(format!(
            "commit failed ({}) and restoring the previous output failed ({}); \
             the previous entries are in {}",
            err,
            restore_err,
            kept.display()
        ))));
    }
    Err(err)
}

fn swap_entries<'e>(
    staging: &Path,
    output: &Path,
    backup: &Path,
    entries: &'e [PathBuf],
    moved: &mut Vec<&'e PathBuf>,
    installed: &mut Vec<&'e PathBuf>,
) -> Result<()> {
    for entry in entries {
        let live = output.join(entry);
        if live.symlink_metadata().is_err() {
            continue;
        }
        move_entry(&live, &backup.join(entry))?;
        moved.push(entry);
    }

    for entry in entries {
        let staged = staging.join(entry);
        if !staged.exists() {
            continue;
        }
        move_entry(&staged, &output.join(entry))?;
        installed.push(entry);
    }
    Ok(())
}

fn restore_entries(
    output: &Path,
    backup: &Path,
    moved: &[&PathBuf],
    installed: &[&PathBuf],
) -> Result<()> {
    for entry in installed.iter().rev() {
        let live = output.join(entry);
        if live.is_dir() {
            fs::remove_dir_all(&live)?;
        } else {
            fs::remove_file(&live)?;
        }
    }
    for entry in moved.iter().rev() {
        move_entry(&backup.join(entry), &output.join(entry))?;
    }
    Ok(())
}

fn move_entry(from: &Path, to: &Path) -> Result<()> {
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::rename(from, to)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_managed_entries() {
        let entries = managed_entries("libtor");
        for expected in [
            "zlib",
            "zlib_config",
            "tor",
            "tor_config",
            "libtor",
            "Cargo.toml",
            "build.rs",
            "src",
            "upstream.lock",
        ] {
            assert!(entries.contains(&PathBuf::from(expected)), "{}", expected);
        }
    }

    #[test]
    fn test_commit_replaces_only_managed_entries() {
        let output = tempfile::tempdir().unwrap();
        let staging = tempfile::tempdir().unwrap();
        fs::create_dir_all(output.path().join("tor/src/old")).unwrap();
        fs::write(output.path().join("README.md"), "keep me").unwrap();
        fs::write(output.path().join("upstream.lock"), "old").unwrap();
        fs::create_dir_all(staging.path().join("tor/src/new")).unwrap();
        fs::write(staging.path().join("upstream.lock"), "new").unwrap();

        commit(staging.path(), output.path(), &managed_entries("libtor")).unwrap();

        assert!(output.path().join("tor/src/new").is_dir());
        assert!(!output.path().join("tor/src/old").exists());
        assert_eq!(fs::read_to_string(output.path().join("upstream.lock")).unwrap(), "new");
        assert_eq!(fs::read_to_string(output.path().join("README.md")).unwrap(), "keep me");
    }

    fn files(root: &Path) -> Vec<(String, String)> {
        let mut found: Vec<_> = walkdir::WalkDir::new(root)
            .into_iter()
            .map(|e| e.unwrap())
            .filter(|e| e.file_type().is_file())
            .map(|e| {
                let rel = e.path().strip_prefix(root).unwrap().to_string_lossy().to_string();
                (rel, fs::read_to_string(e.path()).unwrap())
            })
            .collect();
        found.sort();
        found
    }

    #[test]
    fn test_commit_restores_previous_output_on_failure() {
        let output = tempfile::tempdir().unwrap();
        let staging = tempfile::tempdir().unwrap();
        fs::create_dir_all(output.path().join("tor/src")).unwrap();
        fs::write(output.path().join("tor/src/old.c"), "old").unwrap();
        fs::create_dir_all(output.path().join("zlib_config")).unwrap();
        fs::write(output.path().join("zlib_config/zconf.h"), "old").unwrap();
        fs::write(output.path().join("upstream.lock"), "old").unwrap();
        // A plain file where the nested wrapper directory has to go
        fs::write(output.path().join("gen"), "operator file").unwrap();
        let before = files(output.path());

        fs::create_dir_all(staging.path().join("tor/src")).unwrap();
        fs::write(staging.path().join("tor/src/new.c"), "new").unwrap();
        fs::create_dir_all(staging.path().join("gen/libtor")).unwrap();
        fs::write(staging.path().join("gen/libtor/tor.preamble"), "new").unwrap();
        fs::write(staging.path().join("upstream.lock"), "new").unwrap();

        let err = commit(staging.path(), output.path(), &managed_entries("gen/libtor")).unwrap_err();
        assert_eq!(err.stage(), "io");

        assert_eq!(files(output.path()), before);
        let leftovers: Vec<_> = fs::read_dir(output.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .filter(|n| n.starts_with(BACKUP_PREFIX))
            .collect();
        assert!(leftovers.is_empty(), "{:?}", leftovers);
    }

    #[test]
    fn test_output_ownership() {
        let dir = tempfile::tempdir().unwrap();
        assert!(check_output_owned(dir.path()).is_ok());
        assert!(check_output_owned(&dir.path().join("missing")).is_ok());

        // Some other crate's checkout
        fs::write(dir.path().join(MANIFEST), "[package]\nname = \"libtor-gen\"\n").unwrap();
        let err = check_output_owned(dir.path()).unwrap_err();
        assert_eq!(err.stage(), "config");
        assert!(err.to_string().contains(LOCK_FILE));

        fs::write(dir.path().join(LOCK_FILE), "version = 1\n").unwrap();
        let err = check_output_owned(dir.path()).unwrap_err();
        assert!(err.to_string().contains("libtor-gen"));

        fs::write(dir.path().join(MANIFEST), "[package]\nname = \"libtor\"\n").unwrap();
        assert!(check_output_owned(dir.path()).is_ok());
    }

    #[test]
    fn test_pinned_policy_rejects_floating_selector() {
        let config = GeneratorConfig {
            revision_policy: RevisionPolicy::Pinned,
            ..Default::default()
        };
        let runner = crate::runner::SystemRunner;
        let generator = Generator::new(config, &runner);

        let err = generator.selector_for(&component::openssl(), None).unwrap_err();
        assert_eq!(err.stage(), "acquire");
        assert!(err.to_string().contains("pinned"));

        let tor = generator.selector_for(&component::tor(), None).unwrap();
        assert_eq!(tor, RevisionSelector::Ref("release-0.3.5".to_string()));
    }

    #[test]
    fn test_locked_replays_commit() {
        let runner = crate::runner::SystemRunner;
        let generator = Generator::new(
            GeneratorConfig {
                revision_policy: RevisionPolicy::Pinned,
                ..Default::default()
            },
            &runner,
        );
        let lock = UpstreamLock::parse(
            r#"
            version = 1
            [components.openssl]
            source_url = "https://github.com/openssl/openssl"
            selector = "latest stable branch"
            reference = "OpenSSL_1_1_1-stable"
            commit = "0123456789abcdef"
            date = "Tue May 28 13:07:56 2019 +0100"
            version = "1.1.1-stable"
            "#,
        )
        .unwrap();

        let selector = generator.selector_for(&component::openssl(), Some(&lock)).unwrap();
        assert_eq!(selector, RevisionSelector::Commit("0123456789abcdef".to_string()));

        let err = generator.selector_for(&component::tor(), Some(&lock)).unwrap_err();
        assert_eq!(err.stage(), "config");
    }
}
