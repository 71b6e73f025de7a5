// src/lockfile.rs

//! Upstream revision pin file
//!
//! `upstream.lock` records which commit every component was generated from.
//! It is the only artifact carried from one run to the next: `--locked`
//! replays the recorded commits instead of resolving selectors again.
//!
//! # Example
//!
//! ```toml
//! version = 1
//!
//! [components.openssl]
//! source_url = "https://github.com/openssl/openssl"
//! selector = "latest stable branch matching OpenSSL_([0-9]+_[0-9]+_[0-9]+)-stable"
//! reference = "OpenSSL_1_1_1-stable"
//! commit = "c0ca3b9a1a8c5e0d1a7d4a7f0e9f7f61f4a8e2b1"
//! date = "Tue May 28 13:07:56 2019 +0100"
//! version = "1.1.1-stable"
//! ```

use crate::acquire::AcquiredTree;
use crate::error::{Error, Result};
use crate::extract::VersionMetadata;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Current pin file format version
pub const LOCK_VERSION: u32 = 1;

/// Pin file name inside the output directory
pub const LOCK_FILE: &str = "upstream.lock";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpstreamLock {
    pub version: u32,
    #[serde(default)]
    pub components: BTreeMap<String, LockedComponent>,
}

/// Resolved revision and metadata of one component
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockedComponent {
    pub source_url: String,
    /// Selector that was applied, as described in logs
    pub selector: String,
    /// Branch or tag checked out, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    pub commit: String,
    pub date: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub numeric_version: Option<String>,
}

impl LockedComponent {
    pub fn new(source_url: &str, tree: &AcquiredTree, metadata: &VersionMetadata) -> Self {
        Self {
            source_url: source_url.to_string(),
            selector: tree.revision.selector.describe(),
            reference: tree.revision.reference.clone(),
            commit: tree.revision.commit.clone(),
            date: tree.revision.date.clone(),
            version: metadata.version.clone(),
            numeric_version: metadata.numeric_version.clone(),
        }
    }
}

impl Default for UpstreamLock {
    fn default() -> Self {
        Self::new()
    }
}

impl UpstreamLock {
    pub fn new() -> Self {
        Self {
            version: LOCK_VERSION,
            components: BTreeMap::new(),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let lock: Self = toml::from_str(content)?;
        if lock.version != LOCK_VERSION {
            return Err(Error::Config(format!(
                "{} version mismatch: expected {}, found {}",
                LOCK_FILE, LOCK_VERSION, lock.version
            )));
        }
        Ok(lock)
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_toml()?)?;
        Ok(())
    }

    pub fn insert(&mut self, name: &str, locked: LockedComponent) {
        self.components.insert(name.to_string(), locked);
    }

    pub fn get(&self, name: &str) -> Option<&LockedComponent> {
        self.components.get(name)
    }
}
