// src/config.rs

//! Generator configuration
//!
//! Read from an optional TOML file; every field has a default so an absent
//! file is a valid configuration. Command-line flags are applied on top by
//! the binary.
//!
//! # Example
//!
//! ```toml
//! output_dir = "../libtor"
//! verify = false
//! revision_policy = "pinned"
//!
//! [components.openssl]
//! revision = "OpenSSL_1_1_1-stable"
//!
//! [components.tor]
//! source_url = "https://gitlab.torproject.org/tpo/core/tor.git"
//! ```

use crate::component::{self, ComponentSpec, RevisionSelector};
use crate::error::{Error, Result};
use crate::lockfile::LOCK_FILE;
use crate::package::GLUE_FILES;
use crate::verify::DEFAULT_VERIFY_COMMAND;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Config file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "libtor-gen.toml";

/// Generated package root, relative to the working directory
pub const DEFAULT_OUTPUT_DIR: &str = "libtor";

/// Whether floating revision selectors are allowed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevisionPolicy {
    /// Follow "latest stable branch" selectors
    #[default]
    Track,
    /// Require every component to resolve to a fixed revision
    Pinned,
}

impl std::fmt::Display for RevisionPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RevisionPolicy::Track => write!(f, "track"),
            RevisionPolicy::Pinned => write!(f, "pinned"),
        }
    }
}

/// Per-component overrides
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ComponentOverride {
    pub enabled: bool,
    /// Alternative clone URL (mirror)
    pub source_url: Option<String>,
    /// Fixed tag or branch replacing the built-in selector
    pub revision: Option<String>,
}

impl Default for ComponentOverride {
    fn default() -> Self {
        Self {
            enabled: true,
            source_url: None,
            revision: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GeneratorConfig {
    /// Root of the generated package
    pub output_dir: PathBuf,
    /// Directory holding `templates/`, `config/` and `package/`
    pub assets_dir: PathBuf,
    /// Wrapper module directory, relative to the package root
    pub wrapper_dir: String,
    /// Compile the assembled package before committing it
    pub verify: bool,
    /// Command run in the package root by the verifier
    pub verify_command: Vec<String>,
    /// Run component pipelines concurrently
    pub parallel: bool,
    pub revision_policy: RevisionPolicy,
    pub components: BTreeMap<String, ComponentOverride>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            assets_dir: PathBuf::from("assets"),
            wrapper_dir: "libtor".to_string(),
            verify: true,
            verify_command: DEFAULT_VERIFY_COMMAND.iter().map(|s| s.to_string()).collect(),
            parallel: false,
            revision_policy: RevisionPolicy::default(),
            components: BTreeMap::new(),
        }
    }
}

impl GeneratorConfig {
    /// Load `path`, falling back to defaults if it does not exist
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        let config = Self::parse(&content)?;
        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        for name in self.components.keys() {
            if component::find_builtin(name).is_none() {
                return Err(Error::Config(format!("unknown component `{}`", name)));
            }
        }

        let wrapper = Path::new(&self.wrapper_dir);
        let plain = self
            .wrapper_dir
            .split('/')
            .all(|segment| !matches!(segment, "" | "." | ".."));
        if !plain || wrapper.is_absolute() {
            return Err(Error::Config(format!(
                "wrapper_dir `{}` must be a relative path inside the package",
                self.wrapper_dir
            )));
        }
        let reserved = component::builtin_components()
            .into_iter()
            .flat_map(|c| [c.config_dir(), c.name])
            .chain(GLUE_FILES.iter().map(|(_, target, _)| target.to_string()))
            .chain(["src".to_string(), LOCK_FILE.to_string()]);
        for name in reserved {
            if wrapper.starts_with(&name) {
                return Err(Error::Config(format!(
                    "wrapper_dir `{}` clashes with generated entry `{}`",
                    self.wrapper_dir, name
                )));
            }
        }

        if self.verify && self.verify_command.is_empty() {
            return Err(Error::Config("verify_command is empty".to_string()));
        }
        Ok(())
    }

    /// Built-in components with overrides applied, restricted to `only`
    ///
    /// Disabled components are skipped. An empty `only` selects every
    /// enabled component. Order is the built-in dependency order.
    pub fn resolve_components(&self, only: &[String]) -> Result<Vec<ComponentSpec>> {
        for name in only {
            if component::find_builtin(name).is_none() {
                return Err(Error::Config(format!("unknown component `{}`", name)));
            }
        }

        let mut specs = Vec::new();
        for mut spec in component::builtin_components() {
            if !only.is_empty() && !only.contains(&spec.name) {
                continue;
            }
            if let Some(ovr) = self.components.get(&spec.name) {
                if !ovr.enabled {
                    debug!("{} disabled by config", spec.name);
                    continue;
                }
                if let Some(url) = &ovr.source_url {
                    spec.source_url = url.clone();
                }
                if let Some(revision) = &ovr.revision {
                    spec.revision = RevisionSelector::Ref(revision.clone());
                }
            }
            specs.push(spec);
        }

        if specs.is_empty() {
            return Err(Error::Config("no components selected".to_string()));
        }
        Ok(specs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GeneratorConfig::parse("").unwrap();
        assert_eq!(config, GeneratorConfig::default());
        assert!(config.verify);
        assert_eq!(config.verify_command, vec!["cargo", "build"]);
        assert_eq!(config.revision_policy, RevisionPolicy::Track);
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = GeneratorConfig::load(&dir.path().join(DEFAULT_CONFIG_FILE)).unwrap();
        assert_eq!(config.wrapper_dir, "libtor");
    }

    #[test]
    fn test_overrides_apply() {
        let config = GeneratorConfig::parse(
            r#"
            revision_policy = "pinned"
            parallel = true

            [components.openssl]
            revision = "OpenSSL_1_1_1-stable"

            [components.zlib]
            enabled = false
            "#,
        )
        .unwrap();
        assert_eq!(config.revision_policy, RevisionPolicy::Pinned);

        let specs = config.resolve_components(&[]).unwrap();
        let names: Vec<_> = specs.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["libevent", "openssl", "tor"]);
        assert_eq!(
            specs[1].revision,
            RevisionSelector::Ref("OpenSSL_1_1_1-stable".to_string())
        );
    }

    #[test]
    fn test_unknown_component_rejected() {
        let err = GeneratorConfig::parse("[components.nss]\nenabled = true\n").unwrap_err();
        assert_eq!(err.stage(), "config");

        let err = GeneratorConfig::default()
            .resolve_components(&["nss".to_string()])
            .unwrap_err();
        assert!(err.to_string().contains("nss"));
    }

    #[test]
    fn test_only_filters_components() {
        let specs = GeneratorConfig::default()
            .resolve_components(&["tor".to_string(), "zlib".to_string()])
            .unwrap();
        let names: Vec<_> = specs.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["zlib", "tor"]);
    }

    #[test]
    fn test_wrapper_dir_must_not_shadow_outputs() {
        assert!(GeneratorConfig::parse("wrapper_dir = \"tor\"\n").is_err());
        assert!(GeneratorConfig::parse("wrapper_dir = \"src\"\n").is_err());
        assert!(GeneratorConfig::parse("wrapper_dir = \"/abs\"\n").is_err());
        assert!(GeneratorConfig::parse("wrapper_dir = \"gen/libtor\"\n").is_ok());
    }

    #[test]
    fn test_wrapper_dir_rejects_dot_components() {
        for dir in ["", ".", "./libtor", "libtor/.", "..", "gen/../libtor", "gen//libtor"] {
            let err = GeneratorConfig::parse(&format!("wrapper_dir = \"{}\"\n", dir)).unwrap_err();
            assert_eq!(err.stage(), "config", "{}", dir);
        }
    }

    #[test]
    fn test_wrapper_dir_rejects_glue_names() {
        for dir in ["Cargo.toml", "build.rs", "upstream.lock", "src/lib.rs"] {
            let err = GeneratorConfig::parse(&format!("wrapper_dir = \"{}\"\n", dir)).unwrap_err();
            assert!(err.to_string().contains("clashes"), "{}", dir);
        }
    }

    #[test]
    fn test_default_output_is_not_working_directory() {
        let config = GeneratorConfig::default();
        assert_eq!(config.output_dir, PathBuf::from(DEFAULT_OUTPUT_DIR));
        assert_ne!(config.output_dir, PathBuf::from("."));
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert!(GeneratorConfig::parse("outptu_dir = \"x\"\n").is_err());
    }
}
