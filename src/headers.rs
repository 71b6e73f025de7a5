// src/headers.rs

//! Platform Config Templater
//!
//! Upstream configure scripts generate host-specific headers. Since one
//! generation pass serves several target platforms, each component ships a
//! fixed template per platform instead, and only the release metadata is
//! substituted in.

use crate::component::ComponentSpec;
use crate::error::{Error, Result};
use crate::extract::VersionMetadata;
use crate::template::AssetStore;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// A rendered config header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigHeader {
    /// Path relative to the generated package root
    pub path: PathBuf,
    pub contents: String,
}

/// Render every config header `spec` declares
///
/// All metadata values the component has are offered to every template, but
/// only the header's declared placeholders are required to appear.
pub fn render_headers(
    spec: &ComponentSpec,
    metadata: &VersionMetadata,
    assets: &AssetStore,
) -> Result<Vec<ConfigHeader>> {
    let mut values = BTreeMap::new();
    values.insert("component", spec.name.clone());
    values.insert("version", metadata.version.clone());
    values.insert("build_date", metadata.build_date.clone());
    if let Some(numeric) = &metadata.numeric_version {
        values.insert("numeric_version", numeric.clone());
    }

    let config_dir = spec.config_dir();
    let mut headers = Vec::with_capacity(spec.config_headers.len());
    for header in &spec.config_headers {
        let template = assets.config_template(&header.template).map_err(|e| {
            Error::rendering(&spec.name, format!("cannot load config template: {}", e))
        })?;

        let mut required = Vec::with_capacity(header.required.len());
        for placeholder in &header.required {
            if metadata.value(*placeholder).is_none() {
                return Err(Error::rendering(
                    &spec.name,
                    format!(
                        "{} needs {} but no value was extracted",
                        header.template,
                        placeholder.name()
                    ),
                ));
            }
            required.push(placeholder.name());
        }

        let contents = template
            .render(&values, &required)
            .map_err(|e| Error::rendering(&spec.name, e.to_string()))?;
        debug!("Rendered {}/{}", config_dir, header.target);
        headers.push(ConfigHeader {
            path: Path::new(&config_dir).join(&header.target),
            contents,
        });
    }

    info!("{}: rendered {} config headers", spec.name, headers.len());
    Ok(headers)
}

/// Write rendered headers below the package root
pub fn write_headers(package_root: &Path, headers: &[ConfigHeader]) -> Result<()> {
    for header in headers {
        let path = package_root.join(&header.path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, &header.contents)?;
    }
    Ok(())
}
