// src/package.rs

//! Glue files of the generated package
//!
//! Besides the component trees, config headers and wrapper modules, the
//! output is a buildable crate: a manifest, a build script that compiles
//! every wrapper module with `cc`, and a small embedding shim over Tor's
//! `tor_api.h`. These are rendered from `assets/package/`.

use crate::error::{Error, Result};
use crate::extract::VersionMetadata;
use crate::template::AssetStore;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Component name used in rendering errors for package glue
const GLUE: &str = "package";

/// Cargo package name of the generated package
pub const PACKAGE_NAME: &str = "libtor";

/// Template, output path and required placeholders of each glue file
pub const GLUE_FILES: &[(&str, &str, &[&str])] = &[
    ("Cargo.toml.in", "Cargo.toml", &["versions"]),
    ("build.rs.in", "build.rs", &["wrapper_dir", "components"]),
    ("lib.rs.in", "src/lib.rs", &["component_list"]),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageFile {
    /// Path relative to the package root
    pub path: PathBuf,
    pub contents: String,
}

/// Render the glue files for the given components
///
/// `components` is in dependency order (dependencies first). The build
/// script links in the reverse order so static archives resolve in one pass.
pub fn render_package(
    assets: &AssetStore,
    wrapper_dir: &str,
    components: &[(String, VersionMetadata)],
) -> Result<Vec<PackageFile>> {
    let mut values = BTreeMap::new();
    values.insert("wrapper_dir", wrapper_dir.to_string());
    values.insert(
        "components",
        format!(
            "[{}]",
            components
                .iter()
                .rev()
                .map(|(name, _)| format!("\"{}\"", name))
                .collect::<Vec<_>>()
                .join(", ")
        ),
    );
    values.insert(
        "component_list",
        components
            .iter()
            .map(|(name, meta)| format!("{} {}", name, meta.version))
            .collect::<Vec<_>>()
            .join(", "),
    );
    values.insert(
        "versions",
        components
            .iter()
            .map(|(name, meta)| format!("{} = \"{}\"", name, meta.version))
            .collect::<Vec<_>>()
            .join("\n"),
    );

    let mut files = Vec::with_capacity(GLUE_FILES.len());
    for (template, target, required) in GLUE_FILES {
        let tmpl = assets
            .package_template(template)
            .map_err(|e| Error::rendering(GLUE, format!("cannot load package template: {}", e)))?;
        let contents = tmpl
            .render(&values, required)
            .map_err(|e| Error::rendering(GLUE, e.to_string()))?;
        files.push(PackageFile {
            path: PathBuf::from(target),
            contents,
        });
    }
    Ok(files)
}

pub fn write_package(package_root: &Path, files: &[PackageFile]) -> Result<()> {
    for file in files {
        let path = package_root.join(&file.path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, &file.contents)?;
        debug!("Wrote {}", file.path.display());
    }
    Ok(())
}
