// src/synth.rs

//! Wrapper Synthesizer
//!
//! Emits one stub module per unit variant. A stub does nothing but include
//! the untouched upstream `.c` file, so the generated package's `cc` build
//! picks it up as a separate compilation unit. One preamble per component
//! carries the include paths, defines and link libraries shared by all of
//! that component's stubs.
//!
//! Module names are `<component>_<unit stem with '/' mapped to '_'>` with a
//! `.<arch>` suffix for architecture-restricted variants. Distinct unit paths
//! that would map to the same name are rejected rather than overwritten.

use crate::arch::Arch;
use crate::component::ComponentSpec;
use crate::error::{Error, Result};
use crate::extract::{SourceSet, UnitVariant};
use crate::template::AssetStore;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Delimiter replacing path separators in module names
pub const PATH_DELIMITER: char = '_';

/// File suffix of a stub module
pub const STUB_SUFFIX: &str = ".c";

/// File suffix of a component preamble
pub const PREAMBLE_SUFFIX: &str = ".preamble";

/// One generated file in the wrapper directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrapperModule {
    /// Path relative to the generated package root
    pub module_path: PathBuf,
    /// Upstream source the module includes, relative to the component tree
    pub included_unit: String,
    pub arch: Option<Arch>,
    /// Template asset the module was rendered from
    pub template: String,
    pub contents: String,
}

/// Everything the synthesizer produced for one component
#[derive(Debug, Clone)]
pub struct Synthesis {
    pub component: String,
    /// Stub modules, sorted by path
    pub modules: Vec<WrapperModule>,
    pub preamble_path: PathBuf,
    pub preamble: String,
}

/// Deterministic module name for a unit variant, without file suffix
pub fn module_name(component: &str, unit_stem: &str, arch: Option<Arch>) -> String {
    let flattened: String = unit_stem
        .chars()
        .map(|c| if c == '/' { PATH_DELIMITER } else { c })
        .collect();
    let mut name = format!("{}{}{}", component, PATH_DELIMITER, flattened);
    if let Some(arch) = arch {
        name.push('.');
        name.push_str(arch.name());
    }
    name
}

/// Path from the wrapper directory back to the package root
fn up_to_root(wrapper_dir: &str) -> String {
    let depth = Path::new(wrapper_dir).components().count();
    "../".repeat(depth)
}

/// Render the stub modules and preamble for a component
pub fn synthesize(
    spec: &ComponentSpec,
    set: &SourceSet,
    assets: &AssetStore,
    wrapper_dir: &str,
) -> Result<Synthesis> {
    let stub = assets
        .template(&spec.stub_template)
        .map_err(|e| Error::rendering(&spec.name, format!("cannot load stub template: {}", e)))?;
    let up = up_to_root(wrapper_dir);

    let mut claimed: BTreeMap<String, &UnitVariant> = BTreeMap::new();
    let mut modules = Vec::with_capacity(set.variants.len());

    for variant in &set.variants {
        let name = module_name(&spec.name, variant.unit.stem(), variant.arch);
        if let Some(previous) = claimed.get(&name) {
            return Err(Error::rendering(
                &spec.name,
                format!(
                    "module name {} collides for {} and {}",
                    name, previous.unit.path, variant.unit.path
                ),
            ));
        }
        claimed.insert(name.clone(), variant);

        let mut values = BTreeMap::new();
        values.insert("component", spec.name.clone());
        values.insert("unit", variant.unit.path.clone());
        values.insert("source", format!("{}{}/{}", up, spec.name, variant.source));
        let contents = stub
            .render(&values, &["source"])
            .map_err(|e| Error::rendering(&spec.name, e.to_string()))?;

        modules.push(WrapperModule {
            module_path: Path::new(wrapper_dir).join(format!("{}{}", name, STUB_SUFFIX)),
            included_unit: variant.source.clone(),
            arch: variant.arch,
            template: stub.name.clone(),
            contents,
        });
    }
    modules.sort_by(|a, b| a.module_path.cmp(&b.module_path));

    let preamble_tmpl = assets
        .template(&spec.preamble_template)
        .map_err(|e| Error::rendering(&spec.name, format!("cannot load preamble template: {}", e)))?;
    let mut values = BTreeMap::new();
    values.insert("component", spec.name.clone());
    values.insert("flags", preamble_flags(spec));
    let preamble = preamble_tmpl
        .render(&values, &["component", "flags"])
        .map_err(|e| Error::rendering(&spec.name, e.to_string()))?;

    info!("{}: synthesized {} wrapper modules", spec.name, modules.len());

    Ok(Synthesis {
        component: spec.name.clone(),
        modules,
        preamble_path: Path::new(wrapper_dir).join(format!("{}{}", spec.name, PREAMBLE_SUFFIX)),
        preamble,
    })
}

/// Preamble body: one directive per line, in declaration order
pub fn preamble_flags(spec: &ComponentSpec) -> String {
    let mut lines = Vec::new();
    for dir in &spec.preamble.include_dirs {
        lines.push(format!("include {}", dir));
    }
    for (name, value) in &spec.preamble.defines {
        match value {
            Some(value) => lines.push(format!("define {}={}", name, value)),
            None => lines.push(format!("define {}", name)),
        }
    }
    for lib in &spec.preamble.link_libs {
        lines.push(format!("link {}", lib));
    }
    lines.join("\n")
}

/// Write a synthesis into the package directory
pub fn write_synthesis(package_root: &Path, synthesis: &Synthesis) -> Result<()> {
    for module in &synthesis.modules {
        write_file(package_root, &module.module_path, &module.contents)?;
    }
    write_file(package_root, &synthesis.preamble_path, &synthesis.preamble)?;
    debug!(
        "Wrote {} modules and the preamble for {}",
        synthesis.modules.len(),
        synthesis.component
    );
    Ok(())
}

fn write_file(root: &Path, relative: &Path, contents: &str) -> Result<()> {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, contents)?;
    Ok(())
}
