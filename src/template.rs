// src/template.rs

//! Template assets and strict placeholder substitution
//!
//! Templates are plain text files loaded from the assets directory at run
//! time. Rendering only replaces `{{name}}` placeholders; there is no
//! conditional logic. A placeholder the caller requires but the template
//! lacks, or a placeholder in the template with no value, is an error.

use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use thiserror::Error;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").expect("valid placeholder pattern")
});

/// Template rendering failures
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("template {template} does not contain required placeholder {{{{{name}}}}}")]
    MissingPlaceholder { template: String, name: String },

    #[error("template {template} references {{{{{name}}}}} but no value was supplied")]
    Unresolved { template: String, name: String },
}

/// A loaded text template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    /// Asset-relative name, used in error messages
    pub name: String,
    pub text: String,
}

impl Template {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
        }
    }

    /// Placeholder names appearing in the template
    pub fn placeholders(&self) -> BTreeSet<String> {
        PLACEHOLDER
            .captures_iter(&self.text)
            .map(|c| c[1].to_string())
            .collect()
    }

    /// Substitute `values` into the template
    ///
    /// Every name in `required` must occur in the template, and every
    /// placeholder in the template must have a value.
    pub fn render(
        &self,
        values: &BTreeMap<&str, String>,
        required: &[&str],
    ) -> Result<String, TemplateError> {
        let present = self.placeholders();
        for name in required {
            if !present.contains(*name) {
                return Err(TemplateError::MissingPlaceholder {
                    template: self.name.clone(),
                    name: name.to_string(),
                });
            }
        }
        if let Some(name) = present.iter().find(|n| !values.contains_key(n.as_str())) {
            return Err(TemplateError::Unresolved {
                template: self.name.clone(),
                name: name.clone(),
            });
        }

        let rendered = PLACEHOLDER.replace_all(&self.text, |caps: &regex::Captures<'_>| {
            values.get(&caps[1]).cloned().unwrap_or_default()
        });
        Ok(rendered.into_owned())
    }
}

/// Read access to the assets directory
///
/// Layout:
/// - `templates/` stub and preamble templates
/// - `config/` platform config header templates, per component
/// - `package/` glue files of the generated package
#[derive(Debug, Clone)]
pub struct AssetStore {
    root: PathBuf,
}

impl AssetStore {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Stub or preamble template
    pub fn template(&self, name: &str) -> std::io::Result<Template> {
        self.load("templates", name)
    }

    /// Config header template
    pub fn config_template(&self, name: &str) -> std::io::Result<Template> {
        self.load("config", name)
    }

    /// Package glue template
    pub fn package_template(&self, name: &str) -> std::io::Result<Template> {
        self.load("package", name)
    }

    fn load(&self, section: &str, name: &str) -> std::io::Result<Template> {
        let path = self.root.join(section).join(name);
        let text = fs::read_to_string(&path).map_err(|e| {
            std::io::Error::new(e.kind(), format!("{}: {}", path.display(), e))
        })?;
        Ok(Template::new(format!("{}/{}", section, name), text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(pairs: &[(&'static str, &str)]) -> BTreeMap<&'static str, String> {
        pairs.iter().map(|(k, v)| (*k, v.to_string())).collect()
    }

    #[test]
    fn test_render_substitutes_version() {
        let tmpl = Template::new("orconfig.linux64.h", "#define VERSION \"{{version}}\"\n");
        let out = tmpl
            .render(&values(&[("version", "1.2.3")]), &["version"])
            .unwrap();
        assert_eq!(out, "#define VERSION \"1.2.3\"\n");
        assert!(out.contains("1.2.3"));
    }

    #[test]
    fn test_render_fails_when_required_placeholder_absent() {
        let tmpl = Template::new("orconfig.linux64.h", "#define VERSION \"\"\n");
        let err = tmpl
            .render(&values(&[("version", "1.2.3")]), &["version"])
            .unwrap_err();
        assert_eq!(
            err,
            TemplateError::MissingPlaceholder {
                template: "orconfig.linux64.h".to_string(),
                name: "version".to_string(),
            }
        );
        assert!(err.to_string().contains("{{version}}"));
    }

    #[test]
    fn test_render_fails_on_unresolved_placeholder() {
        let tmpl = Template::new("event-config.h", "{{version}} {{numeric_version}}");
        let err = tmpl
            .render(&values(&[("version", "2.2.0")]), &[])
            .unwrap_err();
        assert!(matches!(err, TemplateError::Unresolved { ref name, .. } if name == "numeric_version"));
    }

    #[test]
    fn test_placeholder_whitespace_and_repeats() {
        let tmpl = Template::new("t", "{{ version }}/{{version}}");
        assert_eq!(tmpl.placeholders().len(), 1);
        let out = tmpl.render(&values(&[("version", "9")]), &[]).unwrap();
        assert_eq!(out, "9/9");
    }

    #[test]
    fn test_asset_store_missing_file_names_path() {
        let dir = tempfile::tempdir().unwrap();
        let store = AssetStore::new(dir.path());
        let err = store.template("tor/stub.c.in").unwrap_err();
        assert!(err.to_string().contains("tor/stub.c.in"));
    }
}
