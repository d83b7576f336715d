// src/manifest/mod.rs

//! Installation manifest model
//!
//! The installation manifest is a TOML file named `install_manifest.toml`
//! describing one installation: its name, free-form properties, the modules
//! it contains and the components those modules provide. The file lives at
//! the root of the installation directory and deliberately stores only
//! paths relative to it, so an installation can be moved wholesale.
//!
//! Shape:
//!
//! ```toml
//! [Installation]
//! Version = 100                        # schema/interface version
//! Name = "Duck"
//!
//! [Properties]
//! Product = "Wild goose components"
//! Version = "0.1.2"                    # package version
//!
//! [[Module]]
//! Path = "mallard.sdv"
//!
//! [[Module.Component]]
//! Class = "Mallard"
//! Aliases = ["Duck"]
//! Type = "ComplexService"
//! ```

mod component;
mod version;

pub use component::{Component, ComponentType};
pub use version::PackageVersion;

use crate::error::{Error, Result};
use crate::introspect;
use crate::pathmatch;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Framework interface version; doubles as the manifest schema version.
pub const INTERFACE_VERSION: u32 = 100;

/// File name of the installation manifest within the install directory.
pub const MANIFEST_FILE_NAME: &str = "install_manifest.toml";

/// One module of an installation and the components it declares
#[derive(Debug, Clone)]
pub struct ModuleRecord {
    /// Module location relative to the installation directory
    pub rel_path: PathBuf,
    /// The module's component-manifest TOML (may be empty)
    pub manifest: String,
    /// Components parsed from the manifest snippet
    pub components: Vec<Component>,
}

impl ModuleRecord {
    /// Parse the component snippet; malformed entries are skipped, they
    /// never reject the module.
    fn new(rel_path: PathBuf, manifest: String, block_system_objects: bool) -> Self {
        let mut components = Vec::new();
        if !manifest.is_empty() {
            if let Ok(value) = toml::from_str::<toml::Value>(&manifest) {
                if let Some(entries) = value.get("Component").and_then(|c| c.as_array()) {
                    for entry in entries {
                        if let Some(component) = component::component_from_value(
                            entry,
                            &rel_path,
                            block_system_objects,
                        ) {
                            components.push(component);
                        }
                    }
                }
            }
        }
        Self {
            rel_path,
            manifest,
            components,
        }
    }
}

/// In-memory installation manifest
///
/// A manifest is *valid* when it carries a non-empty installation name.
/// The installation directory is only known after `load` or `save`.
#[derive(Debug, Clone, Default)]
pub struct InstallManifest {
    install_name: String,
    install_dir: PathBuf,
    block_system_objects: bool,
    modules: Vec<ModuleRecord>,
    properties: BTreeMap<String, String>,
}

impl InstallManifest {
    /// Start a fresh manifest. An empty name is refused.
    pub fn create(install_name: &str) -> Result<Self> {
        if install_name.is_empty() {
            return Err(Error::FailedManifestCreation(install_name.to_string()));
        }
        Ok(Self {
            install_name: install_name.to_string(),
            ..Self::default()
        })
    }

    /// Parse a manifest from TOML text.
    ///
    /// The `Installation.Version` schema version must match
    /// [`INTERFACE_VERSION`] exactly; the name must be present and
    /// non-empty. Unknown keys are ignored.
    pub fn from_toml(text: &str, block_system_objects: bool) -> Result<Self> {
        let root: toml::Value = toml::from_str(text)
            .map_err(|e| Error::InvalidManifest(format!("parse error: {}", e)))?;

        let schema = root
            .get("Installation")
            .and_then(|i| i.get("Version"))
            .and_then(|v| v.as_integer())
            .ok_or_else(|| Error::InvalidManifest("missing Installation.Version".into()))?;
        if schema != i64::from(INTERFACE_VERSION) {
            return Err(Error::InvalidManifest(format!(
                "schema version {} does not match interface version {}",
                schema, INTERFACE_VERSION
            )));
        }

        let install_name = root
            .get("Installation")
            .and_then(|i| i.get("Name"))
            .and_then(|n| n.as_str())
            .unwrap_or_default()
            .to_string();
        if install_name.is_empty() {
            return Err(Error::InvalidManifest("missing Installation.Name".into()));
        }

        let mut properties = BTreeMap::new();
        if let Some(table) = root.get("Properties").and_then(|p| p.as_table()) {
            for (key, value) in table {
                match value.as_str() {
                    Some(text) => {
                        properties.insert(key.clone(), text.to_string());
                    }
                    None => debug!("ignoring non-string property '{}'", key),
                }
            }
        }

        let mut modules = Vec::new();
        if let Some(module_node) = root.get("Module") {
            let entries = module_node
                .as_array()
                .ok_or_else(|| Error::InvalidManifest("Module is not an array".into()))?;
            for entry in entries {
                let Some(path) = entry.get("Path").and_then(|p| p.as_str()) else {
                    continue;
                };
                let snippet = match entry.get("Component").and_then(|c| c.as_array()) {
                    Some(components) => component_array_toml(components),
                    None => String::new(),
                };
                modules.push(ModuleRecord::new(
                    PathBuf::from(path),
                    snippet,
                    block_system_objects,
                ));
            }
        }

        Ok(Self {
            install_name,
            install_dir: PathBuf::new(),
            block_system_objects,
            modules,
            properties,
        })
    }

    /// Load `install_manifest.toml` from an installation directory.
    pub fn load(install_dir: &Path, block_system_objects: bool) -> Result<Self> {
        if install_dir.as_os_str().is_empty() || !install_dir.is_dir() {
            return Err(Error::invalid_path(install_dir));
        }
        let path = install_dir.join(MANIFEST_FILE_NAME);
        let text = fs::read_to_string(&path)
            .map_err(|_| Error::CannotOpenFile(path.display().to_string()))?;
        let mut manifest = Self::from_toml(&text, block_system_objects)?;
        manifest.install_dir = install_dir.to_path_buf();
        Ok(manifest)
    }

    /// Write `install_manifest.toml` into an installation directory and
    /// remember that directory.
    pub fn save(&mut self, install_dir: &Path) -> Result<()> {
        let target = install_dir.join(MANIFEST_FILE_NAME);
        let text = self.write();
        if text.is_empty() || install_dir.as_os_str().is_empty() {
            return Err(Error::FailedSaveManifest(target.display().to_string()));
        }
        fs::write(&target, text)
            .map_err(|_| Error::FailedSaveManifest(target.display().to_string()))?;
        self.install_dir = install_dir.to_path_buf();
        Ok(())
    }

    /// Whether this manifest describes an installation (has a name).
    pub fn is_valid(&self) -> bool {
        !self.install_name.is_empty()
    }

    /// Reset to the empty (invalid) manifest.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn install_name(&self) -> &str {
        &self.install_name
    }

    /// Installation directory; empty unless loaded from or saved to disk.
    pub fn install_dir(&self) -> &Path {
        &self.install_dir
    }

    /// The package version carried by the `Version` property; absent
    /// properties read as 0.0.0.
    pub fn version(&self) -> PackageVersion {
        self.property("Version")
            .map(PackageVersion::parse)
            .unwrap_or_default()
    }

    /// Set a property. Names containing quotes are refused (dropped).
    pub fn set_property(&mut self, name: &str, value: &str) {
        if name.contains('"') || name.contains('\'') {
            debug!("refusing property name with quote: {}", name);
            return;
        }
        self.properties.insert(name.to_string(), value.to_string());
    }

    /// Look up a property by exact name.
    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties.get(name).map(String::as_str)
    }

    /// All properties, sorted by name.
    pub fn properties(&self) -> impl Iterator<Item = (&str, &str)> {
        self.properties
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Modules in insertion order.
    pub fn modules(&self) -> &[ModuleRecord] {
        &self.modules
    }

    /// All components across all modules.
    pub fn components(&self) -> impl Iterator<Item = &Component> {
        self.modules.iter().flat_map(|m| m.components.iter())
    }

    /// First component whose class name or alias equals `class`.
    pub fn find_component_by_class(&self, class: &str) -> Option<&Component> {
        self.components().find(|c| c.answers_to(class))
    }

    /// Absolute path of a module below the installation directory.
    /// Only answerable once the manifest knows that directory.
    pub fn find_module(&self, rel_module: &Path) -> Option<PathBuf> {
        if !self.is_valid() || self.install_dir.as_os_str().is_empty() {
            return None;
        }
        self.modules
            .iter()
            .find(|m| m.rel_path == rel_module)
            .map(|_| self.install_dir.join(rel_module))
    }

    /// The raw component-manifest snippet of a module.
    pub fn find_module_manifest(&self, rel_module: &Path) -> Option<&str> {
        self.modules
            .iter()
            .find(|m| m.rel_path == rel_module)
            .map(|m| m.manifest.as_str())
    }

    /// Add a module file to the manifest.
    ///
    /// The module's component manifest is read through introspection when
    /// `trusted` is set; the schema version inside it must match the
    /// interface version. The module lands at
    /// `rel_target_dir/<file name>`.
    pub fn add_module(
        &mut self,
        module_path: &Path,
        rel_target_dir: &Path,
        trusted: bool,
    ) -> Result<()> {
        if !self.is_valid() {
            return Err(Error::FailedManifestCreation(self.install_name.clone()));
        }
        if !module_path.is_file() {
            return Err(Error::ModuleNotFound(module_path.display().to_string()));
        }
        if rel_target_dir.is_absolute() || pathmatch::escapes_root(rel_target_dir) {
            return Err(Error::invalid_path(rel_target_dir));
        }

        let text = introspect::read_module_manifest(module_path, trusted);
        let snippet = if text.is_empty() {
            String::new()
        } else {
            let root: toml::Value = toml::from_str(&text).map_err(|e| {
                Error::InvalidManifest(format!(
                    "module manifest of {}: {}",
                    module_path.display(),
                    e
                ))
            })?;
            let schema = root
                .get("Interface")
                .and_then(|i| i.get("Version"))
                .and_then(|v| v.as_integer());
            if schema != Some(i64::from(INTERFACE_VERSION)) {
                return Err(Error::InvalidManifest(format!(
                    "module manifest of {} has interface version {:?}, expected {}",
                    module_path.display(),
                    schema,
                    INTERFACE_VERSION
                )));
            }
            match root.get("Component") {
                None => String::new(),
                Some(node) => {
                    let entries = node.as_array().ok_or_else(|| {
                        Error::InvalidManifest(format!(
                            "module manifest of {}: Component is not an array",
                            module_path.display()
                        ))
                    })?;
                    component_array_toml(entries)
                }
            }
        };

        let file_name = module_path
            .file_name()
            .ok_or_else(|| Error::invalid_path(module_path))?;
        let rel_module = pathmatch::normalize_rel(&rel_target_dir.join(file_name));
        self.modules.push(ModuleRecord::new(
            rel_module,
            snippet,
            self.block_system_objects,
        ));
        Ok(())
    }

    /// Emit the manifest as deterministic TOML.
    ///
    /// Properties are sorted by key, modules keep insertion order, and
    /// optional component fields are omitted at their defaults. Returns
    /// the empty string for an invalid manifest.
    pub fn write(&self) -> String {
        if !self.is_valid() {
            return String::new();
        }

        let mut out = String::new();
        out.push_str("[Installation]\n");
        out.push_str(&format!("Version = {}\n", INTERFACE_VERSION));
        out.push_str(&format!("Name = {}\n\n", toml_string(&self.install_name)));

        if !self.properties.is_empty() {
            out.push_str("[Properties]\n");
            for (key, value) in &self.properties {
                let key = if needs_quoted_key(key) {
                    toml_string(key)
                } else {
                    key.clone()
                };
                out.push_str(&format!("{} = {}\n", key, toml_string(value)));
            }
            out.push('\n');
        }

        for module in &self.modules {
            out.push_str("[[Module]]\n");
            out.push_str(&format!(
                "Path = {}\n",
                toml_string(&pathmatch::slash_path(&module.rel_path))
            ));
            for component in &module.components {
                out.push('\n');
                out.push_str("[[Module.Component]]\n");
                out.push_str(&format!(
                    "Class = {}\n",
                    toml_string(&component.class_name)
                ));
                if !component.aliases.is_empty() {
                    out.push_str(&format!(
                        "Aliases = {}\n",
                        toml_string_array(&component.aliases)
                    ));
                }
                if component.default_object_name != component.class_name {
                    out.push_str(&format!(
                        "DefaultName = {}\n",
                        toml_string(&component.default_object_name)
                    ));
                }
                out.push_str(&format!(
                    "Type = {}\n",
                    toml_string(component.component_type.manifest_key())
                ));
                if component.singleton {
                    out.push_str("Singleton = true\n");
                }
                if !component.dependencies.is_empty() {
                    out.push_str(&format!(
                        "Dependencies = {}\n",
                        toml_string_array(&component.dependencies)
                    ));
                }
            }
            out.push('\n');
        }

        out
    }
}

/// TOML bare keys allow only ASCII letters, digits, `_` and `-`;
/// everything else must be quoted.
fn needs_quoted_key(name: &str) -> bool {
    !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        || name.is_empty()
}

/// Quote and escape a string the TOML way.
fn toml_string(text: &str) -> String {
    toml::Value::String(text.to_string()).to_string()
}

fn toml_string_array(items: &[String]) -> String {
    toml::Value::Array(
        items
            .iter()
            .map(|s| toml::Value::String(s.clone()))
            .collect(),
    )
    .to_string()
}

/// Re-emit a component array as a standalone `[[Component]]` snippet.
fn component_array_toml(entries: &[toml::Value]) -> String {
    let mut table = toml::value::Table::new();
    table.insert(
        "Component".to_string(),
        toml::Value::Array(entries.to_vec()),
    );
    toml::to_string(&toml::Value::Table(table)).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn sample_manifest() -> InstallManifest {
        let text = format!(
            r#"
            [Installation]
            Version = {version}
            Name = "Duck"

            [Properties]
            Product = "Wild goose components"
            Version = "1.2.3"
            "with space" = "quoted key"

            [[Module]]
            Path = "mallard.sdv"

            [[Module.Component]]
            Class = "Mallard"
            Aliases = ["Duck"]
            Type = "ComplexService"
            Singleton = true

            [[Module.Component]]
            Class = "Feather"
            Type = "Utility"

            [[Module]]
            Path = "large/greylag_goose.sdv"
            "#,
            version = INTERFACE_VERSION
        );
        InstallManifest::from_toml(&text, false).unwrap()
    }

    #[test]
    fn test_read_basic_fields() {
        let m = sample_manifest();
        assert!(m.is_valid());
        assert_eq!(m.install_name(), "Duck");
        assert_eq!(m.version(), PackageVersion::new(1, 2, 3));
        assert_eq!(m.property("Product"), Some("Wild goose components"));
        assert_eq!(m.property("with space"), Some("quoted key"));
        assert_eq!(m.modules().len(), 2);
        assert_eq!(m.modules()[0].components.len(), 2);
        assert!(m.modules()[1].components.is_empty());
    }

    #[test]
    fn test_find_component_by_class_and_alias() {
        let m = sample_manifest();
        assert_eq!(
            m.find_component_by_class("Mallard").unwrap().class_name,
            "Mallard"
        );
        assert_eq!(
            m.find_component_by_class("Duck").unwrap().class_name,
            "Mallard"
        );
        assert!(m.find_component_by_class("Swan").is_none());
    }

    #[test]
    fn test_write_read_roundtrip() {
        let m = sample_manifest();
        let text = m.write();
        let reread = InstallManifest::from_toml(&text, false).unwrap();
        assert_eq!(reread.install_name(), m.install_name());
        assert_eq!(reread.version(), m.version());
        assert_eq!(
            reread.properties().collect::<Vec<_>>(),
            m.properties().collect::<Vec<_>>()
        );
        assert_eq!(reread.modules().len(), m.modules().len());
        assert_eq!(
            reread.modules()[0].components[0].aliases,
            m.modules()[0].components[0].aliases
        );
        // Emission is deterministic
        assert_eq!(reread.write(), text);
    }

    #[test]
    fn test_wrong_schema_version_rejected() {
        let text = r#"
            [Installation]
            Version = 99
            Name = "Duck"
        "#;
        assert!(matches!(
            InstallManifest::from_toml(text, false),
            Err(Error::InvalidManifest(_))
        ));
    }

    #[test]
    fn test_missing_name_rejected() {
        let text = format!("[Installation]\nVersion = {}\n", INTERFACE_VERSION);
        assert!(InstallManifest::from_toml(&text, false).is_err());
    }

    #[test]
    fn test_create_refuses_empty_name() {
        assert!(matches!(
            InstallManifest::create(""),
            Err(Error::FailedManifestCreation(_))
        ));
    }

    #[test]
    fn test_block_system_objects_drops_on_read() {
        let text = format!(
            r#"
            [Installation]
            Version = {}
            Name = "Sys"

            [[Module]]
            Path = "core.sdv"

            [[Module.Component]]
            Class = "Kernel"
            Type = "System"

            [[Module.Component]]
            Class = "Helper"
            Type = "Utility"
            "#,
            INTERFACE_VERSION
        );
        let m = InstallManifest::from_toml(&text, true).unwrap();
        assert_eq!(m.components().count(), 1);
        assert_eq!(m.components().next().unwrap().class_name, "Helper");
    }

    #[test]
    fn test_quoted_and_bare_key_are_one_property() {
        // A bare key and a quoted key with equal text decode to the same
        // property; the later assignment wins.
        let mut m = InstallManifest::create("X").unwrap();
        m.set_property("Author", "first");
        m.set_property("Author", "second");
        assert_eq!(m.property("Author"), Some("second"));
        assert_eq!(m.properties().count(), 1);
    }

    #[test]
    fn test_multiline_property_value_roundtrips() {
        let mut m = InstallManifest::create("X").unwrap();
        m.set_property("Address", "Vildgåsvägen 7\nSkanör med Falsterbo\nSverige");
        let text = m.write();
        let reread = InstallManifest::from_toml(&text, false).unwrap();
        assert_eq!(reread.property("Address"), m.property("Address"));
    }

    #[test]
    fn test_property_name_with_quote_is_refused() {
        let mut m = InstallManifest::create("X").unwrap();
        m.set_property("bad\"name", "v");
        m.set_property("bad'name", "v");
        assert_eq!(m.properties().count(), 0);
    }

    #[test]
    fn test_key_quoting_rule() {
        assert!(!needs_quoted_key("Version"));
        assert!(!needs_quoted_key("with-dash_and_1"));
        assert!(needs_quoted_key("with space"));
        assert!(needs_quoted_key("dotted.key"));
        assert!(needs_quoted_key(""));
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let mut m = InstallManifest::create("Duck").unwrap();
        m.set_property("Version", "2.0.1");
        m.save(dir.path()).unwrap();
        assert_eq!(m.install_dir(), dir.path());
        assert!(dir.path().join(MANIFEST_FILE_NAME).is_file());

        let loaded = InstallManifest::load(dir.path(), false).unwrap();
        assert_eq!(loaded.install_name(), "Duck");
        assert_eq!(loaded.version(), PackageVersion::new(2, 0, 1));
        assert_eq!(loaded.install_dir(), dir.path());
    }

    #[test]
    fn test_load_missing_dir_fails() {
        assert!(InstallManifest::load(Path::new("/no/such/dir"), false).is_err());
    }

    #[test]
    fn test_add_module_plain_file() {
        let dir = TempDir::new().unwrap();
        let module = dir.path().join("engine.bin");
        fs::write(&module, b"binary").unwrap();

        let mut m = InstallManifest::create("Car").unwrap();
        m.add_module(&module, Path::new("drivers"), false).unwrap();
        assert_eq!(m.modules().len(), 1);
        assert_eq!(m.modules()[0].rel_path, PathBuf::from("drivers/engine.bin"));
        assert!(m.modules()[0].components.is_empty());
    }

    #[test]
    fn test_add_module_rejects_escaping_target() {
        let dir = TempDir::new().unwrap();
        let module = dir.path().join("engine.bin");
        fs::write(&module, b"binary").unwrap();

        let mut m = InstallManifest::create("Car").unwrap();
        assert!(matches!(
            m.add_module(&module, Path::new("../out"), false),
            Err(Error::InvalidPath(_))
        ));
        assert!(matches!(
            m.add_module(&module, Path::new("/abs"), false),
            Err(Error::InvalidPath(_))
        ));
    }

    #[test]
    fn test_add_module_missing_file() {
        let mut m = InstallManifest::create("Car").unwrap();
        assert!(matches!(
            m.add_module(Path::new("/no/such.bin"), Path::new("."), false),
            Err(Error::ModuleNotFound(_))
        ));
    }

    #[test]
    fn test_find_module_requires_install_dir() {
        let dir = TempDir::new().unwrap();
        let module = dir.path().join("engine.bin");
        fs::write(&module, b"binary").unwrap();

        let mut m = InstallManifest::create("Car").unwrap();
        m.add_module(&module, Path::new("."), false).unwrap();
        assert!(m.find_module(Path::new("engine.bin")).is_none());

        m.save(dir.path()).unwrap();
        assert_eq!(
            m.find_module(Path::new("engine.bin")),
            Some(dir.path().join("engine.bin"))
        );
        assert!(m.find_module(Path::new("other.bin")).is_none());
    }
}
