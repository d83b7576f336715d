// src/manifest/component.rs

//! Component descriptions embedded in module manifests
//!
//! A module's component manifest is a TOML snippet of `[[Component]]`
//! tables. Entries that fail to parse or carry an unknown `Type` are
//! skipped silently; a malformed component never rejects its module.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

/// The role a component plays within the framework
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentType {
    SystemObject,
    Device,
    BasicService,
    ComplexService,
    Application,
    Proxy,
    Stub,
    Utility,
}

impl ComponentType {
    /// Parse the `Type` value used in manifests.
    pub fn from_manifest_key(key: &str) -> Option<Self> {
        match key {
            "System" => Some(Self::SystemObject),
            "Device" => Some(Self::Device),
            "BasicService" => Some(Self::BasicService),
            "ComplexService" => Some(Self::ComplexService),
            "App" => Some(Self::Application),
            "Proxy" => Some(Self::Proxy),
            "Stub" => Some(Self::Stub),
            "Utility" => Some(Self::Utility),
            _ => None,
        }
    }

    /// The `Type` value written to manifests.
    pub fn manifest_key(&self) -> &'static str {
        match self {
            Self::SystemObject => "System",
            Self::Device => "Device",
            Self::BasicService => "BasicService",
            Self::ComplexService => "ComplexService",
            Self::Application => "App",
            Self::Proxy => "Proxy",
            Self::Stub => "Stub",
            Self::Utility => "Utility",
        }
    }
}

/// One component described by a module's embedded manifest
#[derive(Debug, Clone)]
pub struct Component {
    /// Class name; never empty
    pub class_name: String,
    /// Alternative class names, in manifest order
    pub aliases: Vec<String>,
    /// Default instance name; falls back to the class name
    pub default_object_name: String,
    pub component_type: ComponentType,
    pub singleton: bool,
    /// Class names this component depends on
    pub dependencies: Vec<String>,
    /// Module location relative to the installation directory
    pub rel_module_path: PathBuf,
    /// The component's own TOML, preserved for round-trips
    pub raw_manifest: String,
}

impl Component {
    /// Whether `name` is the class name or one of its aliases.
    pub fn answers_to(&self, name: &str) -> bool {
        self.class_name == name || self.aliases.iter().any(|a| a == name)
    }
}

/// The on-disk table shape of a `[[Component]]` entry. Unknown keys are
/// ignored.
#[derive(Debug, Deserialize)]
struct RawComponent {
    #[serde(rename = "Class")]
    class: String,
    #[serde(rename = "Aliases", default)]
    aliases: Vec<String>,
    #[serde(rename = "DefaultName")]
    default_name: Option<String>,
    #[serde(rename = "Type")]
    component_type: String,
    #[serde(rename = "Singleton", default)]
    singleton: bool,
    #[serde(rename = "Dependencies", default)]
    dependencies: Vec<String>,
}

/// Build a component from one entry of a `Component` array.
///
/// Returns `None` (skip) for entries that do not deserialize, have an
/// empty class, or name an unknown type. When `block_system_objects` is
/// set, `System` components are dropped too.
pub(crate) fn component_from_value(
    value: &toml::Value,
    rel_module_path: &Path,
    block_system_objects: bool,
) -> Option<Component> {
    let raw: RawComponent = match RawComponent::deserialize(value.clone()) {
        Ok(raw) => raw,
        Err(e) => {
            debug!("skipping malformed component entry: {}", e);
            return None;
        }
    };
    if raw.class.is_empty() {
        return None;
    }
    let component_type = match ComponentType::from_manifest_key(&raw.component_type) {
        Some(t) => t,
        None => {
            debug!(
                "skipping component '{}' with unknown type '{}'",
                raw.class, raw.component_type
            );
            return None;
        }
    };
    if block_system_objects && component_type == ComponentType::SystemObject {
        return None;
    }

    let raw_manifest = component_toml_text(value);
    let default_object_name = raw.default_name.unwrap_or_else(|| raw.class.clone());

    Some(Component {
        class_name: raw.class,
        aliases: raw.aliases,
        default_object_name,
        component_type,
        singleton: raw.singleton,
        dependencies: raw.dependencies,
        rel_module_path: rel_module_path.to_path_buf(),
        raw_manifest,
    })
}

/// Re-emit a single component table as a standalone `[[Component]]` snippet.
fn component_toml_text(value: &toml::Value) -> String {
    let mut table = toml::value::Table::new();
    table.insert(
        "Component".to_string(),
        toml::Value::Array(vec![value.clone()]),
    );
    toml::to_string(&toml::Value::Table(table)).unwrap_or_default()
}
