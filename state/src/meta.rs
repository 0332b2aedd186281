//! Charm metadata: `metadata.yaml`, `config.yaml`, `actions.yaml`, or the
//! unified `charmcraft.yaml`.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::MetaError;
use crate::state::ConfigValue;

/// Scope of a relation endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationScope {
    /// Any unit of the remote application.
    #[default]
    Global,
    /// Only the co-located principal (subordinate charms).
    Container,
}

/// One declared relation endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationMeta {
    /// Interface name.
    pub interface: String,
    /// Maximum number of relations on this endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    /// Scope.
    #[serde(default)]
    pub scope: RelationScope,
    /// Whether the relation is optional.
    #[serde(default)]
    pub optional: bool,
}

/// Which section of metadata an endpoint was declared under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EndpointRole {
    /// `requires`
    Requires,
    /// `provides`
    Provides,
    /// `peers`
    Peers,
}

/// A storage mount inside a container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerMountMeta {
    /// Storage name.
    pub storage: String,
    /// Mount point inside the container.
    pub location: String,
}

/// A declared workload container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerMeta {
    /// OCI image resource backing the container.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
    /// Storage mounts.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mounts: Vec<ContainerMountMeta>,
}

/// Storage kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    /// A mounted filesystem.
    #[default]
    Filesystem,
    /// A raw block device.
    Block,
}

/// `multiple:` on a storage declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageMultiple {
    /// `N`, `N-M`, `N-` or `N+`.
    pub range: String,
}

impl StorageMultiple {
    /// Parses the range into inclusive bounds; an open upper bound is `None`.
    #[must_use]
    pub fn bounds(&self) -> Option<(u32, Option<u32>)> {
        let range = self.range.trim();
        if let Some(lower) = range.strip_suffix('+').or_else(|| range.strip_suffix('-')) {
            return Some((lower.parse().ok()?, None));
        }
        match range.split_once('-') {
            Some((lo, hi)) => Some((lo.parse().ok()?, Some(hi.parse().ok()?))),
            None => {
                let n = range.parse().ok()?;
                Some((n, Some(n)))
            }
        }
    }
}

/// A declared storage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageMeta {
    /// Storage kind.
    #[serde(rename = "type", default)]
    pub storage_type: StorageType,
    /// Mount location.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// How many instances may be attached.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multiple: Option<StorageMultiple>,
}

/// A declared resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceMeta {
    /// `file` or `oci-image`.
    #[serde(rename = "type")]
    pub resource_type: String,
    /// Filename, for file resources.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    /// Description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// The contents of `metadata.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CharmMeta {
    /// Charm (and default application) name.
    pub name: String,
    /// One-line summary.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// Long description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Whether the charm is a subordinate.
    #[serde(default)]
    pub subordinate: bool,
    /// Endpoints this charm consumes.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub requires: BTreeMap<String, RelationMeta>,
    /// Endpoints this charm offers.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub provides: BTreeMap<String, RelationMeta>,
    /// Peer endpoints.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub peers: BTreeMap<String, RelationMeta>,
    /// Workload containers.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub containers: BTreeMap<String, ContainerMeta>,
    /// Storage.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub storage: BTreeMap<String, StorageMeta>,
    /// Resources.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub resources: BTreeMap<String, ResourceMeta>,
    /// Bindings that are not relation endpoints.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra_bindings: BTreeMap<String, Option<String>>,
}

impl CharmMeta {
    /// Minimal metadata with only a name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Every declared endpoint with its role.
    pub fn endpoints(&self) -> impl Iterator<Item = (&str, EndpointRole, &RelationMeta)> {
        tagged(EndpointRole::Requires, &self.requires)
            .chain(tagged(EndpointRole::Provides, &self.provides))
            .chain(tagged(EndpointRole::Peers, &self.peers))
    }

    /// The declaration of `endpoint`, if any.
    #[must_use]
    pub fn endpoint(&self, endpoint: &str) -> Option<(EndpointRole, &RelationMeta)> {
        self.endpoints()
            .find(|(name, _, _)| *name == endpoint)
            .map(|(_, role, meta)| (role, meta))
    }

    /// Whether `name` is a relation endpoint or an extra binding.
    #[must_use]
    pub fn has_binding(&self, name: &str) -> bool {
        self.endpoint(name).is_some() || self.extra_bindings.contains_key(name)
    }
}

fn tagged(
    role: EndpointRole,
    section: &BTreeMap<String, RelationMeta>,
) -> impl Iterator<Item = (&str, EndpointRole, &RelationMeta)> {
    section.iter().map(move |(name, meta)| (name.as_str(), role, meta))
}

/// Type of a config option.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigType {
    /// Free text.
    #[default]
    String,
    /// Integer.
    Int,
    /// Float; integers are accepted.
    Float,
    /// Boolean.
    Boolean,
    /// A secret URI.
    Secret,
}

impl ConfigType {
    /// Whether `value` is acceptable for an option of this type.
    #[must_use]
    pub fn accepts(self, value: &ConfigValue) -> bool {
        matches!(
            (self, value),
            (ConfigType::String | ConfigType::Secret, ConfigValue::String(_))
                | (ConfigType::Int, ConfigValue::Int(_))
                | (ConfigType::Float, ConfigValue::Float(_) | ConfigValue::Int(_))
                | (ConfigType::Boolean, ConfigValue::Bool(_))
        )
    }
}

/// One declared config option.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigOption {
    /// Option type.
    #[serde(rename = "type", default)]
    pub option_type: ConfigType,
    /// Default value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<ConfigValue>,
    /// Description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// The contents of `config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigSchema {
    /// Options by name.
    #[serde(default)]
    pub options: BTreeMap<String, ConfigOption>,
}

impl ConfigSchema {
    /// Declared defaults, for options that have one.
    #[must_use]
    pub fn defaults(&self) -> BTreeMap<String, ConfigValue> {
        self.options
            .iter()
            .filter_map(|(k, o)| o.default.clone().map(|v| (k.clone(), v)))
            .collect()
    }
}

/// One declared action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionMeta {
    /// Description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Parameter name to JSON-schema fragment (`type`, `default`, `description`).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, Value>,
    /// Parameters that must be supplied.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
    /// Whether undeclared parameters are allowed.
    #[serde(default = "default_true")]
    pub additional_properties: bool,
}

fn default_true() -> bool {
    true
}

impl Default for ActionMeta {
    fn default() -> Self {
        Self {
            description: None,
            params: BTreeMap::new(),
            required: Vec::new(),
            additional_properties: true,
        }
    }
}

impl ActionMeta {
    /// Declared type of parameter `name`, if any.
    #[must_use]
    pub fn param_type(&self, name: &str) -> Option<&str> {
        self.params.get(name)?.get("type")?.as_str()
    }

    /// Declared defaults, for parameters that have one.
    #[must_use]
    pub fn defaults(&self) -> BTreeMap<String, Value> {
        self.params
            .iter()
            .filter_map(|(k, schema)| schema.get("default").map(|d| (k.clone(), d.clone())))
            .collect()
    }
}

/// Whether a JSON value satisfies a JSON-schema `type` keyword.
#[must_use]
pub fn json_type_matches(schema_type: &str, value: &Value) -> bool {
    match schema_type {
        "string" => value.is_string(),
        "integer" => value.is_i64() || value.is_u64(),
        "number" => value.is_number(),
        "boolean" => value.is_boolean(),
        "array" => value.is_array(),
        "object" => value.is_object(),
        "null" => value.is_null(),
        _ => true,
    }
}

/// The contents of `actions.yaml`.
pub type ActionsSchema = BTreeMap<String, ActionMeta>;

#[derive(Deserialize)]
struct Charmcraft {
    #[serde(flatten)]
    meta: CharmMeta,
    #[serde(default)]
    config: Option<ConfigSchema>,
    #[serde(default)]
    actions: Option<ActionsSchema>,
}

/// Everything the engine knows about the charm under test.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CharmSpec {
    /// Metadata.
    pub meta: CharmMeta,
    /// Config schema, if the charm has options.
    #[serde(default)]
    pub config: Option<ConfigSchema>,
    /// Actions, if the charm has any.
    #[serde(default)]
    pub actions: Option<ActionsSchema>,
    /// Charm source directory whose `src`/`lib` end up in the virtual root.
    #[serde(default)]
    pub source: Option<PathBuf>,
}

impl CharmSpec {
    /// A spec with only metadata.
    #[must_use]
    pub fn new(meta: CharmMeta) -> Self {
        Self {
            meta,
            ..Self::default()
        }
    }

    /// Sets the config schema.
    #[must_use]
    pub fn with_config(mut self, config: ConfigSchema) -> Self {
        self.config = Some(config);
        self
    }

    /// Sets the actions.
    #[must_use]
    pub fn with_actions(mut self, actions: ActionsSchema) -> Self {
        self.actions = Some(actions);
        self
    }

    /// Parses descriptor texts.
    ///
    /// # Errors
    ///
    /// Returns [`MetaError::Yaml`] if any text does not match its schema.
    pub fn from_yaml(
        metadata: &str,
        config: Option<&str>,
        actions: Option<&str>,
    ) -> Result<Self, MetaError> {
        let meta = parse_yaml("metadata.yaml", metadata)?;
        let config = config.map(|c| parse_yaml("config.yaml", c)).transpose()?;
        let actions = actions.map(|a| parse_yaml("actions.yaml", a)).transpose()?;
        Ok(Self {
            meta,
            config,
            actions,
            source: None,
        })
    }

    /// Loads descriptors from a charm directory, preferring `charmcraft.yaml`
    /// when it carries metadata.
    ///
    /// # Errors
    ///
    /// Returns [`MetaError::Missing`] if neither `metadata.yaml` nor a
    /// `charmcraft.yaml` with a `name` exists, or an I/O or parse error.
    pub fn autoload(dir: &Path) -> Result<Self, MetaError> {
        let charmcraft = dir.join("charmcraft.yaml");
        let metadata = dir.join("metadata.yaml");
        let mut spec = if metadata.is_file() {
            let meta = read_yaml(&metadata)?;
            let config = read_optional(&dir.join("config.yaml"))?;
            let actions = read_optional(&dir.join("actions.yaml"))?;
            Self {
                meta,
                config,
                actions,
                source: None,
            }
        } else if charmcraft.is_file() {
            let unified: Charmcraft = read_yaml(&charmcraft)?;
            Self {
                meta: unified.meta,
                config: unified.config,
                actions: unified.actions,
                source: None,
            }
        } else {
            return Err(MetaError::Missing(dir.display().to_string()));
        };
        spec.source = Some(dir.to_path_buf());
        Ok(spec)
    }

    /// `metadata.yaml` text.
    ///
    /// # Errors
    ///
    /// Returns [`MetaError::Yaml`] if serialization fails.
    pub fn meta_yaml(&self) -> Result<String, MetaError> {
        to_yaml("metadata.yaml", &self.meta)
    }

    /// `config.yaml` text, if the charm has config.
    ///
    /// # Errors
    ///
    /// Returns [`MetaError::Yaml`] if serialization fails.
    pub fn config_yaml(&self) -> Result<Option<String>, MetaError> {
        self.config
            .as_ref()
            .map(|c| to_yaml("config.yaml", c))
            .transpose()
    }

    /// `actions.yaml` text, if the charm has actions.
    ///
    /// # Errors
    ///
    /// Returns [`MetaError::Yaml`] if serialization fails.
    pub fn actions_yaml(&self) -> Result<Option<String>, MetaError> {
        self.actions
            .as_ref()
            .map(|a| to_yaml("actions.yaml", a))
            .transpose()
    }

    /// Declaration of action `name`.
    #[must_use]
    pub fn action(&self, name: &str) -> Option<&ActionMeta> {
        self.actions.as_ref()?.get(name)
    }

    /// Declaration of config option `name`.
    #[must_use]
    pub fn config_option(&self, name: &str) -> Option<&ConfigOption> {
        self.config.as_ref()?.options.get(name)
    }
}

fn parse_yaml<T: serde::de::DeserializeOwned>(what: &str, text: &str) -> Result<T, MetaError> {
    serde_yaml::from_str(text).map_err(|source| MetaError::Yaml {
        what: what.to_string(),
        source,
    })
}

fn to_yaml<T: Serialize>(what: &str, value: &T) -> Result<String, MetaError> {
    serde_yaml::to_string(value).map_err(|source| MetaError::Yaml {
        what: what.to_string(),
        source,
    })
}

fn read_yaml<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, MetaError> {
    let text = fs::read_to_string(path).map_err(|source| MetaError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_yaml(&path.display().to_string(), &text)
}

fn read_optional<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>, MetaError> {
    if path.is_file() {
        read_yaml(path).map(Some)
    } else {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const METADATA: &str = r"
name: demo
requires:
  db:
    interface: postgresql
    limit: 1
peers:
  replicas:
    interface: demo-peers
containers:
  workload:
    resource: workload-image
storage:
  data:
    type: filesystem
    multiple:
      range: 1-3
extra-bindings:
  metrics: null
";

    const CONFIG: &str = r"
options:
  port:
    type: int
    default: 8080
  debug:
    type: boolean
    default: false
  name:
    type: string
";

    const ACTIONS: &str = r"
backup:
  description: take a backup
  params:
    target:
      type: string
      default: /tmp
  required: [target]
  additionalProperties: false
";

    #[test]
    fn parses_descriptors() {
        let spec = CharmSpec::from_yaml(METADATA, Some(CONFIG), Some(ACTIONS)).unwrap();
        assert_eq!(spec.meta.name, "demo");
        assert_eq!(spec.meta.endpoint("db").unwrap().0, EndpointRole::Requires);
        assert_eq!(spec.meta.endpoint("replicas").unwrap().0, EndpointRole::Peers);
        assert!(spec.meta.has_binding("metrics"));
        assert!(!spec.meta.has_binding("nope"));

        let defaults = spec.config.as_ref().unwrap().defaults();
        assert_eq!(defaults.get("port"), Some(&ConfigValue::Int(8080)));
        assert_eq!(defaults.get("debug"), Some(&ConfigValue::Bool(false)));
        assert!(!defaults.contains_key("name"));

        let backup = spec.action("backup").unwrap();
        assert!(!backup.additional_properties);
        assert_eq!(backup.param_type("target"), Some("string"));
        assert_eq!(backup.defaults().get("target"), Some(&Value::from("/tmp")));
    }

    #[test]
    fn storage_ranges() {
        let r = |s: &str| StorageMultiple { range: s.into() }.bounds();
        assert_eq!(r("1-3"), Some((1, Some(3))));
        assert_eq!(r("2"), Some((2, Some(2))));
        assert_eq!(r("1+"), Some((1, None)));
        assert_eq!(r("0-"), Some((0, None)));
        assert_eq!(r("x"), None);
    }

    #[test]
    fn config_types_accept_values() {
        assert!(ConfigType::Float.accepts(&ConfigValue::Int(1)));
        assert!(!ConfigType::Int.accepts(&ConfigValue::Float(1.5)));
        assert!(ConfigType::Secret.accepts(&ConfigValue::String("secret:1".into())));
        assert!(!ConfigType::Boolean.accepts(&ConfigValue::String("true".into())));
    }

    #[test]
    fn autoload_prefers_metadata_then_charmcraft() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().to_path_buf();
        assert!(matches!(CharmSpec::autoload(&dir), Err(MetaError::Missing(_))));

        fs::write(
            dir.join("charmcraft.yaml"),
            "name: unified\nconfig:\n  options:\n    a:\n      type: int\nactions:\n  go: {}\n",
        )
        .unwrap();
        let unified = CharmSpec::autoload(&dir).unwrap();
        assert_eq!(unified.meta.name, "unified");
        assert!(unified.config_option("a").is_some());
        assert!(unified.action("go").is_some());
        assert_eq!(unified.source.as_deref(), Some(dir.as_path()));

        fs::write(dir.join("metadata.yaml"), "name: split\n").unwrap();
        let split = CharmSpec::autoload(&dir).unwrap();
        assert_eq!(split.meta.name, "split");
        assert!(split.config.is_none());
    }

    #[test]
    fn yaml_output_parses_back() {
        let spec = CharmSpec::from_yaml(METADATA, Some(CONFIG), Some(ACTIONS)).unwrap();
        let again = CharmSpec::from_yaml(
            &spec.meta_yaml().unwrap(),
            spec.config_yaml().unwrap().as_deref(),
            spec.actions_yaml().unwrap().as_deref(),
        )
        .unwrap();
        assert_eq!(again, spec);
    }
}
