//! Framework-persisted charm state.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The key/value cache a charm object persists between hooks.
///
/// Identity is `(owner_path, name)`: `owner_path` is the framework path of the
/// owning object (`None` for the framework itself), `name` its attribute name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredState {
    /// Owner path, e.g. `MyCharm`.
    #[serde(default)]
    pub owner_path: Option<String>,
    /// Attribute name.
    #[serde(default = "default_name")]
    pub name: String,
    /// Persisted content.
    #[serde(default)]
    pub content: BTreeMap<String, Value>,
}

fn default_name() -> String {
    "_stored".to_string()
}

impl StoredState {
    /// Empty stored state `_stored` owned by `owner_path`.
    pub fn new(owner_path: impl Into<String>) -> Self {
        Self {
            owner_path: Some(owner_path.into()),
            name: default_name(),
            content: BTreeMap::new(),
        }
    }

    /// Sets the attribute name.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets one content entry.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.content.insert(key.into(), value.into());
        self
    }

    /// Framework handle path, `owner/StoredStateData[name]`.
    #[must_use]
    pub fn handle_path(&self) -> String {
        match &self.owner_path {
            Some(owner) => format!("{owner}/StoredStateData[{}]", self.name),
            None => format!("StoredStateData[{}]", self.name),
        }
    }
}
