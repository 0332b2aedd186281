//! The root snapshot.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::container::Container;
use crate::deferred::DeferredEvent;
use crate::error::LookupError;
use crate::ids::{RelationId, SecretId, StorageIndex};
use crate::model_info::ModelInfo;
use crate::network::{Network, Port};
use crate::relation::AnyRelation;
use crate::secret::Secret;
use crate::status::Status;
use crate::storage::{Resource, Storage};
use crate::stored::StoredState;

/// A charm config value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    /// `boolean`
    Bool(bool),
    /// `int`
    Int(i64),
    /// `float`
    Float(f64),
    /// `string` or `secret`
    String(String),
}

impl ConfigValue {
    /// The value as JSON, the shape `config-get` returns.
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            ConfigValue::Bool(b) => Value::from(*b),
            ConfigValue::Int(i) => Value::from(*i),
            ConfigValue::Float(f) => Value::from(*f),
            ConfigValue::String(s) => Value::from(s.clone()),
        }
    }

    /// The string payload, if this is a string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConfigValue::String(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigValue::Bool(b) => write!(f, "{b}"),
            ConfigValue::Int(i) => write!(f, "{i}"),
            ConfigValue::Float(x) => write!(f, "{x}"),
            ConfigValue::String(s) => f.write_str(s),
        }
    }
}

impl From<bool> for ConfigValue {
    fn from(v: bool) -> Self {
        ConfigValue::Bool(v)
    }
}

impl From<i64> for ConfigValue {
    fn from(v: i64) -> Self {
        ConfigValue::Int(v)
    }
}

impl From<i32> for ConfigValue {
    fn from(v: i32) -> Self {
        ConfigValue::Int(v.into())
    }
}

impl From<f64> for ConfigValue {
    fn from(v: f64) -> Self {
        ConfigValue::Float(v)
    }
}

impl From<&str> for ConfigValue {
    fn from(v: &str) -> Self {
        ConfigValue::String(v.to_string())
    }
}

impl From<String> for ConfigValue {
    fn from(v: String) -> Self {
        ConfigValue::String(v)
    }
}

/// Everything Juju and Pebble would tell the unit about its world.
///
/// A `State` is a plain value: cloning it yields an independent copy, and
/// the engine never hands out references into its working copy. Collections
/// without a meaningful order compare as multisets; `deferred` compares in
/// order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct State {
    /// Charm config, key to value.
    #[serde(default)]
    pub config: BTreeMap<String, ConfigValue>,
    /// Relations of every kind.
    #[serde(default)]
    pub relations: Vec<AnyRelation>,
    /// Explicit network bindings; missing ones get [`Network::default_for`].
    #[serde(default)]
    pub networks: Vec<Network>,
    /// Workload containers.
    #[serde(default)]
    pub containers: Vec<Container>,
    /// Attached storage.
    #[serde(default)]
    pub storages: Vec<Storage>,
    /// Ports the unit has opened.
    #[serde(default)]
    pub opened_ports: Vec<Port>,
    /// Whether this unit is the leader.
    #[serde(default)]
    pub leader: bool,
    /// The model.
    #[serde(default)]
    pub model: ModelInfo,
    /// Secrets visible to the unit.
    #[serde(default)]
    pub secrets: Vec<Secret>,
    /// Resources on disk.
    #[serde(default)]
    pub resources: Vec<Resource>,
    /// Number of units Juju plans for the application.
    #[serde(default = "one")]
    pub planned_units: u32,
    /// Deferred events, in the order they will be re-emitted.
    #[serde(default)]
    pub deferred: Vec<DeferredEvent>,
    /// Persisted charm state.
    #[serde(default)]
    pub stored_states: Vec<StoredState>,
    /// Application status.
    #[serde(default)]
    pub app_status: Status,
    /// Unit status.
    #[serde(default)]
    pub unit_status: Status,
    /// Workload version.
    #[serde(default)]
    pub workload_version: String,
}

fn one() -> u32 {
    1
}

impl Default for State {
    fn default() -> Self {
        Self {
            config: BTreeMap::new(),
            relations: Vec::new(),
            networks: Vec::new(),
            containers: Vec::new(),
            storages: Vec::new(),
            opened_ports: Vec::new(),
            leader: false,
            model: ModelInfo::default(),
            secrets: Vec::new(),
            resources: Vec::new(),
            planned_units: 1,
            deferred: Vec::new(),
            stored_states: Vec::new(),
            app_status: Status::Unknown,
            unit_status: Status::Unknown,
            workload_version: String::new(),
        }
    }
}

fn same_members<T: PartialEq>(a: &[T], b: &[T]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut used = vec![false; b.len()];
    a.iter().all(|x| {
        let hit = b
            .iter()
            .enumerate()
            .find(|(i, y)| !used[*i] && *y == x)
            .map(|(i, _)| i);
        match hit {
            Some(i) => {
                used[i] = true;
                true
            }
            None => false,
        }
    })
}

impl PartialEq for State {
    fn eq(&self, other: &Self) -> bool {
        self.config == other.config
            && same_members(&self.relations, &other.relations)
            && same_members(&self.networks, &other.networks)
            && same_members(&self.containers, &other.containers)
            && same_members(&self.storages, &other.storages)
            && same_members(&self.opened_ports, &other.opened_ports)
            && self.leader == other.leader
            && self.model == other.model
            && same_members(&self.secrets, &other.secrets)
            && same_members(&self.resources, &other.resources)
            && self.planned_units == other.planned_units
            && self.deferred == other.deferred
            && same_members(&self.stored_states, &other.stored_states)
            && self.app_status == other.app_status
            && self.unit_status == other.unit_status
            && self.workload_version == other.workload_version
    }
}

impl State {
    /// An empty, non-leader state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets leadership.
    #[must_use]
    pub fn with_leader(mut self, leader: bool) -> Self {
        self.leader = leader;
        self
    }

    /// Sets one config value.
    #[must_use]
    pub fn with_config(mut self, key: impl Into<String>, value: impl Into<ConfigValue>) -> Self {
        self.config.insert(key.into(), value.into());
        self
    }

    /// Adds a relation.
    #[must_use]
    pub fn with_relation(mut self, relation: impl Into<AnyRelation>) -> Self {
        self.relations.push(relation.into());
        self
    }

    /// Adds a container.
    #[must_use]
    pub fn with_container(mut self, container: Container) -> Self {
        self.containers.push(container);
        self
    }

    /// Adds a secret.
    #[must_use]
    pub fn with_secret(mut self, secret: Secret) -> Self {
        self.secrets.push(secret);
        self
    }

    /// Adds a storage instance.
    #[must_use]
    pub fn with_storage(mut self, storage: Storage) -> Self {
        self.storages.push(storage);
        self
    }

    /// Adds a network binding.
    #[must_use]
    pub fn with_network(mut self, network: Network) -> Self {
        self.networks.push(network);
        self
    }

    /// Adds an opened port.
    #[must_use]
    pub fn with_opened_port(mut self, port: Port) -> Self {
        self.opened_ports.push(port);
        self
    }

    /// Adds a resource.
    #[must_use]
    pub fn with_resource(mut self, resource: Resource) -> Self {
        self.resources.push(resource);
        self
    }

    /// Adds a stored state.
    #[must_use]
    pub fn with_stored_state(mut self, stored: StoredState) -> Self {
        self.stored_states.push(stored);
        self
    }

    /// Appends a deferred event.
    #[must_use]
    pub fn with_deferred(mut self, deferred: DeferredEvent) -> Self {
        self.deferred.push(deferred);
        self
    }

    /// Sets the unit status.
    #[must_use]
    pub fn with_unit_status(mut self, status: Status) -> Self {
        self.unit_status = status;
        self
    }

    /// Sets the application status.
    #[must_use]
    pub fn with_app_status(mut self, status: Status) -> Self {
        self.app_status = status;
        self
    }

    /// Sets the workload version.
    #[must_use]
    pub fn with_workload_version(mut self, version: impl Into<String>) -> Self {
        self.workload_version = version.into();
        self
    }

    /// Sets the model.
    #[must_use]
    pub fn with_model(mut self, model: ModelInfo) -> Self {
        self.model = model;
        self
    }

    /// Sets the planned unit count.
    #[must_use]
    pub fn with_planned_units(mut self, n: u32) -> Self {
        self.planned_units = n;
        self
    }

    /// The relation with `id`.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError`] if no relation has that id.
    pub fn get_relation(&self, id: RelationId) -> Result<&AnyRelation, LookupError> {
        self.relations
            .iter()
            .find(|r| r.id() == id)
            .ok_or_else(|| LookupError::new("relation", id))
    }

    /// Mutable access to the relation with `id`.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError`] if no relation has that id.
    pub fn get_relation_mut(&mut self, id: RelationId) -> Result<&mut AnyRelation, LookupError> {
        self.relations
            .iter_mut()
            .find(|r| r.id() == id)
            .ok_or_else(|| LookupError::new("relation", id))
    }

    /// All relations on `endpoint`, possibly none.
    #[must_use]
    pub fn get_relations(&self, endpoint: &str) -> Vec<&AnyRelation> {
        self.relations
            .iter()
            .filter(|r| r.endpoint() == endpoint)
            .collect()
    }

    /// The container called `name`.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError`] if there is no such container.
    pub fn get_container(&self, name: &str) -> Result<&Container, LookupError> {
        self.containers
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| LookupError::new("container", name))
    }

    /// Mutable access to the container called `name`.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError`] if there is no such container.
    pub fn get_container_mut(&mut self, name: &str) -> Result<&mut Container, LookupError> {
        self.containers
            .iter_mut()
            .find(|c| c.name == name)
            .ok_or_else(|| LookupError::new("container", name))
    }

    /// The secret with `id`.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError`] if the unit cannot see that secret.
    pub fn get_secret(&self, id: SecretId) -> Result<&Secret, LookupError> {
        self.secrets
            .iter()
            .find(|s| s.id == id)
            .ok_or_else(|| LookupError::new("secret", id))
    }

    /// Mutable access to the secret with `id`.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError`] if the unit cannot see that secret.
    pub fn get_secret_mut(&mut self, id: SecretId) -> Result<&mut Secret, LookupError> {
        self.secrets
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| LookupError::new("secret", id))
    }

    /// The secret labelled `label`.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError`] if no visible secret carries that label.
    pub fn get_secret_by_label(&self, label: &str) -> Result<&Secret, LookupError> {
        self.secrets
            .iter()
            .find(|s| s.label.as_deref() == Some(label))
            .ok_or_else(|| LookupError::new("secret label", label))
    }

    /// The storage instance `name/index`.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError`] if it is not attached.
    pub fn get_storage(&self, name: &str, index: StorageIndex) -> Result<&Storage, LookupError> {
        self.storages
            .iter()
            .find(|s| s.name == name && s.index == index)
            .ok_or_else(|| LookupError::new("storage", format!("{name}/{index}")))
    }

    /// The explicit network for `binding`.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError`] if the state has no entry for it.
    pub fn get_network(&self, binding: &str) -> Result<&Network, LookupError> {
        self.networks
            .iter()
            .find(|n| n.binding_name == binding)
            .ok_or_else(|| LookupError::new("network", binding))
    }

    /// The stored state `name` owned by `owner_path`.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError`] if there is none.
    pub fn get_stored_state(
        &self,
        owner_path: Option<&str>,
        name: &str,
    ) -> Result<&StoredState, LookupError> {
        self.stored_states
            .iter()
            .find(|s| s.owner_path.as_deref() == owner_path && s.name == name)
            .ok_or_else(|| {
                LookupError::new("stored state", format!("{}/{name}", owner_path.unwrap_or("")))
            })
    }

    /// The resource called `name`.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError`] if there is none.
    pub fn get_resource(&self, name: &str) -> Result<&Resource, LookupError> {
        self.resources
            .iter()
            .find(|r| r.name == name)
            .ok_or_else(|| LookupError::new("resource", name))
    }
}
