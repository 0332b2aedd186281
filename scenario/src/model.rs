//! The charm-facing model: a thin, typed layer over [`ModelBackend`].

use std::collections::BTreeMap;

use scenario_state::{ConfigValue, Databag, Port, RelationId, Status};
use serde_json::Value;

use crate::backend::{ModelBackend, PebbleClient};
use crate::error::ModelError;
use crate::recorder::LogLevel;

/// Name of the stored-state object a charm gets by default.
pub const DEFAULT_STORED_STATE: &str = "_stored";

/// The unit's view of its model during one handler call.
pub struct Model<'a> {
    backend: Box<dyn ModelBackend + 'a>,
    owner: &'a str,
}

impl<'a> Model<'a> {
    /// Wraps a backend; `owner` is the framework path stored state lives under.
    #[must_use]
    pub fn new(backend: Box<dyn ModelBackend + 'a>, owner: &'a str) -> Self {
        Self { backend, owner }
    }

    /// `<app>/<unit id>`.
    #[must_use]
    pub fn unit_name(&self) -> String {
        self.backend.unit_name()
    }

    /// The application name.
    #[must_use]
    pub fn app_name(&self) -> String {
        self.backend.app_name()
    }

    /// Whether this unit is the leader.
    #[must_use]
    pub fn is_leader(&self) -> bool {
        self.backend.is_leader()
    }

    /// Effective configuration.
    #[must_use]
    pub fn config(&self) -> BTreeMap<String, ConfigValue> {
        self.backend.config_get()
    }

    /// One configuration value.
    #[must_use]
    pub fn config_value(&self, key: &str) -> Option<ConfigValue> {
        self.config().remove(key)
    }

    /// The unit status.
    ///
    /// # Errors
    ///
    /// Propagates backend failures.
    pub fn unit_status(&self) -> Result<Status, ModelError> {
        self.backend.status_get(false)
    }

    /// Sets the unit status.
    ///
    /// # Errors
    ///
    /// `unknown` and `error` cannot be set by a charm.
    pub fn set_unit_status(&mut self, status: Status) -> Result<(), ModelError> {
        self.backend.status_set(status, false)
    }

    /// The application status.
    ///
    /// # Errors
    ///
    /// Only the leader may read it.
    pub fn app_status(&self) -> Result<Status, ModelError> {
        self.backend.status_get(true)
    }

    /// Sets the application status.
    ///
    /// # Errors
    ///
    /// Only the leader may set it; `unknown` and `error` are refused.
    pub fn set_app_status(&mut self, status: Status) -> Result<(), ModelError> {
        self.backend.status_set(status, true)
    }

    /// `application-version-set`.
    pub fn set_workload_version(&mut self, version: &str) {
        self.backend.application_version_set(version);
    }

    /// Relation ids bound to `endpoint`.
    #[must_use]
    pub fn relation_ids(&self, endpoint: &str) -> Vec<RelationId> {
        self.backend.relation_ids(endpoint)
    }

    /// This unit's databag in relation `id`.
    ///
    /// # Errors
    ///
    /// Unknown relation.
    pub fn local_unit_data(&self, id: RelationId) -> Result<Databag, ModelError> {
        self.backend.relation_get(id, &self.unit_name(), false)
    }

    /// This application's databag in relation `id`.
    ///
    /// # Errors
    ///
    /// Unknown relation, or a non-leader reading a non-peer databag.
    pub fn local_app_data(&self, id: RelationId) -> Result<Databag, ModelError> {
        self.backend.relation_get(id, &self.app_name(), true)
    }

    /// The remote application's databag in relation `id`.
    ///
    /// # Errors
    ///
    /// Unknown relation.
    pub fn remote_app_data(&self, id: RelationId) -> Result<Databag, ModelError> {
        let remote = self.backend.relation_remote_app_name(id)?;
        self.backend.relation_get(id, &remote, true)
    }

    /// A remote unit's databag, `unit` being a full unit name.
    ///
    /// # Errors
    ///
    /// Unknown relation or unit.
    pub fn remote_unit_data(&self, id: RelationId, unit: &str) -> Result<Databag, ModelError> {
        self.backend.relation_get(id, unit, false)
    }

    /// Remote units of relation `id`.
    ///
    /// # Errors
    ///
    /// Unknown relation.
    pub fn relation_units(&self, id: RelationId) -> Result<Vec<String>, ModelError> {
        self.backend.relation_list(id)
    }

    /// Writes one key of the local unit (or, with `app`, application)
    /// databag. An empty value deletes the key.
    ///
    /// # Errors
    ///
    /// Unknown relation, or a non-leader writing application data.
    pub fn set_relation_data(
        &mut self,
        id: RelationId,
        key: &str,
        value: &str,
        app: bool,
    ) -> Result<(), ModelError> {
        self.backend.relation_set(id, key, value, app)
    }

    /// Ports opened by this unit.
    #[must_use]
    pub fn opened_ports(&self) -> Vec<Port> {
        self.backend.opened_ports()
    }

    /// Opens `port`.
    ///
    /// # Errors
    ///
    /// Invalid port number or protocol combination.
    pub fn open_port(&mut self, port: Port) -> Result<(), ModelError> {
        self.backend.open_port(port)
    }

    /// Closes `port`.
    ///
    /// # Errors
    ///
    /// Invalid port number or protocol combination.
    pub fn close_port(&mut self, port: Port) -> Result<(), ModelError> {
        self.backend.close_port(port)
    }

    /// A Pebble client for `container`.
    ///
    /// # Errors
    ///
    /// Unknown container.
    pub fn pebble(&mut self, container: &str) -> Result<Box<dyn PebbleClient + '_>, ModelError> {
        self.backend.pebble(container)
    }

    /// The charm's default stored state.
    #[must_use]
    pub fn stored(&self) -> BTreeMap<String, Value> {
        self.backend.stored_state_get(self.owner, DEFAULT_STORED_STATE)
    }

    /// One key of the default stored state.
    #[must_use]
    pub fn stored_get(&self, key: &str) -> Option<Value> {
        self.stored().remove(key)
    }

    /// Writes one key of the default stored state.
    pub fn stored_set(&mut self, key: &str, value: impl Into<Value>) {
        self.backend
            .stored_state_set(self.owner, DEFAULT_STORED_STATE, key, value.into());
    }

    /// Writes a `juju-log` line.
    pub fn log(&mut self, level: LogLevel, message: &str) {
        self.backend.juju_log(level, message);
    }

    /// The raw hook-tool surface.
    pub fn backend(&mut self) -> &mut (dyn ModelBackend + 'a) {
        &mut *self.backend
    }

    /// The raw hook-tool surface, read-only.
    #[must_use]
    pub fn backend_ref(&self) -> &(dyn ModelBackend + 'a) {
        &*self.backend
    }
}
