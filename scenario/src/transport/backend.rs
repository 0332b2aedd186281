//! Hook commands resolved against the working state.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use scenario_state::{
    ActionEvent, ActionMeta, AnyRelation, CharmSpec, CloudSpec, ConfigValue, Databag, LookupError,
    Network, Port, RelationId, RelationKind, Secret, SecretContent, SecretId, SecretOwner, State,
    Status, StorageIndex, StoredState,
};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::backend::{ModelBackend, NewSecret, PebbleClient, SecretInfo, SecretUpdate};
use crate::config::RuntimeConfig;
use crate::error::ModelError;
use crate::recorder::{IdAllocator, LogLevel, Recorder};
use crate::transport::fs::FsArena;
use crate::transport::pebble::MockPebble;

/// Context-owned pieces every backend of one run shares.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Shared<'a> {
    pub(crate) spec: &'a CharmSpec,
    pub(crate) config: &'a RuntimeConfig,
    pub(crate) app_name: &'a str,
    pub(crate) recorder: &'a RefCell<Recorder>,
    pub(crate) ids: &'a IdAllocator,
    pub(crate) fs: &'a FsArena,
}

/// The action being run, if the event is one.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ActionRun {
    pub(crate) event: ActionEvent,
    pub(crate) failure: Option<String>,
}

impl ActionRun {
    pub(crate) fn new(event: ActionEvent) -> Self {
        Self {
            event,
            failure: None,
        }
    }
}

/// [`ModelBackend`] over the working copy of a [`State`].
pub struct MockBackend<'a> {
    shared: Shared<'a>,
    state: &'a mut State,
    action: Option<&'a mut ActionRun>,
}

impl<'a> MockBackend<'a> {
    pub(crate) fn new(
        shared: Shared<'a>,
        state: &'a mut State,
        action: Option<&'a mut ActionRun>,
    ) -> Self {
        Self {
            shared,
            state,
            action,
        }
    }

    fn relation(&self, id: RelationId) -> Result<&AnyRelation, ModelError> {
        Ok(self.state.get_relation(id)?)
    }

    fn secret_index(&self, id: Option<SecretId>, label: Option<&str>) -> Result<usize, ModelError> {
        let found = match (id, label) {
            (Some(id), _) => self
                .state
                .secrets
                .iter()
                .position(|s| s.id == id)
                .ok_or_else(|| LookupError::new("secret", id)),
            (None, Some(label)) => self
                .state
                .secrets
                .iter()
                .position(|s| s.label.as_deref() == Some(label))
                .ok_or_else(|| LookupError::new("secret", label)),
            (None, None) => return Err(ModelError::invalid("a secret id or label is required")),
        };
        Ok(found?)
    }

    fn managed_secret(&mut self, id: SecretId) -> Result<&mut Secret, ModelError> {
        let index = self.secret_index(Some(id), None)?;
        check_can_manage(&self.state.secrets[index], self.state.leader)?;
        Ok(&mut self.state.secrets[index])
    }

    fn action_run(&self) -> Result<&ActionRun, ModelError> {
        self.action.as_deref().ok_or_else(not_in_action)
    }

    fn declared_storage(&self, name: &str) -> Result<(), ModelError> {
        if self.shared.spec.meta.storage.contains_key(name) {
            Ok(())
        } else {
            Err(LookupError::new("storage", name).into())
        }
    }
}

fn not_in_action() -> ModelError {
    ModelError::invalid("action tools are only available while running an action")
}

fn check_can_manage(secret: &Secret, leader: bool) -> Result<(), ModelError> {
    match secret.owner {
        None => Err(LookupError::new("owned secret", secret.id).into()),
        Some(SecretOwner::App) if !leader => Err(ModelError::denied(format!(
            "application-owned secret {} can only be managed by the leader",
            secret.id
        ))),
        Some(_) => Ok(()),
    }
}

fn remote_unit_id(member: &str) -> Option<u32> {
    member.rsplit_once('/')?.1.parse().ok()
}

impl ModelBackend for MockBackend<'_> {
    fn unit_name(&self) -> String {
        format!("{}/{}", self.shared.app_name, self.shared.config.unit_id)
    }

    fn app_name(&self) -> String {
        self.shared.app_name.to_string()
    }

    fn is_leader(&self) -> bool {
        self.state.leader
    }

    fn config_get(&self) -> BTreeMap<String, ConfigValue> {
        let mut config = self
            .shared
            .spec
            .config
            .as_ref()
            .map(|schema| schema.defaults())
            .unwrap_or_default();
        config.extend(self.state.config.clone());
        config
    }

    fn status_get(&self, app: bool) -> Result<Status, ModelError> {
        if app {
            if !self.state.leader {
                return Err(ModelError::denied("only the leader can read application status"));
            }
            Ok(self.state.app_status.clone())
        } else {
            Ok(self.state.unit_status.clone())
        }
    }

    fn status_set(&mut self, status: Status, app: bool) -> Result<(), ModelError> {
        debug!(tool = "status-set", app, %status);
        if matches!(status, Status::Unknown | Status::Error(_)) {
            return Err(ModelError::invalid(format!(
                "charms cannot set {} status",
                status.name()
            )));
        }
        let mut recorder = self.shared.recorder.borrow_mut();
        if app {
            if !self.state.leader {
                return Err(ModelError::denied("only the leader can set application status"));
            }
            let previous = std::mem::replace(&mut self.state.app_status, status);
            recorder.app_status_history.push(previous);
        } else {
            let previous = std::mem::replace(&mut self.state.unit_status, status);
            recorder.unit_status_history.push(previous);
        }
        Ok(())
    }

    fn application_version_set(&mut self, version: &str) {
        debug!(tool = "application-version-set", version);
        let previous = std::mem::replace(&mut self.state.workload_version, version.to_string());
        self.shared
            .recorder
            .borrow_mut()
            .workload_version_history
            .push(previous);
    }

    fn relation_ids(&self, endpoint: &str) -> Vec<RelationId> {
        self.state
            .get_relations(endpoint)
            .into_iter()
            .map(AnyRelation::id)
            .collect()
    }

    fn relation_list(&self, id: RelationId) -> Result<Vec<String>, ModelError> {
        let relation = self.relation(id)?;
        let app = relation.remote_app_name(self.shared.app_name);
        Ok(relation
            .remote_unit_ids()
            .into_iter()
            .map(|unit| format!("{app}/{unit}"))
            .collect())
    }

    fn relation_remote_app_name(&self, id: RelationId) -> Result<String, ModelError> {
        Ok(self
            .relation(id)?
            .remote_app_name(self.shared.app_name)
            .to_string())
    }

    fn relation_get(
        &self,
        id: RelationId,
        member: &str,
        is_app: bool,
    ) -> Result<Databag, ModelError> {
        debug!(tool = "relation-get", relation = %id, member, is_app);
        let relation = self.relation(id)?;
        if is_app {
            if member == self.shared.app_name {
                if relation.kind() != RelationKind::Peer && !self.state.leader {
                    return Err(ModelError::denied(format!(
                        "relation {id}: only the leader can read its own application databag"
                    )));
                }
                return Ok(relation.local_app_data().clone());
            }
            if member != relation.remote_app_name(self.shared.app_name) {
                return Err(LookupError::new("application", member).into());
            }
            return Ok(relation.remote_app_data().clone());
        }
        if member == self.unit_name() {
            return Ok(relation.local_unit_data().clone());
        }
        remote_unit_id(member)
            .and_then(|unit| relation.remote_unit_data(unit))
            .cloned()
            .ok_or_else(|| LookupError::new("unit", member).into())
    }

    fn relation_set(
        &mut self,
        id: RelationId,
        key: &str,
        value: &str,
        is_app: bool,
    ) -> Result<(), ModelError> {
        debug!(tool = "relation-set", relation = %id, key, is_app);
        if is_app && !self.state.leader {
            return Err(ModelError::denied(format!(
                "relation {id}: only the leader can write application data"
            )));
        }
        let relation = self.state.get_relation_mut(id)?;
        let databag = if is_app {
            relation.local_app_data_mut()
        } else {
            relation.local_unit_data_mut()
        };
        if value.is_empty() {
            databag.remove(key);
        } else {
            databag.insert(key.to_string(), value.to_string());
        }
        Ok(())
    }

    fn opened_ports(&self) -> Vec<Port> {
        self.state.opened_ports.clone()
    }

    fn open_port(&mut self, port: Port) -> Result<(), ModelError> {
        debug!(tool = "open-port", %port);
        port.validate().map_err(ModelError::Invalid)?;
        if !self.state.opened_ports.contains(&port) {
            self.state.opened_ports.push(port);
        }
        Ok(())
    }

    fn close_port(&mut self, port: Port) -> Result<(), ModelError> {
        debug!(tool = "close-port", %port);
        port.validate().map_err(ModelError::Invalid)?;
        self.state.opened_ports.retain(|p| *p != port);
        Ok(())
    }

    fn secret_add(
        &mut self,
        content: SecretContent,
        options: NewSecret,
    ) -> Result<SecretId, ModelError> {
        let owner = options.owner.unwrap_or(SecretOwner::App);
        if owner == SecretOwner::App && !self.state.leader {
            return Err(ModelError::denied("only the leader can add application secrets"));
        }
        let id = self.shared.ids.next_secret();
        debug!(tool = "secret-add", secret = %id);
        let mut secret = Secret::new(id, content).owned_by(owner);
        secret.label = options.label;
        secret.description = options.description;
        secret.expire = options.expire;
        secret.rotate = options.rotate;
        self.state.secrets.push(secret);
        Ok(id)
    }

    fn secret_get(
        &mut self,
        id: Option<SecretId>,
        label: Option<&str>,
        refresh: bool,
        peek: bool,
    ) -> Result<SecretContent, ModelError> {
        debug!(tool = "secret-get", refresh, peek);
        let index = self.secret_index(id, label)?;
        let owners_track = self.shared.config.juju_version.owners_track_revisions();
        let secret = &mut self.state.secrets[index];
        if let (Some(_), Some(label)) = (id, label) {
            secret.label = Some(label.to_string());
        }
        let refresh = refresh || (secret.is_owned() && !owners_track);
        if refresh {
            secret.track_latest_revision();
        }
        Ok(if refresh || peek {
            secret.latest_content.clone()
        } else {
            secret.tracked_content.clone()
        })
    }

    fn secret_info_get(
        &self,
        id: Option<SecretId>,
        label: Option<&str>,
    ) -> Result<SecretInfo, ModelError> {
        let secret = &self.state.secrets[self.secret_index(id, label)?];
        check_can_manage(secret, self.state.leader)?;
        Ok(SecretInfo {
            id: secret.id,
            label: secret.label.clone(),
            revision: secret.latest_revision,
            expires: secret.expire,
            rotation: secret.rotate,
            description: secret.description.clone(),
        })
    }

    fn secret_set(&mut self, id: SecretId, update: SecretUpdate) -> Result<(), ModelError> {
        debug!(tool = "secret-set", secret = %id);
        let secret = self.managed_secret(id)?;
        if let Some(content) = update.content {
            secret.publish_revision(content);
        }
        if update.label.is_some() {
            secret.label = update.label;
        }
        if update.description.is_some() {
            secret.description = update.description;
        }
        if update.expire.is_some() {
            secret.expire = update.expire;
        }
        if update.rotate.is_some() {
            secret.rotate = update.rotate;
        }
        Ok(())
    }

    fn secret_grant(
        &mut self,
        id: SecretId,
        relation: RelationId,
        unit: Option<&str>,
    ) -> Result<(), ModelError> {
        debug!(tool = "secret-grant", secret = %id, relation = %relation);
        let grantee = match unit {
            Some(unit) => unit.to_string(),
            None => self.relation_remote_app_name(relation)?,
        };
        let secret = self.managed_secret(id)?;
        secret
            .remote_grants
            .entry(relation)
            .or_insert_with(BTreeSet::new)
            .insert(grantee);
        Ok(())
    }

    fn secret_revoke(
        &mut self,
        id: SecretId,
        relation: RelationId,
        unit: Option<&str>,
    ) -> Result<(), ModelError> {
        debug!(tool = "secret-revoke", secret = %id, relation = %relation);
        let grantee = match unit {
            Some(unit) => unit.to_string(),
            None => self.relation_remote_app_name(relation)?,
        };
        let secret = self.managed_secret(id)?;
        if let Some(grantees) = secret.remote_grants.get_mut(&relation) {
            grantees.remove(&grantee);
            if grantees.is_empty() {
                secret.remote_grants.remove(&relation);
            }
        }
        Ok(())
    }

    fn secret_remove(&mut self, id: SecretId, revision: Option<u32>) -> Result<(), ModelError> {
        debug!(tool = "secret-remove", secret = %id, ?revision);
        let latest = self.managed_secret(id)?.latest_revision;
        match revision {
            Some(revision) if revision == 0 || revision > latest => {
                return Err(ModelError::invalid(format!(
                    "secret {id} has no revision {revision} (latest is {latest})"
                )));
            }
            Some(revision) => self
                .shared
                .recorder
                .borrow_mut()
                .removed_secret_revisions
                .push(revision),
            None => self.state.secrets.retain(|s| s.id != id),
        }
        Ok(())
    }

    fn storage_list(&self, name: &str) -> Result<Vec<StorageIndex>, ModelError> {
        self.declared_storage(name)?;
        Ok(self
            .state
            .storages
            .iter()
            .filter(|s| s.name == name)
            .map(|s| s.index)
            .collect())
    }

    fn storage_get(&self, name: &str, index: StorageIndex) -> Result<PathBuf, ModelError> {
        let storage = self.state.get_storage(name, index)?;
        self.shared
            .fs
            .storage_root(storage)
            .map_err(|source| ModelError::Io {
                path: storage.storage_id(),
                source,
            })
    }

    fn storage_add(&mut self, name: &str, count: u32) -> Result<(), ModelError> {
        debug!(tool = "storage-add", name, count);
        self.declared_storage(name)?;
        *self
            .shared
            .recorder
            .borrow_mut()
            .requested_storages
            .entry(name.to_string())
            .or_default() += count;
        Ok(())
    }

    fn network_get(&self, binding: &str) -> Result<Network, ModelError> {
        if !self.shared.spec.meta.has_binding(binding) {
            return Err(LookupError::new("binding", binding).into());
        }
        Ok(self
            .state
            .get_network(binding)
            .cloned()
            .unwrap_or_else(|_| Network::default_for(binding)))
    }

    fn resource_get(&self, name: &str) -> Result<PathBuf, ModelError> {
        Ok(self.state.get_resource(name)?.path.clone())
    }

    fn credential_get(&self) -> Result<CloudSpec, ModelError> {
        if !self.shared.config.app_trusted {
            return Err(ModelError::denied(
                "credential-get needs the application to be deployed with --trust",
            ));
        }
        self.state
            .model
            .cloud_spec
            .clone()
            .ok_or_else(|| LookupError::new("cloud spec", &self.state.model.name).into())
    }

    fn planned_units(&self) -> u32 {
        self.state.planned_units
    }

    fn stored_state_get(&self, owner: &str, name: &str) -> BTreeMap<String, Value> {
        self.state
            .get_stored_state(Some(owner), name)
            .map(|s| s.content.clone())
            .unwrap_or_default()
    }

    fn stored_state_set(&mut self, owner: &str, name: &str, key: &str, value: Value) {
        debug!(tool = "state-set", owner, name, key);
        let stored = &mut self.state.stored_states;
        let index = match stored
            .iter()
            .position(|s| s.owner_path.as_deref() == Some(owner) && s.name == name)
        {
            Some(index) => index,
            None => {
                stored.push(StoredState::new(owner).named(name));
                stored.len() - 1
            }
        };
        stored[index].content.insert(key.to_string(), value);
    }

    fn action_get(&self) -> Result<BTreeMap<String, Value>, ModelError> {
        let run = self.action_run()?;
        let mut params = self
            .shared
            .spec
            .action(&run.event.name)
            .map(ActionMeta::defaults)
            .unwrap_or_default();
        params.extend(run.event.params.clone());
        Ok(params)
    }

    fn action_set(&mut self, results: BTreeMap<String, Value>) -> Result<(), ModelError> {
        self.action_run()?;
        self.shared
            .recorder
            .borrow_mut()
            .action_results
            .get_or_insert_with(BTreeMap::new)
            .extend(results);
        Ok(())
    }

    fn action_log(&mut self, message: &str) -> Result<(), ModelError> {
        self.action_run()?;
        self.shared
            .recorder
            .borrow_mut()
            .action_logs
            .push(message.to_string());
        Ok(())
    }

    fn action_fail(&mut self, message: &str) -> Result<(), ModelError> {
        let run = self.action.as_deref_mut().ok_or_else(not_in_action)?;
        run.failure = Some(message.to_string());
        Ok(())
    }

    fn juju_log(&mut self, level: LogLevel, message: &str) {
        match level {
            LogLevel::Debug => debug!(target: "juju_log", "{message}"),
            LogLevel::Info => info!(target: "juju_log", "{message}"),
            LogLevel::Warning => warn!(target: "juju_log", "{message}"),
            LogLevel::Error | LogLevel::Critical => error!(target: "juju_log", "{message}"),
        }
        self.shared.recorder.borrow_mut().log(level, message);
    }

    fn pebble(&mut self, container: &str) -> Result<Box<dyn PebbleClient + '_>, ModelError> {
        let container = self.state.get_container_mut(container)?;
        Ok(Box::new(MockPebble::new(
            container,
            self.shared.fs,
            self.shared.recorder,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use scenario_state::{
        CharmMeta, ConfigOption, ConfigSchema, ConfigType, JujuVersion, PeerRelation, Relation,
        RelationMeta, Storage, StorageMeta,
    };

    struct Fixture {
        spec: CharmSpec,
        config: RuntimeConfig,
        recorder: RefCell<Recorder>,
        ids: IdAllocator,
        fs: FsArena,
    }

    impl Fixture {
        fn new() -> Self {
            let mut meta = CharmMeta::new("demo");
            meta.requires.insert(
                "db".into(),
                RelationMeta {
                    interface: "pg".into(),
                    limit: None,
                    scope: Default::default(),
                    optional: false,
                },
            );
            meta.storage.insert("data".into(), StorageMeta::default());
            let mut options = BTreeMap::new();
            options.insert(
                "port".to_string(),
                ConfigOption {
                    option_type: ConfigType::Int,
                    default: Some(ConfigValue::Int(80)),
                    description: None,
                },
            );
            Self {
                spec: CharmSpec::new(meta).with_config(ConfigSchema { options }),
                config: RuntimeConfig::default(),
                recorder: RefCell::default(),
                ids: IdAllocator::default(),
                fs: FsArena::default(),
            }
        }

        fn shared(&self) -> Shared<'_> {
            Shared {
                spec: &self.spec,
                config: &self.config,
                app_name: "demo",
                recorder: &self.recorder,
                ids: &self.ids,
                fs: &self.fs,
            }
        }
    }

    #[test]
    fn config_overlays_defaults() {
        let fx = Fixture::new();
        let mut state = State::new().with_config("debug", true);
        let backend = MockBackend::new(fx.shared(), &mut state, None);
        let config = backend.config_get();
        assert_eq!(config.get("port"), Some(&ConfigValue::Int(80)));
        assert_eq!(config.get("debug"), Some(&ConfigValue::Bool(true)));
    }

    #[test]
    fn app_status_needs_leadership() {
        let fx = Fixture::new();
        let mut state = State::new();
        let mut backend = MockBackend::new(fx.shared(), &mut state, None);
        let err = backend.status_set(Status::active("x"), true).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Authorization);
        backend.status_set(Status::active("x"), false).unwrap();
        assert_eq!(state.unit_status, Status::active("x"));
        assert_eq!(fx.recorder.borrow().unit_status_history, [Status::Unknown]);
    }

    #[test]
    fn relation_writes_follow_role() {
        let fx = Fixture::new();
        let mut state = State::new().with_relation(Relation::new(RelationId(1), "db"));
        let mut backend = MockBackend::new(fx.shared(), &mut state, None);
        backend.relation_set(RelationId(1), "a", "1", false).unwrap();
        let err = backend.relation_set(RelationId(1), "a", "1", true).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Authorization);
        let err = backend.relation_get(RelationId(1), "demo", true).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Authorization);
        backend.relation_set(RelationId(1), "a", "", false).unwrap();
        let local = state.get_relation(RelationId(1)).unwrap().local_unit_data();
        assert!(!local.contains_key("a"));
    }

    #[test]
    fn peers_read_their_app_databag_without_leadership() {
        let fx = Fixture::new();
        let mut state = State::new().with_relation(
            PeerRelation::new(RelationId(4), "peers").with_local_app_data([("k", "v")]),
        );
        let backend = MockBackend::new(fx.shared(), &mut state, None);
        let data = backend.relation_get(RelationId(4), "demo", true).unwrap();
        assert_eq!(data.get("k").map(String::as_str), Some("v"));
        assert_eq!(backend.relation_list(RelationId(4)).unwrap(), ["demo/1"]);
    }

    #[test]
    fn unknown_relation_is_a_lookup_error() {
        let fx = Fixture::new();
        let mut state = State::new();
        let backend = MockBackend::new(fx.shared(), &mut state, None);
        let err = backend.relation_list(RelationId(9)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Lookup);
    }

    #[test]
    fn secret_owners_and_revisions() {
        let fx = Fixture::new();
        let mut state = State::new();
        let mut backend = MockBackend::new(fx.shared(), &mut state, None);
        let content = SecretContent::from([("k".to_string(), "v".to_string())]);
        let err = backend
            .secret_add(content.clone(), NewSecret::default())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Authorization);
        let unit_owned = NewSecret {
            owner: Some(SecretOwner::Unit),
            label: Some("mine".into()),
            ..NewSecret::default()
        };
        let id = backend.secret_add(content, unit_owned).unwrap();
        let update = SecretUpdate {
            content: Some(SecretContent::from([("k".to_string(), "w".to_string())])),
            ..SecretUpdate::default()
        };
        backend.secret_set(id, update).unwrap();
        assert_eq!(backend.secret_info_get(None, Some("mine")).unwrap().revision, 2);
        backend.secret_remove(id, Some(1)).unwrap();
        assert_eq!(fx.recorder.borrow().removed_secret_revisions, [1]);
        for missing in [0, 3] {
            let err = backend.secret_remove(id, Some(missing)).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        }
        assert_eq!(fx.recorder.borrow().removed_secret_revisions, [1]);
        backend.secret_remove(id, None).unwrap();
        assert!(state.secrets.is_empty());
    }

    #[test]
    fn old_juju_owners_always_see_latest() {
        let mut fx = Fixture::new();
        fx.config.juju_version = JujuVersion::new(3, 1, 6);
        let v1 = SecretContent::from([("k".to_string(), "1".to_string())]);
        let v2 = SecretContent::from([("k".to_string(), "2".to_string())]);
        let secret = Secret::new(SecretId(1), v1)
            .owned_by(SecretOwner::Unit)
            .with_latest(v2.clone());
        let mut state = State::new().with_secret(secret);
        let mut backend = MockBackend::new(fx.shared(), &mut state, None);
        assert_eq!(backend.secret_get(Some(SecretId(1)), None, false, false).unwrap(), v2);
        assert_eq!(state.secrets[0].tracked_revision, 2);
    }

    #[test]
    fn storage_tools() {
        let fx = Fixture::new();
        let mut state = State::new().with_storage(Storage::new("data", 0));
        let mut backend = MockBackend::new(fx.shared(), &mut state, None);
        assert_eq!(backend.storage_list("data").unwrap(), [0]);
        assert!(backend.storage_get("data", 0).unwrap().is_dir());
        backend.storage_add("data", 2).unwrap();
        assert!(backend.storage_add("logs", 1).is_err());
        assert_eq!(fx.recorder.borrow().requested_storages.get("data"), Some(&2));
    }

    #[test]
    fn action_tools_outside_actions_fail() {
        let fx = Fixture::new();
        let mut state = State::new();
        let mut backend = MockBackend::new(fx.shared(), &mut state, None);
        assert_eq!(backend.action_get().unwrap_err().kind(), ErrorKind::InvalidArgument);
        assert!(backend.action_fail("nope").is_err());
    }

    #[test]
    fn credentials_need_trust() {
        let fx = Fixture::new();
        let mut state = State::new();
        let backend = MockBackend::new(fx.shared(), &mut state, None);
        assert_eq!(backend.credential_get().unwrap_err().kind(), ErrorKind::Authorization);
    }

    #[test]
    fn stored_state_round_trip() {
        let fx = Fixture::new();
        let mut state = State::new();
        let mut backend = MockBackend::new(fx.shared(), &mut state, None);
        backend.stored_state_set("Demo", "_stored", "count", Value::from(3));
        assert_eq!(
            backend.stored_state_get("Demo", "_stored").get("count"),
            Some(&Value::from(3))
        );
        assert_eq!(state.stored_states.len(), 1);
    }
}
