//! The test harness: one charm, its metadata, and the histories of every
//! run fired through it.

use std::cell::{Ref, RefCell};
use std::collections::BTreeMap;
use std::io;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use scenario_state::{
    ActionEvent, AnyRelation, CharmSpec, Container, CustomEvent, Event, JujuVersion, Notice,
    PeerRelation, Relation, RelationEventKind, Secret, SecretContent, SecretEventKind,
    State, Storage, StorageEventKind, SubordinateRelation,
};
use serde_json::Value;
use tracing::debug;

use crate::charm::Charm;
use crate::config::RuntimeConfig;
use crate::dispatch::Session;
use crate::error::ScenarioError;
use crate::manager::Manager;
use crate::recorder::{EmittedEvent, ExecArgs, IdAllocator, JujuLogLine, Recorder};
use crate::transport::backend::Shared;
use crate::transport::FsArena;

/// Runs events against charm `C` and keeps what each run recorded.
///
/// Histories accumulate across runs; ids handed out by the factories are
/// unique for the lifetime of the context.
pub struct Context<C: Charm> {
    spec: CharmSpec,
    config: RuntimeConfig,
    app_name: String,
    ids: IdAllocator,
    recorder: RefCell<Recorder>,
    fs: FsArena,
    _charm: PhantomData<fn() -> C>,
}

impl<C: Charm> Context<C> {
    /// A context for `spec`, configured from the environment.
    #[must_use]
    pub fn new(spec: CharmSpec) -> Self {
        Self::from_parts(spec, RuntimeConfig::from_env())
    }

    /// Starts a builder configured from the environment.
    #[must_use]
    pub fn builder() -> ContextBuilder<C> {
        ContextBuilder {
            spec: None,
            config: RuntimeConfig::from_env(),
            _charm: PhantomData,
        }
    }

    fn from_parts(spec: CharmSpec, config: RuntimeConfig) -> Self {
        let app_name = config
            .app_name
            .clone()
            .unwrap_or_else(|| spec.meta.name.clone());
        Self {
            spec,
            config,
            app_name,
            ids: IdAllocator::default(),
            recorder: RefCell::new(Recorder::default()),
            fs: FsArena::default(),
            _charm: PhantomData,
        }
    }

    /// Charm metadata.
    #[must_use]
    pub fn spec(&self) -> &CharmSpec {
        &self.spec
    }

    /// Runtime settings.
    #[must_use]
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// The application name.
    #[must_use]
    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    /// `<app>/<unit id>`.
    #[must_use]
    pub fn unit_name(&self) -> String {
        format!("{}/{}", self.app_name, self.config.unit_id)
    }

    fn shared(&self) -> Shared<'_> {
        Shared {
            spec: &self.spec,
            config: &self.config,
            app_name: &self.app_name,
            recorder: &self.recorder,
            ids: &self.ids,
            fs: &self.fs,
        }
    }

    /// Sets the charm up against a copy of `state` without firing `event`.
    ///
    /// # Errors
    ///
    /// The scenario is inconsistent, the charm root cannot be prepared, the
    /// hook environment does not decode, or the charm fails to initialise.
    pub fn manager(&self, event: Event, state: &State) -> Result<Manager<'_, C>, ScenarioError> {
        debug!(event = %event, "preparing run");
        Ok(Manager::new(Session::start(self.shared(), event, state)?))
    }

    /// Fires `event` against a copy of `state` and returns the new state.
    /// `state` itself is never modified.
    ///
    /// # Errors
    ///
    /// See [`ScenarioError`]: inconsistent input, charm errors (with the
    /// partial state) and failed actions (with the resulting state).
    pub fn run(&self, event: Event, state: &State) -> Result<State, ScenarioError> {
        self.manager(event, state)?.run()
    }

    /// Event constructors that draw ids from this context.
    #[must_use]
    pub fn on(&self) -> EventFactory<'_> {
        EventFactory { ids: &self.ids }
    }

    /// A regular relation with a fresh id.
    #[must_use]
    pub fn relation(&self, endpoint: &str) -> Relation {
        Relation::new(self.ids.next_relation(), endpoint)
    }

    /// A peer relation with a fresh id.
    #[must_use]
    pub fn peer_relation(&self, endpoint: &str) -> PeerRelation {
        PeerRelation::new(self.ids.next_relation(), endpoint)
    }

    /// A subordinate relation with a fresh id.
    #[must_use]
    pub fn subordinate_relation(&self, endpoint: &str) -> SubordinateRelation {
        SubordinateRelation::new(self.ids.next_relation(), endpoint)
    }

    /// A secret with a fresh id and `content` as revision 1.
    #[must_use]
    pub fn secret(&self, content: SecretContent) -> Secret {
        Secret::new(self.ids.next_secret(), content)
    }

    /// A storage instance with a fresh index.
    #[must_use]
    pub fn storage(&self, name: &str) -> Storage {
        Storage::new(name, self.ids.next_storage_index())
    }

    /// A Pebble notice with a fresh id.
    #[must_use]
    pub fn notice(&self, key: &str) -> Notice {
        Notice::new(self.ids.next_notice(), key)
    }

    /// The host directory standing in for `container`'s filesystem root.
    /// Files placed here are visible to the charm through Pebble.
    ///
    /// # Errors
    ///
    /// The directory cannot be created.
    pub fn container_root(&self, container: &str) -> io::Result<PathBuf> {
        self.fs.container_root(container)
    }

    /// The host directory backing `storage`.
    ///
    /// # Errors
    ///
    /// The directory cannot be created.
    pub fn storage_root(&self, storage: &Storage) -> io::Result<PathBuf> {
        self.fs.storage_root(storage)
    }

    /// Everything recorded so far.
    ///
    /// # Panics
    ///
    /// Never while no run is in progress; runs borrow the recorder only
    /// inside hook commands.
    #[must_use]
    pub fn recorder(&self) -> Ref<'_, Recorder> {
        self.recorder.borrow()
    }

    /// `juju-log` lines.
    #[must_use]
    pub fn juju_log(&self) -> Vec<JujuLogLine> {
        self.recorder().juju_log.clone()
    }

    /// Previous unit statuses, oldest first.
    #[must_use]
    pub fn unit_status_history(&self) -> Vec<scenario_state::Status> {
        self.recorder().unit_status_history.clone()
    }

    /// Previous application statuses, oldest first.
    #[must_use]
    pub fn app_status_history(&self) -> Vec<scenario_state::Status> {
        self.recorder().app_status_history.clone()
    }

    /// Previous workload versions, oldest first.
    #[must_use]
    pub fn workload_version_history(&self) -> Vec<String> {
        self.recorder().workload_version_history.clone()
    }

    /// Emitted events, in emission order.
    #[must_use]
    pub fn emitted_events(&self) -> Vec<EmittedEvent> {
        self.recorder().emitted_events.clone()
    }

    /// Commands run per container.
    #[must_use]
    pub fn exec_history(&self, container: &str) -> Vec<ExecArgs> {
        self.recorder()
            .exec_history
            .get(container)
            .cloned()
            .unwrap_or_default()
    }

    /// Storage requested with `storage-add`, by name.
    #[must_use]
    pub fn requested_storages(&self) -> BTreeMap<String, u32> {
        self.recorder().requested_storages.clone()
    }

    /// Secret revisions removed by number.
    #[must_use]
    pub fn removed_secret_revisions(&self) -> Vec<u32> {
        self.recorder().removed_secret_revisions.clone()
    }

    /// Action log messages.
    #[must_use]
    pub fn action_logs(&self) -> Vec<String> {
        self.recorder().action_logs.clone()
    }

    /// Results of the last action run, if it set any.
    #[must_use]
    pub fn action_results(&self) -> Option<BTreeMap<String, Value>> {
        self.recorder().action_results.clone()
    }
}

/// Builder for [`Context`].
pub struct ContextBuilder<C: Charm> {
    spec: Option<CharmSpec>,
    config: RuntimeConfig,
    _charm: PhantomData<fn() -> C>,
}

impl<C: Charm> ContextBuilder<C> {
    /// Uses `spec` instead of the charm's embedded or on-disk metadata.
    #[must_use]
    pub fn spec(mut self, spec: CharmSpec) -> Self {
        self.spec = Some(spec);
        self
    }

    /// Replaces all runtime settings.
    #[must_use]
    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    /// Juju version to simulate.
    #[must_use]
    pub fn juju_version(mut self, version: JujuVersion) -> Self {
        self.config.juju_version = version;
        self
    }

    /// Application name.
    #[must_use]
    pub fn app_name(mut self, name: impl Into<String>) -> Self {
        self.config.app_name = Some(name.into());
        self
    }

    /// This unit's number.
    #[must_use]
    pub fn unit_id(mut self, id: u32) -> Self {
        self.config.unit_id = id;
        self
    }

    /// Whether the application is trusted.
    #[must_use]
    pub fn app_trusted(mut self, trusted: bool) -> Self {
        self.config.app_trusted = trusted;
        self
    }

    /// Record re-emitted deferred events.
    #[must_use]
    pub fn capture_deferred_events(mut self, capture: bool) -> Self {
        self.config.capture_deferred_events = capture;
        self
    }

    /// Record framework events.
    #[must_use]
    pub fn capture_framework_events(mut self, capture: bool) -> Self {
        self.config.capture_framework_events = capture;
        self
    }

    /// Charm root to write into (and to autoload metadata from).
    #[must_use]
    pub fn charm_root(mut self, root: impl AsRef<Path>) -> Self {
        self.config.charm_root = Some(root.as_ref().to_path_buf());
        self
    }

    /// Turns the consistency gate off.
    #[must_use]
    pub fn skip_consistency_checks(mut self, skip: bool) -> Self {
        self.config.skip_consistency_checks = skip;
        self
    }

    /// Resolves the charm metadata and builds the context. Metadata comes
    /// from, in order: [`spec`](Self::spec), [`Charm::embedded_spec`], the
    /// charm root.
    ///
    /// # Errors
    ///
    /// [`ScenarioError::NoSpec`] when there is nowhere to get metadata from;
    /// [`ScenarioError::Meta`] when the charm root's descriptors are invalid.
    pub fn build(self) -> Result<Context<C>, ScenarioError> {
        let spec = match self.spec.or_else(C::embedded_spec) {
            Some(spec) => spec,
            None => {
                let root = self.config.charm_root.as_deref().ok_or(ScenarioError::NoSpec)?;
                CharmSpec::autoload(root)?
            }
        };
        Ok(Context::from_parts(spec, self.config))
    }
}

/// Event constructors; action and notice ids come from the owning context.
#[derive(Debug, Clone, Copy)]
pub struct EventFactory<'a> {
    ids: &'a IdAllocator,
}

impl EventFactory<'_> {
    fn relation<R: Clone + Into<AnyRelation>>(kind: RelationEventKind, relation: &R) -> Event {
        Event::relation(kind, &relation.clone().into())
    }

    /// `<endpoint>-relation-created`
    #[must_use]
    pub fn relation_created<R: Clone + Into<AnyRelation>>(&self, relation: &R) -> Event {
        Self::relation(RelationEventKind::Created, relation)
    }

    /// `<endpoint>-relation-joined`, from the first remote unit.
    #[must_use]
    pub fn relation_joined<R: Clone + Into<AnyRelation>>(&self, relation: &R) -> Event {
        Self::relation(RelationEventKind::Joined, relation)
    }

    /// `<endpoint>-relation-changed`, from the first remote unit.
    #[must_use]
    pub fn relation_changed<R: Clone + Into<AnyRelation>>(&self, relation: &R) -> Event {
        Self::relation(RelationEventKind::Changed, relation)
    }

    /// `<endpoint>-relation-changed` from remote unit `unit`.
    #[must_use]
    pub fn relation_changed_from<R: Clone + Into<AnyRelation>>(
        &self,
        relation: &R,
        unit: u32,
    ) -> Event {
        let mut event = Self::relation(RelationEventKind::Changed, relation);
        if let Event::Relation(r) = &mut event {
            r.remote_unit = Some(unit);
        }
        event
    }

    /// `<endpoint>-relation-departed`, with the unit that is leaving.
    #[must_use]
    pub fn relation_departed<R: Clone + Into<AnyRelation>>(
        &self,
        relation: &R,
        departing_unit: Option<u32>,
    ) -> Event {
        let mut event = Self::relation(RelationEventKind::Departed, relation);
        if let Event::Relation(r) = &mut event {
            r.departing_unit = departing_unit;
        }
        event
    }

    /// `<endpoint>-relation-broken`
    #[must_use]
    pub fn relation_broken<R: Clone + Into<AnyRelation>>(&self, relation: &R) -> Event {
        Self::relation(RelationEventKind::Broken, relation)
    }

    /// `<container>-pebble-ready`
    #[must_use]
    pub fn pebble_ready(&self, container: &Container) -> Event {
        Event::pebble_ready(container)
    }

    /// `<container>-pebble-custom-notice`
    #[must_use]
    pub fn pebble_custom_notice(&self, container: &Container, notice: &Notice) -> Event {
        Event::pebble_custom_notice(container, notice)
    }

    /// `<container>-pebble-check-failed`
    #[must_use]
    pub fn pebble_check_failed(&self, container: &Container, check: &str) -> Event {
        Event::pebble_check(container, check, true)
    }

    /// `<container>-pebble-check-recovered`
    #[must_use]
    pub fn pebble_check_recovered(&self, container: &Container, check: &str) -> Event {
        Event::pebble_check(container, check, false)
    }

    /// `<storage>-storage-attached`
    #[must_use]
    pub fn storage_attached(&self, storage: &Storage) -> Event {
        Event::storage(StorageEventKind::Attached, storage)
    }

    /// `<storage>-storage-detaching`
    #[must_use]
    pub fn storage_detaching(&self, storage: &Storage) -> Event {
        Event::storage(StorageEventKind::Detaching, storage)
    }

    /// `secret-changed`, seen by an observer of the secret.
    #[must_use]
    pub fn secret_changed(&self, secret: &Secret) -> Event {
        Event::secret(SecretEventKind::Changed, secret, None)
    }

    /// `secret-rotate`, seen by the owner.
    #[must_use]
    pub fn secret_rotate(&self, secret: &Secret) -> Event {
        Event::secret(SecretEventKind::Rotate, secret, None)
    }

    /// `secret-expired` for `revision`, seen by the owner.
    #[must_use]
    pub fn secret_expired(&self, secret: &Secret, revision: u32) -> Event {
        Event::secret(SecretEventKind::Expired, secret, Some(revision))
    }

    /// `secret-remove` for `revision`, seen by the owner.
    #[must_use]
    pub fn secret_remove(&self, secret: &Secret, revision: u32) -> Event {
        Event::secret(SecretEventKind::Remove, secret, Some(revision))
    }

    /// The action `name` with a fresh id.
    #[must_use]
    pub fn action<K: Into<String>, V: Into<Value>>(
        &self,
        name: &str,
        params: impl IntoIterator<Item = (K, V)>,
    ) -> Event {
        Event::Action(ActionEvent {
            name: name.to_string(),
            id: self.ids.next_action(),
            params: params
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        })
    }

    /// A charm-defined event.
    #[must_use]
    pub fn custom(&self, event: CustomEvent) -> Event {
        Event::Custom(event)
    }
}
