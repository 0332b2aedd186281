//! The seam between the engine and charm code: observer registration and
//! the per-invocation handle a handler receives.

use std::any::type_name;
use std::collections::BTreeMap;

use scenario_state::{CharmSpec, CustomEvent, Event, Status};
use serde_json::Value;

use crate::error::ModelError;
use crate::model::Model;
use crate::recorder::LogLevel;

/// A charm under test.
///
/// `init` plays the part of the charm constructor: it runs once per run,
/// registers observers on the framework and may read the model.
///
/// ```
/// use ops_scenario::{on, Charm, EventContext, Framework, Model};
/// use scenario_state::Status;
///
/// struct Ruler;
///
/// impl Ruler {
///     fn on_start(&mut self, ctx: &mut EventContext<'_>) -> anyhow::Result<()> {
///         let model = ctx.model();
///         let status = if model.is_leader() { "I rule" } else { "I am ruled" };
///         model.set_unit_status(Status::active(status))?;
///         Ok(())
///     }
/// }
///
/// impl Charm for Ruler {
///     fn init(framework: &mut Framework<Self>, _model: &mut Model<'_>) -> anyhow::Result<Self> {
///         framework.observe(on::START, Ruler::on_start);
///         Ok(Ruler)
///     }
/// }
/// ```
pub trait Charm: Sized + 'static {
    /// Metadata compiled into the charm, used when the Context is given none.
    fn embedded_spec() -> Option<CharmSpec> {
        None
    }

    /// Builds the charm and registers its observers.
    ///
    /// # Errors
    ///
    /// Any error is reported as an uncaught charm error.
    fn init(framework: &mut Framework<Self>, model: &mut Model<'_>) -> anyhow::Result<Self>;
}

/// A registered event handler.
pub type Handler<C> = Box<dyn Fn(&mut C, &mut EventContext<'_>) -> anyhow::Result<()>>;

pub(crate) struct Observer<C> {
    pub(crate) name: String,
    pub(crate) handler: Handler<C>,
}

/// Observer table of one charm instance, keyed by event path name.
pub struct Framework<C> {
    owner: String,
    observers: BTreeMap<String, Vec<Observer<C>>>,
}

impl<C: 'static> Framework<C> {
    pub(crate) fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            observers: BTreeMap::new(),
        }
    }

    /// Framework path of the charm; deferred events are recorded against it.
    #[must_use]
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Registers `handler` for `event` (see [`on`]). The observer is named
    /// after the handler function, which is what a deferred event records.
    ///
    /// Every closure written in one function shares that function's name.
    /// When a second one is registered for the same event it becomes
    /// `name#2`, then `name#3`, by registration order, so a deferred event
    /// only finds its closure again if `init` registers them in the same
    /// order. Use [`observe_named`](Self::observe_named) for closures that
    /// may defer.
    pub fn observe<F>(&mut self, event: impl Into<String>, handler: F)
    where
        F: Fn(&mut C, &mut EventContext<'_>) -> anyhow::Result<()> + 'static,
    {
        let event = event.into();
        let base = observer_name::<F>();
        let mut name = base.clone();
        let mut n = 1;
        while self.is_observed_by(&event, &name) {
            n += 1;
            name = format!("{base}#{n}");
        }
        self.observe_named(event, name, handler);
    }

    /// Registers `handler` for `event` under an explicit observer name.
    pub fn observe_named<F>(&mut self, event: impl Into<String>, name: impl Into<String>, handler: F)
    where
        F: Fn(&mut C, &mut EventContext<'_>) -> anyhow::Result<()> + 'static,
    {
        self.observers
            .entry(event.into())
            .or_default()
            .push(Observer {
                name: name.into(),
                handler: Box::new(handler),
            });
    }

    /// Observer names registered for `event`, in registration order.
    pub fn observers(&self, event: &str) -> impl Iterator<Item = &str> {
        self.handlers(event).iter().map(|o| o.name.as_str())
    }

    /// Whether `observer` is registered for `event`.
    #[must_use]
    pub fn is_observed_by(&self, event: &str, observer: &str) -> bool {
        self.observers(event).any(|name| name == observer)
    }

    pub(crate) fn handlers(&self, event: &str) -> &[Observer<C>] {
        self.observers.get(event).map_or(&[], Vec::as_slice)
    }
}

/// Last path segment of a type name, without generics.
pub(crate) fn short_type_name<T: ?Sized>() -> String {
    let full = type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base).to_string()
}

/// `my_charm::Charm::on_start` becomes `on_start`; a closure is named after
/// the function it was written in.
fn observer_name<F>() -> String {
    type_name::<F>()
        .split("::")
        .filter(|segment| !segment.starts_with('{'))
        .last()
        .unwrap_or("observer")
        .to_string()
}

/// What a handler gets besides the charm: the event, the model and the
/// framework verbs (defer, emit, add status, action tools).
pub struct EventContext<'a> {
    event: &'a Event,
    model: Model<'a>,
    deferred: bool,
    emitted: Vec<CustomEvent>,
    statuses: Vec<Status>,
}

impl<'a> EventContext<'a> {
    pub(crate) fn new(event: &'a Event, model: Model<'a>) -> Self {
        Self {
            event,
            model,
            deferred: false,
            emitted: Vec::new(),
            statuses: Vec::new(),
        }
    }

    /// The event being handled.
    #[must_use]
    pub fn event(&self) -> &Event {
        self.event
    }

    /// The unit's model.
    pub fn model(&mut self) -> &mut Model<'a> {
        &mut self.model
    }

    /// Keeps the event in the deferred queue for the next run.
    ///
    /// # Errors
    ///
    /// Actions and framework events cannot be deferred.
    pub fn defer(&mut self) -> Result<(), ModelError> {
        if self.event.is_action() || self.event.is_framework() {
            return Err(ModelError::invalid(format!(
                "{} cannot be deferred",
                self.event.name()
            )));
        }
        self.deferred = true;
        Ok(())
    }

    /// Whether [`defer`](Self::defer) was called.
    #[must_use]
    pub fn is_deferred(&self) -> bool {
        self.deferred
    }

    /// Emits a charm-defined event; its observers run once this handler returns.
    pub fn emit(&mut self, event: CustomEvent) {
        self.emitted.push(event);
    }

    /// Offers a status during collect-status; the highest priority one wins.
    pub fn add_status(&mut self, status: Status) {
        self.statuses.push(status);
    }

    /// Action parameters merged over schema defaults.
    ///
    /// # Errors
    ///
    /// The event is not an action.
    pub fn params(&self) -> Result<BTreeMap<String, Value>, ModelError> {
        self.model.backend_ref().action_get()
    }

    /// Adds action results.
    ///
    /// # Errors
    ///
    /// The event is not an action.
    pub fn set_results<K: Into<String>, V: Into<Value>>(
        &mut self,
        results: impl IntoIterator<Item = (K, V)>,
    ) -> Result<(), ModelError> {
        let results = results
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self.model.backend().action_set(results)
    }

    /// Logs an action progress message.
    ///
    /// # Errors
    ///
    /// The event is not an action.
    pub fn log(&mut self, message: &str) -> Result<(), ModelError> {
        self.model.backend().action_log(message)
    }

    /// Marks the action failed.
    ///
    /// # Errors
    ///
    /// The event is not an action.
    pub fn fail(&mut self, message: &str) -> Result<(), ModelError> {
        self.model.backend().action_fail(message)
    }

    /// Writes a `juju-log` line.
    pub fn juju_log(&mut self, level: LogLevel, message: &str) {
        self.model.log(level, message);
    }

    pub(crate) fn into_parts(self) -> (bool, Vec<CustomEvent>, Vec<Status>) {
        (self.deferred, self.emitted, self.statuses)
    }
}

/// Event path names to observe.
///
/// Endpoint, container, storage and action names are spelled as in
/// metadata; dashes become underscores.
pub mod on {
    /// `install`
    pub const INSTALL: &str = "install";
    /// `start`
    pub const START: &str = "start";
    /// `stop`
    pub const STOP: &str = "stop";
    /// `remove`
    pub const REMOVE: &str = "remove";
    /// `config-changed`
    pub const CONFIG_CHANGED: &str = "config_changed";
    /// `upgrade-charm`
    pub const UPGRADE_CHARM: &str = "upgrade_charm";
    /// `leader-elected`
    pub const LEADER_ELECTED: &str = "leader_elected";
    /// `leader-settings-changed`
    pub const LEADER_SETTINGS_CHANGED: &str = "leader_settings_changed";
    /// `update-status`
    pub const UPDATE_STATUS: &str = "update_status";
    /// `pre-series-upgrade`
    pub const PRE_SERIES_UPGRADE: &str = "pre_series_upgrade";
    /// `post-series-upgrade`
    pub const POST_SERIES_UPGRADE: &str = "post_series_upgrade";
    /// Unit collect-status.
    pub const COLLECT_UNIT_STATUS: &str = "collect_unit_status";
    /// Application collect-status (leader only).
    pub const COLLECT_APP_STATUS: &str = "collect_app_status";
    /// Pre-commit.
    pub const PRE_COMMIT: &str = "pre_commit";
    /// Commit.
    pub const COMMIT: &str = "commit";
    /// `secret-changed`
    pub const SECRET_CHANGED: &str = "secret_changed";
    /// `secret-rotate`
    pub const SECRET_ROTATE: &str = "secret_rotate";
    /// `secret-expired`
    pub const SECRET_EXPIRED: &str = "secret_expired";
    /// `secret-remove`
    pub const SECRET_REMOVE: &str = "secret_remove";

    fn segment(name: &str) -> String {
        name.replace('-', "_")
    }

    /// `<endpoint>-relation-created`
    #[must_use]
    pub fn relation_created(endpoint: &str) -> String {
        format!("{}_relation_created", segment(endpoint))
    }

    /// `<endpoint>-relation-joined`
    #[must_use]
    pub fn relation_joined(endpoint: &str) -> String {
        format!("{}_relation_joined", segment(endpoint))
    }

    /// `<endpoint>-relation-changed`
    #[must_use]
    pub fn relation_changed(endpoint: &str) -> String {
        format!("{}_relation_changed", segment(endpoint))
    }

    /// `<endpoint>-relation-departed`
    #[must_use]
    pub fn relation_departed(endpoint: &str) -> String {
        format!("{}_relation_departed", segment(endpoint))
    }

    /// `<endpoint>-relation-broken`
    #[must_use]
    pub fn relation_broken(endpoint: &str) -> String {
        format!("{}_relation_broken", segment(endpoint))
    }

    /// `<container>-pebble-ready`
    #[must_use]
    pub fn pebble_ready(container: &str) -> String {
        format!("{}_pebble_ready", segment(container))
    }

    /// `<container>-pebble-custom-notice`
    #[must_use]
    pub fn pebble_custom_notice(container: &str) -> String {
        format!("{}_pebble_custom_notice", segment(container))
    }

    /// `<container>-pebble-check-failed`
    #[must_use]
    pub fn pebble_check_failed(container: &str) -> String {
        format!("{}_pebble_check_failed", segment(container))
    }

    /// `<container>-pebble-check-recovered`
    #[must_use]
    pub fn pebble_check_recovered(container: &str) -> String {
        format!("{}_pebble_check_recovered", segment(container))
    }

    /// `<storage>-storage-attached`
    #[must_use]
    pub fn storage_attached(storage: &str) -> String {
        format!("{}_storage_attached", segment(storage))
    }

    /// `<storage>-storage-detaching`
    #[must_use]
    pub fn storage_detaching(storage: &str) -> String {
        format!("{}_storage_detaching", segment(storage))
    }

    /// The action `name`.
    #[must_use]
    pub fn action(name: &str) -> String {
        format!("{}_action", segment(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Demo;

    impl Demo {
        fn on_start(&mut self, _ctx: &mut EventContext<'_>) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn observers_are_named_after_handlers() {
        let mut framework = Framework::<Demo>::new(short_type_name::<Demo>());
        framework.observe(on::START, Demo::on_start);
        framework.observe(on::START, |_: &mut Demo, _: &mut EventContext<'_>| Ok(()));
        framework.observe_named(on::STOP, "stopper", |_: &mut Demo, _: &mut EventContext<'_>| {
            Ok(())
        });
        let names: Vec<_> = framework.observers(on::START).collect();
        assert_eq!(names, ["on_start", "observers_are_named_after_handlers"]);
        assert!(framework.is_observed_by(on::STOP, "stopper"));
        assert_eq!(framework.owner(), "Demo");
        assert_eq!(framework.observers(on::INSTALL).count(), 0);
    }

    #[test]
    fn sibling_closures_are_numbered() {
        let mut framework = Framework::<Demo>::new("Demo");
        for _ in 0..3 {
            framework.observe(on::START, |_: &mut Demo, _: &mut EventContext<'_>| Ok(()));
        }
        framework.observe(on::STOP, |_: &mut Demo, _: &mut EventContext<'_>| Ok(()));
        let names: Vec<_> = framework.observers(on::START).collect();
        assert_eq!(
            names,
            [
                "sibling_closures_are_numbered",
                "sibling_closures_are_numbered#2",
                "sibling_closures_are_numbered#3",
            ]
        );
        assert!(framework.is_observed_by(on::STOP, "sibling_closures_are_numbered"));
    }

    #[test]
    fn event_names_match_the_vocabulary() {
        assert_eq!(on::relation_changed("db-admin"), "db_admin_relation_changed");
        assert_eq!(on::pebble_ready("workload"), "workload_pebble_ready");
        assert_eq!(on::action("do-backup"), "do_backup_action");
        assert_eq!(on::storage_attached("data"), "data_storage_attached");
    }
}
