//! One run: set up the unit, fire the event, collect statuses, commit.
//!
//! The order is fixed. Deferred events are re-emitted first (oldest first,
//! each to the observer that deferred it), then the requested event, then
//! collect-status (application first, leader only), then pre-commit and
//! commit. Custom events a handler emits run as soon as that handler
//! returns.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};

use scenario_consistency::Scenario;
use scenario_state::{DeferredEvent, Event, State, Status};
use tracing::{debug, info, info_span, warn};

use crate::backend::ModelBackend;
use crate::charm::{short_type_name, Charm, EventContext, Framework};
use crate::env::HookEnvironment;
use crate::error::ScenarioError;
use crate::model::Model;
use crate::recorder::{EmittedEvent, EventOrigin};
use crate::root::VirtualCharmRoot;
use crate::transport::backend::{ActionRun, Shared};
use crate::transport::MockBackend;

/// A charm set up against a working copy of the input state.
pub(crate) struct Session<'ctx, C: Charm> {
    shared: Shared<'ctx>,
    state: State,
    event: Event,
    framework: Framework<C>,
    charm: C,
    action: Option<ActionRun>,
    next_seq: u32,
    unit_name: String,
    env: HookEnvironment,
    // Dropped last; the charm may read its root until then.
    _root: VirtualCharmRoot,
}

impl<'ctx, C: Charm> Session<'ctx, C> {
    /// Checks the scenario, prepares the charm root and environment, and
    /// builds the charm.
    pub(crate) fn start(
        shared: Shared<'ctx>,
        event: Event,
        input: &State,
    ) -> Result<Self, ScenarioError> {
        let config = shared.config;
        let unit_name = format!("{}/{}", shared.app_name, config.unit_id);

        if config.skip_consistency_checks {
            debug!("consistency checks skipped");
        } else {
            let scenario = Scenario::new(shared.spec, input, &event, &config.juju_version)
                .with_unit_id(config.unit_id);
            scenario_consistency::check(&scenario)?;
        }

        let mut state = input.clone();
        for relation in &state.relations {
            shared.ids.reserve_relation(relation.id());
        }
        for secret in &state.secrets {
            shared.ids.reserve_secret(secret.id);
        }
        for storage in &state.storages {
            shared.ids.reserve_storage(storage.index);
        }
        for notice in state.containers.iter().flat_map(|c| &c.notices) {
            shared.ids.reserve_notice(notice.id);
        }
        if let Event::Action(run) = &event {
            shared.ids.reserve_action(run.id);
        }

        let root = VirtualCharmRoot::build(shared.spec, config.charm_root.as_deref())
            .map_err(ScenarioError::Root)?;
        let env = HookEnvironment::for_event(
            &event,
            &state,
            &unit_name,
            &config.juju_version,
            root.path(),
        );
        let event = if event.is_custom() || event.is_framework() {
            event
        } else {
            let mut decoded = env.decode()?;
            if let (Event::Action(decoded), Event::Action(requested)) = (&mut decoded, &event) {
                decoded.params.clone_from(&requested.params);
            }
            decoded
        };

        let mut action = match &event {
            Event::Action(run) => {
                shared.recorder.borrow_mut().action_results = None;
                Some(ActionRun::new(run.clone()))
            }
            _ => None,
        };

        let owner = short_type_name::<C>();
        let mut framework = Framework::new(owner.clone());
        let init = {
            let backend = MockBackend::new(shared, &mut state, action.as_mut());
            let mut model = Model::new(Box::new(backend), &owner);
            catch_unwind(AssertUnwindSafe(|| C::init(&mut framework, &mut model)))
        };
        let charm = match flatten(init) {
            Ok(charm) => charm,
            Err(source) => return Err(uncaught(&event, source, &state)),
        };

        let next_seq = state
            .deferred
            .iter()
            .filter_map(|d| handle_seq(&d.handle_path))
            .max()
            .map_or(1, |seq| seq + 1);
        debug!(event = %event, unit = %unit_name, "charm initialised");

        Ok(Self {
            shared,
            state,
            event,
            framework,
            charm,
            action,
            next_seq,
            unit_name,
            env,
            _root: root,
        })
    }

    /// Fires the event and returns the resulting state.
    pub(crate) fn run(&mut self) -> Result<State, ScenarioError> {
        let span = info_span!("scenario.run", event = %self.event, unit = %self.unit_name);
        let _entered = span.enter();

        self.reemit_deferred()?;
        self.emit_main()?;
        self.collect_status()?;
        for event in [Event::PreCommit, Event::Commit] {
            let mut parts = self.parts();
            parts.record_framework(&event);
            dispatch(&mut parts, &event, None)?;
        }

        if let Some(message) = self.action.as_ref().and_then(|run| run.failure.clone()) {
            warn!(%message, "action failed");
            return Err(ScenarioError::ActionFailed {
                message,
                state: Box::new(self.state.clone()),
            });
        }
        info!(deferred = self.state.deferred.len(), "run complete");
        Ok(self.state.clone())
    }

    pub(crate) fn charm(&self) -> &C {
        &self.charm
    }

    pub(crate) fn charm_mut(&mut self) -> &mut C {
        &mut self.charm
    }

    pub(crate) fn state(&self) -> &State {
        &self.state
    }

    pub(crate) fn state_mut(&mut self) -> &mut State {
        &mut self.state
    }

    pub(crate) fn event(&self) -> &Event {
        &self.event
    }

    pub(crate) fn env(&self) -> &HookEnvironment {
        &self.env
    }

    pub(crate) fn model(&mut self) -> Model<'_> {
        let backend = MockBackend::new(self.shared, &mut self.state, self.action.as_mut());
        Model::new(Box::new(backend), self.framework.owner())
    }

    fn parts(&mut self) -> Parts<'_, 'ctx, C> {
        Parts {
            shared: self.shared,
            state: &mut self.state,
            framework: &self.framework,
            charm: &mut self.charm,
            action: &mut self.action,
            next_seq: &mut self.next_seq,
        }
    }

    fn reemit_deferred(&mut self) -> Result<(), ScenarioError> {
        let capture = self.shared.config.capture_deferred_events;
        let mut parts = self.parts();
        let mut pending = std::mem::take(&mut parts.state.deferred).into_iter();
        let mut kept = Vec::new();

        while let Some(deferred) = pending.next() {
            let event = match deferred.restore() {
                Ok(event) => event,
                Err(err) => {
                    warn!(handle = %deferred.handle_path, %err, "keeping unrestorable deferred event");
                    kept.push(deferred);
                    continue;
                }
            };
            if !parts
                .framework
                .is_observed_by(deferred.name(), &deferred.observer)
            {
                warn!(
                    handle = %deferred.handle_path,
                    observer = %deferred.observer,
                    "no such observer; deferred event stays queued"
                );
                kept.push(deferred);
                continue;
            }
            if capture {
                parts.record(&event, EventOrigin::Deferred);
            }
            match dispatch(&mut parts, &event, Some(&deferred.observer)) {
                Ok(outcome) => {
                    if !outcome.deferred_by.is_empty() {
                        debug!(handle = %deferred.handle_path, "deferred again");
                        kept.push(deferred);
                    }
                }
                Err(mut err) => {
                    kept.push(deferred);
                    kept.extend(pending);
                    let fresh = std::mem::replace(&mut parts.state.deferred, kept);
                    parts.state.deferred.extend(fresh);
                    if let ScenarioError::UncaughtCharm { state, .. } = &mut err {
                        state.deferred.clone_from(&parts.state.deferred);
                    }
                    return Err(err);
                }
            }
        }

        let fresh = std::mem::replace(&mut parts.state.deferred, kept);
        parts.state.deferred.extend(fresh);
        Ok(())
    }

    fn emit_main(&mut self) -> Result<(), ScenarioError> {
        let event = self.event.clone();
        let mut parts = self.parts();
        parts.record(&event, EventOrigin::Juju);
        let outcome = dispatch(&mut parts, &event, None)?;
        for observer in &outcome.deferred_by {
            parts.enqueue(&event, observer);
        }
        Ok(())
    }

    fn collect_status(&mut self) -> Result<(), ScenarioError> {
        let mut parts = self.parts();
        if parts.state.leader {
            parts.collect(Event::CollectAppStatus, true)?;
        }
        parts.collect(Event::CollectUnitStatus, false)
    }
}

/// Disjoint borrows of a session, so handlers can run while the observer
/// table is being walked.
struct Parts<'s, 'ctx, C> {
    shared: Shared<'ctx>,
    state: &'s mut State,
    framework: &'s Framework<C>,
    charm: &'s mut C,
    action: &'s mut Option<ActionRun>,
    next_seq: &'s mut u32,
}

impl<C: Charm> Parts<'_, '_, C> {
    fn record(&self, event: &Event, origin: EventOrigin) {
        self.shared
            .recorder
            .borrow_mut()
            .emitted_events
            .push(EmittedEvent {
                event: event.clone(),
                origin,
            });
    }

    fn record_framework(&self, event: &Event) {
        if self.shared.config.capture_framework_events {
            self.record(event, EventOrigin::Framework);
        }
    }

    fn enqueue(&mut self, event: &Event, observer: &str) {
        let deferred =
            DeferredEvent::from_event(event, self.framework.owner(), observer, *self.next_seq);
        *self.next_seq += 1;
        debug!(handle = %deferred.handle_path, observer, "event deferred");
        self.state.deferred.push(deferred);
    }

    fn collect(&mut self, event: Event, app: bool) -> Result<(), ScenarioError> {
        self.record_framework(&event);
        let outcome = dispatch(self, &event, None)?;
        let Some(status) = Status::highest(&outcome.statuses) else {
            return Ok(());
        };
        debug!(%status, app, "collected status");
        let result = {
            let mut backend = MockBackend::new(self.shared, &mut *self.state, None);
            backend.status_set(status.clone(), app)
        };
        result.map_err(|err| uncaught(&event, err.into(), self.state))
    }
}

#[derive(Debug, Default)]
struct Dispatched {
    deferred_by: Vec<String>,
    statuses: Vec<Status>,
}

/// Calls every observer of `event` (or just `only`) in registration order.
fn dispatch<C: Charm>(
    parts: &mut Parts<'_, '_, C>,
    event: &Event,
    only: Option<&str>,
) -> Result<Dispatched, ScenarioError> {
    let framework = parts.framework;
    let mut outcome = Dispatched::default();

    for observer in framework.handlers(&event.name()) {
        if only.is_some_and(|name| name != observer.name) {
            continue;
        }
        debug!(event = %event, observer = %observer.name, "calling observer");
        let (result, (deferred, emitted, statuses)) = {
            let backend = MockBackend::new(parts.shared, &mut *parts.state, parts.action.as_mut());
            let mut ctx = EventContext::new(event, Model::new(Box::new(backend), framework.owner()));
            let charm = &mut *parts.charm;
            let result = catch_unwind(AssertUnwindSafe(|| (observer.handler)(charm, &mut ctx)));
            (result, ctx.into_parts())
        };
        if let Err(source) = flatten(result) {
            return Err(uncaught(event, source, parts.state));
        }
        if deferred {
            outcome.deferred_by.push(observer.name.clone());
        }
        outcome.statuses.extend(statuses);

        for custom in emitted {
            let custom = Event::Custom(custom);
            parts.record(&custom, EventOrigin::Custom);
            let nested = dispatch(parts, &custom, None)?;
            for name in &nested.deferred_by {
                parts.enqueue(&custom, name);
            }
            outcome.statuses.extend(nested.statuses);
        }
    }
    Ok(outcome)
}

fn flatten<T>(result: std::thread::Result<anyhow::Result<T>>) -> anyhow::Result<T> {
    result.unwrap_or_else(|payload| Err(panic_error(payload.as_ref())))
}

fn panic_error(payload: &(dyn Any + Send)) -> anyhow::Error {
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string());
    anyhow::anyhow!("charm panicked: {message}")
}

fn uncaught(event: &Event, source: anyhow::Error, state: &State) -> ScenarioError {
    warn!(event = %event, error = %source, "uncaught charm error");
    ScenarioError::UncaughtCharm {
        event: event.name(),
        source,
        state: Box::new(state.clone()),
    }
}

/// `Owner/on/start[3]` -> `3`.
fn handle_seq(handle: &str) -> Option<u32> {
    handle.rsplit_once('[')?.1.strip_suffix(']')?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handle_sequence_numbers() {
        assert_eq!(handle_seq("Charm/on/start[3]"), Some(3));
        assert_eq!(handle_seq("Charm/on/start"), None);
        assert_eq!(handle_seq("Charm/on/start[x]"), None);
    }

    #[test]
    fn panic_payloads_become_errors() {
        let err = panic_error(&"boom");
        assert_eq!(err.to_string(), "charm panicked: boom");
        let err = panic_error(&String::from("bang"));
        assert_eq!(err.to_string(), "charm panicked: bang");
        let err = panic_error(&7_u8);
        assert!(err.to_string().contains("non-string"));
    }
}
