//! Deferral across runs.

mod common;

use common::{leader, spec, WebApp};
use ops_scenario::{on, Charm, Context, EventContext, EventOrigin, Framework, Model};
use scenario_state::{CharmSpec, ConfigValue, DeferredEvent, Event, State};

fn capturing() -> Context<WebApp> {
    Context::<WebApp>::builder()
        .spec(spec())
        .capture_deferred_events(true)
        .build()
        .unwrap()
}

fn deferred_update_status(observer: &str) -> DeferredEvent {
    DeferredEvent::from_event(&Event::UpdateStatus, "WebApp", observer, 1)
}

#[test]
fn deferring_queues_the_event() {
    let ctx = capturing();
    let state = leader().with_config("defer-updates", true);
    let out = ctx.run(Event::UpdateStatus, &state).unwrap();

    assert_eq!(out.deferred.len(), 1);
    let queued = &out.deferred[0];
    assert_eq!(queued.handle_path, "WebApp/on/update_status[1]");
    assert_eq!(queued.observer, "on_update_status");
    assert_eq!(queued.name(), "update_status");
}

#[test]
fn deferred_events_run_before_the_new_one() {
    let ctx = capturing();
    let state = leader().with_deferred(deferred_update_status("on_update_status"));
    let mut mgr = ctx.manager(Event::Start, &state).unwrap();
    let out = mgr.run().unwrap();

    assert!(out.deferred.is_empty());
    assert_eq!(mgr.charm().seen, ["update_status"]);
    let stored = out.get_stored_state(Some("WebApp"), "_stored").unwrap();
    assert_eq!(stored.content.get("updates"), Some(&serde_json::Value::from(1)));

    let emitted = ctx.emitted_events();
    let origins: Vec<_> = emitted.iter().map(|e| (e.name(), e.origin)).collect();
    assert_eq!(
        origins,
        [
            ("update_status".to_string(), EventOrigin::Deferred),
            ("start".to_string(), EventOrigin::Juju),
        ]
    );
}

#[test]
fn a_deferred_queue_carries_into_the_next_run() {
    let ctx = capturing();
    let first = ctx
        .run(Event::UpdateStatus, &leader().with_config("defer-updates", true))
        .unwrap();
    assert_eq!(first.deferred.len(), 1);

    let second = first.clone().with_config("defer-updates", false);
    let out = ctx.run(Event::Start, &second).unwrap();

    assert!(out.deferred.is_empty());
    let stored = out.get_stored_state(Some("WebApp"), "_stored").unwrap();
    assert_eq!(stored.content.get("updates"), Some(&serde_json::Value::from(1)));
    let origins: Vec<_> = ctx
        .emitted_events()
        .iter()
        .map(|e| (e.name(), e.origin))
        .collect();
    assert_eq!(
        origins,
        [
            ("update_status".to_string(), EventOrigin::Juju),
            ("update_status".to_string(), EventOrigin::Deferred),
            ("start".to_string(), EventOrigin::Juju),
        ]
    );
}

#[test]
fn re_deferred_events_keep_their_place() {
    let ctx = capturing();
    let state = leader()
        .with_config("defer-updates", true)
        .with_deferred(deferred_update_status("on_update_status"));
    let out = ctx.run(Event::UpdateStatus, &state).unwrap();

    let handles: Vec<_> = out.deferred.iter().map(|d| d.handle_path.as_str()).collect();
    assert_eq!(
        handles,
        ["WebApp/on/update_status[1]", "WebApp/on/update_status[2]"]
    );
    assert_eq!(ctx.recorder().emitted_names(), ["update_status", "update_status"]);
}

#[test]
fn deferred_events_without_an_observer_stay_queued() {
    let ctx = Context::<WebApp>::builder().spec(spec()).build().unwrap();
    let orphan = deferred_update_status("on_something_removed");
    let state = State::new().with_deferred(orphan.clone());
    let out = ctx.run(Event::Start, &state).unwrap();

    assert_eq!(out.deferred, [orphan]);
    assert_eq!(ctx.recorder().emitted_names(), ["start"]);
}

#[test]
fn deferred_events_are_hidden_unless_captured() {
    let ctx = Context::<WebApp>::builder().spec(spec()).build().unwrap();
    let state = leader().with_deferred(deferred_update_status("on_update_status"));
    let out = ctx.run(Event::Start, &state).unwrap();
    assert!(out.deferred.is_empty());
    assert_eq!(ctx.recorder().emitted_names(), ["start"]);
}

/// Two closures on one event; only the second one defers.
#[derive(Default)]
struct Twins {
    calls: Vec<&'static str>,
}

impl Charm for Twins {
    fn embedded_spec() -> Option<CharmSpec> {
        Some(spec())
    }

    fn init(framework: &mut Framework<Self>, _model: &mut Model<'_>) -> anyhow::Result<Self> {
        framework.observe(on::UPDATE_STATUS, |charm: &mut Twins, _: &mut EventContext<'_>| {
            charm.calls.push("first");
            Ok(())
        });
        framework.observe(on::UPDATE_STATUS, |charm: &mut Twins, ctx: &mut EventContext<'_>| {
            charm.calls.push("second");
            if ctx.model().config_value("defer-updates") == Some(ConfigValue::Bool(true)) {
                ctx.defer()?;
            }
            Ok(())
        });
        Ok(Twins::default())
    }
}

#[test]
fn deferring_closures_get_their_own_event_back() {
    let ctx = Context::<Twins>::builder().build().unwrap();
    let first = ctx
        .run(Event::UpdateStatus, &leader().with_config("defer-updates", true))
        .unwrap();
    assert_eq!(first.deferred.len(), 1);
    assert_eq!(first.deferred[0].observer, "init#2");

    let second = first.with_config("defer-updates", false);
    let mut mgr = ctx.manager(Event::Start, &second).unwrap();
    let out = mgr.run().unwrap();

    assert_eq!(mgr.charm().calls, ["second"]);
    assert!(out.deferred.is_empty());
}
