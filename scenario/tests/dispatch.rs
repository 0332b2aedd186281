//! The run sequence: what fires, in which order, and what comes back.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};

use common::{context, leader, Collector, Ruler, WebApp};
use ops_scenario::{
    on, Charm, Context, EventContext, EventOrigin, Framework, Model, ScenarioError,
};
use scenario_state::{Event, Port, Relation, RelationId, State, Status};

#[test]
fn leadership_decides_the_status() {
    let ctx = Context::<Ruler>::builder().build().unwrap();

    let out = ctx.run(Event::Start, &leader()).unwrap();
    assert_eq!(out.unit_status, Status::active("I rule"));

    let out = ctx.run(Event::Start, &State::new()).unwrap();
    assert_eq!(out.unit_status, Status::active("I am ruled"));

    assert_eq!(ctx.unit_status_history(), [Status::Unknown, Status::Unknown]);
}

#[test]
fn input_state_is_untouched() {
    let ctx = context::<WebApp>();
    let input = leader().with_config("greeting", "hi");
    let snapshot = input.clone();

    let out = ctx.run(Event::ConfigChanged, &input).unwrap();

    assert_eq!(input, snapshot);
    assert_ne!(out, snapshot);
    assert_eq!(out.workload_version, "hi");
    assert_eq!(out.opened_ports, [Port::tcp(8080)]);
    assert_eq!(ctx.workload_version_history(), [String::new()]);
}

#[test]
fn config_defaults_reach_the_charm() {
    let ctx = context::<WebApp>();
    let out = ctx.run(Event::ConfigChanged, &leader()).unwrap();
    assert_eq!(out.workload_version, "hello");
}

#[test]
fn custom_events_run_after_their_emitter() {
    let ctx = context::<WebApp>();
    let mut mgr = ctx.manager(Event::Install, &leader()).unwrap();
    let out = mgr.run().unwrap();

    assert_eq!(mgr.charm().seen, ["install", "configured"]);
    let stored = out.get_stored_state(Some("WebApp"), "_stored").unwrap();
    assert_eq!(stored.content.get("configured"), Some(&serde_json::Value::Bool(true)));
    assert_eq!(out.unit_status, Status::maintenance("installing"));

    let origins: Vec<_> = ctx
        .emitted_events()
        .into_iter()
        .map(|e| (e.name(), e.origin))
        .collect();
    assert_eq!(
        origins,
        [
            ("install".to_string(), EventOrigin::Juju),
            ("configured".to_string(), EventOrigin::Custom),
        ]
    );
}

#[test]
fn framework_events_are_recorded_on_request() {
    let ctx = Context::<Ruler>::builder()
        .capture_framework_events(true)
        .build()
        .unwrap();
    ctx.run(Event::Start, &leader()).unwrap();
    assert_eq!(
        ctx.recorder().emitted_names(),
        ["start", "collect_app_status", "collect_unit_status", "pre_commit", "commit"]
    );

    let quiet = Context::<Ruler>::builder().build().unwrap();
    quiet.run(Event::Start, &State::new()).unwrap();
    assert_eq!(quiet.recorder().emitted_names(), ["start"]);
}

#[test]
fn charm_errors_carry_the_partial_state() {
    let ctx = context::<WebApp>();

    let err = ctx.run(Event::Stop, &leader()).unwrap_err();
    assert!(matches!(err, ScenarioError::UncaughtCharm { .. }));
    assert!(err.to_string().contains("stop handler failed"));

    let err = ctx.run(Event::Remove, &leader()).unwrap_err();
    assert!(err.to_string().contains("remove handler panicked"));
    let partial = err.state().unwrap();
    assert_eq!(partial.unit_status, Status::maintenance("removing"));
}

#[test]
fn manager_exposes_both_sides_of_the_run() {
    let ctx = context::<WebApp>();
    let mut mgr = ctx.manager(Event::UpdateStatus, &leader()).unwrap();
    assert_eq!(mgr.env().get("JUJU_DISPATCH_PATH"), Some("hooks/update-status"));
    assert_eq!(mgr.env().get("JUJU_UNIT_NAME"), Some("webapp/0"));
    assert!(mgr.charm().seen.is_empty());
    assert!(mgr.model().is_leader());
    assert!(mgr.output().is_none());

    let out = mgr.run().unwrap();
    assert_eq!(mgr.charm().seen, ["update_status"]);
    assert_eq!(mgr.output(), Some(&out));
    assert!(matches!(mgr.run(), Err(ScenarioError::AlreadyEmitted)));
}

#[test]
fn inconsistent_scenarios_are_refused() {
    let ctx = context::<WebApp>();
    let cache = Relation::new(RelationId(3), "cache");
    let state = leader().with_relation(cache.clone());
    let err = ctx.run(ctx.on().relation_changed(&cache), &state).unwrap_err();
    let ScenarioError::Inconsistent(inner) = err else {
        panic!("expected an inconsistency, got {err}");
    };
    assert!(inner.failures.iter().any(|f| f.contains("cache")));

    let lenient = Context::<WebApp>::builder()
        .spec(common::spec())
        .skip_consistency_checks(true)
        .build()
        .unwrap();
    assert!(lenient.run(lenient.on().relation_changed(&cache), &state).is_ok());
}

static INITIALISED: AtomicUsize = AtomicUsize::new(0);

struct Counted;

impl Charm for Counted {
    fn init(framework: &mut Framework<Self>, _model: &mut Model<'_>) -> anyhow::Result<Self> {
        INITIALISED.fetch_add(1, Ordering::SeqCst);
        framework.observe(on::START, |_: &mut Counted, _: &mut EventContext<'_>| Ok(()));
        Ok(Counted)
    }
}

#[test]
fn refused_scenarios_never_reach_the_charm() {
    let ctx = Context::<Counted>::builder()
        .spec(common::spec())
        .skip_consistency_checks(false)
        .build()
        .unwrap();
    let before = INITIALISED.load(Ordering::SeqCst);
    let state = leader().with_config("no-such-option", true);
    assert!(ctx.run(Event::Start, &state).is_err());
    assert_eq!(INITIALISED.load(Ordering::SeqCst), before);

    ctx.run(Event::Start, &leader()).unwrap();
    assert_eq!(INITIALISED.load(Ordering::SeqCst), before + 1);
}

#[test]
fn collect_status_picks_the_most_severe() {
    let ctx = context::<Collector>();

    let out = ctx.run(Event::UpdateStatus, &leader()).unwrap();
    assert_eq!(out.unit_status, Status::blocked("needs a database"));
    assert_eq!(out.app_status, Status::waiting("peers settling"));

    let with_db = State::new().with_relation(Relation::new(RelationId(1), "db"));
    let out = ctx.run(Event::UpdateStatus, &with_db).unwrap();
    assert_eq!(out.unit_status, Status::active(""));
    assert_eq!(out.app_status, Status::Unknown);
}

#[test]
fn spec_resolution_needs_a_source() {
    let err = Context::<WebApp>::builder().build().err().unwrap();
    assert!(matches!(err, ScenarioError::NoSpec));

    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("metadata.yaml"), common::METADATA).unwrap();
    let ctx = Context::<WebApp>::builder()
        .charm_root(dir.path())
        .build()
        .unwrap();
    assert_eq!(ctx.app_name(), "webapp");
    ctx.run(Event::Start, &State::new()).unwrap();
    let written = std::fs::read_to_string(dir.path().join("metadata.yaml")).unwrap();
    assert_eq!(written, common::METADATA);
}
