//! Actions: parameters, results, logs and failure.

mod common;

use common::{context, leader, WebApp};
use ops_scenario::ScenarioError;
use serde_json::{json, Value};

#[test]
fn defaults_fill_in_missing_params() {
    let ctx = context::<WebApp>();
    let event = ctx.on().action("backup", Vec::<(String, Value)>::new());
    ctx.run(event, &leader()).unwrap();

    let results = ctx.action_results().unwrap();
    assert_eq!(results.get("target"), Some(&json!("/backups")));
    assert_eq!(ctx.action_logs(), ["backing up to /backups"]);
}

#[test]
fn given_params_win_over_defaults() {
    let ctx = context::<WebApp>();
    let event = ctx.on().action("backup", [("target", "/mnt/offsite")]);
    let mut mgr = ctx.manager(event, &leader()).unwrap();
    assert_eq!(mgr.env().get("JUJU_DISPATCH_PATH"), Some("actions/backup"));
    mgr.run().unwrap();

    let results = ctx.action_results().unwrap();
    assert_eq!(results.get("target"), Some(&json!("/mnt/offsite")));
}

#[test]
fn failed_actions_report_message_and_state() {
    let ctx = context::<WebApp>();
    let event = ctx.on().action("backup", [("target", "/tmp")]);
    ctx.run(event, &leader()).unwrap();

    let event = ctx.on().action("refuse", Vec::<(String, Value)>::new());
    let err = ctx.run(event, &leader()).unwrap_err();

    let ScenarioError::ActionFailed { message, state } = err else {
        panic!("expected a failed action, got {err}");
    };
    assert_eq!(message, "refusing");
    assert!(state.deferred.is_empty());
    let results = ctx.action_results().unwrap();
    assert_eq!(results.get("attempted"), Some(&json!(true)));
    assert!(!results.contains_key("target"));
}

#[test]
fn undeclared_actions_and_params_are_inconsistent() {
    let ctx = context::<WebApp>();
    let event = ctx.on().action("restore", Vec::<(String, Value)>::new());
    assert!(matches!(
        ctx.run(event, &leader()),
        Err(ScenarioError::Inconsistent(_))
    ));

    let event = ctx.on().action("backup", [("full", "yes")]);
    assert!(matches!(
        ctx.run(event, &leader()),
        Err(ScenarioError::Inconsistent(_))
    ));
}

#[test]
fn action_ids_are_unique() {
    let ctx = context::<WebApp>();
    let ids: Vec<_> = (0..3)
        .map(|_| match ctx.on().action("backup", [("target", "/x")]) {
            scenario_state::Event::Action(a) => a.id,
            _ => unreachable!(),
        })
        .collect();
    assert!(ids.windows(2).all(|w| w[0] < w[1]));
}
