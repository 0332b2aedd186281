//! End-to-end checks of the consistency gate on realistic charm metadata.

use scenario_consistency::{check, run_all, Scenario};
use scenario_state::{
    CharmSpec, Container, Event, JujuVersion, PeerRelation, Relation, RelationEventKind,
    RelationId, State,
};

use proptest::prelude::*;

const METADATA: &str = r"
name: webapp
requires:
  db:
    interface: postgresql_client
    limit: 1
peers:
  cluster:
    interface: webapp-peers
containers:
  web: {}
";

fn spec() -> CharmSpec {
    CharmSpec::from_yaml(METADATA, None, None).unwrap()
}

#[test]
fn realistic_state_is_consistent() {
    let spec = spec();
    let db = Relation::new(RelationId(1), "db");
    let state = State::new()
        .with_leader(true)
        .with_relation(db.clone())
        .with_relation(PeerRelation::new(RelationId(2), "cluster"))
        .with_container(Container::new("web"));
    let event = Event::relation(RelationEventKind::Changed, &db.into());
    let version = JujuVersion::default();
    let report = check(&Scenario::new(&spec, &state, &event, &version)).unwrap();
    assert_eq!(report.failure_count(), 0);
}

#[test]
fn undeclared_endpoint_is_rejected() {
    let spec = spec();
    let cache = Relation::new(RelationId(7), "cache");
    let state = State::new().with_relation(cache.clone());
    let event = Event::relation(RelationEventKind::Joined, &cache.into());
    let version = JujuVersion::default();
    let err = check(&Scenario::new(&spec, &state, &event, &version)).unwrap_err();
    assert!(err.failures.iter().any(|f| f.contains("cache")));
}

#[test]
fn unit_id_matters_for_peers() {
    let spec = spec();
    let state = State::new().with_relation(PeerRelation::new(RelationId(2), "cluster"));
    let version = JujuVersion::default();
    let as_unit_0 = Scenario::new(&spec, &state, &Event::Start, &version);
    assert!(run_all(&as_unit_0).all_passed());
    let as_unit_1 = as_unit_0.with_unit_id(1);
    assert!(!run_all(&as_unit_1).all_passed());
}

proptest! {
    #[test]
    fn any_undeclared_endpoint_fails(endpoint in "[a-z]{3,10}") {
        prop_assume!(endpoint != "db" && endpoint != "cluster");
        let spec = spec();
        let rel = Relation::new(RelationId(1), endpoint.as_str());
        let state = State::new().with_relation(rel.clone());
        let event = Event::relation(RelationEventKind::Changed, &rel.into());
        let version = JujuVersion::default();
        prop_assert!(check(&Scenario::new(&spec, &state, &event, &version)).is_err());
    }
}
