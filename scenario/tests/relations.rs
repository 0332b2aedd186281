//! Relation databags as charms see and change them.

mod common;

use common::{context, leader, WebApp};
use ops_scenario::{ErrorKind, ScenarioError};
use scenario_state::{
    AnyRelation, Container, Notice, NoticeId, PeerRelation, RelationKind, State, Storage,
};

#[test]
fn leader_writes_unit_and_app_data() {
    let ctx = context::<WebApp>();
    let db = ctx
        .relation("db")
        .with_remote_app_name("postgresql")
        .with_remote_app_data([("host", "pg.internal")]);
    let state = leader().with_relation(db.clone());

    let out = ctx.run(ctx.on().relation_changed(&db), &state).unwrap();

    let relation = out.get_relation(db.id).unwrap();
    assert_eq!(
        relation.local_unit_data().get("db-host").map(String::as_str),
        Some("pg.internal")
    );
    assert_eq!(
        relation.local_app_data().get("ready").map(String::as_str),
        Some("yes")
    );
    let before = state.get_relation(db.id).unwrap();
    assert!(before.local_app_data().is_empty());
}

#[test]
fn followers_cannot_write_app_data() {
    let ctx = context::<WebApp>();
    let db = ctx
        .relation("db")
        .with_remote_app_data([("host", "pg.internal")]);
    let state = State::new().with_relation(db.clone());

    let err = ctx.run(ctx.on().relation_changed(&db), &state).unwrap_err();

    assert!(matches!(err, ScenarioError::UncaughtCharm { .. }));
    assert_eq!(err.model_error().map(|e| e.kind()), Some(ErrorKind::Authorization));
    let partial = err.state().unwrap();
    let relation = partial.get_relation(db.id).unwrap();
    assert_eq!(
        relation.local_unit_data().get("db-host").map(String::as_str),
        Some("pg.internal")
    );
    assert!(relation.local_app_data().is_empty());
}

#[test]
fn relation_events_carry_their_remote_unit() {
    let ctx = context::<WebApp>();
    let db = ctx.relation("db");
    let mut mgr = ctx
        .manager(ctx.on().relation_changed(&db), &leader().with_relation(db.clone()))
        .unwrap();
    assert_eq!(mgr.env().get("JUJU_REMOTE_UNIT"), Some("remote/0"));
    let relation_id = format!("db:{}", db.id);
    assert_eq!(mgr.env().get("JUJU_RELATION_ID"), Some(relation_id.as_str()));
    mgr.run().unwrap();
}

#[test]
fn factory_ids_never_repeat() {
    let ctx = context::<WebApp>();
    let first = ctx.relation("db");
    let peers: AnyRelation = ctx.peer_relation("cluster").into();
    let third = ctx.relation("db");
    assert!(first.id < peers.id());
    assert!(peers.id() < third.id);
    assert_eq!(peers.kind(), RelationKind::Peer);
}

#[test]
fn ids_stay_clear_of_relations_already_in_a_state() {
    let ctx = context::<WebApp>();
    let existing = PeerRelation::new(scenario_state::RelationId(40), "cluster");
    ctx.run(scenario_state::Event::Start, &State::new().with_relation(existing))
        .unwrap();
    assert!(ctx.relation("db").id.0 > 40);
}

#[test]
fn ids_stay_clear_of_storages_and_notices_already_in_a_state() {
    let ctx = context::<WebApp>();
    let web = Container::new("web").with_notice(Notice::new(NoticeId(7), "example.com/ready"));
    let state = State::new()
        .with_storage(Storage::new("data", 0))
        .with_container(web);
    ctx.run(scenario_state::Event::Start, &state).unwrap();

    assert_eq!(ctx.storage("data").index, 1);
    assert_eq!(ctx.notice("example.com/other").id, NoticeId(8));
}
