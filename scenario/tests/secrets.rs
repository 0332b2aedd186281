//! Secret ownership, revisions and tracking.

mod common;

use ops_scenario::{on, Charm, Context, ErrorKind, EventContext, Framework, Model, NewSecret};
use scenario_state::{
    CharmSpec, Event, JujuVersion, SecretContent, SecretOwner, State, Status,
};

struct Keeper;

fn content(value: &str) -> SecretContent {
    SecretContent::from([("password".to_string(), value.to_string())])
}

impl Keeper {
    fn on_install(&mut self, ctx: &mut EventContext<'_>) -> anyhow::Result<()> {
        let backend = ctx.model().backend();
        let options = NewSecret {
            label: Some("admin".into()),
            ..NewSecret::default()
        };
        backend.secret_add(content("hunter2"), options)?;
        Ok(())
    }

    fn on_secret_changed(&mut self, ctx: &mut EventContext<'_>) -> anyhow::Result<()> {
        let Event::Secret(event) = ctx.event().clone() else {
            return Ok(());
        };
        let backend = ctx.model().backend();
        let tracked = backend.secret_get(Some(event.id), None, false, false)?;
        let peeked = backend.secret_get(Some(event.id), None, false, true)?;
        let refreshed = backend.secret_get(Some(event.id), None, true, false)?;
        let message = [tracked, peeked, refreshed]
            .iter()
            .map(|c| c.get("password").cloned().unwrap_or_default())
            .collect::<Vec<_>>()
            .join("/");
        ctx.model().set_unit_status(Status::active(message))?;
        Ok(())
    }
}

impl Charm for Keeper {
    fn embedded_spec() -> Option<CharmSpec> {
        Some(common::spec())
    }

    fn init(framework: &mut Framework<Self>, _model: &mut Model<'_>) -> anyhow::Result<Self> {
        framework.observe(on::INSTALL, Keeper::on_install);
        framework.observe(on::SECRET_CHANGED, Keeper::on_secret_changed);
        Ok(Keeper)
    }
}

fn context() -> Context<Keeper> {
    Context::<Keeper>::builder().build().unwrap()
}

#[test]
fn leader_adds_application_secrets() {
    let ctx = context();
    let out = ctx.run(Event::Install, &State::new().with_leader(true)).unwrap();

    assert_eq!(out.secrets.len(), 1);
    let secret = &out.secrets[0];
    assert_eq!(secret.owner, Some(SecretOwner::App));
    assert_eq!(secret.label.as_deref(), Some("admin"));
    assert_eq!(secret.latest_content, content("hunter2"));
    assert_eq!(out.get_secret_by_label("admin").unwrap().id, secret.id);
}

#[test]
fn followers_cannot_add_application_secrets() {
    let ctx = context();
    let err = ctx.run(Event::Install, &State::new()).unwrap_err();
    assert_eq!(err.model_error().map(|e| e.kind()), Some(ErrorKind::Authorization));
}

#[test]
fn observers_track_until_they_refresh() {
    let ctx = context();
    let secret = ctx.secret(content("old")).with_latest(content("new"));
    let state = State::new().with_secret(secret.clone());

    let out = ctx.run(ctx.on().secret_changed(&secret), &state).unwrap();

    assert_eq!(out.unit_status, Status::active("old/new/new"));
    let after = out.get_secret(secret.id).unwrap();
    assert_eq!(after.tracked_revision, after.latest_revision);
    assert_eq!(state.get_secret(secret.id).unwrap().tracked_revision, 1);
}

#[test]
fn owner_events_need_an_owned_secret() {
    let ctx = context();
    let observed = ctx.secret(content("x"));
    let state = State::new().with_leader(true).with_secret(observed.clone());
    assert!(ctx.run(ctx.on().secret_rotate(&observed), &state).is_err());

    let owned = ctx.secret(content("x")).owned_by(SecretOwner::Unit);
    let state = State::new().with_secret(owned.clone());
    assert!(ctx.run(ctx.on().secret_rotate(&owned), &state).is_ok());
}

#[test]
fn secrets_need_a_recent_juju() {
    let ctx = Context::<Keeper>::builder()
        .juju_version("2.9.44".parse::<JujuVersion>().unwrap())
        .build()
        .unwrap();
    let secret = ctx.secret(content("x"));
    let state = State::new().with_secret(secret.clone());
    assert!(ctx.run(ctx.on().secret_changed(&secret), &state).is_err());
}
