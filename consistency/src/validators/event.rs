//! Event validator.
//!
//! Checks that whatever the event refers to exists both in the state and in
//! the charm's metadata, and that the event is one Juju would send to this
//! unit given its role:
//! - relation events: relation present, endpoint declared, remote unit known
//! - workload events: container present and declared, notice/check present,
//!   Juju new enough
//! - storage events: storage declared and attached
//! - secret events: secret visible, owner-only events on owned secrets,
//!   revision rules for expired/remove
//! - action events: action declared, params declared and well-typed

use scenario_state::meta::json_type_matches;
use scenario_state::{
    ActionEvent, Event, RelationEvent, RelationKind, SecretEvent, SecretEventKind, SecretOwner,
    StorageEvent, WorkloadEvent, WorkloadEventKind,
};

use crate::report::{Audit, ConsistencyReport};
use crate::Scenario;

const VALIDATOR: &str = "event";

/// Validates the event against the state and metadata.
pub fn validate(scenario: &Scenario<'_>) -> ConsistencyReport {
    let mut audit = Audit::new(VALIDATOR);

    match scenario.event {
        Event::Relation(r) => check_relation(scenario, r, &mut audit),
        Event::Workload(w) => check_workload(scenario, w, &mut audit),
        Event::Storage(s) => check_storage(scenario, s, &mut audit),
        Event::Secret(s) => check_secret(scenario, s, &mut audit),
        Event::Action(a) => check_action(scenario, a, &mut audit),
        Event::Custom(c) => audit.caution(format!(
            "custom event {} fired directly; charms normally emit it themselves",
            c.name
        )),
        e if e.is_framework() => audit.caution(format!(
            "framework event {} fired directly; the engine emits it after every run",
            e.name()
        )),
        _ => {}
    }

    audit.verdict(
        format!("{} is consistent with the state", scenario.event.name()),
        format!("{} does not match the state or metadata", scenario.event.name()),
    )
}

fn check_relation(scenario: &Scenario<'_>, event: &RelationEvent, audit: &mut Audit) {
    if scenario.spec.meta.endpoint(&event.endpoint).is_none() {
        audit.violation(format!("endpoint {} is not declared in metadata", event.endpoint));
    }
    let Ok(relation) = scenario.state.get_relation(event.relation_id) else {
        audit.violation(format!("relation {} is not in the state", event.relation_id));
        return;
    };
    if relation.endpoint() != event.endpoint {
        audit.violation(format!(
            "relation {} is on endpoint {}, not {}",
            event.relation_id,
            relation.endpoint(),
            event.endpoint
        ));
    }

    let remote_ids = relation.remote_unit_ids();
    match event.remote_unit {
        Some(id) if !remote_ids.contains(&id) => audit.violation(format!(
            "remote unit {id} is not part of relation {}",
            event.relation_id
        )),
        None if event.kind.has_remote_unit() => audit.caution(format!(
            "{} has no remote unit; relation {} has {} candidates",
            scenario.event.name(),
            event.relation_id,
            remote_ids.len()
        )),
        _ => {}
    }

    if let Some(departing) = event.departing_unit {
        let own = relation.kind() == RelationKind::Peer && departing == scenario.unit_id;
        if !own && !remote_ids.contains(&departing) {
            audit.violation(format!(
                "departing unit {departing} is not part of relation {}",
                event.relation_id
            ));
        }
    }
}

fn check_workload(scenario: &Scenario<'_>, event: &WorkloadEvent, audit: &mut Audit) {
    if !scenario.spec.meta.containers.contains_key(&event.container) {
        audit.violation(format!("container {} is not declared in metadata", event.container));
    }
    let Ok(container) = scenario.state.get_container(&event.container) else {
        audit.violation(format!("container {} is not in the state", event.container));
        return;
    };

    match event.kind {
        WorkloadEventKind::PebbleReady => {
            if !container.can_connect {
                audit.caution(format!(
                    "{}: pebble-ready on a container that cannot connect",
                    event.container
                ));
            }
        }
        WorkloadEventKind::PebbleCustomNotice => {
            if !scenario.juju_version.supports_pebble_notices() {
                audit.violation(format!(
                    "Pebble notices need Juju 3.4 or later, not {}",
                    scenario.juju_version
                ));
            }
            match &event.notice {
                None => audit.violation("custom-notice event names no notice".to_string()),
                Some(notice) if container.get_notice(notice.id).is_err() => audit.violation(
                    format!("notice {} is not in container {}", notice.id, event.container),
                ),
                Some(_) => {}
            }
        }
        WorkloadEventKind::PebbleCheckFailed | WorkloadEventKind::PebbleCheckRecovered => {
            if !scenario.juju_version.supports_pebble_check_events() {
                audit.violation(format!(
                    "Pebble check events need Juju 3.6 or later, not {}",
                    scenario.juju_version
                ));
            }
            match &event.check {
                None => audit.violation("check event names no check".to_string()),
                Some(check) if container.get_check_info(check).is_err() => audit.violation(
                    format!("check {check} has no check info in container {}", event.container),
                ),
                Some(_) => {}
            }
        }
    }
}

fn check_storage(scenario: &Scenario<'_>, event: &StorageEvent, audit: &mut Audit) {
    if !scenario.spec.meta.storage.contains_key(&event.name) {
        audit.violation(format!("storage {} is not declared in metadata", event.name));
    }
    if scenario.state.get_storage(&event.name, event.index).is_err() {
        audit.violation(format!(
            "storage {}/{} is not in the state",
            event.name, event.index
        ));
    }
}

fn check_secret(scenario: &Scenario<'_>, event: &SecretEvent, audit: &mut Audit) {
    if !scenario.juju_version.has_secrets() {
        audit.violation(format!("secrets need Juju 3.0.2 or later, not {}", scenario.juju_version));
    }
    let Ok(secret) = scenario.state.get_secret(event.id) else {
        audit.violation(format!("secret {} is not in the state", event.id));
        return;
    };

    if event.kind.is_for_owner() {
        match secret.owner {
            None => audit.violation(format!(
                "{} is only sent to the owner, and secret {} is not owned",
                scenario.event.name(),
                event.id
            )),
            Some(SecretOwner::App) if !scenario.state.leader => audit.violation(format!(
                "secret {} is owned by the application; only the leader gets its events",
                event.id
            )),
            Some(_) => {}
        }
    } else if secret.owner.is_some() {
        audit.violation(format!(
            "secret-changed is only sent to observers, and secret {} is owned",
            event.id
        ));
    }

    if event.kind.needs_revision() {
        match event.revision {
            None => audit.violation(format!("{} needs a revision", scenario.event.name())),
            Some(rev)
                if event.kind == SecretEventKind::Remove
                    && rev != secret.tracked_revision
                    && rev != secret.latest_revision =>
            {
                audit.violation(format!(
                    "secret-remove names revision {rev}, but secret {} is at {} (tracked) / {} (latest)",
                    event.id, secret.tracked_revision, secret.latest_revision
                ));
            }
            Some(_) => {}
        }
    }
}

fn check_action(scenario: &Scenario<'_>, event: &ActionEvent, audit: &mut Audit) {
    let Some(action) = scenario.spec.action(&event.name) else {
        audit.violation(format!("action {} is not declared", event.name));
        return;
    };
    for (name, value) in &event.params {
        match action.param_type(name) {
            Some(expected) if !json_type_matches(expected, value) => audit.violation(format!(
                "param {name} should be {expected}, got {value}"
            )),
            None if !action.params.contains_key(name) && !action.additional_properties => {
                audit.violation(format!("param {name} is not declared for {}", event.name));
            }
            _ => {}
        }
    }
    let defaults = action.defaults();
    for required in &action.required {
        if !event.params.contains_key(required) && !defaults.contains_key(required) {
            audit.violation(format!("required param {required} is missing"));
        }
    }
}
