//! Secrets validator.
//!
//! - Juju must support secrets if any are present
//! - ids and labels are unique
//! - grants exist only on owned secrets and point at relations in the state

use std::collections::BTreeSet;

use crate::report::{Audit, ConsistencyReport};
use crate::Scenario;

const VALIDATOR: &str = "secrets";

/// Validates `State::secrets`.
pub fn validate(scenario: &Scenario<'_>) -> ConsistencyReport {
    let mut audit = Audit::new(VALIDATOR);
    let secrets = &scenario.state.secrets;

    if !secrets.is_empty() && !scenario.juju_version.has_secrets() {
        audit.violation(format!(
            "the state has secrets but Juju {} does not support them",
            scenario.juju_version
        ));
    }

    let mut ids = BTreeSet::new();
    let mut labels = BTreeSet::new();
    for secret in secrets {
        if !ids.insert(secret.id) {
            audit.violation(format!("secret {} appears more than once", secret.id));
        }
        if let Some(label) = &secret.label {
            if !labels.insert(label.as_str()) {
                audit.violation(format!("label {label:?} is used by more than one secret"));
            }
        }
        if !secret.remote_grants.is_empty() && !secret.is_owned() {
            audit.violation(format!(
                "secret {} has grants but is not owned by this unit or app",
                secret.id
            ));
        }
        for relation_id in secret.remote_grants.keys() {
            if scenario.state.get_relation(*relation_id).is_err() {
                audit.violation(format!(
                    "secret {} is granted on relation {relation_id}, which is not in the state",
                    secret.id
                ));
            }
        }
    }

    audit.verdict(format!("{} secrets are consistent", secrets.len()), "secrets are inconsistent")
}

#[cfg(test)]
mod tests {
    use super::*;
    use scenario_state::{
        CharmMeta, CharmSpec, Event, JujuVersion, RelationId, Secret, SecretId, SecretOwner, State,
    };
    use std::collections::BTreeMap;

    fn failures(state: &State, version: &str) -> usize {
        let spec = CharmSpec::new(CharmMeta::new("demo"));
        let version: JujuVersion = version.parse().unwrap();
        validate(&Scenario::new(&spec, state, &Event::Start, &version)).failure_count()
    }

    #[test]
    fn old_juju_has_no_secrets() {
        let state = State::new().with_secret(Secret::new(SecretId(1), BTreeMap::new()));
        assert_eq!(failures(&state, "3.1"), 0);
        assert_eq!(failures(&state, "2.9"), 1);
    }

    #[test]
    fn labels_are_unique() {
        let state = State::new()
            .with_secret(Secret::new(SecretId(1), BTreeMap::new()).with_label("a"))
            .with_secret(Secret::new(SecretId(2), BTreeMap::new()).with_label("a"));
        assert_eq!(failures(&state, "3.5"), 1);
    }

    #[test]
    fn grants_need_ownership_and_relation() {
        let mut observed = Secret::new(SecretId(1), BTreeMap::new());
        observed
            .remote_grants
            .insert(RelationId(4), ["remote".to_string()].into());
        assert_eq!(failures(&State::new().with_secret(observed.clone()), "3.5"), 1);

        let owned = observed.owned_by(SecretOwner::Unit);
        assert_eq!(failures(&State::new().with_secret(owned), "3.5"), 1);
    }
}
