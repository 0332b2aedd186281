//! Networks validator: every explicit network is for a declared binding.

use crate::report::{Audit, ConsistencyReport};
use crate::Scenario;

const VALIDATOR: &str = "networks";

/// Validates `State::networks`.
pub fn validate(scenario: &Scenario<'_>) -> ConsistencyReport {
    let mut audit = Audit::new(VALIDATOR);
    for network in &scenario.state.networks {
        if !scenario.spec.meta.has_binding(&network.binding_name) {
            audit.violation(format!(
                "network {} is neither a relation endpoint nor an extra binding",
                network.binding_name
            ));
        }
    }

    audit.verdict(
        format!("{} networks are bound", scenario.state.networks.len()),
        "networks reference undeclared bindings",
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use scenario_state::{CharmMeta, CharmSpec, Event, JujuVersion, Network, State};

    #[test]
    fn extra_bindings_count() {
        let mut meta = CharmMeta::new("demo");
        meta.extra_bindings.insert("metrics".into(), None);
        let spec = CharmSpec::new(meta);
        let version = JujuVersion::default();

        let ok = State::new().with_network(Network::default_for("metrics"));
        assert!(validate(&Scenario::new(&spec, &ok, &Event::Start, &version)).all_passed());

        let bad = State::new().with_network(Network::default_for("db"));
        assert_eq!(
            validate(&Scenario::new(&spec, &bad, &Event::Start, &version)).failure_count(),
            1
        );
    }
}
