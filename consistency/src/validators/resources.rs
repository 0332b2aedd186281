//! Resources validator: every resource on disk is declared.

use crate::report::{Audit, ConsistencyReport};
use crate::Scenario;

const VALIDATOR: &str = "resources";

/// Validates `State::resources`.
pub fn validate(scenario: &Scenario<'_>) -> ConsistencyReport {
    let mut audit = Audit::new(VALIDATOR);
    for resource in &scenario.state.resources {
        if !scenario.spec.meta.resources.contains_key(&resource.name) {
            audit.violation(format!("resource {} is not declared in metadata", resource.name));
        }
    }

    audit.verdict(
        format!("{} resources are declared", scenario.state.resources.len()),
        "resources are not declared",
    )
}
