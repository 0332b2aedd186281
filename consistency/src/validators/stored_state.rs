//! Stored state validator: `(owner_path, name)` identifies at most one entry.

use std::collections::BTreeSet;

use crate::report::{Audit, ConsistencyReport};
use crate::Scenario;

const VALIDATOR: &str = "stored_state";

/// Validates `State::stored_states`.
pub fn validate(scenario: &Scenario<'_>) -> ConsistencyReport {
    let mut audit = Audit::new(VALIDATOR);
    let mut seen = BTreeSet::new();

    for stored in &scenario.state.stored_states {
        if !seen.insert((stored.owner_path.as_deref(), stored.name.as_str())) {
            audit.violation(format!("{} appears more than once", stored.handle_path()));
        }
    }

    audit.verdict(
        format!("{} stored states are unique", scenario.state.stored_states.len()),
        "stored states collide",
    )
}
