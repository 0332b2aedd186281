//! Cloud spec validator: `credential-get` only exists on machine models.

use scenario_state::ModelType;

use crate::report::{Audit, ConsistencyReport};
use crate::Scenario;

const VALIDATOR: &str = "cloud_spec";

/// Validates `State::model.cloud_spec`.
pub fn validate(scenario: &Scenario<'_>) -> ConsistencyReport {
    let mut audit = Audit::new(VALIDATOR);
    let model = &scenario.state.model;

    if model.cloud_spec.is_some() && model.model_type == ModelType::Kubernetes {
        audit.violation(format!(
            "model {} is a Kubernetes model; cloud specs are only available on machine models",
            model.name
        ));
    }

    audit.verdict("cloud spec matches the model type", "cloud spec on a Kubernetes model")
}
