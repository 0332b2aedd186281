//! Config validator: every key is declared and its value has the declared type.

use crate::report::{Audit, ConsistencyReport};
use crate::Scenario;

const VALIDATOR: &str = "config";

/// Validates `State::config` against the charm's config schema.
pub fn validate(scenario: &Scenario<'_>) -> ConsistencyReport {
    let mut audit = Audit::new(VALIDATOR);

    for (key, value) in &scenario.state.config {
        match scenario.spec.config_option(key) {
            None => audit.violation(format!("{key} is not declared in config.yaml")),
            Some(option) if !option.option_type.accepts(value) => audit.violation(format!(
                "{key} is declared as {:?} but set to {value}",
                option.option_type
            )),
            Some(_) => {}
        }
    }

    audit.verdict(
        format!("{} config values match the schema", scenario.state.config.len()),
        "config does not match the schema",
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use scenario_state::{
        CharmMeta, CharmSpec, ConfigOption, ConfigSchema, ConfigType, Event, JujuVersion, State,
    };
    use std::collections::BTreeMap;

    fn spec() -> CharmSpec {
        let option = |t| ConfigOption {
            option_type: t,
            ..ConfigOption::default()
        };
        CharmSpec::new(CharmMeta::new("demo")).with_config(ConfigSchema {
            options: BTreeMap::from([
                ("port".to_string(), option(ConfigType::Int)),
                ("ratio".to_string(), option(ConfigType::Float)),
            ]),
        })
    }

    fn failures(state: &State) -> usize {
        let spec = spec();
        let version = JujuVersion::default();
        validate(&Scenario::new(&spec, state, &Event::ConfigChanged, &version)).failure_count()
    }

    #[test]
    fn declared_and_typed() {
        assert_eq!(failures(&State::new().with_config("port", 80).with_config("ratio", 2)), 0);
        assert_eq!(failures(&State::new().with_config("port", "80")), 1);
        assert_eq!(failures(&State::new().with_config("other", true)), 1);
    }
}
