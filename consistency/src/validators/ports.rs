//! Ports validator: tcp/udp ports in range, icmp without a port, no duplicates.

use crate::report::{Audit, ConsistencyReport};
use crate::Scenario;

const VALIDATOR: &str = "ports";

/// Validates `State::opened_ports`.
pub fn validate(scenario: &Scenario<'_>) -> ConsistencyReport {
    let mut audit = Audit::new(VALIDATOR);
    let ports = &scenario.state.opened_ports;

    for (i, port) in ports.iter().enumerate() {
        if let Err(reason) = port.validate() {
            audit.violation(reason);
        }
        if ports[..i].contains(port) {
            audit.violation(format!("{port} is opened more than once"));
        }
    }

    audit.verdict(format!("{} opened ports are valid", ports.len()), "opened ports are invalid")
}

#[cfg(test)]
mod tests {
    use super::*;
    use scenario_state::{
        CharmMeta, CharmSpec, CloudSpec, Event, JujuVersion, ModelInfo, ModelType, Port,
        Protocol, State,
    };

    fn failures(state: &State) -> usize {
        let spec = CharmSpec::new(CharmMeta::new("demo"));
        let version = JujuVersion::default();
        crate::run_all(&Scenario::new(&spec, state, &Event::Start, &version)).failure_count()
    }

    #[test]
    fn port_rules() {
        assert_eq!(failures(&State::new().with_opened_port(Port::tcp(80))), 0);
        let zero = Port {
            protocol: Protocol::Tcp,
            port: Some(0),
        };
        assert_eq!(failures(&State::new().with_opened_port(zero)), 1);
        let icmp_with_port = Port {
            protocol: Protocol::Icmp,
            port: Some(1),
        };
        assert_eq!(failures(&State::new().with_opened_port(icmp_with_port)), 1);
        let dup = State::new()
            .with_opened_port(Port::udp(53))
            .with_opened_port(Port::udp(53));
        assert_eq!(failures(&dup), 1);
    }

    #[test]
    fn cloud_spec_needs_machine_model() {
        let k8s = State::new().with_model(ModelInfo {
            cloud_spec: Some(CloudSpec::new("lxd")),
            ..ModelInfo::default()
        });
        assert_eq!(failures(&k8s), 1);
        let lxd = State::new().with_model(ModelInfo {
            model_type: ModelType::Lxd,
            cloud_spec: Some(CloudSpec::new("lxd")),
            ..ModelInfo::default()
        });
        assert_eq!(failures(&lxd), 0);
    }
}
