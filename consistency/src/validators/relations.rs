//! Relations validator.
//!
//! - every relation's endpoint is declared under the section matching its
//!   kind (peers for peer relations, requires/provides otherwise)
//! - subordinate relations sit on container-scoped endpoints
//! - relation ids are unique
//! - an explicit interface agrees with metadata
//! - per-endpoint `limit` is respected
//! - peer relations never list this unit among the peers

use std::collections::{BTreeMap, BTreeSet};

use scenario_state::{AnyRelation, EndpointRole, RelationKind, RelationScope};

use crate::report::{Audit, ConsistencyReport};
use crate::Scenario;

const VALIDATOR: &str = "relations";

/// Validates `State::relations`.
pub fn validate(scenario: &Scenario<'_>) -> ConsistencyReport {
    let mut audit = Audit::new(VALIDATOR);
    let meta = &scenario.spec.meta;

    let mut ids = BTreeSet::new();
    let mut per_endpoint: BTreeMap<&str, u32> = BTreeMap::new();

    for relation in &scenario.state.relations {
        let endpoint = relation.endpoint();
        if !ids.insert(relation.id()) {
            audit.violation(format!("relation id {} is used more than once", relation.id()));
        }
        *per_endpoint.entry(endpoint).or_default() += 1;

        let Some((role, declared)) = meta.endpoint(endpoint) else {
            audit.violation(format!("endpoint {endpoint} is not declared in metadata"));
            continue;
        };

        match (relation.kind(), role) {
            (RelationKind::Peer, EndpointRole::Peers) => {}
            (RelationKind::Peer, _) => audit.violation(format!(
                "peer relation {} is on {endpoint}, which is not declared under peers",
                relation.id()
            )),
            (_, EndpointRole::Peers) => audit.violation(format!(
                "relation {} is on peer endpoint {endpoint}; use a peer relation",
                relation.id()
            )),
            _ => {}
        }

        if relation.kind() == RelationKind::Subordinate && declared.scope != RelationScope::Container
        {
            audit.violation(format!(
                "subordinate relation {} is on {endpoint}, which is not container-scoped",
                relation.id()
            ));
        }

        if let Some(interface) = relation.interface() {
            if interface != declared.interface {
                audit.violation(format!(
                    "relation {} uses interface {interface}, metadata declares {}",
                    relation.id(),
                    declared.interface
                ));
            }
        }

        if let AnyRelation::Peer(peer) = relation {
            if peer.peers_data.contains_key(&scenario.unit_id) {
                audit.violation(format!(
                    "peer relation {} lists this unit ({}) among its peers",
                    relation.id(),
                    scenario.unit_id
                ));
            }
        }
    }

    for (endpoint, count) in per_endpoint {
        if let Some((_, declared)) = meta.endpoint(endpoint) {
            if let Some(limit) = declared.limit {
                if count > limit {
                    audit.violation(format!(
                        "endpoint {endpoint} has {count} relations, limit is {limit}"
                    ));
                }
            }
        }
    }

    audit.verdict(
        format!("{} relations match metadata", scenario.state.relations.len()),
        "relations do not match metadata",
    )
}
