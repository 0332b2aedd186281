//! Storage validator: declared, unique, and within the declared `multiple` range.

use std::collections::{BTreeMap, BTreeSet};

use crate::report::{Audit, ConsistencyReport};
use crate::Scenario;

const VALIDATOR: &str = "storages";

/// Validates `State::storages`.
pub fn validate(scenario: &Scenario<'_>) -> ConsistencyReport {
    let mut audit = Audit::new(VALIDATOR);
    let declared = &scenario.spec.meta.storage;

    let mut seen = BTreeSet::new();
    let mut counts: BTreeMap<&str, u32> = BTreeMap::new();
    for storage in &scenario.state.storages {
        if !declared.contains_key(&storage.name) {
            audit.violation(format!("storage {} is not declared in metadata", storage.name));
        }
        if !seen.insert((storage.name.as_str(), storage.index)) {
            audit.violation(format!("storage {} appears more than once", storage.storage_id()));
        }
        *counts.entry(storage.name.as_str()).or_default() += 1;
    }

    for (name, count) in counts {
        let Some(meta) = declared.get(name) else {
            continue;
        };
        let max = match &meta.multiple {
            None => Some(1),
            Some(multiple) => match multiple.bounds() {
                Some((_, upper)) => upper,
                None => {
                    audit.violation(format!(
                        "storage {name} has an unreadable multiple range {:?}",
                        multiple.range
                    ));
                    continue;
                }
            },
        };
        if let Some(max) = max {
            if count > max {
                audit.violation(format!(
                    "storage {name} has {count} instances, at most {max} allowed"
                ));
            }
        }
    }

    audit.verdict(
        format!("{} storage instances are declared", scenario.state.storages.len()),
        "storage instances do not match metadata",
    )
}
