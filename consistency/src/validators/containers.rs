//! Containers validator.
//!
//! - containers are declared in metadata
//! - notice ids are unique per container and custom notice keys have the
//!   `domain.tld/path` shape Pebble requires
//! - check infos refer to checks the container's plan defines
//! - exec mocks have a non-empty command prefix
//! - workload containers on a machine model only warn

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;
use scenario_state::{ModelType, NoticeType};

use crate::report::{Audit, ConsistencyReport};
use crate::Scenario;

const VALIDATOR: &str = "containers";

static CUSTOM_NOTICE_KEY: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9]+(?:[.-][a-z0-9]+)*\.[a-z]{2,}/[A-Za-z0-9._~/-]+$").ok()
});

/// Validates `State::containers`.
pub fn validate(scenario: &Scenario<'_>) -> ConsistencyReport {
    let mut audit = Audit::new(VALIDATOR);
    let containers = &scenario.state.containers;

    let mut names = BTreeSet::new();
    for container in containers {
        let name = &container.name;
        if !scenario.spec.meta.containers.contains_key(name) {
            audit.violation(format!("container {name} is not declared in metadata"));
        }
        if !names.insert(name.as_str()) {
            audit.violation(format!("container {name} appears more than once"));
        }

        let mut notice_ids = BTreeSet::new();
        for notice in &container.notices {
            if !notice_ids.insert(notice.id) {
                audit.violation(format!("{name}: notice id {} is used more than once", notice.id));
            }
            if notice.notice_type == NoticeType::Custom {
                if let Some(pattern) = CUSTOM_NOTICE_KEY.as_ref() {
                    if !pattern.is_match(&notice.key) {
                        audit.violation(format!(
                            "{name}: custom notice key {:?} is not of the form domain.tld/path",
                            notice.key
                        ));
                    }
                }
            }
        }

        let plan = container.plan();
        for info in &container.check_infos {
            if !plan.checks.contains_key(&info.name) {
                audit.violation(format!(
                    "{name}: check info {} has no matching check in any layer",
                    info.name
                ));
            }
        }

        for exec in &container.execs {
            if exec.command_prefix.is_empty() {
                audit.violation(format!("{name}: an exec mock has an empty command prefix"));
            }
        }
    }

    if !containers.is_empty() && scenario.state.model.model_type != ModelType::Kubernetes {
        audit.caution("workload containers on a machine model; Pebble only runs on Kubernetes");
    }

    audit.verdict(
        format!("{} containers are consistent", containers.len()),
        "containers are inconsistent",
    )
}
