//! Consistency checker for charm test scenarios.
//!
//! Given the charm's metadata, an input [`State`] and the event about to be
//! fired, decides whether Juju could ever produce that combination. The
//! engine runs [`check`] before every dispatch; a failure means the test
//! setup is wrong, so nothing is retried.
//!
//! # Validators
//!
//! | Validator | Concern |
//! |-----------|---------|
//! | `event` | the event's relation/container/storage/secret/action linkage |
//! | `config` | keys declared, value types |
//! | `secrets` | Juju support, unique ids and labels, grants |
//! | `storages` | declared, unique, within `multiple` range |
//! | `relations` | endpoint role, ids, interface, limit, peer ids |
//! | `containers` | declared, notices, checks, exec mocks |
//! | `networks` | bindings declared |
//! | `resources` | declared |
//! | `stored_state` | unique identity |
//! | `cloud_spec` | machine models only |
//! | `ports` | range, protocol, duplicates |
//!
//! # Entry Point
//!
//! ```
//! use scenario_consistency::{check, Scenario};
//! use scenario_state::{CharmMeta, CharmSpec, Event, JujuVersion, State};
//!
//! let spec = CharmSpec::new(CharmMeta::new("demo"));
//! let state = State::new();
//! let version = JujuVersion::default();
//! let scenario = Scenario::new(&spec, &state, &Event::Start, &version);
//! assert!(check(&scenario).is_ok());
//! ```

#![deny(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    missing_docs,
    clippy::missing_errors_doc
)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

pub mod report;
pub mod validators;

use scenario_state::{CharmSpec, Event, JujuVersion, State};
use tracing::warn;

pub use report::{Audit, ConsistencyReport, Finding, Severity};

/// The triple under scrutiny, plus the runtime facts some checks need.
#[derive(Debug, Clone, Copy)]
pub struct Scenario<'a> {
    /// Charm metadata.
    pub spec: &'a CharmSpec,
    /// Input state.
    pub state: &'a State,
    /// Event to fire.
    pub event: &'a Event,
    /// Juju version the run simulates.
    pub juju_version: &'a JujuVersion,
    /// This unit's id.
    pub unit_id: u32,
}

impl<'a> Scenario<'a> {
    /// A scenario for unit `0`.
    #[must_use]
    pub fn new(
        spec: &'a CharmSpec,
        state: &'a State,
        event: &'a Event,
        juju_version: &'a JujuVersion,
    ) -> Self {
        Self {
            spec,
            state,
            event,
            juju_version,
            unit_id: 0,
        }
    }

    /// Sets this unit's id.
    #[must_use]
    pub fn with_unit_id(mut self, unit_id: u32) -> Self {
        self.unit_id = unit_id;
        self
    }
}

/// The scenario cannot happen under Juju.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("inconsistent scenario:\n{}", .failures.join("\n"))]
pub struct InconsistentScenarioError {
    /// One entry per failed check, with its details.
    pub failures: Vec<String>,
}

/// Runs all validators and returns the aggregated report.
///
/// Validators run in this order: event, config, secrets, storages,
/// relations, containers, networks, resources, stored state, cloud spec,
/// ports.
#[must_use]
pub fn run_all(scenario: &Scenario<'_>) -> ConsistencyReport {
    let mut report = ConsistencyReport::new();

    report.extend(validators::event::validate(scenario));
    report.extend(validators::config::validate(scenario));
    report.extend(validators::secrets::validate(scenario));
    report.extend(validators::storages::validate(scenario));
    report.extend(validators::relations::validate(scenario));
    report.extend(validators::containers::validate(scenario));
    report.extend(validators::networks::validate(scenario));
    report.extend(validators::resources::validate(scenario));
    report.extend(validators::stored_state::validate(scenario));
    report.extend(validators::cloud_spec::validate(scenario));
    report.extend(validators::ports::validate(scenario));

    report
}

/// Runs all validators, logs warnings, and fails on any failure.
///
/// # Errors
///
/// Returns [`InconsistentScenarioError`] listing every failed check.
pub fn check(scenario: &Scenario<'_>) -> Result<ConsistencyReport, InconsistentScenarioError> {
    let report = run_all(scenario);
    for warning in report.warnings() {
        warn!(validator = %warning.validator, "{}", warning.message);
    }
    if report.all_passed() {
        Ok(report)
    } else {
        Err(InconsistentScenarioError {
            failures: report.failures().map(ToString::to_string).collect(),
        })
    }
}
