//! Run options for a [`Context`](crate::Context).

use std::env;
use std::path::PathBuf;

use scenario_state::JujuVersion;
use tracing::warn;

/// Environment variable that disables the consistency gate.
pub const SKIP_CONSISTENCY_CHECKS_ENV: &str = "SCENARIO_SKIP_CONSISTENCY_CHECKS";
/// Environment variable that overrides the simulated Juju version.
pub const JUJU_VERSION_ENV: &str = "SCENARIO_JUJU_VERSION";

/// Options that shape every run of one `Context`.
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeConfig {
    /// Juju version to simulate.
    pub juju_version: JujuVersion,
    /// Application name; defaults to the charm name from metadata.
    pub app_name: Option<String>,
    /// This unit's number.
    pub unit_id: u32,
    /// Whether the application was deployed with `--trust`.
    pub app_trusted: bool,
    /// Record re-emitted deferred events in the emitted-event history.
    pub capture_deferred_events: bool,
    /// Record collect-status, pre-commit and commit in the emitted-event history.
    pub capture_framework_events: bool,
    /// Caller-owned charm root; otherwise a temporary one is made per run.
    pub charm_root: Option<PathBuf>,
    /// Skip the consistency gate.
    pub skip_consistency_checks: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            juju_version: JujuVersion::default(),
            app_name: None,
            unit_id: 0,
            app_trusted: false,
            capture_deferred_events: false,
            capture_framework_events: false,
            charm_root: None,
            skip_consistency_checks: false,
        }
    }
}

impl RuntimeConfig {
    /// Defaults, with the escape hatch and Juju version read from the
    /// process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Defaults, with the escape hatch and Juju version read through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(flag) = lookup(SKIP_CONSISTENCY_CHECKS_ENV) {
            config.skip_consistency_checks = is_truthy(&flag);
        }
        if let Some(raw) = lookup(JUJU_VERSION_ENV) {
            match raw.parse() {
                Ok(version) => config.juju_version = version,
                Err(err) => warn!(%err, "ignoring {JUJU_VERSION_ENV}"),
            }
        }
        config
    }
}

fn is_truthy(flag: &str) -> bool {
    let flag = flag.trim();
    !(flag.is_empty() || flag == "0" || flag.eq_ignore_ascii_case("false"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> RuntimeConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        RuntimeConfig::from_lookup(|k| vars.get(k).cloned())
    }

    #[test]
    fn escape_hatch_values() {
        assert!(!config(&[]).skip_consistency_checks);
        assert!(config(&[(SKIP_CONSISTENCY_CHECKS_ENV, "1")]).skip_consistency_checks);
        assert!(config(&[(SKIP_CONSISTENCY_CHECKS_ENV, "yes")]).skip_consistency_checks);
        assert!(!config(&[(SKIP_CONSISTENCY_CHECKS_ENV, "0")]).skip_consistency_checks);
        assert!(!config(&[(SKIP_CONSISTENCY_CHECKS_ENV, "False")]).skip_consistency_checks);
    }

    #[test]
    fn juju_version_override() {
        assert_eq!(config(&[]).juju_version, JujuVersion::new(3, 5, 0));
        assert_eq!(
            config(&[(JUJU_VERSION_ENV, "3.1.7")]).juju_version,
            JujuVersion::new(3, 1, 7)
        );
        assert_eq!(
            config(&[(JUJU_VERSION_ENV, "garbage")]).juju_version,
            JujuVersion::default()
        );
    }
}
