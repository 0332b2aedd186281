//! The `JUJU_*` environment a hook would be started with.
//!
//! The dispatcher decodes its event from this map, never from the process
//! environment, so two runs cannot leak into each other.

use std::collections::BTreeMap;
use std::path::Path;

use scenario_state::{ActionEvent, ActionId, Event, JujuVersion, State, Storage};
use serde_json::Value;

use crate::error::ScenarioError;

/// `JUJU_*` variables for one hook invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HookEnvironment {
    vars: BTreeMap<String, String>,
}

impl HookEnvironment {
    /// The environment Juju would set for `event` on `unit_name`.
    #[must_use]
    pub fn for_event(
        event: &Event,
        state: &State,
        unit_name: &str,
        juju_version: &JujuVersion,
        charm_dir: &Path,
    ) -> Self {
        let mut env = Self::default();
        if let Some(path) = event.dispatch_path() {
            env.set("JUJU_DISPATCH_PATH", path);
        }
        env.set("JUJU_UNIT_NAME", unit_name);
        env.set("JUJU_MODEL_NAME", &state.model.name);
        env.set("JUJU_MODEL_UUID", &state.model.uuid);
        env.set("JUJU_VERSION", juju_version.to_string());
        env.set("JUJU_CHARM_DIR", charm_dir.display().to_string());

        let this_app = unit_name.split_once('/').map_or(unit_name, |(app, _)| app);
        match event {
            Event::Relation(r) => {
                env.set("JUJU_RELATION", &r.endpoint);
                env.set("JUJU_RELATION_ID", format!("{}:{}", r.endpoint, r.relation_id));
                if let Ok(relation) = state.get_relation(r.relation_id) {
                    let remote_app = relation.remote_app_name(this_app);
                    env.set("JUJU_REMOTE_APP", remote_app);
                    if let Some(unit) = r.remote_unit {
                        env.set("JUJU_REMOTE_UNIT", format!("{remote_app}/{unit}"));
                    }
                    if let Some(unit) = r.departing_unit {
                        env.set("JUJU_DEPARTING_UNIT", format!("{remote_app}/{unit}"));
                    }
                }
            }
            Event::Workload(w) => {
                env.set("JUJU_WORKLOAD_NAME", &w.container);
                if let Some(notice) = &w.notice {
                    env.set("JUJU_NOTICE_ID", notice.id.to_string());
                    env.set("JUJU_NOTICE_KEY", &notice.key);
                    env.set("JUJU_NOTICE_TYPE", notice.notice_type.as_str());
                }
                if let Some(check) = &w.check {
                    env.set("JUJU_PEBBLE_CHECK_NAME", check);
                }
            }
            Event::Storage(s) => {
                env.set("JUJU_STORAGE_ID", Storage::new(&s.name, s.index).storage_id());
            }
            Event::Secret(s) => {
                env.set("JUJU_SECRET_ID", s.id.to_string());
                if let Some(label) = &s.label {
                    env.set("JUJU_SECRET_LABEL", label);
                }
                if let Some(revision) = s.revision {
                    env.set("JUJU_SECRET_REVISION", revision.to_string());
                }
            }
            Event::Action(a) => {
                env.set("JUJU_ACTION_NAME", &a.name);
                env.set("JUJU_ACTION_UUID", a.id.to_string());
            }
            _ => {}
        }
        env
    }

    fn set(&mut self, key: &str, value: impl Into<String>) {
        self.vars.insert(key.to_string(), value.into());
    }

    /// One variable.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// All variables.
    #[must_use]
    pub fn vars(&self) -> &BTreeMap<String, String> {
        &self.vars
    }

    /// Rebuilds the event the way the charm's dispatcher would, from the
    /// dispatch path and the event-specific variables.
    ///
    /// Action parameters are not part of the environment; the decoded
    /// action carries none.
    ///
    /// # Errors
    ///
    /// Returns [`ScenarioError::Environment`] when the dispatch path is
    /// missing or a variable the event needs is absent or malformed.
    pub fn decode(&self) -> Result<Event, ScenarioError> {
        let path = self
            .get("JUJU_DISPATCH_PATH")
            .ok_or_else(|| ScenarioError::Environment("JUJU_DISPATCH_PATH is not set".into()))?;

        if let Some(action) = path.strip_prefix("actions/") {
            let id = self
                .get("JUJU_ACTION_UUID")
                .and_then(|id| id.parse().ok())
                .ok_or_else(|| bad("JUJU_ACTION_UUID"))?;
            return Ok(Event::Action(ActionEvent {
                name: action.to_string(),
                id: ActionId(id),
                params: BTreeMap::new(),
            }));
        }

        let hook = path
            .strip_prefix("hooks/")
            .ok_or_else(|| ScenarioError::Environment(format!("unexpected dispatch path {path}")))?;
        let mut snapshot = BTreeMap::new();

        if let Some(relation) = self.get("JUJU_RELATION_ID") {
            let (endpoint, id) = relation
                .rsplit_once(':')
                .and_then(|(e, id)| Some((e, id.parse::<u32>().ok()?)))
                .ok_or_else(|| bad("JUJU_RELATION_ID"))?;
            snapshot.insert("relation_name".to_string(), Value::from(endpoint));
            snapshot.insert("relation_id".to_string(), Value::from(id));
        }
        for (var, key) in [
            ("JUJU_REMOTE_UNIT", "unit_id"),
            ("JUJU_DEPARTING_UNIT", "departing_unit_id"),
        ] {
            if let Some(unit) = self.get(var) {
                let id = unit
                    .rsplit_once('/')
                    .and_then(|(_, n)| n.parse::<u32>().ok())
                    .ok_or_else(|| bad(var))?;
                snapshot.insert(key.to_string(), Value::from(id));
            }
        }
        if let Some(container) = self.get("JUJU_WORKLOAD_NAME") {
            snapshot.insert("container_name".to_string(), Value::from(container));
        }
        if let Some(id) = self.get("JUJU_NOTICE_ID") {
            let id = id.parse::<u32>().map_err(|_| bad("JUJU_NOTICE_ID"))?;
            snapshot.insert("notice_id".to_string(), Value::from(id));
        }
        for (var, key) in [
            ("JUJU_NOTICE_KEY", "notice_key"),
            ("JUJU_NOTICE_TYPE", "notice_type"),
            ("JUJU_PEBBLE_CHECK_NAME", "check_name"),
            ("JUJU_SECRET_ID", "id"),
            ("JUJU_SECRET_LABEL", "label"),
        ] {
            if let Some(value) = self.get(var) {
                snapshot.insert(key.to_string(), Value::from(value));
            }
        }
        if let Some(revision) = self.get("JUJU_SECRET_REVISION") {
            let revision = revision
                .parse::<u32>()
                .map_err(|_| bad("JUJU_SECRET_REVISION"))?;
            snapshot.insert("revision".to_string(), Value::from(revision));
        }
        if let Some(storage) = self.get("JUJU_STORAGE_ID") {
            let (name, index) = Storage::parse_id(storage).ok_or_else(|| bad("JUJU_STORAGE_ID"))?;
            snapshot.insert("storage_name".to_string(), Value::from(name));
            snapshot.insert("storage_index".to_string(), Value::from(index));
        }

        Event::restore(&hook.replace('-', "_"), &snapshot)
            .map_err(|err| ScenarioError::Environment(err.to_string()))
    }
}

fn bad(var: &str) -> ScenarioError {
    ScenarioError::Environment(format!("{var} is missing or malformed"))
}
