//! Workload containers and the Pebble plan, services, checks and notices
//! they expose.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::LookupError;
use crate::ids::NoticeId;

/// A host directory mounted into the container at `location`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mount {
    /// Absolute path inside the container.
    pub location: String,
    /// Host directory backing the mount.
    pub source: PathBuf,
}

/// A mocked command: any exec whose argv starts with `command_prefix`
/// resolves to this result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exec {
    /// Argv prefix this mock answers for.
    pub command_prefix: Vec<String>,
    /// Process exit code.
    #[serde(default)]
    pub return_code: i32,
    /// Captured standard output.
    #[serde(default)]
    pub stdout: String,
    /// Captured standard error.
    #[serde(default)]
    pub stderr: String,
}

impl Exec {
    /// A mock for `command_prefix` that exits 0 with no output.
    pub fn new<S: Into<String>>(command_prefix: impl IntoIterator<Item = S>) -> Self {
        Self {
            command_prefix: command_prefix.into_iter().map(Into::into).collect(),
            return_code: 0,
            stdout: String::new(),
            stderr: String::new(),
        }
    }

    /// Sets the exit code.
    #[must_use]
    pub fn with_return_code(mut self, code: i32) -> Self {
        self.return_code = code;
        self
    }

    /// Sets standard output.
    #[must_use]
    pub fn with_stdout(mut self, stdout: impl Into<String>) -> Self {
        self.stdout = stdout.into();
        self
    }

    /// Sets standard error.
    #[must_use]
    pub fn with_stderr(mut self, stderr: impl Into<String>) -> Self {
        self.stderr = stderr.into();
        self
    }

    /// True when `command` starts with this mock's prefix.
    #[must_use]
    pub fn matches(&self, command: &[String]) -> bool {
        command.len() >= self.command_prefix.len()
            && command[..self.command_prefix.len()] == self.command_prefix[..]
    }
}

/// Whether a layer entry merges into or replaces an existing entry of the same name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Override {
    /// Overlay set fields onto the existing entry.
    #[default]
    Merge,
    /// Drop the existing entry.
    Replace,
}

/// Whether Pebble starts a service on `replan`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Startup {
    /// Not set in any layer.
    #[default]
    Unknown,
    /// Started by `replan` and on boot.
    Enabled,
    /// Only started explicitly.
    Disabled,
}

/// Current state of a Pebble service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    /// Running.
    Active,
    /// Not running.
    #[default]
    Inactive,
    /// Exited with an error.
    Error,
}

/// A service entry in a Pebble layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    /// Merge or replace.
    #[serde(rename = "override", default)]
    pub override_: Override,
    /// One-line summary.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// Command line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    /// Startup policy.
    #[serde(default)]
    pub startup: Startup,
    /// Environment variables.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub environment: BTreeMap<String, String>,
    /// User to run as.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    /// Group to run as.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    /// Working directory.
    #[serde(rename = "working-dir", default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<String>,
    /// Services this one starts after.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub after: Vec<String>,
    /// Services this one starts before.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub before: Vec<String>,
    /// Services that must be running for this one.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requires: Vec<String>,
}

impl Service {
    /// Applies `other` on top of `self` following Pebble's merge rules.
    fn merge(&mut self, other: &Service) {
        if other.override_ == Override::Replace {
            *self = other.clone();
            return;
        }
        if other.summary.is_some() {
            self.summary.clone_from(&other.summary);
        }
        if other.command.is_some() {
            self.command.clone_from(&other.command);
        }
        if other.startup != Startup::Unknown {
            self.startup = other.startup;
        }
        if other.user.is_some() {
            self.user.clone_from(&other.user);
        }
        if other.group.is_some() {
            self.group.clone_from(&other.group);
        }
        if other.working_dir.is_some() {
            self.working_dir.clone_from(&other.working_dir);
        }
        self.environment.extend(other.environment.clone());
        self.after.extend(other.after.iter().cloned());
        self.before.extend(other.before.iter().cloned());
        self.requires.extend(other.requires.iter().cloned());
    }
}

/// Check severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckLevel {
    /// Liveness check.
    Alive,
    /// Readiness check.
    Ready,
}

/// A health check entry in a Pebble layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Check {
    /// Merge or replace.
    #[serde(rename = "override", default)]
    pub override_: Override,
    /// Level, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<CheckLevel>,
    /// Interval between runs, e.g. `10s`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period: Option<String>,
    /// Failures before the check is considered down.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<u32>,
    /// Command for exec checks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exec: Option<String>,
    /// URL for HTTP checks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http: Option<String>,
    /// Port for TCP checks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tcp: Option<u16>,
}

impl Check {
    fn merge(&mut self, other: &Check) {
        if other.override_ == Override::Replace {
            *self = other.clone();
            return;
        }
        if other.level.is_some() {
            self.level = other.level;
        }
        if other.period.is_some() {
            self.period.clone_from(&other.period);
        }
        if other.threshold.is_some() {
            self.threshold = other.threshold;
        }
        if other.exec.is_some() {
            self.exec.clone_from(&other.exec);
        }
        if other.http.is_some() {
            self.http.clone_from(&other.http);
        }
        if other.tcp.is_some() {
            self.tcp = other.tcp;
        }
    }
}

/// A Pebble configuration layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Layer {
    /// One-line summary.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// Longer description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Services by name.
    #[serde(default)]
    pub services: BTreeMap<String, Service>,
    /// Checks by name.
    #[serde(default)]
    pub checks: BTreeMap<String, Check>,
}

impl Layer {
    /// Folds `other` into this layer, entry by entry, as Pebble does when a
    /// layer is added with `combine` under an existing label.
    pub fn combine(&mut self, other: &Layer) {
        if other.summary.is_some() {
            self.summary.clone_from(&other.summary);
        }
        if other.description.is_some() {
            self.description.clone_from(&other.description);
        }
        for (name, service) in &other.services {
            self.services
                .entry(name.clone())
                .or_default()
                .merge(service);
        }
        for (name, check) in &other.checks {
            self.checks.entry(name.clone()).or_default().merge(check);
        }
    }
}

/// The merged view of every layer in a container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    /// Merged services.
    pub services: BTreeMap<String, Service>,
    /// Merged checks.
    pub checks: BTreeMap<String, Check>,
}

impl Plan {
    /// Applies `layer` on top of this plan.
    pub fn apply(&mut self, layer: &Layer) {
        for (name, service) in &layer.services {
            self.services
                .entry(name.clone())
                .or_default()
                .merge(service);
        }
        for (name, check) in &layer.checks {
            self.checks.entry(name.clone()).or_default().merge(check);
        }
    }
}

/// Kind of a Pebble notice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NoticeType {
    /// Recorded by a client with `pebble notify`.
    #[default]
    Custom,
    /// A change's status was updated.
    ChangeUpdate,
    /// A warning was recorded.
    Warning,
}

impl NoticeType {
    /// Pebble's spelling of the type.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            NoticeType::Custom => "custom",
            NoticeType::ChangeUpdate => "change-update",
            NoticeType::Warning => "warning",
        }
    }
}

/// A Pebble notice. Timestamps are unix seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    /// Notice id.
    pub id: NoticeId,
    /// Notice key, e.g. `example.com/db-ready`.
    pub key: String,
    /// Notice type.
    #[serde(rename = "type", default)]
    pub notice_type: NoticeType,
    /// User the notice is visible to; `None` means public.
    #[serde(default)]
    pub user_id: Option<u32>,
    /// First occurrence.
    #[serde(default)]
    pub first_occurred: u64,
    /// Latest occurrence.
    #[serde(default)]
    pub last_occurred: u64,
    /// Latest repeat.
    #[serde(default)]
    pub last_repeated: u64,
    /// Number of occurrences.
    #[serde(default = "one")]
    pub occurrences: u32,
    /// Data attached to the latest occurrence.
    #[serde(default)]
    pub last_data: BTreeMap<String, String>,
    /// Minimum seconds before a repeat is recorded.
    #[serde(default)]
    pub repeat_after: Option<u64>,
    /// Seconds after which the notice expires.
    #[serde(default)]
    pub expire_after: Option<u64>,
}

fn one() -> u32 {
    1
}

impl Notice {
    /// A custom notice with a single occurrence.
    pub fn new(id: NoticeId, key: impl Into<String>) -> Self {
        Self {
            id,
            key: key.into(),
            notice_type: NoticeType::Custom,
            user_id: None,
            first_occurred: 0,
            last_occurred: 0,
            last_repeated: 0,
            occurrences: 1,
            last_data: BTreeMap::new(),
            repeat_after: None,
            expire_after: None,
        }
    }

    /// Sets the data of the latest occurrence.
    #[must_use]
    pub fn with_last_data<K: Into<String>, V: Into<String>>(
        mut self,
        data: impl IntoIterator<Item = (K, V)>,
    ) -> Self {
        self.last_data = data.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        self
    }
}

/// Whether a check is passing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    /// Passing.
    #[default]
    Up,
    /// Failing past its threshold.
    Down,
}

/// Runtime information about a check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckInfo {
    /// Check name; must exist in the container's layers.
    pub name: String,
    /// Level, if any.
    #[serde(default)]
    pub level: Option<CheckLevel>,
    /// Current status.
    #[serde(default)]
    pub status: CheckStatus,
    /// Consecutive failures.
    #[serde(default)]
    pub failures: u32,
    /// Failures before the check is down.
    #[serde(default = "default_threshold")]
    pub threshold: u32,
}

fn default_threshold() -> u32 {
    3
}

impl CheckInfo {
    /// A passing check.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            level: None,
            status: CheckStatus::Up,
            failures: 0,
            threshold: default_threshold(),
        }
    }

    /// Marks the check down with `failures` consecutive failures.
    #[must_use]
    pub fn down(mut self, failures: u32) -> Self {
        self.status = CheckStatus::Down;
        self.failures = failures;
        self
    }
}

/// A service as `get_services` reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceInfo {
    /// Service name.
    pub name: String,
    /// Startup policy from the plan.
    pub startup: Startup,
    /// Current status.
    pub current: ServiceStatus,
}

fn default_true() -> bool {
    true
}

/// A workload container managed through Pebble.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Container {
    /// Container name; must be declared in metadata.
    pub name: String,
    /// Whether Pebble is reachable.
    #[serde(default = "default_true")]
    pub can_connect: bool,
    /// Layers in the order they were added.
    #[serde(default)]
    pub layers: Vec<(String, Layer)>,
    /// Service name to current status.
    #[serde(default)]
    pub service_statuses: BTreeMap<String, ServiceStatus>,
    /// Mounts by name.
    #[serde(default)]
    pub mounts: BTreeMap<String, Mount>,
    /// Registered command mocks.
    #[serde(default)]
    pub execs: Vec<Exec>,
    /// Pending notices.
    #[serde(default)]
    pub notices: Vec<Notice>,
    /// Check runtime information.
    #[serde(default)]
    pub check_infos: Vec<CheckInfo>,
}

impl Container {
    /// A connectable container with an empty plan.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            can_connect: true,
            layers: Vec::new(),
            service_statuses: BTreeMap::new(),
            mounts: BTreeMap::new(),
            execs: Vec::new(),
            notices: Vec::new(),
            check_infos: Vec::new(),
        }
    }

    /// Sets connectivity.
    #[must_use]
    pub fn with_can_connect(mut self, can_connect: bool) -> Self {
        self.can_connect = can_connect;
        self
    }

    /// Appends a layer.
    #[must_use]
    pub fn with_layer(mut self, label: impl Into<String>, layer: Layer) -> Self {
        self.layers.push((label.into(), layer));
        self
    }

    /// Sets a service status.
    #[must_use]
    pub fn with_service_status(mut self, service: impl Into<String>, status: ServiceStatus) -> Self {
        self.service_statuses.insert(service.into(), status);
        self
    }

    /// Adds a mount.
    #[must_use]
    pub fn with_mount(mut self, name: impl Into<String>, mount: Mount) -> Self {
        self.mounts.insert(name.into(), mount);
        self
    }

    /// Registers a command mock.
    #[must_use]
    pub fn with_exec(mut self, exec: Exec) -> Self {
        self.execs.push(exec);
        self
    }

    /// Adds a notice.
    #[must_use]
    pub fn with_notice(mut self, notice: Notice) -> Self {
        self.notices.push(notice);
        self
    }

    /// Adds check runtime information.
    #[must_use]
    pub fn with_check_info(mut self, info: CheckInfo) -> Self {
        self.check_infos.push(info);
        self
    }

    /// The merged plan of all layers, in insertion order.
    #[must_use]
    pub fn plan(&self) -> Plan {
        let mut plan = Plan::default();
        for (_, layer) in &self.layers {
            plan.apply(layer);
        }
        plan
    }

    /// Services in the plan with their current status.
    #[must_use]
    pub fn services(&self) -> Vec<ServiceInfo> {
        self.plan()
            .services
            .into_iter()
            .map(|(name, service)| ServiceInfo {
                current: self
                    .service_statuses
                    .get(&name)
                    .copied()
                    .unwrap_or_default(),
                startup: service.startup,
                name,
            })
            .collect()
    }

    /// The exec mock with the longest prefix of `command`.
    #[must_use]
    pub fn find_exec(&self, command: &[String]) -> Option<&Exec> {
        self.execs
            .iter()
            .filter(|e| e.matches(command))
            .max_by_key(|e| e.command_prefix.len())
    }

    /// Notice by id.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError`] if no notice has that id.
    pub fn get_notice(&self, id: NoticeId) -> Result<&Notice, LookupError> {
        self.notices
            .iter()
            .find(|n| n.id == id)
            .ok_or_else(|| LookupError::new("notice", id))
    }

    /// Check information by check name.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError`] if the check is unknown.
    pub fn get_check_info(&self, name: &str) -> Result<&CheckInfo, LookupError> {
        self.check_infos
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| LookupError::new("check", name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn argv(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn longest_prefix_wins() {
        let c = Container::new("workload")
            .with_exec(Exec::new(["ls"]).with_stdout("short"))
            .with_exec(Exec::new(["ls", "-ll"]).with_stdout("long"));
        let hit = c.find_exec(&argv(&["ls", "-ll", "extra"])).unwrap();
        assert_eq!(hit.stdout, "long");
        let hit = c.find_exec(&argv(&["ls", "-a"])).unwrap();
        assert_eq!(hit.stdout, "short");
        assert!(c.find_exec(&argv(&["cat"])).is_none());
    }

    #[test]
    fn plan_merges_layers_in_order() {
        let base = Layer {
            services: BTreeMap::from([(
                "web".to_string(),
                Service {
                    command: Some("/bin/web".into()),
                    startup: Startup::Enabled,
                    environment: BTreeMap::from([("A".into(), "1".into())]),
                    ..Service::default()
                },
            )]),
            ..Layer::default()
        };
        let overlay = Layer {
            services: BTreeMap::from([(
                "web".to_string(),
                Service {
                    environment: BTreeMap::from([("B".into(), "2".into())]),
                    ..Service::default()
                },
            )]),
            ..Layer::default()
        };
        let c = Container::new("w")
            .with_layer("base", base)
            .with_layer("overlay", overlay);
        let web = &c.plan().services["web"];
        assert_eq!(web.command.as_deref(), Some("/bin/web"));
        assert_eq!(web.startup, Startup::Enabled);
        assert_eq!(web.environment.len(), 2);
    }

    #[test]
    fn replace_drops_previous_definition() {
        let c = Container::new("w")
            .with_layer(
                "a",
                Layer {
                    services: BTreeMap::from([(
                        "svc".to_string(),
                        Service {
                            command: Some("old".into()),
                            user: Some("root".into()),
                            ..Service::default()
                        },
                    )]),
                    ..Layer::default()
                },
            )
            .with_layer(
                "b",
                Layer {
                    services: BTreeMap::from([(
                        "svc".to_string(),
                        Service {
                            override_: Override::Replace,
                            command: Some("new".into()),
                            ..Service::default()
                        },
                    )]),
                    ..Layer::default()
                },
            );
        let svc = &c.plan().services["svc"];
        assert_eq!(svc.command.as_deref(), Some("new"));
        assert_eq!(svc.user, None);
    }

    #[test]
    fn services_report_inactive_by_default() {
        let c = Container::new("w").with_layer(
            "a",
            Layer {
                services: BTreeMap::from([("svc".to_string(), Service::default())]),
                ..Layer::default()
            },
        );
        assert_eq!(c.services()[0].current, ServiceStatus::Inactive);
    }

    proptest! {
        /// Whatever suffix follows, the most specific registered prefix answers.
        #[test]
        fn prop_longest_prefix_match(suffix in proptest::collection::vec("[a-z]{1,4}", 0..4)) {
            let c = Container::new("w")
                .with_exec(Exec::new(["ls"]).with_return_code(1))
                .with_exec(Exec::new(["ls", "-ll"]).with_return_code(2));
            let mut cmd = argv(&["ls", "-ll"]);
            cmd.extend(suffix);
            prop_assert_eq!(c.find_exec(&cmd).map(|e| e.return_code), Some(2));
        }
    }
}
