//! Context-lifetime bookkeeping: identity counters and side-channel histories.
//!
//! Nothing here is part of the [`State`](scenario_state::State). Histories are
//! appended in call order and only reset by building a new `Context`.

use std::cell::Cell;
use std::collections::BTreeMap;
use std::fmt;

use scenario_state::{ActionId, Event, NoticeId, RelationId, SecretId, Status, StorageIndex};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `juju-log` severity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    /// `DEBUG`
    Debug,
    /// `INFO`
    #[default]
    Info,
    /// `WARNING`
    Warning,
    /// `ERROR`
    Error,
    /// `CRITICAL`
    Critical,
}

impl LogLevel {
    /// The level as `juju-log --log-level` spells it.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
            LogLevel::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One `juju-log` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JujuLogLine {
    /// Severity.
    pub level: LogLevel,
    /// Message.
    pub message: String,
}

/// Why an event was emitted during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventOrigin {
    /// The event the run was asked to fire.
    Juju,
    /// Re-emitted from the deferred queue.
    Deferred,
    /// Emitted by charm code.
    Custom,
    /// Collect-status, pre-commit or commit.
    Framework,
}

/// An event instance emitted during a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmittedEvent {
    /// The event.
    pub event: Event,
    /// How it came to be emitted.
    pub origin: EventOrigin,
}

impl EmittedEvent {
    /// Framework path name of the event.
    #[must_use]
    pub fn name(&self) -> String {
        self.event.name()
    }
}

/// Arguments of one `exec` call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecArgs {
    /// Full argv.
    pub command: Vec<String>,
    /// Extra environment.
    pub environment: BTreeMap<String, String>,
    /// Working directory.
    pub working_dir: Option<String>,
    /// Timeout in seconds.
    pub timeout: Option<f64>,
    /// User name.
    pub user: Option<String>,
    /// Group name.
    pub group: Option<String>,
    /// Standard input.
    pub stdin: Option<String>,
}

/// Append-only histories owned by one `Context`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Recorder {
    /// `juju-log` lines.
    pub juju_log: Vec<JujuLogLine>,
    /// The unit status in force before each `status-set`.
    pub unit_status_history: Vec<Status>,
    /// The application status in force before each `status-set --application`.
    pub app_status_history: Vec<Status>,
    /// The workload version in force before each `application-version-set`.
    pub workload_version_history: Vec<String>,
    /// Events emitted, in emission order.
    pub emitted_events: Vec<EmittedEvent>,
    /// `exec` calls per container.
    pub exec_history: BTreeMap<String, Vec<ExecArgs>>,
    /// `storage-add` counts per storage name.
    pub requested_storages: BTreeMap<String, u32>,
    /// Secret revisions removed with `secret-remove --revision`.
    pub removed_secret_revisions: Vec<u32>,
    /// `action-log` messages.
    pub action_logs: Vec<String>,
    /// `action-set` results of the most recent action run.
    pub action_results: Option<BTreeMap<String, Value>>,
}

impl Recorder {
    /// Names of the emitted events, in order.
    #[must_use]
    pub fn emitted_names(&self) -> Vec<String> {
        self.emitted_events.iter().map(EmittedEvent::name).collect()
    }

    pub(crate) fn log(&mut self, level: LogLevel, message: impl Into<String>) {
        self.juju_log.push(JujuLogLine {
            level,
            message: message.into(),
        });
    }
}

/// Monotonic identity counters for one `Context`.
///
/// Ids start at 1 and are never reused, so repeated runs never collide.
#[derive(Debug, Default)]
pub struct IdAllocator {
    relation: Cell<u32>,
    secret: Cell<u64>,
    action: Cell<u32>,
    notice: Cell<u32>,
    storage: Cell<StorageIndex>,
}

impl IdAllocator {
    /// Next relation id.
    pub fn next_relation(&self) -> RelationId {
        RelationId(bump(&self.relation))
    }

    /// Next secret id.
    pub fn next_secret(&self) -> SecretId {
        let next = self.secret.get() + 1;
        self.secret.set(next);
        SecretId(next)
    }

    /// Next action id.
    pub fn next_action(&self) -> ActionId {
        ActionId(bump(&self.action))
    }

    /// Next notice id.
    pub fn next_notice(&self) -> NoticeId {
        NoticeId(bump(&self.notice))
    }

    /// Next storage index. Indices are unique across storage names.
    pub fn next_storage_index(&self) -> StorageIndex {
        let index = self.storage.get();
        self.storage.set(index + 1);
        index
    }

    /// Makes sure later ids are above the ones already present in a state.
    pub(crate) fn reserve_relation(&self, id: RelationId) {
        self.relation.set(self.relation.get().max(id.0));
    }

    pub(crate) fn reserve_secret(&self, id: SecretId) {
        self.secret.set(self.secret.get().max(id.0));
    }

    pub(crate) fn reserve_action(&self, id: ActionId) {
        self.action.set(self.action.get().max(id.0));
    }

    pub(crate) fn reserve_notice(&self, id: NoticeId) {
        self.notice.set(self.notice.get().max(id.0));
    }

    /// Storage indices start at 0, so the next one goes past `index`.
    pub(crate) fn reserve_storage(&self, index: StorageIndex) {
        self.storage.set(self.storage.get().max(index + 1));
    }
}

fn bump(cell: &Cell<u32>) -> u32 {
    let next = cell.get() + 1;
    cell.set(next);
    next
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_strictly_increasing() {
        let ids = IdAllocator::default();
        assert_eq!(ids.next_relation(), RelationId(1));
        assert_eq!(ids.next_relation(), RelationId(2));
        assert_eq!(ids.next_secret(), SecretId(1));
        assert_eq!(ids.next_storage_index(), 0);
        assert_eq!(ids.next_storage_index(), 1);
    }

    #[test]
    fn reserving_skips_taken_ids() {
        let ids = IdAllocator::default();
        ids.reserve_relation(RelationId(9));
        assert_eq!(ids.next_relation(), RelationId(10));
        ids.reserve_relation(RelationId(3));
        assert_eq!(ids.next_relation(), RelationId(11));

        ids.reserve_storage(0);
        assert_eq!(ids.next_storage_index(), 1);
        ids.reserve_notice(NoticeId(4));
        assert_eq!(ids.next_notice(), NoticeId(5));
        ids.reserve_action(ActionId(2));
        assert_eq!(ids.next_action(), ActionId(3));
    }

    #[test]
    fn emitted_names_follow_order() {
        let mut rec = Recorder::default();
        for event in [Event::UpdateStatus, Event::Start] {
            rec.emitted_events.push(EmittedEvent {
                event,
                origin: EventOrigin::Juju,
            });
        }
        assert_eq!(rec.emitted_names(), ["update_status", "start"]);
    }
}
