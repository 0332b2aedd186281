//! The Juju event vocabulary.
//!
//! [`Event`] is a closed enumeration of what Juju and the framework can
//! emit, plus [`Event::Custom`] for events charms and libraries define
//! themselves. Every event has two spellings: the framework path used to
//! register observers (`db_relation_changed`) and, for events Juju raises,
//! the hook name (`db-relation-changed`).

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::container::{Container, Notice, NoticeType};
use crate::ids::{ActionId, NoticeId, RelationId, SecretId, StorageIndex};
use crate::relation::AnyRelation;
use crate::secret::Secret;
use crate::storage::Storage;

/// Relation event flavours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationEventKind {
    /// The relation was established.
    Created,
    /// A remote unit joined.
    Joined,
    /// A databag changed.
    Changed,
    /// A remote unit left.
    Departed,
    /// The relation is being torn down.
    Broken,
}

impl RelationEventKind {
    const ALL: [RelationEventKind; 5] = [
        RelationEventKind::Created,
        RelationEventKind::Joined,
        RelationEventKind::Changed,
        RelationEventKind::Departed,
        RelationEventKind::Broken,
    ];

    fn suffix(self) -> &'static str {
        match self {
            RelationEventKind::Created => "created",
            RelationEventKind::Joined => "joined",
            RelationEventKind::Changed => "changed",
            RelationEventKind::Departed => "departed",
            RelationEventKind::Broken => "broken",
        }
    }

    /// Whether the event concerns a specific remote unit.
    #[must_use]
    pub fn has_remote_unit(self) -> bool {
        !matches!(self, RelationEventKind::Created | RelationEventKind::Broken)
    }
}

/// An event on one relation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationEvent {
    /// Which relation event.
    pub kind: RelationEventKind,
    /// Endpoint the relation is on.
    pub endpoint: String,
    /// Relation id.
    pub relation_id: RelationId,
    /// Remote unit the event is about, by id.
    #[serde(default)]
    pub remote_unit: Option<u32>,
    /// Unit leaving the relation (departed events).
    #[serde(default)]
    pub departing_unit: Option<u32>,
}

impl RelationEvent {
    /// Builds an event for `relation`. When the event concerns a remote unit
    /// and the relation has exactly one, that unit is used.
    #[must_use]
    pub fn new(kind: RelationEventKind, relation: &AnyRelation) -> Self {
        let remote_ids = relation.remote_unit_ids();
        let remote_unit = match (kind.has_remote_unit(), remote_ids.as_slice()) {
            (true, [only]) => Some(*only),
            _ => None,
        };
        Self {
            kind,
            endpoint: relation.endpoint().to_string(),
            relation_id: relation.id(),
            remote_unit,
            departing_unit: None,
        }
    }
}

/// Workload (Pebble) event flavours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WorkloadEventKind {
    /// Pebble became reachable.
    PebbleReady,
    /// A custom notice occurred.
    PebbleCustomNotice,
    /// A check went down.
    PebbleCheckFailed,
    /// A check came back up.
    PebbleCheckRecovered,
}

impl WorkloadEventKind {
    const ALL: [WorkloadEventKind; 4] = [
        WorkloadEventKind::PebbleReady,
        WorkloadEventKind::PebbleCustomNotice,
        WorkloadEventKind::PebbleCheckFailed,
        WorkloadEventKind::PebbleCheckRecovered,
    ];

    fn suffix(self) -> &'static str {
        match self {
            WorkloadEventKind::PebbleReady => "pebble_ready",
            WorkloadEventKind::PebbleCustomNotice => "pebble_custom_notice",
            WorkloadEventKind::PebbleCheckFailed => "pebble_check_failed",
            WorkloadEventKind::PebbleCheckRecovered => "pebble_check_recovered",
        }
    }
}

/// Identifies the notice a custom-notice event is about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoticeRef {
    /// Notice id.
    pub id: NoticeId,
    /// Notice key.
    pub key: String,
    /// Notice type.
    #[serde(rename = "type", default)]
    pub notice_type: NoticeType,
}

impl From<&Notice> for NoticeRef {
    fn from(n: &Notice) -> Self {
        Self {
            id: n.id,
            key: n.key.clone(),
            notice_type: n.notice_type,
        }
    }
}

/// An event on one workload container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkloadEvent {
    /// Which workload event.
    pub kind: WorkloadEventKind,
    /// Container name.
    pub container: String,
    /// Notice, for custom-notice events.
    #[serde(default)]
    pub notice: Option<NoticeRef>,
    /// Check name, for check events.
    #[serde(default)]
    pub check: Option<String>,
}

/// Storage event flavours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageEventKind {
    /// Storage was attached.
    Attached,
    /// Storage is about to be detached.
    Detaching,
}

impl StorageEventKind {
    fn suffix(self) -> &'static str {
        match self {
            StorageEventKind::Attached => "storage_attached",
            StorageEventKind::Detaching => "storage_detaching",
        }
    }
}

/// An event on one storage instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageEvent {
    /// Which storage event.
    pub kind: StorageEventKind,
    /// Storage name.
    pub name: String,
    /// Storage index.
    pub index: StorageIndex,
}

/// Secret event flavours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecretEventKind {
    /// A newer revision exists (observers).
    Changed,
    /// Rotation is due (owners).
    Rotate,
    /// A revision expired (owners).
    Expired,
    /// A revision is no longer tracked by anyone (owners).
    Remove,
}

impl SecretEventKind {
    fn suffix(self) -> &'static str {
        match self {
            SecretEventKind::Changed => "changed",
            SecretEventKind::Rotate => "rotate",
            SecretEventKind::Expired => "expired",
            SecretEventKind::Remove => "remove",
        }
    }

    /// Whether the event is raised to the secret's owner rather than observers.
    #[must_use]
    pub fn is_for_owner(self) -> bool {
        !matches!(self, SecretEventKind::Changed)
    }

    /// Whether the event names a revision.
    #[must_use]
    pub fn needs_revision(self) -> bool {
        matches!(self, SecretEventKind::Expired | SecretEventKind::Remove)
    }
}

/// An event on one secret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretEvent {
    /// Which secret event.
    pub kind: SecretEventKind,
    /// Secret id.
    pub id: SecretId,
    /// Label the unit knows the secret by.
    #[serde(default)]
    pub label: Option<String>,
    /// Revision, for expired and remove events.
    #[serde(default)]
    pub revision: Option<u32>,
}

/// An action invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionEvent {
    /// Action name as declared.
    pub name: String,
    /// Invocation id.
    pub id: ActionId,
    /// Parameters passed by the operator.
    #[serde(default)]
    pub params: BTreeMap<String, Value>,
}

/// An event defined by a charm or library and emitted from charm code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomEvent {
    /// Framework path name, e.g. `db_ready`.
    pub name: String,
    /// Data the emitter attached.
    #[serde(default)]
    pub payload: BTreeMap<String, Value>,
}

impl CustomEvent {
    /// A custom event with no payload.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            payload: BTreeMap::new(),
        }
    }

    /// Attaches one payload entry.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.payload.insert(key.into(), value.into());
        self
    }
}

/// Something a charm observes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum Event {
    /// `install`
    Install,
    /// `start`
    Start,
    /// `stop`
    Stop,
    /// `remove`
    Remove,
    /// `config-changed`
    ConfigChanged,
    /// `upgrade-charm`
    UpgradeCharm,
    /// `leader-elected`
    LeaderElected,
    /// `leader-settings-changed`
    LeaderSettingsChanged,
    /// `update-status`
    UpdateStatus,
    /// `pre-series-upgrade`
    PreSeriesUpgrade,
    /// `post-series-upgrade`
    PostSeriesUpgrade,
    /// Framework: gather unit status.
    CollectUnitStatus,
    /// Framework: gather application status (leader only).
    CollectAppStatus,
    /// Framework: about to commit.
    PreCommit,
    /// Framework: committing.
    Commit,
    /// A relation event.
    Relation(RelationEvent),
    /// A workload event.
    Workload(WorkloadEvent),
    /// A storage event.
    Storage(StorageEvent),
    /// A secret event.
    Secret(SecretEvent),
    /// An action.
    Action(ActionEvent),
    /// A charm-defined event.
    Custom(CustomEvent),
}

const LIFECYCLE: [(&str, Event); 15] = [
    ("install", Event::Install),
    ("start", Event::Start),
    ("stop", Event::Stop),
    ("remove", Event::Remove),
    ("config_changed", Event::ConfigChanged),
    ("upgrade_charm", Event::UpgradeCharm),
    ("leader_elected", Event::LeaderElected),
    ("leader_settings_changed", Event::LeaderSettingsChanged),
    ("update_status", Event::UpdateStatus),
    ("pre_series_upgrade", Event::PreSeriesUpgrade),
    ("post_series_upgrade", Event::PostSeriesUpgrade),
    ("collect_unit_status", Event::CollectUnitStatus),
    ("collect_app_status", Event::CollectAppStatus),
    ("pre_commit", Event::PreCommit),
    ("commit", Event::Commit),
];

fn path_segment(name: &str) -> String {
    name.replace('-', "_")
}

impl Event {
    /// A relation event on `relation`.
    #[must_use]
    pub fn relation(kind: RelationEventKind, relation: &AnyRelation) -> Self {
        Event::Relation(RelationEvent::new(kind, relation))
    }

    /// `<container>-pebble-ready`.
    #[must_use]
    pub fn pebble_ready(container: &Container) -> Self {
        Event::Workload(WorkloadEvent {
            kind: WorkloadEventKind::PebbleReady,
            container: container.name.clone(),
            notice: None,
            check: None,
        })
    }

    /// `<container>-pebble-custom-notice` for `notice`.
    #[must_use]
    pub fn pebble_custom_notice(container: &Container, notice: &Notice) -> Self {
        Event::Workload(WorkloadEvent {
            kind: WorkloadEventKind::PebbleCustomNotice,
            container: container.name.clone(),
            notice: Some(notice.into()),
            check: None,
        })
    }

    /// `<container>-pebble-check-failed` or `-recovered` for `check`.
    #[must_use]
    pub fn pebble_check(container: &Container, check: &str, failed: bool) -> Self {
        Event::Workload(WorkloadEvent {
            kind: if failed {
                WorkloadEventKind::PebbleCheckFailed
            } else {
                WorkloadEventKind::PebbleCheckRecovered
            },
            container: container.name.clone(),
            notice: None,
            check: Some(check.to_string()),
        })
    }

    /// A storage event on `storage`.
    #[must_use]
    pub fn storage(kind: StorageEventKind, storage: &Storage) -> Self {
        Event::Storage(StorageEvent {
            kind,
            name: storage.name.clone(),
            index: storage.index,
        })
    }

    /// A secret event on `secret`.
    #[must_use]
    pub fn secret(kind: SecretEventKind, secret: &Secret, revision: Option<u32>) -> Self {
        Event::Secret(SecretEvent {
            kind,
            id: secret.id,
            label: secret.label.clone(),
            revision,
        })
    }

    /// Framework path name, used to register observers.
    #[must_use]
    pub fn name(&self) -> String {
        if let Some((name, _)) = LIFECYCLE.iter().find(|(_, e)| e == self) {
            return (*name).to_string();
        }
        match self {
            Event::Relation(r) => {
                format!("{}_relation_{}", path_segment(&r.endpoint), r.kind.suffix())
            }
            Event::Workload(w) => format!("{}_{}", path_segment(&w.container), w.kind.suffix()),
            Event::Storage(s) => format!("{}_{}", path_segment(&s.name), s.kind.suffix()),
            Event::Secret(s) => format!("secret_{}", s.kind.suffix()),
            Event::Action(a) => format!("{}_action", path_segment(&a.name)),
            Event::Custom(c) => c.name.clone(),
            _ => String::new(),
        }
    }

    /// The Juju hook (or action) name, for events Juju raises.
    #[must_use]
    pub fn hook_name(&self) -> Option<String> {
        match self {
            Event::Custom(_) => None,
            e if e.is_framework() => None,
            Event::Relation(r) => Some(format!("{}-relation-{}", r.endpoint, r.kind.suffix())),
            Event::Workload(w) => Some(format!(
                "{}-{}",
                w.container,
                w.kind.suffix().replace('_', "-")
            )),
            Event::Storage(s) => Some(format!("{}-{}", s.name, s.kind.suffix().replace('_', "-"))),
            Event::Action(a) => Some(a.name.clone()),
            other => Some(other.name().replace('_', "-")),
        }
    }

    /// `JUJU_DISPATCH_PATH` for this event.
    #[must_use]
    pub fn dispatch_path(&self) -> Option<String> {
        let hook = self.hook_name()?;
        Some(match self {
            Event::Action(_) => format!("actions/{hook}"),
            _ => format!("hooks/{hook}"),
        })
    }

    /// Framework-internal lifecycle events (collect-status, pre-commit, commit).
    #[must_use]
    pub fn is_framework(&self) -> bool {
        matches!(
            self,
            Event::CollectUnitStatus | Event::CollectAppStatus | Event::PreCommit | Event::Commit
        )
    }

    /// Whether this is an action.
    #[must_use]
    pub fn is_action(&self) -> bool {
        matches!(self, Event::Action(_))
    }

    /// Whether this event is charm-defined.
    #[must_use]
    pub fn is_custom(&self) -> bool {
        matches!(self, Event::Custom(_))
    }

    /// Event-specific linkage to persist when the event is deferred.
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<String, Value> {
        let mut snap = BTreeMap::new();
        match self {
            Event::Relation(r) => {
                snap.insert("relation_name".into(), Value::from(r.endpoint.clone()));
                snap.insert("relation_id".into(), Value::from(r.relation_id.0));
                if let Some(u) = r.remote_unit {
                    snap.insert("unit_id".into(), Value::from(u));
                }
                if let Some(u) = r.departing_unit {
                    snap.insert("departing_unit_id".into(), Value::from(u));
                }
            }
            Event::Workload(w) => {
                snap.insert("container_name".into(), Value::from(w.container.clone()));
                if let Some(n) = &w.notice {
                    snap.insert("notice_id".into(), Value::from(n.id.0));
                    snap.insert("notice_key".into(), Value::from(n.key.clone()));
                    snap.insert("notice_type".into(), Value::from(n.notice_type.as_str()));
                }
                if let Some(c) = &w.check {
                    snap.insert("check_name".into(), Value::from(c.clone()));
                }
            }
            Event::Storage(s) => {
                snap.insert("storage_name".into(), Value::from(s.name.clone()));
                snap.insert("storage_index".into(), Value::from(s.index));
            }
            Event::Secret(s) => {
                snap.insert("id".into(), Value::from(s.id.to_string()));
                if let Some(l) = &s.label {
                    snap.insert("label".into(), Value::from(l.clone()));
                }
                if let Some(r) = s.revision {
                    snap.insert("revision".into(), Value::from(r));
                }
            }
            Event::Action(a) => {
                snap.insert("id".into(), Value::from(a.id.0));
                snap.insert("params".into(), serde_json::to_value(&a.params).unwrap_or_default());
            }
            Event::Custom(c) => {
                snap.extend(c.payload.clone());
            }
            _ => {}
        }
        snap
    }

    /// Rebuilds an event from its framework path name and a [`snapshot`](Self::snapshot).
    ///
    /// Names that match no Juju event are restored as custom events carrying
    /// the snapshot as payload.
    ///
    /// # Errors
    ///
    /// Returns [`RestoreError`] when a Juju event's snapshot lacks a field it needs.
    pub fn restore(name: &str, snapshot: &BTreeMap<String, Value>) -> Result<Event, RestoreError> {
        if let Some((_, event)) = LIFECYCLE.iter().find(|(n, _)| *n == name) {
            return Ok(event.clone());
        }
        let field = |key: &'static str| {
            snapshot.get(key).ok_or_else(|| RestoreError {
                name: name.to_string(),
                field: key,
            })
        };
        let text = |key: &'static str| -> Result<String, RestoreError> {
            field(key)?.as_str().map(str::to_string).ok_or(RestoreError {
                name: name.to_string(),
                field: key,
            })
        };
        let number = |key: &'static str| -> Result<u32, RestoreError> {
            field(key)?
                .as_u64()
                .and_then(|n| u32::try_from(n).ok())
                .ok_or(RestoreError {
                    name: name.to_string(),
                    field: key,
                })
        };
        let optional_number = |key: &'static str| {
            snapshot
                .get(key)
                .and_then(Value::as_u64)
                .and_then(|n| u32::try_from(n).ok())
        };

        for kind in RelationEventKind::ALL {
            if name.ends_with(&format!("_relation_{}", kind.suffix())) {
                return Ok(Event::Relation(RelationEvent {
                    kind,
                    endpoint: text("relation_name")?,
                    relation_id: RelationId(number("relation_id")?),
                    remote_unit: optional_number("unit_id"),
                    departing_unit: optional_number("departing_unit_id"),
                }));
            }
        }
        for kind in WorkloadEventKind::ALL {
            if name.ends_with(&format!("_{}", kind.suffix())) {
                let notice = match kind {
                    WorkloadEventKind::PebbleCustomNotice => Some(NoticeRef {
                        id: NoticeId(number("notice_id")?),
                        key: text("notice_key")?,
                        notice_type: NoticeType::Custom,
                    }),
                    _ => None,
                };
                let check = match kind {
                    WorkloadEventKind::PebbleCheckFailed
                    | WorkloadEventKind::PebbleCheckRecovered => Some(text("check_name")?),
                    _ => None,
                };
                return Ok(Event::Workload(WorkloadEvent {
                    kind,
                    container: text("container_name")?,
                    notice,
                    check,
                }));
            }
        }
        for kind in [StorageEventKind::Attached, StorageEventKind::Detaching] {
            if name.ends_with(&format!("_{}", kind.suffix())) {
                return Ok(Event::Storage(StorageEvent {
                    kind,
                    name: text("storage_name")?,
                    index: number("storage_index")?,
                }));
            }
        }
        for kind in [
            SecretEventKind::Changed,
            SecretEventKind::Rotate,
            SecretEventKind::Expired,
            SecretEventKind::Remove,
        ] {
            if name == format!("secret_{}", kind.suffix()) {
                let id = text("id")?.parse().map_err(|_| RestoreError {
                    name: name.to_string(),
                    field: "id",
                })?;
                return Ok(Event::Secret(SecretEvent {
                    kind,
                    id,
                    label: snapshot.get("label").and_then(Value::as_str).map(str::to_string),
                    revision: optional_number("revision"),
                }));
            }
        }
        Ok(Event::Custom(CustomEvent {
            name: name.to_string(),
            payload: snapshot.clone(),
        }))
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// A deferred event's snapshot could not be turned back into an event.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot restore deferred {name}: snapshot lacks {field}")]
pub struct RestoreError {
    /// Event name.
    pub name: String,
    /// Missing or mistyped snapshot field.
    pub field: &'static str,
}
