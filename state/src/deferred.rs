//! Events a charm deferred, persisted in the state until the next run.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::event::{Event, RestoreError};

/// A deferred event awaiting re-emission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeferredEvent {
    /// Framework handle, `Owner/on/<event>[<seq>]`.
    pub handle_path: String,
    /// Framework path of the object that emitted the event (the charm).
    pub owner: String,
    /// Name of the observer that deferred it.
    pub observer: String,
    /// Event-specific linkage.
    #[serde(default)]
    pub snapshot_data: BTreeMap<String, Value>,
}

impl DeferredEvent {
    /// Captures `event` as deferred by `observer` on `owner`.
    #[must_use]
    pub fn from_event(event: &Event, owner: &str, observer: &str, seq: u32) -> Self {
        Self {
            handle_path: format!("{owner}/on/{}[{seq}]", event.name()),
            owner: owner.to_string(),
            observer: observer.to_string(),
            snapshot_data: event.snapshot(),
        }
    }

    /// The event's framework path name, parsed from the handle.
    #[must_use]
    pub fn name(&self) -> &str {
        let tail = self
            .handle_path
            .rsplit_once("/on/")
            .map_or(self.handle_path.as_str(), |(_, t)| t);
        tail.split_once('[').map_or(tail, |(name, _)| name)
    }

    /// Rebuilds the event.
    ///
    /// # Errors
    ///
    /// Returns [`RestoreError`] if the snapshot lacks linkage the event needs.
    pub fn restore(&self) -> Result<Event, RestoreError> {
        Event::restore(self.name(), &self.snapshot_data)
    }
}
