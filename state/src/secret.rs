//! Juju secrets as seen from this unit.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::ids::{RelationId, SecretId};

/// Secret content: string keys to string values.
pub type SecretContent = BTreeMap<String, String>;

/// Who owns a secret, from this unit's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecretOwner {
    /// Owned by this application; only the leader manages it.
    App,
    /// Owned by this unit.
    Unit,
}

/// How often Juju asks the owner to rotate a secret.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RotatePolicy {
    /// Never.
    Never,
    /// Every hour.
    Hourly,
    /// Every day.
    Daily,
    /// Every week.
    Weekly,
    /// Every month.
    Monthly,
    /// Every quarter.
    Quarterly,
    /// Every year.
    Yearly,
}

/// A secret this unit can see. Absence from `State::secrets` means the charm
/// has no visibility of it at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Secret {
    /// Secret id.
    pub id: SecretId,
    /// Content of the revision this unit tracks.
    pub tracked_content: SecretContent,
    /// Content of the newest revision.
    pub latest_content: SecretContent,
    /// Revision this unit tracks.
    #[serde(default = "first_revision")]
    pub tracked_revision: u32,
    /// Newest revision.
    #[serde(default = "first_revision")]
    pub latest_revision: u32,
    /// `None` when this unit only observes the secret.
    #[serde(default)]
    pub owner: Option<SecretOwner>,
    /// Relation id to the apps/units granted access.
    #[serde(default)]
    pub remote_grants: BTreeMap<RelationId, BTreeSet<String>>,
    /// Label this unit knows the secret by.
    #[serde(default)]
    pub label: Option<String>,
    /// Description.
    #[serde(default)]
    pub description: Option<String>,
    /// Expiry, unix seconds.
    #[serde(default)]
    pub expire: Option<u64>,
    /// Rotation policy.
    #[serde(default)]
    pub rotate: Option<RotatePolicy>,
}

fn first_revision() -> u32 {
    1
}

impl Secret {
    /// An observed secret whose tracked and latest revisions share `content`.
    pub fn new(id: SecretId, content: SecretContent) -> Self {
        Self {
            id,
            latest_content: content.clone(),
            tracked_content: content,
            tracked_revision: 1,
            latest_revision: 1,
            owner: None,
            remote_grants: BTreeMap::new(),
            label: None,
            description: None,
            expire: None,
            rotate: None,
        }
    }

    /// Sets the owner.
    #[must_use]
    pub fn owned_by(mut self, owner: SecretOwner) -> Self {
        self.owner = Some(owner);
        self
    }

    /// Sets the label.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Publishes a newer revision with `content` that this unit does not track yet.
    #[must_use]
    pub fn with_latest(mut self, content: SecretContent) -> Self {
        self.latest_content = content;
        self.latest_revision = self.tracked_revision + 1;
        self
    }

    /// Starts tracking the newest revision.
    pub fn track_latest_revision(&mut self) {
        self.tracked_content = self.latest_content.clone();
        self.tracked_revision = self.latest_revision;
    }

    /// Creates a new revision with `content`.
    pub fn publish_revision(&mut self, content: SecretContent) {
        self.latest_content = content;
        self.latest_revision += 1;
    }

    /// True if this unit owns (and so may manage) the secret.
    #[must_use]
    pub fn is_owned(&self) -> bool {
        self.owner.is_some()
    }
}
