//! Unit and application workload status.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A Juju workload status: a kind plus an optional free-text message.
///
/// Statuses compare by value, so `Status::active("x") == Status::active("x")`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "name", content = "message", rename_all = "lowercase")]
pub enum Status {
    /// The status has not been set.
    #[default]
    Unknown,
    /// The workload is running as expected.
    Active(String),
    /// The workload needs operator intervention.
    Blocked(String),
    /// The workload is waiting on something outside this unit.
    Waiting(String),
    /// The unit is performing maintenance.
    Maintenance(String),
    /// A hook failed. Charms never set this themselves.
    Error(String),
}

impl Status {
    /// `active` status with a message.
    pub fn active(message: impl Into<String>) -> Self {
        Status::Active(message.into())
    }

    /// `blocked` status with a message.
    pub fn blocked(message: impl Into<String>) -> Self {
        Status::Blocked(message.into())
    }

    /// `waiting` status with a message.
    pub fn waiting(message: impl Into<String>) -> Self {
        Status::Waiting(message.into())
    }

    /// `maintenance` status with a message.
    pub fn maintenance(message: impl Into<String>) -> Self {
        Status::Maintenance(message.into())
    }

    /// `error` status with a message.
    pub fn error(message: impl Into<String>) -> Self {
        Status::Error(message.into())
    }

    /// The Juju name of this status kind.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Status::Unknown => "unknown",
            Status::Active(_) => "active",
            Status::Blocked(_) => "blocked",
            Status::Waiting(_) => "waiting",
            Status::Maintenance(_) => "maintenance",
            Status::Error(_) => "error",
        }
    }

    /// The status message (empty for `unknown`).
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Status::Unknown => "",
            Status::Active(m)
            | Status::Blocked(m)
            | Status::Waiting(m)
            | Status::Maintenance(m)
            | Status::Error(m) => m,
        }
    }

    /// Builds a status from its Juju name and message, as `status-get` reports it.
    #[must_use]
    pub fn from_name(name: &str, message: impl Into<String>) -> Option<Self> {
        let message = message.into();
        Some(match name {
            "unknown" => Status::Unknown,
            "active" => Status::Active(message),
            "blocked" => Status::Blocked(message),
            "waiting" => Status::Waiting(message),
            "maintenance" => Status::Maintenance(message),
            "error" => Status::Error(message),
            _ => return None,
        })
    }

    /// Priority used when several statuses are collected for one entity.
    ///
    /// error > blocked > maintenance > waiting > active > unknown
    #[must_use]
    pub fn priority(&self) -> u8 {
        match self {
            Status::Error(_) => 5,
            Status::Blocked(_) => 4,
            Status::Maintenance(_) => 3,
            Status::Waiting(_) => 2,
            Status::Active(_) => 1,
            Status::Unknown => 0,
        }
    }

    /// Returns the highest-priority status, keeping the first on ties.
    pub fn highest<'a>(statuses: impl IntoIterator<Item = &'a Status>) -> Option<&'a Status> {
        statuses.into_iter().fold(None, |best, s| match best {
            Some(b) if b.priority() >= s.priority() => Some(b),
            _ => Some(s),
        })
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message().is_empty() {
            write!(f, "{}", self.name())
        } else {
            write!(f, "{}: {}", self.name(), self.message())
        }
    }
}
