//! Errors raised by the engine and by the mocked hook-command surface.

use std::fmt;

use scenario_consistency::InconsistentScenarioError;
use scenario_state::{LookupError, MetaError, State};
use thiserror::Error;

/// Broad classification of a [`ModelError`], for assertions that only care
/// which contract was violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The unit lacks the role the operation needs.
    Authorization,
    /// An identity is not in the state.
    Lookup,
    /// No exec mock matches the command.
    ExecMockMiss,
    /// The container's Pebble cannot be reached.
    Connection,
    /// The arguments are not acceptable.
    InvalidArgument,
    /// Filesystem access failed.
    Io,
}

/// A hook command or Pebble call failed, as it would under Juju.
#[derive(Debug, Error)]
pub enum ModelError {
    /// The operation needs leadership or ownership this unit does not have.
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    /// An identity is not in the state.
    #[error(transparent)]
    NotFound(#[from] LookupError),
    /// No registered exec mock matches the command.
    #[error("container {container}: no exec mock matches {command:?}")]
    ExecMockMissing {
        /// Container the command was run in.
        container: String,
        /// The command.
        command: Vec<String>,
    },
    /// Pebble in the container is unreachable.
    #[error("cannot connect to Pebble in container {0}")]
    Connection(String),
    /// Bad arguments.
    #[error("invalid argument: {0}")]
    Invalid(String),
    /// A workload or storage filesystem operation failed.
    #[error("{path}: {source}")]
    Io {
        /// Path inside the container or storage.
        path: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

impl ModelError {
    /// Which contract this error reports.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            ModelError::PermissionDenied(_) => ErrorKind::Authorization,
            ModelError::NotFound(_) => ErrorKind::Lookup,
            ModelError::ExecMockMissing { .. } => ErrorKind::ExecMockMiss,
            ModelError::Connection(_) => ErrorKind::Connection,
            ModelError::Invalid(_) => ErrorKind::InvalidArgument,
            ModelError::Io { .. } => ErrorKind::Io,
        }
    }

    pub(crate) fn denied(what: impl fmt::Display) -> Self {
        ModelError::PermissionDenied(what.to_string())
    }

    pub(crate) fn invalid(what: impl fmt::Display) -> Self {
        ModelError::Invalid(what.to_string())
    }
}

/// A mocked command exited non-zero.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{command:?} exited with status {exit_code}")]
pub struct ExecError {
    /// The command.
    pub command: Vec<String>,
    /// Exit code.
    pub exit_code: i32,
    /// Standard output.
    pub stdout: String,
    /// Standard error.
    pub stderr: String,
}

/// A run could not complete.
#[derive(Debug, Error)]
pub enum ScenarioError {
    /// The scenario could never happen under Juju; no charm code ran.
    #[error(transparent)]
    Inconsistent(#[from] InconsistentScenarioError),
    /// Charm metadata could not be loaded or written.
    #[error(transparent)]
    Meta(#[from] MetaError),
    /// No metadata was given, embedded, or found in the charm root.
    #[error("no charm metadata: pass a CharmSpec, embed one, or point at a charm root")]
    NoSpec,
    /// Charm code returned an error or panicked.
    #[error("charm raised an uncaught error while handling {event}: {source}")]
    UncaughtCharm {
        /// Event being handled.
        event: String,
        /// What the charm raised; downcast to [`ModelError`] for hook-command failures.
        #[source]
        source: anyhow::Error,
        /// The working state at the moment of failure.
        state: Box<State>,
    },
    /// The action called `fail`.
    #[error("action failed: {message}")]
    ActionFailed {
        /// Failure message.
        message: String,
        /// The state the run produced.
        state: Box<State>,
    },
    /// `run` was called twice on one manager.
    #[error("this manager has already emitted its event")]
    AlreadyEmitted,
    /// The virtual charm root could not be prepared.
    #[error("cannot prepare the virtual charm root: {0:#}")]
    Root(#[source] anyhow::Error),
    /// The hook environment could not be decoded back into an event.
    #[error("bad hook environment: {0}")]
    Environment(String),
}

impl ScenarioError {
    /// The partial or final state carried by charm and action failures.
    #[must_use]
    pub fn state(&self) -> Option<&State> {
        match self {
            ScenarioError::UncaughtCharm { state, .. } | ScenarioError::ActionFailed { state, .. } => {
                Some(state)
            }
            _ => None,
        }
    }

    /// The hook-command failure behind an uncaught charm error, if that is what it was.
    #[must_use]
    pub fn model_error(&self) -> Option<&ModelError> {
        match self {
            ScenarioError::UncaughtCharm { source, .. } => source.downcast_ref::<ModelError>(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_classify_errors() {
        assert_eq!(ModelError::denied("x").kind(), ErrorKind::Authorization);
        assert_eq!(
            ModelError::from(LookupError::new("relation", 3)).kind(),
            ErrorKind::Lookup
        );
        assert_eq!(ModelError::Connection("w".into()).kind(), ErrorKind::Connection);
    }

    #[test]
    fn uncaught_error_exposes_model_error() {
        let err = ScenarioError::UncaughtCharm {
            event: "start".into(),
            source: anyhow::Error::new(ModelError::denied("app status")),
            state: Box::default(),
        };
        assert_eq!(err.model_error().map(ModelError::kind), Some(ErrorKind::Authorization));
        assert!(err.state().is_some());
        assert!(err.to_string().contains("start"));
    }
}
