//! Error types for state lookups and charm metadata parsing.

use thiserror::Error;

/// A state accessor was asked for an identity that is not present.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("no {kind} {key:?} in this state")]
pub struct LookupError {
    /// What kind of component was requested (`relation`, `container`, ...).
    pub kind: &'static str,
    /// The missing key, rendered as text.
    pub key: String,
}

impl LookupError {
    /// Creates a lookup error for `kind` keyed by `key`.
    pub fn new(kind: &'static str, key: impl ToString) -> Self {
        Self {
            kind,
            key: key.to_string(),
        }
    }
}

/// Charm metadata could not be loaded.
#[derive(Debug, Error)]
pub enum MetaError {
    /// A descriptor file could not be read.
    #[error("cannot read {path}: {source}")]
    Io {
        /// Path of the descriptor.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// A descriptor was not valid YAML for its schema.
    #[error("cannot parse {what}: {source}")]
    Yaml {
        /// Which descriptor failed (`metadata.yaml`, `config`, ...).
        what: String,
        /// Underlying parse error.
        #[source]
        source: serde_yaml::Error,
    },
    /// No metadata descriptor was found where one was expected.
    #[error("no metadata.yaml or charmcraft.yaml found in {0}")]
    Missing(String),
}
