//! Identity newtypes for the state components whose identity is assigned by
//! the engine rather than chosen by the test author.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::LookupError;

/// Juju relation id. Unique within a model; never reused within a `Context`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RelationId(pub u32);

impl fmt::Display for RelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Action invocation id (`JUJU_ACTION_UUID`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionId(pub u32);

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Pebble notice id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NoticeId(pub u32);

impl fmt::Display for NoticeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Storage instance index; `name/index` is the Juju storage id.
pub type StorageIndex = u32;

const SECRET_PREFIX: &str = "secret:";
const SECRET_URI_PREFIX: &str = "secret://";

/// Juju secret id.
///
/// The canonical form is `secret:` followed by 20 zero-padded digits, which
/// keeps ids allocated by one `Context` ordered both numerically and
/// lexically. Full secret URIs (`secret://<model-uuid>/<id>`) parse to the
/// same id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SecretId(pub u64);

impl SecretId {
    /// Returns the canonical `secret:<id>` string.
    #[must_use]
    pub fn canonical(&self) -> String {
        self.to_string()
    }

    /// Returns the unique part of the id (the 20 digits).
    #[must_use]
    pub fn unique_identifier(&self) -> String {
        format!("{:020}", self.0)
    }
}

impl fmt::Display for SecretId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{SECRET_PREFIX}{:020}", self.0)
    }
}

impl FromStr for SecretId {
    type Err = LookupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = if let Some(rest) = s.strip_prefix(SECRET_URI_PREFIX) {
            // secret://<model-uuid>/<id>
            rest.rsplit('/').next().unwrap_or(rest)
        } else {
            s.strip_prefix(SECRET_PREFIX).unwrap_or(s)
        };
        digits
            .parse::<u64>()
            .map(SecretId)
            .map_err(|_| LookupError::new("secret", s))
    }
}

impl Serialize for SecretId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for SecretId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secret_id_canonical_form() {
        let id = SecretId(42);
        assert_eq!(id.to_string(), "secret:00000000000000000042");
        assert_eq!(id.unique_identifier().len(), 20);
    }

    #[test]
    fn secret_id_parses_all_spellings() {
        let expected = SecretId(7);
        assert_eq!("secret:00000000000000000007".parse::<SecretId>(), Ok(expected));
        assert_eq!(
            "secret://4f2c8a6e-model/00000000000000000007".parse::<SecretId>(),
            Ok(expected)
        );
        assert_eq!("7".parse::<SecretId>(), Ok(expected));
    }

    #[test]
    fn secret_id_rejects_garbage() {
        let err = "secret:nope".parse::<SecretId>().unwrap_err();
        assert_eq!(err.key, "secret:nope");
    }

    #[test]
    fn secret_ids_order_lexically_and_numerically() {
        let a = SecretId(9);
        let b = SecretId(10);
        assert!(a < b);
        assert!(a.to_string() < b.to_string());
    }
}
