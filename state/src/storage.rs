//! Storage instances and charm resources.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::ids::StorageIndex;

/// A storage instance attached to this unit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Storage {
    /// Storage name as declared in metadata.
    pub name: String,
    /// Instance index; `name/index` is the Juju storage id.
    pub index: StorageIndex,
}

impl Storage {
    /// Storage `name` with the given index.
    pub fn new(name: impl Into<String>, index: StorageIndex) -> Self {
        Self {
            name: name.into(),
            index,
        }
    }

    /// The Juju storage id, `name/index`.
    #[must_use]
    pub fn storage_id(&self) -> String {
        format!("{}/{}", self.name, self.index)
    }

    /// Parses a `name/index` storage id.
    #[must_use]
    pub fn parse_id(id: &str) -> Option<(String, StorageIndex)> {
        let (name, index) = id.rsplit_once('/')?;
        Some((name.to_string(), index.parse().ok()?))
    }
}

/// A charm resource made available on disk.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resource {
    /// Resource name as declared in metadata.
    pub name: String,
    /// Path `resource-get` returns.
    pub path: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_id_round_trip() {
        let s = Storage::new("data-disk", 3);
        assert_eq!(s.storage_id(), "data-disk/3");
        assert_eq!(Storage::parse_id("data-disk/3"), Some(("data-disk".into(), 3)));
        assert_eq!(Storage::parse_id("nope"), None);
    }
}
