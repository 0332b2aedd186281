//! Juju agent versions, compared the way Juju compares them.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A Juju version such as `3.4.2`, `3.5-beta1` or `2.9.44.1`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JujuVersion {
    /// Major.
    pub major: u32,
    /// Minor.
    pub minor: u32,
    /// Tag such as `beta`; pre-releases sort before the release.
    pub tag: Option<String>,
    /// Patch (or the tag's number when a tag is present).
    pub patch: u32,
    /// Build.
    pub build: u32,
}

/// The version a Context assumes unless told otherwise.
pub const DEFAULT_JUJU_VERSION: &str = "3.5";

impl JujuVersion {
    /// `major.minor.patch` with no tag or build.
    #[must_use]
    pub fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            tag: None,
            patch,
            build: 0,
        }
    }

    /// Whether this version supports secrets.
    #[must_use]
    pub fn has_secrets(&self) -> bool {
        *self >= JujuVersion::new(3, 0, 2)
    }

    /// Whether Pebble custom notices reach the charm.
    #[must_use]
    pub fn supports_pebble_notices(&self) -> bool {
        *self >= JujuVersion::new(3, 4, 0)
    }

    /// Whether Pebble check events reach the charm.
    #[must_use]
    pub fn supports_pebble_check_events(&self) -> bool {
        *self >= JujuVersion::new(3, 6, 0)
    }

    /// Whether secret owners track a revision like observers do. Older
    /// agents always hand owners the latest revision.
    #[must_use]
    pub fn owners_track_revisions(&self) -> bool {
        *self == JujuVersion::new(3, 1, 7) || *self >= JujuVersion::new(3, 3, 1)
    }
}

impl Default for JujuVersion {
    fn default() -> Self {
        Self::new(3, 5, 0)
    }
}

impl Ord for JujuVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor)
            .cmp(&(other.major, other.minor))
            .then_with(|| match (&self.tag, &other.tag) {
                (None, None) => Ordering::Equal,
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (Some(a), Some(b)) => a.cmp(b),
            })
            .then_with(|| (self.patch, self.build).cmp(&(other.patch, other.build)))
    }
}

impl PartialOrd for JujuVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A version string did not parse.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0:?} is not a valid Juju version")]
pub struct InvalidVersion(pub String);

impl FromStr for JujuVersion {
    type Err = InvalidVersion;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || InvalidVersion(s.to_string());
        let (major, rest) = s.split_once('.').ok_or_else(bad)?;
        let major = major.parse().map_err(|_| bad())?;

        // minor may be followed by ".patch[.build]" or "-tagN[.build]"
        let minor_end = rest.find(['.', '-']).unwrap_or(rest.len());
        let minor = rest[..minor_end].parse().map_err(|_| bad())?;
        let rest = &rest[minor_end..];

        let (tag, numbers) = if let Some(tagged) = rest.strip_prefix('-') {
            let digits_at = tagged
                .find(|c: char| c.is_ascii_digit())
                .ok_or_else(bad)?;
            (Some(tagged[..digits_at].to_string()), &tagged[digits_at..])
        } else {
            (None, rest.strip_prefix('.').unwrap_or(rest))
        };

        let mut parts = numbers.split('.').filter(|p| !p.is_empty());
        let patch = parts.next().map(str::parse).transpose().map_err(|_| bad())?;
        let build = parts.next().map(str::parse).transpose().map_err(|_| bad())?;
        if parts.next().is_some() {
            return Err(bad());
        }

        Ok(Self {
            major,
            minor,
            tag,
            patch: patch.unwrap_or(0),
            build: build.unwrap_or(0),
        })
    }
}

impl fmt::Display for JujuVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.tag {
            Some(tag) => write!(f, "{}.{}-{}{}", self.major, self.minor, tag, self.patch)?,
            None => write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?,
        }
        if self.build > 0 {
            write!(f, ".{}", self.build)?;
        }
        Ok(())
    }
}

impl Serialize for JujuVersion {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for JujuVersion {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
