//! Semantic version triple used for host/plugin compatibility checks.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// `major.minor.patch` version.
///
/// Ordering is lexicographic on (major, minor, patch), which is exactly the
/// order the compatibility check relies on.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl Version {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Whether a component requiring `required` can run on this version.
    pub fn satisfies(&self, required: &Version) -> bool {
        required <= self
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Error returned when a version string has no leading numeric component.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid version string '{0}'")]
pub struct ParseVersionError(pub String);

impl FromStr for Version {
    type Err = ParseVersionError;

    /// Accepts `1`, `1.2`, `1.2.3` and tolerates pre-release suffixes such as
    /// `2.1.0-rc1` or `2.1.0~beta`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let core = s
            .trim()
            .split(|c: char| c == '-' || c == '~' || c == '+' || c.is_whitespace())
            .next()
            .unwrap_or("");
        let mut parts = core.split('.').map(|p| p.parse::<u32>());

        let major = match parts.next() {
            Some(Ok(v)) => v,
            _ => return Err(ParseVersionError(s.to_string())),
        };
        let minor = match parts.next() {
            Some(Ok(v)) => v,
            Some(Err(_)) => return Err(ParseVersionError(s.to_string())),
            None => 0,
        };
        let patch = match parts.next() {
            Some(Ok(v)) => v,
            Some(Err(_)) => return Err(ParseVersionError(s.to_string())),
            None => 0,
        };
        Ok(Self::new(major, minor, patch))
    }
}
