//! Semantic version tags attached to the published repositories.
//!
//! Tags always have the shape `v<major>.<minor>.<patch>`. A repository with no
//! tag yet starts from [`Version::empty`], so its first release is `v0.1.0`.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::VersionError;

/// Message printed by `git describe` when the repository has no tags.
pub const NO_TAGS_FOUND: &str = "No names found, cannot describe anything";

fn semantic_matcher() -> &'static Regex {
    static MATCHER: OnceLock<Regex> = OnceLock::new();
    MATCHER.get_or_init(|| {
        Regex::new(r"^v([0-9]+)\.([0-9]+)\.([0-9]+)$").expect("semantic version pattern is valid")
    })
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize)]
#[serde(into = "String")]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl Version {
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Starting point for a repository that has never been tagged.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builds a version from the combined output of `git describe --abbrev=0 --tags`.
    ///
    /// A failed describe whose output carries [`NO_TAGS_FOUND`] yields the empty
    /// version; any other failure is returned as `None` so the caller can report
    /// the command error itself.
    pub fn from_describe_output(succeeded: bool, output: &str) -> Option<Result<Self, VersionError>> {
        if succeeded {
            Some(output.parse())
        } else if output.contains(NO_TAGS_FOUND) {
            Some(Ok(Self::empty()))
        } else {
            None
        }
    }

    /// Only the minor component moves; major and patch stay as they are.
    pub fn increment_minor(self) -> Result<Self, VersionError> {
        let minor = self
            .minor
            .checked_add(1)
            .ok_or_else(|| VersionError::Overflow {
                tag: self.to_string(),
            })?;
        Ok(Self { minor, ..self })
    }
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        // git prints the tag followed by a newline
        let trimmed = tag.strip_suffix('\n').unwrap_or(tag);
        let trimmed = trimmed.strip_suffix('\r').unwrap_or(trimmed);
        let captures = semantic_matcher()
            .captures(trimmed)
            .ok_or_else(|| VersionError::Malformed {
                tag: trimmed.to_string(),
            })?;

        let component = |index: usize| -> Result<u64, VersionError> {
            let raw = &captures[index];
            raw.parse::<u64>().map_err(|_| VersionError::OutOfRange {
                tag: trimmed.to_string(),
                component: raw.to_string(),
            })
        };

        Ok(Self {
            major: component(1)?,
            minor: component(2)?,
            patch: component(3)?,
        })
    }
}

impl From<Version> for String {
    fn from(version: Version) -> Self {
        version.to_string()
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}.{}.{}", self.major, self.minor, self.patch)
    }
}
