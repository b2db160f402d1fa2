//! Version value type and bump algebra.
//!
//! Versions follow the `major.minor.patch[.suffix]` form used by
//! version-bearing source files (`__version__ = "1.2.3.dev"`). The optional
//! trailing suffix is a pre-release/build qualifier (`dev`, `rc1`), not a
//! semver pre-release: the separator is a dot, and ordering is undefined.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from version operations.
#[derive(Error, Debug)]
pub enum VersionError {
    /// The string does not match `major.minor.patch[.suffix]`.
    #[error("invalid version string: {0:?}")]
    Invalid(String),
}

/// Result alias for version operations.
pub type VersionResult<T> = Result<T, VersionError>;

/// Which numeric component a bump advances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Part {
    /// Major release (X.0.0).
    Major,
    /// Minor release (x.Y.0).
    Minor,
    /// Patch release (x.y.Z).
    Patch,
}

impl fmt::Display for Part {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Major => write!(f, "major"),
            Self::Minor => write!(f, "minor"),
            Self::Patch => write!(f, "patch"),
        }
    }
}

/// A parsed `major.minor.patch[.suffix]` version.
///
/// Equality is structural over all four fields. The canonical textual form
/// (via [`fmt::Display`]) round-trips through [`Version::parse`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Version {
    /// Major component.
    pub major: u64,
    /// Minor component.
    pub minor: u64,
    /// Patch component.
    pub patch: u64,
    /// Optional pre-release/build qualifier (`dev`, `rc1`).
    pub suffix: Option<String>,
}

fn version_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(\d+)\.(\d+)\.(\d+)(?:\.([0-9A-Za-z.]+))?$").expect("version pattern")
    })
}

impl Version {
    /// Create a suffix-less version.
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
            suffix: None,
        }
    }

    /// Create a version carrying a suffix.
    pub fn suffixed(major: u64, minor: u64, patch: u64, suffix: &str) -> Self {
        Self {
            major,
            minor,
            patch,
            suffix: Some(suffix.to_owned()),
        }
    }

    /// Parse a `major.minor.patch[.suffix]` string.
    pub fn parse(text: &str) -> VersionResult<Self> {
        let captures = version_pattern()
            .captures(text)
            .ok_or_else(|| VersionError::Invalid(text.to_owned()))?;

        let number = |index: usize| {
            captures[index]
                .parse::<u64>()
                .map_err(|_| VersionError::Invalid(text.to_owned()))
        };

        Ok(Self {
            major: number(1)?,
            minor: number(2)?,
            patch: number(3)?,
            suffix: captures.get(4).map(|m| m.as_str().to_owned()),
        })
    }

    /// Advance the version in place.
    ///
    /// The numeric step runs first: a major bump resets minor and patch, a
    /// minor bump resets patch, and `None` leaves the numbers untouched.
    /// Then `unsuffix` clears the suffix, and an explicit non-empty `suffix`
    /// sets it; an explicit suffix always wins, even when `unsuffix` is set.
    pub fn bump(&mut self, part: Option<Part>, unsuffix: bool, suffix: Option<&str>) {
        match part {
            Some(Part::Major) => {
                self.major += 1;
                self.minor = 0;
                self.patch = 0;
            }
            Some(Part::Minor) => {
                self.minor += 1;
                self.patch = 0;
            }
            Some(Part::Patch) => self.patch += 1,
            None => {}
        }

        if unsuffix {
            self.suffix = None;
        }
        if let Some(suffix) = suffix.filter(|s| !s.is_empty()) {
            self.suffix = Some(suffix.to_owned());
        }
    }

    /// Return an independent copy with the same bump applied.
    #[must_use]
    pub fn bumped(&self, part: Option<Part>, unsuffix: bool, suffix: Option<&str>) -> Self {
        let mut version = self.clone();
        version.bump(part, unsuffix, suffix);
        version
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if let Some(ref suffix) = self.suffix {
            write!(f, ".{suffix}")?;
        }
        Ok(())
    }
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_plain() {
        assert_eq!(Version::parse("1.2.3").unwrap(), Version::new(1, 2, 3));
    }

    #[test]
    fn parse_suffixed() {
        assert_eq!(
            Version::parse("1.2.3.dev").unwrap(),
            Version::suffixed(1, 2, 3, "dev")
        );
    }

    #[test]
    fn parse_dotted_suffix() {
        assert_eq!(
            Version::parse("1.2.3.rc.1").unwrap(),
            Version::suffixed(1, 2, 3, "rc.1")
        );
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(Version::parse("not-a-version").is_err());
        assert!(Version::parse("1.2").is_err());
        assert!(Version::parse("1.2.3-dev").is_err());
        assert!(Version::parse("").is_err());
    }

    #[test]
    fn display_round_trips() {
        for text in ["0.0.0", "1.2.3", "1.2.3.dev", "10.20.30.rc1"] {
            let version = Version::parse(text).unwrap();
            assert_eq!(version.to_string(), text);
            assert_eq!(Version::parse(&version.to_string()).unwrap(), version);
        }
    }

    #[test]
    fn bump_major_resets_lower_parts() {
        let mut version = Version::suffixed(1, 2, 3, "dev");
        version.bump(Some(Part::Major), true, None);
        assert_eq!(version, Version::new(2, 0, 0));
    }

    #[test]
    fn bump_minor_resets_patch() {
        let mut version = Version::suffixed(1, 2, 3, "dev");
        version.bump(Some(Part::Minor), true, None);
        assert_eq!(version, Version::new(1, 3, 0));
    }

    #[test]
    fn bump_patch() {
        let mut version = Version::suffixed(1, 2, 3, "dev");
        version.bump(Some(Part::Patch), true, None);
        assert_eq!(version, Version::new(1, 2, 4));
    }

    #[test]
    fn bump_default_unsuffixes() {
        let mut version = Version::suffixed(1, 2, 3, "dev");
        version.bump(None, true, None);
        assert_eq!(version, Version::new(1, 2, 3));
    }

    #[test]
    fn explicit_suffix_wins_over_unsuffix() {
        let mut version = Version::suffixed(1, 2, 3, "dev");
        version.bump(None, true, Some("rc1"));
        assert_eq!(version, Version::suffixed(1, 2, 3, "rc1"));
    }

    #[test]
    fn empty_suffix_is_ignored() {
        let mut version = Version::suffixed(1, 2, 3, "dev");
        version.bump(None, true, Some(""));
        assert_eq!(version, Version::new(1, 2, 3));
    }

    #[test]
    fn no_op_bump_keeps_suffix() {
        let mut version = Version::suffixed(1, 2, 3, "dev");
        version.bump(None, false, None);
        assert_eq!(version, Version::suffixed(1, 2, 3, "dev"));
    }

    #[test]
    fn bumped_leaves_original_untouched() {
        let version = Version::suffixed(1, 2, 3, "dev");
        let next = version.bumped(Some(Part::Patch), false, Some("dev"));
        assert_eq!(version, Version::suffixed(1, 2, 3, "dev"));
        assert_eq!(next, Version::suffixed(1, 2, 4, "dev"));
    }
}
