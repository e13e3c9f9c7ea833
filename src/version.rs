// src/version.rs

//! Trove versions: a branch [`Label`] plus an upstream revision.
//!
//! Revision comparison follows RPM conventions (epoch, then version, then
//! release), normalizing through semver where the upstream version allows
//! it and falling back to string order where it does not.

use std::cmp::Ordering;
use std::fmt;

use semver::Version as SemVersion;

use crate::error::{Error, Result};
use crate::label::Label;

/// An upstream revision in `[epoch:]version[-release]` form.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Revision {
    pub epoch: u64,
    pub version: String,
    pub release: Option<String>,
}

impl Revision {
    pub fn parse(s: &str) -> Result<Self> {
        let (epoch_str, rest) = match s.find(':') {
            Some(pos) => (&s[..pos], &s[pos + 1..]),
            None => ("0", s),
        };

        let epoch = if epoch_str.is_empty() {
            0
        } else {
            epoch_str
                .parse::<u64>()
                .map_err(|e| Error::Parse(format!("invalid epoch in revision '{s}': {e}")))?
        };

        let (version, release) = match rest.find('-') {
            Some(pos) => (rest[..pos].to_string(), Some(rest[pos + 1..].to_string())),
            None => (rest.to_string(), None),
        };

        if version.is_empty() {
            return Err(Error::Parse(format!("empty version component in '{s}'")));
        }

        Ok(Self {
            epoch,
            version,
            release,
        })
    }

    /// Normalize to semver for comparison. Revisions that are not semver
    /// get major.minor.patch extracted from their leading numeric parts.
    fn to_semver(&self) -> SemVersion {
        if let Ok(v) = SemVersion::parse(&self.version) {
            return v;
        }
        let parts: Vec<&str> = self.version.split('.').collect();
        let major = parts.first().and_then(|s| s.parse().ok()).unwrap_or(0);
        let minor = parts.get(1).and_then(|s| s.parse().ok()).unwrap_or(0);
        let patch = parts.get(2).and_then(|s| s.parse().ok()).unwrap_or(0);
        SemVersion::new(major, minor, patch)
    }

    pub fn compare(&self, other: &Revision) -> Ordering {
        match self.epoch.cmp(&other.epoch) {
            Ordering::Equal => {}
            ord => return ord,
        }
        match self.to_semver().cmp(&other.to_semver()) {
            Ordering::Equal => {}
            ord => return ord,
        }
        match self.version.cmp(&other.version) {
            Ordering::Equal => {}
            ord => return ord,
        }
        self.release.cmp(&other.release)
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.epoch > 0 {
            write!(f, "{}:", self.epoch)?;
        }
        write!(f, "{}", self.version)?;
        if let Some(release) = &self.release {
            write!(f, "-{release}")?;
        }
        Ok(())
    }
}

/// A full trove version: the branch label it was built on plus the
/// upstream revision. Displayed as `/label/revision`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Version {
    pub label: Label,
    pub revision: Revision,
}

impl Version {
    pub fn new(label: Label, revision: Revision) -> Self {
        Self { label, revision }
    }

    /// Parse `/repository@namespace:tag/revision`.
    pub fn parse(s: &str) -> Result<Self> {
        let rest = s
            .strip_prefix('/')
            .ok_or_else(|| Error::Parse(format!("version must start with '/': {s}")))?;
        let slash = rest
            .rfind('/')
            .ok_or_else(|| Error::Parse(format!("version missing revision: {s}")))?;
        Ok(Self {
            label: Label::parse(&rest[..slash])?,
            revision: Revision::parse(&rest[slash + 1..])?,
        })
    }

    pub fn compare(&self, other: &Version) -> Ordering {
        match self.label.cmp(&other.label) {
            Ordering::Equal => self.revision.compare(&other.revision),
            ord => ord,
        }
    }

    /// Ordering by revision only, regardless of branch. This is what
    /// "require latest" queries use when a name appears on one label.
    pub fn newer_than(&self, other: &Version) -> bool {
        self.revision.compare(&other.revision) == Ordering::Greater
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}/{}", self.label, self.revision)
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.compare(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.compare(other)
    }
}
