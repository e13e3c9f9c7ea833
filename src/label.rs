// src/label.rs

//! Labels identify the branch a trove lives on, in the format
//! `repository@namespace:tag`. A label path is the ordered list of labels
//! searched when resolving trove specs; earlier labels win.

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// A branch label in `repository@namespace:tag` form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Label {
    pub repository: String,
    pub namespace: String,
    pub tag: String,
}

impl Label {
    pub fn new(
        repository: impl Into<String>,
        namespace: impl Into<String>,
        tag: impl Into<String>,
    ) -> Self {
        Self {
            repository: repository.into(),
            namespace: namespace.into(),
            tag: tag.into(),
        }
    }

    /// Parse `repository@namespace:tag`.
    pub fn parse(s: &str) -> Result<Self> {
        let at = s.find('@').ok_or_else(|| Error::InvalidLabel(s.to_string()))?;
        let colon = s[at..]
            .find(':')
            .map(|p| at + p)
            .ok_or_else(|| Error::InvalidLabel(s.to_string()))?;

        let repository = &s[..at];
        let namespace = &s[at + 1..colon];
        let tag = &s[colon + 1..];

        let valid = |c: char| c.is_alphanumeric() || c == '.' || c == '-' || c == '_';
        if repository.is_empty()
            || namespace.is_empty()
            || tag.is_empty()
            || !repository.chars().all(valid)
            || !namespace.chars().all(valid)
            || !tag.chars().all(valid)
        {
            return Err(Error::InvalidLabel(s.to_string()));
        }

        Ok(Self {
            repository: repository.to_string(),
            namespace: namespace.to_string(),
            tag: tag.to_string(),
        })
    }

    /// Two labels share a branch when repository and namespace agree.
    pub fn same_branch(&self, other: &Label) -> bool {
        self.repository == other.repository && self.namespace == other.namespace
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}:{}", self.repository, self.namespace, self.tag)
    }
}

impl FromStr for Label {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Label::parse(s)
    }
}

/// Ordered label search path, highest priority first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelPath {
    labels: Vec<Label>,
}

impl LabelPath {
    pub fn new() -> Self {
        Self { labels: Vec::new() }
    }

    pub fn from_labels(labels: Vec<Label>) -> Self {
        Self { labels }
    }

    pub fn push(&mut self, label: Label) {
        self.labels.push(label);
    }

    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    pub fn contains(&self, label: &Label) -> bool {
        self.labels.contains(label)
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

impl fmt::Display for LabelPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let labels: Vec<String> = self.labels.iter().map(|l| l.to_string()).collect();
        write!(f, "{}", labels.join(" "))
    }
}
