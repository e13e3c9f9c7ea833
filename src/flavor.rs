// src/flavor.rs

//! Flavors describe build-time variation: architecture and optional
//! features. Syntax follows Conary: `ssl,!debug,~vmware,~!xen`.
//!
//! Flavor values on troves use hard senses (present or absent); specs used
//! in queries may also use the soft `~`/`~!` senses, which express
//! preference rather than requirement.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// The sense attached to one flavor item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FlavorOp {
    /// Feature must be present (no prefix).
    Required,
    /// Feature must be absent (`!`).
    Not,
    /// Prefer present (`~`).
    Prefers,
    /// Prefer absent (`~!`).
    PrefersNot,
}

impl FlavorOp {
    pub fn as_prefix(&self) -> &'static str {
        match self {
            Self::Required => "",
            Self::Not => "!",
            Self::Prefers => "~",
            Self::PrefersNot => "~!",
        }
    }

    fn parse_with_name(s: &str) -> Result<(Self, &str)> {
        let s = s.trim();
        let (op, name) = if let Some(rest) = s.strip_prefix("~!") {
            (Self::PrefersNot, rest.trim())
        } else if let Some(rest) = s.strip_prefix('~') {
            (Self::Prefers, rest.trim())
        } else if let Some(rest) = s.strip_prefix('!') {
            (Self::Not, rest.trim())
        } else {
            (Self::Required, s)
        };
        if name.is_empty() {
            return Err(Error::Parse(format!("empty flavor item in '{s}'")));
        }
        Ok((op, name))
    }

    /// Whether this sense asserts presence.
    fn positive(&self) -> bool {
        matches!(self, Self::Required | Self::Prefers)
    }
}

/// A set of flavor items, keyed by feature name. Each name appears with
/// exactly one sense.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Flavor {
    items: BTreeMap<String, FlavorOp>,
}

impl Flavor {
    /// The empty flavor, which satisfies any spec with no hard items.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse a comma-separated item list; an empty string is the empty
    /// flavor.
    pub fn parse(s: &str) -> Result<Self> {
        let mut items = BTreeMap::new();
        for part in s.split(',') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            let (op, name) = FlavorOp::parse_with_name(part)?;
            items.insert(name.to_string(), op);
        }
        Ok(Self { items })
    }

    pub fn insert(&mut self, name: impl Into<String>, op: FlavorOp) {
        self.items.insert(name.into(), op);
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<FlavorOp> {
        self.items.get(name).copied()
    }

    /// Whether this trove flavor satisfies a query spec.
    ///
    /// Hard items in the spec are requirements: `ssl` needs the trove to
    /// carry ssl positively, `!ssl` needs it absent or negative. Soft
    /// items always match; they only influence [`Flavor::score`].
    pub fn satisfies(&self, spec: &Flavor) -> bool {
        for (name, op) in &spec.items {
            let have = self.items.get(name).map(|o| o.positive());
            match op {
                FlavorOp::Required => {
                    if have != Some(true) {
                        return false;
                    }
                }
                FlavorOp::Not => {
                    if have == Some(true) {
                        return false;
                    }
                }
                FlavorOp::Prefers | FlavorOp::PrefersNot => {}
            }
        }
        true
    }

    /// Preference score of this flavor against a spec; higher wins among
    /// troves that already satisfy the spec.
    pub fn score(&self, spec: &Flavor) -> i64 {
        let mut score = 0;
        for (name, op) in &spec.items {
            let have = self.items.get(name).map(|o| o.positive());
            match (op.positive(), have) {
                (true, Some(true)) | (false, None) | (false, Some(false)) => score += 1,
                _ => {}
            }
        }
        score
    }
}

impl fmt::Display for Flavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .items
            .iter()
            .map(|(name, op)| format!("{}{}", op.as_prefix(), name))
            .collect();
        write!(f, "{}", parts.join(","))
    }
}

impl FromStr for Flavor {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Flavor::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_display() {
        let f = Flavor::parse("ssl, !debug, ~vmware, ~!xen").unwrap();
        assert_eq!(f.to_string(), "!debug,ssl,~vmware,~!xen");
        assert_eq!(f.get("ssl"), Some(FlavorOp::Required));
        assert_eq!(f.get("debug"), Some(FlavorOp::Not));
    }

    #[test]
    fn empty_flavor_satisfies_empty_spec() {
        assert!(Flavor::empty().satisfies(&Flavor::empty()));
    }

    #[test]
    fn hard_requirements_filter() {
        let trove = Flavor::parse("ssl").unwrap();
        assert!(trove.satisfies(&Flavor::parse("ssl").unwrap()));
        assert!(!trove.satisfies(&Flavor::parse("!ssl").unwrap()));
        assert!(!trove.satisfies(&Flavor::parse("ssl,gtk").unwrap()));
        assert!(trove.satisfies(&Flavor::parse("~gtk").unwrap()));
    }

    #[test]
    fn flavors_sort_deterministically() {
        // handles are ordered by (name, version, flavor); flavor must
        // order consistently for stable output
        let mut flavors = vec![
            Flavor::parse("ssl").unwrap(),
            Flavor::empty(),
            Flavor::parse("!debug,ssl").unwrap(),
        ];
        flavors.sort();
        let sorted = flavors.clone();
        flavors.reverse();
        flavors.sort();
        assert_eq!(flavors, sorted);
        assert!(flavors.first().unwrap().is_empty(), "empty flavor sorts first");
    }

    #[test]
    fn soft_senses_only_affect_score() {
        let with_ssl = Flavor::parse("ssl").unwrap();
        let without = Flavor::empty();
        let spec = Flavor::parse("~ssl").unwrap();
        assert!(with_ssl.satisfies(&spec));
        assert!(without.satisfies(&spec));
        assert!(with_ssl.score(&spec) > without.score(&spec));
    }
}
