// src/deps.rs

//! Dependency classes and sets.
//!
//! A dependency is a (class, name) pair; troves provide and require sets
//! of them. Classes mirror the ecosystems the dependency detector emits.
//! ABI and RPM-lib dependencies are excluded from erase-mode dependency
//! checks (see [`crate::depsolve`]) because they describe the build host,
//! not trove-to-trove requirements a group can satisfy.

use std::collections::BTreeSet;
use std::fmt;

/// Ecosystem a dependency belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DependencyClass {
    /// Trove-level dependency: the name of another trove.
    Trove,
    /// Shared library soname, e.g. `libssl.so.3`.
    Soname,
    /// A specific file path must be present, e.g. `/bin/sh`.
    File,
    /// Python module.
    Python,
    /// Perl module.
    Perl,
    /// ABI compatibility tag; host property, not resolvable in a group.
    Abi,
    /// rpmlib() feature tags from RPM capsules; host property.
    RpmLib,
}

impl DependencyClass {
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Trove => "trove",
            Self::Soname => "soname",
            Self::File => "file",
            Self::Python => "python",
            Self::Perl => "perl",
            Self::Abi => "abi",
            Self::RpmLib => "rpmlib",
        }
    }
}

impl fmt::Display for DependencyClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// One dependency: a class plus a name within that class.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Dependency {
    pub class: DependencyClass,
    pub name: String,
}

impl Dependency {
    pub fn new(class: DependencyClass, name: impl Into<String>) -> Self {
        Self {
            class,
            name: name.into(),
        }
    }

    pub fn trove(name: impl Into<String>) -> Self {
        Self::new(DependencyClass::Trove, name)
    }

    pub fn soname(name: impl Into<String>) -> Self {
        Self::new(DependencyClass::Soname, name)
    }
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.class, self.name)
    }
}

/// An ordered set of dependencies.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencySet {
    deps: BTreeSet<Dependency>,
}

impl DependencySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, dep: Dependency) {
        self.deps.insert(dep);
    }

    pub fn contains(&self, dep: &Dependency) -> bool {
        self.deps.contains(dep)
    }

    pub fn is_empty(&self) -> bool {
        self.deps.is_empty()
    }

    pub fn len(&self) -> usize {
        self.deps.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Dependency> {
        self.deps.iter()
    }

    pub fn union_with(&mut self, other: &DependencySet) {
        self.deps.extend(other.deps.iter().cloned());
    }

    pub fn intersection(&self, other: &DependencySet) -> DependencySet {
        DependencySet {
            deps: self.deps.intersection(&other.deps).cloned().collect(),
        }
    }

    /// Dependencies in `self` not satisfied by `provides`, skipping the
    /// given classes entirely.
    pub fn unsatisfied_by(
        &self,
        provides: &DependencySet,
        ignore_classes: &[DependencyClass],
    ) -> DependencySet {
        DependencySet {
            deps: self
                .deps
                .iter()
                .filter(|d| !ignore_classes.contains(&d.class))
                .filter(|d| !provides.deps.contains(d))
                .cloned()
                .collect(),
        }
    }
}

impl fmt::Display for DependencySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.deps.iter().map(|d| d.to_string()).collect();
        write!(f, "{}", parts.join(", "))
    }
}

impl FromIterator<Dependency> for DependencySet {
    fn from_iter<T: IntoIterator<Item = Dependency>>(iter: T) -> Self {
        Self {
            deps: iter.into_iter().collect(),
        }
    }
}
