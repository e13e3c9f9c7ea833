// src/handle.rs

//! The universal trove identity: (name, version, flavor).
//!
//! Naming conventions carry structure: `group-*` names are group troves,
//! names containing `:` are components, everything else is a package.
//! Groups and packages are collections (they reference other troves);
//! components are leaves that carry files.

use std::fmt;

use crate::flavor::Flavor;
use crate::version::Version;

/// Immutable (name, version, flavor) identity of one trove.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TroveHandle {
    pub name: String,
    pub version: Version,
    pub flavor: Flavor,
}

impl TroveHandle {
    pub fn new(name: impl Into<String>, version: Version, flavor: Flavor) -> Self {
        Self {
            name: name.into(),
            version,
            flavor,
        }
    }

    pub fn is_group(&self) -> bool {
        trove_is_group(&self.name)
    }

    pub fn is_component(&self) -> bool {
        self.name.contains(':')
    }

    /// Collections reference other troves: groups and packages, but not
    /// components.
    pub fn is_collection(&self) -> bool {
        trove_is_collection(&self.name)
    }

    /// The component suffix after `:`, if this is a component.
    pub fn component_suffix(&self) -> Option<&str> {
        self.name.split_once(':').map(|(_, suffix)| suffix)
    }

    /// The package name before `:` (or the whole name for non-components).
    pub fn package_name(&self) -> &str {
        self.name.split(':').next().unwrap_or(&self.name)
    }

    /// The handle of the containing package, same version and flavor.
    pub fn package_handle(&self) -> TroveHandle {
        TroveHandle {
            name: self.package_name().to_string(),
            version: self.version.clone(),
            flavor: self.flavor.clone(),
        }
    }
}

impl fmt::Display for TroveHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}[{}]", self.name, self.version, self.flavor)
    }
}

pub fn trove_is_group(name: &str) -> bool {
    name.starts_with("group-")
}

pub fn trove_is_collection(name: &str) -> bool {
    trove_is_group(name) || !name.contains(':')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::label::Label;
    use crate::version::Revision;

    fn version() -> Version {
        Version::new(Label::new("repo", "ns", "1"), Revision::parse("1.0-1").unwrap())
    }

    #[test]
    fn classification() {
        let group = TroveHandle::new("group-os", version(), Flavor::empty());
        let pkg = TroveHandle::new("bash", version(), Flavor::empty());
        let comp = TroveHandle::new("bash:runtime", version(), Flavor::empty());

        assert!(group.is_group() && group.is_collection());
        assert!(!pkg.is_group() && pkg.is_collection() && !pkg.is_component());
        assert!(comp.is_component() && !comp.is_collection());
        assert_eq!(comp.component_suffix(), Some("runtime"));
        assert_eq!(comp.package_handle().name, "bash");
    }
}
