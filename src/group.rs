// src/group.rs

//! The per-group accumulator: membership, default-install flags,
//! recorded directives, scripts, and sizes.
//!
//! A [`SingleGroup`] is created once, collects directives, is composed
//! exactly once by [`crate::compose`], and is read-only afterwards apart
//! from size and conflict annotations.

use std::collections::BTreeSet;
use std::fmt;

use indexmap::IndexMap;

use crate::cache::TroveCache;
use crate::deps::{Dependency, DependencySet};
use crate::error::{Error, Result};
use crate::handle::{trove_is_group, TroveHandle};
use crate::source::TroveSpec;

/// Three-state default-install setting on a directive: explicit true or
/// false, or inherit the group's own default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ByDefault {
    True,
    False,
    #[default]
    Inherit,
}

impl ByDefault {
    pub fn resolve(self, group_default: bool) -> bool {
        match self {
            Self::True => true,
            Self::False => false,
            Self::Inherit => group_default,
        }
    }
}

impl From<bool> for ByDefault {
    fn from(value: bool) -> Self {
        if value { Self::True } else { Self::False }
    }
}

/// Why a trove ended up in a group. Recorded the first time a trove is
/// added; explicit additions overwrite implicit reasons.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddReason {
    /// Added directly by an add directive.
    Added,
    /// Added to satisfy a dependency of another member.
    Dep {
        requiring: TroveHandle,
        providing: TroveHandle,
    },
    /// Included as a child of an explicitly added trove.
    Included { parent: TroveHandle },
    /// Included by adding a sub-group.
    IncludedGroup { group: String },
    /// Included via addAll from a source group.
    AddAll { source: TroveHandle },
    /// Added as the replacement in a replace directive.
    Replace { new: TroveHandle },
    /// Added by a component move or copy from another group.
    Copied { from_group: String },
}

impl AddReason {
    /// Human-readable explanation. With a cache available, dependency
    /// reasons name the dependencies the provider satisfied.
    pub fn describe(&self, cache: Option<&TroveCache>) -> String {
        match self {
            Self::Added => "Added directly".to_string(),
            Self::Dep {
                requiring,
                providing,
            } => {
                let missing = cache
                    .and_then(|c| {
                        let req = c.metadata(requiring)?;
                        let prov = c.metadata(providing)?;
                        Some(req.requires.intersection(&prov.provides).to_string())
                    })
                    .unwrap_or_default();
                if missing.is_empty() {
                    format!("Added to satisfy dep of {requiring}")
                } else {
                    format!("Added to satisfy dep(s): ({missing}) required by {requiring}")
                }
            }
            Self::Included { parent } => format!("Included by adding {parent}"),
            Self::IncludedGroup { group } => format!("Included by adding new group {group}"),
            Self::AddAll { source } => format!("Included by adding all from {source}"),
            Self::Replace { new } => format!("Included by replace of {new}"),
            Self::Copied { from_group } => {
                format!("Included due to copy/move of components from {from_group}")
            }
        }
    }
}

/// One slot of group scripting. Each may be set at most once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ScriptSlot {
    PreInstall,
    PostInstall,
    PreUpdate,
    PostUpdate,
    PreErase,
    PostErase,
    PreRollback,
    PostRollback,
}

impl fmt::Display for ScriptSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::PreInstall => "preInstall",
            Self::PostInstall => "postInstall",
            Self::PreUpdate => "preUpdate",
            Self::PostUpdate => "postUpdate",
            Self::PreErase => "preErase",
            Self::PostErase => "postErase",
            Self::PreRollback => "preRollback",
            Self::PostRollback => "postRollback",
        };
        f.write_str(name)
    }
}

/// Script contents plus the compatibility-class conversions it applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupScript {
    pub contents: String,
    pub conversions: Vec<i32>,
}

/// Per-member state inside a group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TroveEntry {
    pub explicit: bool,
    pub by_default: bool,
    pub components: Vec<String>,
    /// Source troves (from addAll) whose own child defaults override the
    /// usual AND rule for this member's children.
    pub child_default_sources: Vec<TroveHandle>,
    pub require_latest: bool,
}

/// A sub-group reference created with addNewGroup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubGroupRef {
    pub by_default: bool,
    pub explicit: bool,
    pub child_default_sources: Vec<TroveHandle>,
}

/// An add directive awaiting bulk resolution.
#[derive(Debug, Clone)]
pub struct AddSpec {
    pub spec: TroveSpec,
    pub by_default: ByDefault,
    pub scope: Option<String>,
    pub components: Vec<String>,
    pub require_latest: bool,
    pub allow_missing: bool,
}

/// A remove directive resolved against the group's own membership.
#[derive(Debug, Clone)]
pub struct RemoveSpec {
    pub spec: TroveSpec,
    pub allow_no_match: bool,
}

/// A replace directive: remove matches by name, add the resolved
/// replacements with the union of the removed members' settings.
#[derive(Debug, Clone)]
pub struct ReplaceSpec {
    pub spec: TroveSpec,
    pub scope: Option<String>,
    pub require_latest: bool,
    pub allow_missing: bool,
    pub allow_no_match: bool,
    pub is_global: bool,
}

/// How addAll descends into nested groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddAllMode {
    /// Recreate the nested group structure.
    Recurse,
    /// Descend but pour every leaf into the one target group.
    Flatten,
    /// Only the direct children.
    NoRecurse,
}

impl AddAllMode {
    /// Translate the recipe-level flag pair. Flatten and recurse are
    /// mutually exclusive; recurse defaults to on.
    pub fn from_flags(recurse: Option<bool>, flatten: bool) -> Result<Self> {
        match (flatten, recurse) {
            (true, Some(true)) => Err(Error::AddAllFlattenAndRecurse),
            (true, _) => Ok(Self::Flatten),
            (false, Some(false)) => Ok(Self::NoRecurse),
            (false, _) => Ok(Self::Recurse),
        }
    }
}

/// An addAll directive.
#[derive(Debug, Clone)]
pub struct AddAllSpec {
    pub spec: TroveSpec,
    pub scope: Option<String>,
    pub mode: AddAllMode,
    pub copy_scripts: bool,
    pub copy_compatibility_class: bool,
    pub require_latest: bool,
    pub allow_missing: bool,
}

/// A difference directive: remove everything also present in the
/// referenced trove.
#[derive(Debug, Clone)]
pub struct DifferenceSpec {
    pub spec: TroveSpec,
    pub scope: Option<String>,
}

/// A component move or copy into other groups.
#[derive(Debug, Clone)]
pub struct ComponentMove {
    pub to_groups: Vec<String>,
    pub components: Vec<String>,
    pub copy: bool,
    pub by_default: ByDefault,
}

/// The parent being examined in an addAll default lookup: either a member
/// trove or a sub-group reference.
#[derive(Debug, Clone, Copy)]
pub enum AddAllParent<'a> {
    Trove(&'a TroveHandle),
    Group(&'a str),
}

/// Construction-time options for a group.
#[derive(Debug, Clone, Copy)]
pub struct GroupOptions {
    pub dep_check: bool,
    pub auto_resolve: bool,
    pub check_only_by_default_deps: bool,
    pub check_path_conflicts: bool,
    pub by_default: bool,
    pub image_group: bool,
}

impl Default for GroupOptions {
    fn default() -> Self {
        Self {
            dep_check: false,
            auto_resolve: false,
            check_only_by_default_deps: true,
            check_path_conflicts: false,
            by_default: true,
            image_group: false,
        }
    }
}

/// The mutable per-group accumulator.
#[derive(Debug)]
pub struct SingleGroup {
    pub name: String,
    pub dep_check: bool,
    pub auto_resolve: bool,
    pub check_only_by_default_deps: bool,
    pub check_path_conflicts: bool,
    pub image_group: bool,
    by_default: bool,

    troves: IndexMap<TroveHandle, TroveEntry>,
    reasons: IndexMap<TroveHandle, AddReason>,
    subgroups: IndexMap<String, SubGroupRef>,

    add_specs: Vec<AddSpec>,
    remove_specs: Vec<RemoveSpec>,
    replace_specs: Vec<ReplaceSpec>,
    add_all_specs: Vec<AddAllSpec>,
    difference_specs: Vec<DifferenceSpec>,
    new_group_differences: Vec<String>,
    component_moves: Vec<ComponentMove>,
    components_to_remove: BTreeSet<String>,

    requires: DependencySet,
    compatibility_class: Option<i32>,
    scripts: IndexMap<ScriptSlot, GroupScript>,
    size: Option<u64>,
    copied_from: BTreeSet<TroveHandle>,
    build_refs: Vec<TroveHandle>,
}

impl SingleGroup {
    pub fn new(name: &str, options: GroupOptions) -> Result<Self> {
        if !trove_is_group(name) {
            return Err(Error::BadGroupName(name.to_string()));
        }
        Ok(Self {
            name: name.to_string(),
            dep_check: options.dep_check,
            auto_resolve: options.auto_resolve,
            check_only_by_default_deps: options.check_only_by_default_deps,
            // image groups are installed onto media; overlapping paths
            // would corrupt the image, so the check is always on for them
            check_path_conflicts: options.check_path_conflicts || options.image_group,
            image_group: options.image_group,
            by_default: options.by_default,
            troves: IndexMap::new(),
            reasons: IndexMap::new(),
            subgroups: IndexMap::new(),
            add_specs: Vec::new(),
            remove_specs: Vec::new(),
            replace_specs: Vec::new(),
            add_all_specs: Vec::new(),
            difference_specs: Vec::new(),
            new_group_differences: Vec::new(),
            component_moves: Vec::new(),
            components_to_remove: BTreeSet::new(),
            requires: DependencySet::new(),
            compatibility_class: None,
            scripts: IndexMap::new(),
            size: None,
            copied_from: BTreeSet::new(),
            build_refs: Vec::new(),
        })
    }

    // ----- membership -----

    /// Add a trove. Re-adding merges: `explicit`, `by_default`, and
    /// `require_latest` are sticky-true, components accumulate, and the
    /// reason is only replaced by an explicit addition.
    pub fn add_trove(
        &mut self,
        handle: TroveHandle,
        explicit: bool,
        by_default: bool,
        components: &[String],
        child_defaults: Vec<TroveHandle>,
        require_latest: bool,
        reason: AddReason,
    ) {
        let entry = match self.troves.get(&handle) {
            Some(old) => {
                let mut components: Vec<String> =
                    components.iter().chain(old.components.iter()).cloned().collect();
                components.dedup();
                let mut child_default_sources = old.child_default_sources.clone();
                child_default_sources.extend(child_defaults);
                TroveEntry {
                    explicit: explicit || old.explicit,
                    by_default: by_default || old.by_default,
                    components,
                    child_default_sources,
                    require_latest: require_latest || old.require_latest,
                }
            }
            None => TroveEntry {
                explicit,
                by_default,
                components: components.to_vec(),
                child_default_sources: child_defaults,
                require_latest,
            },
        };
        self.troves.insert(handle.clone(), entry);
        if explicit || !self.reasons.contains_key(&handle) {
            self.reasons.insert(handle, reason);
        }
    }

    /// Remove a trove: explicit entries are deleted outright, implicit
    /// entries are demoted to `by_default=false` so their weak reference
    /// stays visible. Missing handles are ignored.
    pub fn del_trove(&mut self, handle: &TroveHandle) {
        match self.troves.get_mut(handle) {
            Some(entry) if entry.explicit => {
                self.troves.shift_remove(handle);
            }
            Some(entry) => {
                entry.by_default = false;
            }
            None => {}
        }
    }

    pub fn set_trove_by_default(&mut self, handle: &TroveHandle, by_default: bool) {
        if let Some(entry) = self.troves.get_mut(handle) {
            entry.by_default = by_default;
        }
    }

    pub fn has_trove(&self, handle: &TroveHandle) -> bool {
        self.troves.contains_key(handle)
    }

    pub fn is_explicit(&self, handle: &TroveHandle) -> bool {
        self.troves.get(handle).is_some_and(|e| e.explicit)
    }

    pub fn include_by_default(&self, handle: &TroveHandle) -> bool {
        self.troves.get(handle).is_some_and(|e| e.by_default)
    }

    pub fn components_of(&self, handle: &TroveHandle) -> &[String] {
        self.troves
            .get(handle)
            .map(|e| e.components.as_slice())
            .unwrap_or(&[])
    }

    pub fn entry(&self, handle: &TroveHandle) -> Option<&TroveEntry> {
        self.troves.get(handle)
    }

    /// Iterate (handle, entry) in insertion order.
    pub fn iter_trove_info(&self) -> impl Iterator<Item = (&TroveHandle, &TroveEntry)> {
        self.troves.iter()
    }

    /// Member handles, filtered by reference strength. Explicit entries
    /// are the group's strong references; implicit entries are weak.
    pub fn iter_trove_list(&self, strong_refs: bool, weak_refs: bool) -> Vec<TroveHandle> {
        self.troves
            .iter()
            .filter(|(_, e)| if e.explicit { strong_refs } else { weak_refs })
            .map(|(h, _)| h.clone())
            .collect()
    }

    pub fn iter_default_troves(&self) -> Vec<TroveHandle> {
        self.troves
            .iter()
            .filter(|(_, e)| e.by_default)
            .map(|(h, _)| h.clone())
            .collect()
    }

    pub fn reason(&self, handle: &TroveHandle) -> Option<&AddReason> {
        self.reasons.get(handle)
    }

    pub fn is_empty(&self) -> bool {
        self.troves.is_empty() && self.subgroups.is_empty()
    }

    // ----- sub-groups -----

    /// Reference another group as a member. Merging is sticky like
    /// [`SingleGroup::add_trove`].
    pub fn add_new_group(
        &mut self,
        name: &str,
        by_default: Option<bool>,
        explicit: bool,
        child_defaults: Vec<TroveHandle>,
    ) -> Result<()> {
        if name == self.name {
            return Err(Error::GroupAddedToItself {
                group: self.name.clone(),
            });
        }
        let entry = match self.subgroups.get(name) {
            Some(old) => {
                let mut child_default_sources = old.child_default_sources.clone();
                child_default_sources.extend(child_defaults);
                SubGroupRef {
                    by_default: old.by_default || by_default.unwrap_or(false),
                    explicit: explicit || old.explicit,
                    child_default_sources,
                }
            }
            None => SubGroupRef {
                by_default: by_default.unwrap_or(true),
                explicit,
                child_default_sources: child_defaults,
            },
        };
        self.subgroups.insert(name.to_string(), entry);
        Ok(())
    }

    pub fn has_new_group(&self, name: &str) -> bool {
        self.subgroups.contains_key(name)
    }

    pub fn iter_new_groups(&self) -> impl Iterator<Item = (&str, &SubGroupRef)> {
        self.subgroups.iter().map(|(n, r)| (n.as_str(), r))
    }

    // ----- addAll child-default lookup -----

    /// When `parent` was populated through addAll, the addAll source
    /// trove's own default setting for `child` takes priority over the
    /// usual AND rule. Returns the source's setting, or None when no
    /// addAll source mentions the child.
    pub fn check_add_all_by_default(
        &self,
        cache: &TroveCache,
        parent: AddAllParent<'_>,
        child: &TroveHandle,
    ) -> Option<bool> {
        let sources = match parent {
            AddAllParent::Trove(handle) => {
                self.troves.get(handle).map(|e| &e.child_default_sources)
            }
            AddAllParent::Group(name) => {
                self.subgroups.get(name).map(|r| &r.child_default_sources)
            }
        }?;

        let mut include = None;
        for source in sources {
            if let Some(meta) = cache.metadata(source) {
                if let Some(by_default) = meta.include_by_default(child) {
                    if by_default {
                        return Some(true);
                    }
                    include = Some(false);
                }
            }
        }
        include
    }

    // ----- directives -----

    pub fn add_spec(
        &mut self,
        spec: TroveSpec,
        by_default: ByDefault,
        scope: Option<String>,
        components: Vec<String>,
        require_latest: bool,
        allow_missing: bool,
    ) {
        self.add_specs.push(AddSpec {
            spec,
            by_default,
            scope,
            components,
            require_latest,
            allow_missing,
        });
    }

    pub fn remove_spec(&mut self, spec: TroveSpec, allow_no_match: bool) {
        self.remove_specs.push(RemoveSpec {
            spec,
            allow_no_match,
        });
    }

    pub fn replace_spec(&mut self, spec: ReplaceSpec) {
        self.replace_specs.push(spec);
    }

    pub fn add_all_spec(&mut self, spec: AddAllSpec) {
        self.add_all_specs.push(spec);
    }

    pub fn difference_update(&mut self, spec: TroveSpec, scope: Option<String>) {
        self.difference_specs.push(DifferenceSpec { spec, scope });
    }

    pub fn difference_update_new_group(&mut self, name: &str) {
        self.new_group_differences.push(name.to_string());
    }

    pub fn move_components(
        &mut self,
        to_groups: Vec<String>,
        components: Vec<String>,
        copy: bool,
        by_default: ByDefault,
    ) {
        let components = components
            .into_iter()
            .map(|c| c.strip_prefix(':').map(str::to_string).unwrap_or(c))
            .collect();
        self.component_moves.push(ComponentMove {
            to_groups,
            components,
            copy,
            by_default,
        });
    }

    pub fn remove_components(&mut self, components: impl IntoIterator<Item = String>) {
        self.components_to_remove.extend(
            components
                .into_iter()
                .map(|c| c.strip_prefix(':').map(str::to_string).unwrap_or(c)),
        );
    }

    pub fn add_specs(&self) -> &[AddSpec] {
        &self.add_specs
    }

    pub fn remove_specs(&self) -> &[RemoveSpec] {
        &self.remove_specs
    }

    pub fn replace_specs(&self) -> &[ReplaceSpec] {
        &self.replace_specs
    }

    pub fn add_all_specs(&self) -> &[AddAllSpec] {
        &self.add_all_specs
    }

    pub fn difference_specs(&self) -> &[DifferenceSpec] {
        &self.difference_specs
    }

    pub fn new_group_differences(&self) -> &[String] {
        &self.new_group_differences
    }

    pub fn component_moves(&self) -> &[ComponentMove] {
        &self.component_moves
    }

    pub fn components_to_remove(&self) -> &BTreeSet<String> {
        &self.components_to_remove
    }

    /// Map component suffix -> (destination group, byDefault override),
    /// for either moves or copies.
    pub fn move_component_map(&self, copy: bool) -> IndexMap<String, Vec<(String, ByDefault)>> {
        let mut map: IndexMap<String, Vec<(String, ByDefault)>> = IndexMap::new();
        for mv in self.component_moves.iter().filter(|m| m.copy == copy) {
            for component in &mv.components {
                for to_group in &mv.to_groups {
                    map.entry(component.clone())
                        .or_default()
                        .push((to_group.clone(), mv.by_default));
                }
            }
        }
        map
    }

    // ----- metadata -----

    pub fn add_requires(&mut self, requirement: &str) {
        self.requires.insert(Dependency::trove(requirement));
    }

    pub fn requires(&self) -> &DependencySet {
        &self.requires
    }

    pub fn add_script(&mut self, slot: ScriptSlot, script: GroupScript) -> Result<()> {
        if self.scripts.contains_key(&slot) {
            return Err(Error::ScriptAlreadySet {
                group: self.name.clone(),
            });
        }
        self.scripts.insert(slot, script);
        Ok(())
    }

    pub fn script(&self, slot: ScriptSlot) -> Option<&GroupScript> {
        self.scripts.get(&slot)
    }

    pub fn set_compatibility_class(&mut self, class: i32) {
        self.compatibility_class = Some(class);
    }

    pub fn compatibility_class(&self) -> Option<i32> {
        self.compatibility_class
    }

    pub fn set_by_default(&mut self, by_default: bool) {
        self.by_default = by_default;
    }

    pub fn by_default(&self) -> bool {
        self.by_default
    }

    pub fn set_size(&mut self, size: Option<u64>) {
        self.size = size;
    }

    pub fn size(&self) -> Option<u64> {
        self.size
    }

    pub fn add_copied_from(&mut self, handle: TroveHandle) {
        self.copied_from.insert(handle);
    }

    pub fn iter_copied_from(&self) -> impl Iterator<Item = &TroveHandle> {
        self.copied_from.iter()
    }

    pub fn set_build_refs(&mut self, refs: Vec<TroveHandle>) {
        self.build_refs = refs;
    }

    pub fn build_refs(&self) -> &[TroveHandle] {
        &self.build_refs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flavor::Flavor;
    use crate::label::Label;
    use crate::version::{Revision, Version};

    fn handle(name: &str) -> TroveHandle {
        TroveHandle::new(
            name,
            Version::new(Label::new("repo", "ns", "1"), Revision::parse("1.0-1").unwrap()),
            Flavor::empty(),
        )
    }

    fn group(name: &str) -> SingleGroup {
        SingleGroup::new(name, GroupOptions::default()).unwrap()
    }

    #[test]
    fn name_must_follow_convention() {
        assert!(SingleGroup::new("os", GroupOptions::default()).is_err());
        assert!(SingleGroup::new("group-os", GroupOptions::default()).is_ok());
    }

    #[test]
    fn image_groups_always_check_path_conflicts() {
        let options = GroupOptions {
            image_group: true,
            check_path_conflicts: false,
            ..GroupOptions::default()
        };
        let g = SingleGroup::new("group-image", options).unwrap();
        assert!(g.check_path_conflicts);
        assert!(g.image_group);
    }

    #[test]
    fn group_requires_accumulate() {
        let mut g = group("group-os");
        g.add_requires("tmpwatch");
        g.add_requires("conary");
        g.add_requires("conary");
        assert_eq!(g.requires().len(), 2);
        assert!(g.requires().contains(&Dependency::trove("conary")));
    }

    #[test]
    fn sticky_flags_survive_reorder() {
        for first_by_default in [true, false] {
            let mut g = group("group-os");
            let h = handle("foo");
            g.add_trove(h.clone(), false, first_by_default, &[], vec![], false, AddReason::Added);
            g.add_trove(h.clone(), true, !first_by_default, &[], vec![], false, AddReason::Added);
            let entry = g.entry(&h).unwrap();
            assert!(entry.explicit, "explicit is sticky");
            assert!(entry.by_default, "byDefault is sticky regardless of order");
        }
    }

    #[test]
    fn explicit_reason_wins() {
        let mut g = group("group-os");
        let h = handle("foo");
        let parent = handle("pkg");
        g.add_trove(
            h.clone(),
            false,
            true,
            &[],
            vec![],
            false,
            AddReason::Included { parent },
        );
        g.add_trove(h.clone(), true, true, &[], vec![], false, AddReason::Added);
        assert_eq!(g.reason(&h), Some(&AddReason::Added));
    }

    #[test]
    fn implicit_reason_does_not_overwrite() {
        let mut g = group("group-os");
        let h = handle("foo");
        g.add_trove(h.clone(), true, true, &[], vec![], false, AddReason::Added);
        g.add_trove(
            h.clone(),
            false,
            true,
            &[],
            vec![],
            false,
            AddReason::IncludedGroup {
                group: "group-x".into(),
            },
        );
        assert_eq!(g.reason(&h), Some(&AddReason::Added));
    }

    #[test]
    fn del_demotes_implicit_deletes_explicit() {
        let mut g = group("group-os");
        let explicit = handle("foo");
        let implicit = handle("bar");
        g.add_trove(explicit.clone(), true, true, &[], vec![], false, AddReason::Added);
        g.add_trove(implicit.clone(), false, true, &[], vec![], false, AddReason::Added);

        g.del_trove(&explicit);
        g.del_trove(&implicit);

        assert!(!g.has_trove(&explicit), "explicit entry deleted outright");
        assert!(g.has_trove(&implicit), "implicit entry stays visible");
        assert!(!g.include_by_default(&implicit), "implicit entry demoted");
    }

    #[test]
    fn cannot_include_self() {
        let mut g = group("group-os");
        assert!(matches!(
            g.add_new_group("group-os", Some(true), true, vec![]),
            Err(Error::GroupAddedToItself { .. })
        ));
    }

    #[test]
    fn scripts_set_once() {
        let mut g = group("group-os");
        let script = GroupScript {
            contents: "#!/bin/sh\n".into(),
            conversions: vec![],
        };
        g.add_script(ScriptSlot::PostInstall, script.clone()).unwrap();
        assert!(matches!(
            g.add_script(ScriptSlot::PostInstall, script),
            Err(Error::ScriptAlreadySet { .. })
        ));
    }

    #[test]
    fn move_component_map_splits_moves_and_copies() {
        let mut g = group("group-os");
        g.move_components(
            vec!["group-dev".into()],
            vec![":devel".into()],
            false,
            ByDefault::Inherit,
        );
        g.move_components(
            vec!["group-doc".into()],
            vec!["doc".into()],
            true,
            ByDefault::True,
        );

        let moves = g.move_component_map(false);
        assert_eq!(moves.len(), 1);
        assert!(moves.contains_key("devel"), "leading colon stripped");
        let copies = g.move_component_map(true);
        assert!(copies.contains_key("doc"));
    }
}
