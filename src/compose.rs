// src/compose.rs

//! The per-group composition pass: turns a group's recorded directives
//! plus the already-built groups it references into final membership.
//!
//! Order of operations within one group: explicit adds, replaces,
//! removes, implicit children of explicit collections, members pulled in
//! from sub-groups, differences, weak-reference pruning, component
//! moves and copies, and finally package demotion. Groups are composed
//! in the order produced by [`crate::graph::sort_groups`], so every
//! sub-group this group references is already final.

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use tracing::debug;

use crate::cache::TroveCache;
use crate::diag::{Diagnostics, Warning};
use crate::error::{Error, Result};
use crate::group::{AddAllParent, AddReason, SingleGroup, TroveEntry};
use crate::handle::TroveHandle;
use crate::redirect::follow_redirect;
use crate::source::{GroupTroveSource, SearchSource, TroveSpec};

/// Handles resolved for every directive spec before composition starts,
/// keyed by (search scope, requireLatest).
#[derive(Debug, Default)]
pub struct ResolvedTroves {
    map: HashMap<(Option<String>, bool), IndexMap<TroveSpec, Vec<TroveHandle>>>,
}

impl ResolvedTroves {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &mut self,
        scope: Option<String>,
        require_latest: bool,
        spec: TroveSpec,
        handles: Vec<TroveHandle>,
    ) {
        self.map
            .entry((scope, require_latest))
            .or_default()
            .insert(spec, handles);
    }

    pub fn get(
        &self,
        scope: &Option<String>,
        require_latest: bool,
        spec: &TroveSpec,
    ) -> &[TroveHandle] {
        self.map
            .get(&(scope.clone(), require_latest))
            .and_then(|bucket| bucket.get(spec))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Lookup that does not care which requireLatest bucket the spec was
    /// resolved under. Differences use this: the same spec may have been
    /// resolved for an add with either flag.
    pub fn get_any(&self, scope: &Option<String>, spec: &TroveSpec) -> &[TroveHandle] {
        for require_latest in [false, true] {
            let found = self.get(scope, require_latest, spec);
            if !found.is_empty() {
                return found;
            }
        }
        &[]
    }

    /// Every resolved handle, for bulk cache priming.
    pub fn all_handles(&self) -> Vec<TroveHandle> {
        let mut handles: Vec<TroveHandle> = self
            .map
            .values()
            .flat_map(|bucket| bucket.values().flatten().cloned())
            .collect();
        handles.sort();
        handles.dedup();
        handles
    }
}

/// A component queued for addition to another group by a move or copy
/// directive. Applied by the caller once this group's pass finishes;
/// ordering guarantees the destination group has not been composed yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedComponent {
    pub to_group: String,
    pub handle: TroveHandle,
    pub by_default: bool,
    pub from_group: String,
}

/// What one composition pass hands back to the driver.
#[derive(Debug, Default)]
pub struct ComposeOutcome {
    pub staged: Vec<StagedComponent>,
    /// Global replace specs that matched something in this group.
    pub matched_global: HashSet<TroveSpec>,
}

/// Compose one group. `built` holds every group already composed; the
/// group being composed must not be in it.
pub fn add_troves_to_group(
    group: &mut SingleGroup,
    built: &IndexMap<String, SingleGroup>,
    resolved: &ResolvedTroves,
    cache: &mut TroveCache<'_>,
    search: &dyn SearchSource,
    diags: &mut Diagnostics,
) -> Result<ComposeOutcome> {
    debug!(group = %group.name, "composing group");
    let mut outcome = ComposeOutcome::default();
    let mut removed: Vec<TroveHandle> = Vec::new();

    apply_adds(group, resolved, cache, search, diags)?;
    let explicit = group.iter_trove_list(true, false);
    propagate_children(group, cache, &explicit)?;
    propagate_subgroups(group, built, cache)?;
    apply_replaces(group, resolved, cache, search, diags, &mut removed, &mut outcome)?;
    apply_removes(group, diags, &mut removed);
    apply_differences(group, built, resolved, cache, &mut removed)?;

    let demote = find_all_weak_troves_to_remove(group, &removed, cache)?;
    for handle in &demote {
        group.set_trove_by_default(handle, false);
    }

    stage_component_moves(group, &mut outcome);
    demote_emptied_packages(group);
    Ok(outcome)
}

fn apply_adds(
    group: &mut SingleGroup,
    resolved: &ResolvedTroves,
    cache: &mut TroveCache<'_>,
    search: &dyn SearchSource,
    diags: &mut Diagnostics,
) -> Result<()> {
    for add in group.add_specs().to_vec() {
        let handles = resolved.get(&add.scope, add.require_latest, &add.spec).to_vec();
        if handles.is_empty() {
            diags.push(Warning::SkippedAdd {
                group: group.name.clone(),
                spec: add.spec.clone(),
            });
            continue;
        }
        let by_default = add.by_default.resolve(group.by_default());
        for handle in handles {
            for concrete in follow_redirect(cache, search, &handle)? {
                group.add_trove(
                    concrete,
                    true,
                    by_default,
                    &add.components,
                    vec![],
                    add.require_latest,
                    AddReason::Added,
                );
            }
        }
    }
    Ok(())
}

fn apply_replaces(
    group: &mut SingleGroup,
    resolved: &ResolvedTroves,
    cache: &mut TroveCache<'_>,
    search: &dyn SearchSource,
    diags: &mut Diagnostics,
    removed: &mut Vec<TroveHandle>,
    outcome: &mut ComposeOutcome,
) -> Result<()> {
    let mut member_source = GroupTroveSource::new(group.iter_trove_list(true, true));
    let mut unmatched: Vec<TroveSpec> = Vec::new();

    for replace in group.replace_specs().to_vec() {
        // members are matched by name; the full spec picks the replacement
        let match_spec = TroveSpec::new(replace.spec.name.clone());
        let matches = member_source
            .find(std::slice::from_ref(&match_spec))
            .shift_remove(&match_spec)
            .unwrap_or_default();
        if matches.is_empty() {
            // globals are accounted across all groups by the driver
            if !replace.is_global && !replace.allow_no_match {
                unmatched.push(replace.spec.clone());
            }
            continue;
        }

        let explicit_matches: Vec<TroveHandle> = matches
            .iter()
            .filter(|h| group.is_explicit(h))
            .cloned()
            .collect();
        if explicit_matches.is_empty() {
            diags.push(Warning::ImplicitReplace {
                group: group.name.clone(),
                handles: matches,
            });
            continue;
        }
        // implicit-only matches do not count: the replace did nothing here
        if replace.is_global {
            outcome.matched_global.insert(replace.spec.clone());
        }

        let mut by_default = false;
        let mut components: Vec<String> = Vec::new();
        for handle in &explicit_matches {
            if let Some(entry) = group.entry(handle) {
                by_default |= entry.by_default;
                for component in &entry.components {
                    if !components.contains(component) {
                        components.push(component.clone());
                    }
                }
            }
            group.del_trove(handle);
            member_source.del_trove(handle);
            removed.push(handle.clone());
        }

        let replacements = resolved
            .get(&replace.scope, replace.require_latest, &replace.spec)
            .to_vec();
        let mut added = Vec::new();
        for handle in replacements {
            for concrete in follow_redirect(cache, search, &handle)? {
                member_source.add_trove(concrete.clone());
                group.add_trove(
                    concrete.clone(),
                    true,
                    by_default,
                    &components,
                    vec![],
                    replace.require_latest,
                    AddReason::Replace {
                        new: concrete.clone(),
                    },
                );
                added.push(concrete);
            }
        }
        // replacements are collections too; bring their children along
        propagate_children(group, cache, &added)?;
    }

    if !unmatched.is_empty() {
        diags.push(Warning::UnmatchedReplaces {
            group: group.name.clone(),
            specs: unmatched,
        });
    }
    Ok(())
}

fn apply_removes(
    group: &mut SingleGroup,
    diags: &mut Diagnostics,
    removed: &mut Vec<TroveHandle>,
) {
    let mut member_source = GroupTroveSource::new(group.iter_trove_list(true, true));
    let mut unmatched: Vec<TroveSpec> = Vec::new();

    for remove in group.remove_specs().to_vec() {
        let matches = member_source
            .find(std::slice::from_ref(&remove.spec))
            .shift_remove(&remove.spec)
            .unwrap_or_default();
        if matches.is_empty() {
            if !remove.allow_no_match {
                unmatched.push(remove.spec.clone());
            }
            continue;
        }
        for handle in matches {
            group.del_trove(&handle);
            member_source.del_trove(&handle);
            removed.push(handle);
        }
    }

    if !unmatched.is_empty() {
        diags.push(Warning::UnmatchedRemoves {
            group: group.name.clone(),
            specs: unmatched,
        });
    }
}

/// Every child of an explicitly added collection becomes an implicit
/// member. The default flag is the AND of the parent's and the child
/// reference's, unless an addAll source has its own opinion.
fn propagate_children(
    group: &mut SingleGroup,
    cache: &mut TroveCache<'_>,
    parents: &[TroveHandle],
) -> Result<()> {
    let explicit_collections: Vec<(TroveHandle, TroveEntry)> = parents
        .iter()
        .filter_map(|h| group.entry(h).map(|e| (h.clone(), e.clone())))
        .filter(|(h, e)| e.explicit && h.is_collection())
        .collect();
    let handles: Vec<TroveHandle> =
        explicit_collections.iter().map(|(h, _)| h.clone()).collect();
    cache.cache_troves(&handles)?;

    for (parent, entry) in explicit_collections {
        for child in cache.children_of(&parent, true, true) {
            let mut by_default = entry.by_default && child.by_default;
            if let Some(setting) =
                group.check_add_all_by_default(cache, AddAllParent::Trove(&parent), &child.handle)
            {
                // the addAll source's setting only rules when addAll is
                // why the parent is here at all; any other reason has
                // its own opinion and the source merely switches on
                if matches!(group.reason(&parent), Some(AddReason::AddAll { .. })) {
                    by_default = setting;
                } else {
                    by_default = by_default || setting;
                }
            }
            if let Some(suffix) = child.handle.component_suffix() {
                if group.components_to_remove().contains(suffix) {
                    by_default = false;
                }
                if !entry.components.is_empty() {
                    // naming a component switches it on, even when its
                    // own reference is off
                    by_default = if entry.components.iter().any(|c| c == suffix) {
                        entry.by_default
                    } else {
                        false
                    };
                }
            }
            group.add_trove(
                child.handle.clone(),
                false,
                by_default,
                &[],
                entry.child_default_sources.clone(),
                false,
                AddReason::Included {
                    parent: parent.clone(),
                },
            );
        }
    }
    Ok(())
}

/// Members of explicitly referenced sub-groups become implicit members
/// here, with defaults ANDed against the sub-group reference. Every
/// sub-group's own group references are recorded as weak references so
/// the finished trove knows the full set of groups beneath it.
fn propagate_subgroups(
    group: &mut SingleGroup,
    built: &IndexMap<String, SingleGroup>,
    cache: &mut TroveCache<'_>,
) -> Result<()> {
    let sub_refs: Vec<(String, crate::group::SubGroupRef)> = group
        .iter_new_groups()
        .map(|(n, r)| (n.to_string(), r.clone()))
        .collect();

    for (child_name, sub_ref) in sub_refs {
        let child_group = built
            .get(&child_name)
            .ok_or_else(|| Error::NoSuchGroup(child_name.clone()))?;
        if sub_ref.explicit {
            let members: Vec<(TroveHandle, bool)> = child_group
                .iter_trove_info()
                .map(|(h, e)| (h.clone(), e.by_default))
                .collect();
            for (handle, member_default) in members {
                let mut by_default = match group.check_add_all_by_default(
                    cache,
                    AddAllParent::Group(&child_name),
                    &handle,
                ) {
                    Some(setting) => setting,
                    None => sub_ref.by_default && member_default,
                };
                if by_default
                    && handle
                        .component_suffix()
                        .is_some_and(|s| group.components_to_remove().contains(s))
                {
                    by_default = false;
                }
                group.add_trove(
                    handle,
                    false,
                    by_default,
                    &[],
                    sub_ref.child_default_sources.clone(),
                    false,
                    AddReason::IncludedGroup {
                        group: child_name.clone(),
                    },
                );
            }
        }

        let nested: Vec<(String, bool)> = child_group
            .iter_new_groups()
            .map(|(n, r)| (n.to_string(), sub_ref.by_default && r.by_default))
            .collect();
        for (nested_name, by_default) in nested {
            group.add_new_group(&nested_name, Some(by_default), false, vec![])?;
        }
    }
    Ok(())
}

fn apply_differences(
    group: &mut SingleGroup,
    built: &IndexMap<String, SingleGroup>,
    resolved: &ResolvedTroves,
    cache: &mut TroveCache<'_>,
    removed: &mut Vec<TroveHandle>,
) -> Result<()> {
    for name in group.new_group_differences().to_vec() {
        let other = built
            .get(&name)
            .ok_or_else(|| Error::NoSuchGroup(name.clone()))?;
        for handle in other.iter_trove_list(true, true) {
            group.del_trove(&handle);
            removed.push(handle);
        }
    }

    for diff in group.difference_specs().to_vec() {
        for top in resolved.get_any(&diff.scope, &diff.spec).to_vec() {
            cache.cache_troves(std::slice::from_ref(&top))?;
            for child in cache.children_of(&top, true, true) {
                group.del_trove(&child.handle);
                removed.push(child.handle);
            }
            group.del_trove(&top);
            removed.push(top);
        }
    }
    Ok(())
}

/// After explicit removals, find the implicit members that should be
/// switched off too: a child goes only when every collection in the
/// group that references it has itself been removed. Removed
/// collections are walked breadth-first so the effect cascades.
fn find_all_weak_troves_to_remove(
    group: &SingleGroup,
    primary: &[TroveHandle],
    cache: &mut TroveCache<'_>,
) -> Result<Vec<TroveHandle>> {
    if primary.is_empty() {
        return Ok(Vec::new());
    }

    let collections: Vec<TroveHandle> = group
        .iter_trove_list(true, true)
        .into_iter()
        .chain(primary.iter().cloned())
        .filter(TroveHandle::is_collection)
        .collect();
    cache.cache_troves(&collections)?;

    // child -> collections in the group that reference it
    let mut parents: HashMap<TroveHandle, Vec<TroveHandle>> = HashMap::new();
    for handle in group.iter_trove_list(true, true) {
        if !handle.is_collection() {
            continue;
        }
        for child in cache.children_of(&handle, true, true) {
            if group.has_trove(&child.handle) {
                parents.entry(child.handle).or_default().push(handle.clone());
            }
        }
    }

    let mut gone: HashSet<TroveHandle> = primary.iter().cloned().collect();
    let mut queue: Vec<TroveHandle> = primary
        .iter()
        .filter(|h| h.is_collection())
        .cloned()
        .collect();
    let mut out = Vec::new();

    while let Some(collection) = queue.pop() {
        for child in cache.children_of(&collection, true, true) {
            if gone.contains(&child.handle) || !group.has_trove(&child.handle) {
                continue;
            }
            let still_referenced = parents
                .get(&child.handle)
                .is_some_and(|ps| ps.iter().any(|p| !gone.contains(p)));
            if still_referenced {
                continue;
            }
            gone.insert(child.handle.clone());
            out.push(child.handle.clone());
            if child.handle.is_collection() {
                queue.push(child.handle.clone());
            }
        }
    }
    Ok(out)
}

fn stage_component_moves(group: &mut SingleGroup, outcome: &mut ComposeOutcome) {
    for is_copy in [true, false] {
        let map = group.move_component_map(is_copy);
        if map.is_empty() {
            continue;
        }
        let members: Vec<(TroveHandle, bool)> = group
            .iter_trove_info()
            .map(|(h, e)| (h.clone(), e.by_default))
            .collect();
        for (handle, member_default) in members {
            let Some(suffix) = handle.component_suffix() else {
                continue;
            };
            let Some(destinations) = map.get(suffix) else {
                continue;
            };
            for (to_group, by_default) in destinations {
                outcome.staged.push(StagedComponent {
                    to_group: to_group.clone(),
                    handle: handle.clone(),
                    by_default: by_default.resolve(member_default),
                    from_group: group.name.clone(),
                });
            }
            if !is_copy {
                group.del_trove(&handle);
            }
        }
    }
}

/// A package whose components are all switched off has nothing to
/// install; switch the package itself off so it does not show up in
/// default-install walks.
fn demote_emptied_packages(group: &mut SingleGroup) {
    let packages: Vec<TroveHandle> = group
        .iter_trove_info()
        .filter(|(h, e)| !h.is_group() && h.is_collection() && e.by_default)
        .map(|(h, _)| h.clone())
        .collect();

    for package in packages {
        let components: Vec<TroveHandle> = group
            .iter_trove_list(true, true)
            .into_iter()
            .filter(|h| h.is_component() && h.package_handle() == package)
            .collect();
        if !components.is_empty()
            && components.iter().all(|c| !group.include_by_default(c))
        {
            group.set_trove_by_default(&package, false);
        }
    }
}

/// Components present without their containing package get the package
/// added: explicitly, defaulted on if any of its present components is,
/// with the package's other components brought in switched off.
pub fn add_packages_for_components(
    group: &mut SingleGroup,
    cache: &mut TroveCache<'_>,
) -> Result<()> {
    let mut packages: IndexMap<TroveHandle, Vec<(TroveHandle, bool)>> = IndexMap::new();
    for (handle, entry) in group.iter_trove_info() {
        // switched-off implicit components are leftovers of a removed or
        // replaced collection; they are no reason to pull a package in
        if handle.is_component() && (entry.explicit || entry.by_default) {
            packages
                .entry(handle.package_handle())
                .or_default()
                .push((handle.clone(), entry.by_default));
        }
    }
    packages.retain(|package, _| !group.has_trove(package));
    if packages.is_empty() {
        return Ok(());
    }

    let handles: Vec<TroveHandle> = packages.keys().cloned().collect();
    let exists = cache.has_troves(&handles)?;
    for ((package, components), exists) in packages.into_iter().zip(exists) {
        if !exists {
            debug!(%package, "package for stray components not in repository");
            continue;
        }
        cache.cache_troves(std::slice::from_ref(&package))?;

        let by_default = components.iter().any(|(_, d)| *d);
        let suffixes: Vec<String> = components
            .iter()
            .filter_map(|(h, _)| h.component_suffix().map(str::to_string))
            .collect();
        let present: HashSet<TroveHandle> =
            components.iter().map(|(h, _)| h.clone()).collect();

        group.add_trove(
            package.clone(),
            true,
            by_default,
            &suffixes,
            vec![],
            false,
            AddReason::Included {
                parent: components[0].0.clone(),
            },
        );
        for child in cache.children_of(&package, true, true) {
            if present.contains(&child.handle) {
                continue;
            }
            group.add_trove(
                child.handle,
                false,
                false,
                &[],
                vec![],
                false,
                AddReason::Included {
                    parent: package.clone(),
                },
            );
        }
    }
    Ok(())
}
