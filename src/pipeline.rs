// src/pipeline.rs

//! The build driver: a [`GroupSet`] records directives for a family of
//! groups, then [`GroupSet::build_groups`] runs the whole composition
//! against a repository.
//!
//! The pass structure: resolve every directive spec in bulk, prime the
//! trove cache, expand addAll directives (which may create groups),
//! order the groups, then compose each in order. After a group is
//! composed it is dependency-resolved and -checked as configured,
//! packages are added for stray components, redirects are validated,
//! and its size and path conflicts are computed.

use std::collections::HashSet;

use indexmap::IndexMap;
use tracing::info;

use crate::addall::process_add_all;
use crate::cache::TroveCache;
use crate::compose::{
    add_packages_for_components, add_troves_to_group, ResolvedTroves, StagedComponent,
};
use crate::conflict::{calc_size_and_check_hashes, PathConflict};
use crate::depsolve::{check_group_dependencies, resolve_group_dependencies, ResolveScope};
use crate::diag::{Diagnostics, Warning};
use crate::deps::DependencySet;
use crate::error::{Error, Result};
use crate::flavor::Flavor;
use crate::graph::sort_groups;
use crate::handle::TroveHandle;
use crate::group::{AddReason, GroupOptions, ReplaceSpec, SingleGroup};
use crate::label::LabelPath;
use crate::redirect::check_for_redirects;
use crate::source::{ProviderSource, SearchSource, SourceStack, TroveSource, TroveSpec};

/// Everything `build_groups` needs from a repository client.
pub trait Repository: SearchSource + TroveSource + ProviderSource {}

impl<T: SearchSource + TroveSource + ProviderSource + ?Sized> Repository for T {}

/// What a finished build hands back: the composed groups stay in the
/// [`GroupSet`]; conflicts and warnings are reported here.
#[derive(Debug)]
pub struct BuildResult {
    /// Group build order actually used.
    pub order: Vec<String>,
    /// Path conflicts per group, for groups that asked for the check.
    pub conflicts: IndexMap<String, Vec<PathConflict>>,
    pub diagnostics: Diagnostics,
}

/// A family of groups being built together, sharing a search
/// configuration.
pub struct GroupSet {
    groups: IndexMap<String, SingleGroup>,
    default_group: String,
    label_path: LabelPath,
    search_flavor: Flavor,
    global_replaces: Vec<ReplaceSpec>,
    resolve_specs: Vec<TroveSpec>,
    scopes: IndexMap<String, Box<dyn SearchSource>>,
}

impl GroupSet {
    /// Create a set with its default group.
    pub fn new(default_group: &str, options: GroupOptions) -> Result<Self> {
        let mut groups = IndexMap::new();
        groups.insert(
            default_group.to_string(),
            SingleGroup::new(default_group, options)?,
        );
        Ok(Self {
            groups,
            default_group: default_group.to_string(),
            label_path: LabelPath::new(),
            search_flavor: Flavor::empty(),
            global_replaces: Vec::new(),
            resolve_specs: Vec::new(),
            scopes: IndexMap::new(),
        })
    }

    pub fn set_label_path(&mut self, label_path: LabelPath) {
        self.label_path = label_path;
    }

    pub fn set_search_flavor(&mut self, flavor: Flavor) {
        self.search_flavor = flavor;
    }

    pub fn create_group(&mut self, name: &str, options: GroupOptions) -> Result<()> {
        if self.groups.contains_key(name) {
            return Err(Error::GroupExists(name.to_string()));
        }
        self.groups
            .insert(name.to_string(), SingleGroup::new(name, options)?);
        Ok(())
    }

    pub fn default_group_name(&self) -> &str {
        &self.default_group
    }

    pub fn set_default_group(&mut self, name: &str) -> Result<()> {
        if !self.groups.contains_key(name) {
            return Err(Error::NoSuchGroup(name.to_string()));
        }
        self.default_group = name.to_string();
        Ok(())
    }

    pub fn group(&self, name: &str) -> Result<&SingleGroup> {
        self.groups
            .get(name)
            .ok_or_else(|| Error::NoSuchGroup(name.to_string()))
    }

    pub fn group_mut(&mut self, name: &str) -> Result<&mut SingleGroup> {
        self.groups
            .get_mut(name)
            .ok_or_else(|| Error::NoSuchGroup(name.to_string()))
    }

    pub fn default_group_mut(&mut self) -> &mut SingleGroup {
        // the default group always exists
        &mut self.groups[&self.default_group]
    }

    pub fn iter_groups(&self) -> impl Iterator<Item = (&str, &SingleGroup)> {
        self.groups.iter().map(|(n, g)| (n.as_str(), g))
    }

    /// Reference `child` as a member of `parent`. Both groups must
    /// already exist.
    pub fn add_member_group(
        &mut self,
        parent: &str,
        child: &str,
        by_default: Option<bool>,
        explicit: bool,
    ) -> Result<()> {
        if !self.groups.contains_key(child) {
            return Err(Error::NoSuchGroup(child.to_string()));
        }
        self.group_mut(parent)?
            .add_new_group(child, by_default, explicit, vec![])
    }

    /// Record a replace applied to every group in the set.
    pub fn add_global_replace(&mut self, spec: TroveSpec, require_latest: bool) {
        self.global_replaces.push(ReplaceSpec {
            spec,
            scope: None,
            require_latest,
            allow_missing: true,
            allow_no_match: false,
            is_global: true,
        });
    }

    /// Record a trove whose provides take priority during autoResolve.
    pub fn add_resolve_spec(&mut self, spec: TroveSpec) {
        self.resolve_specs.push(spec);
    }

    /// Register a named search scope directives can refer to. Scoped
    /// lookups search the scope first and fall back to the repository.
    pub fn register_scope(&mut self, name: &str, source: Box<dyn SearchSource>) {
        self.scopes.insert(name.to_string(), source);
    }

    /// Run the whole composition. Groups must not be composed twice;
    /// directives recorded after this call are not honored.
    pub fn build_groups<R: Repository>(&mut self, repos: &R) -> Result<BuildResult> {
        let mut diags = Diagnostics::new();
        let mut cache = TroveCache::new(repos);

        let resolved = self.resolve_all_specs(repos)?;
        cache.cache_troves(&resolved.all_handles())?;

        // addAll first: it can create groups, which must exist before
        // ordering and must receive global replaces too
        let names: Vec<String> = self.groups.keys().cloned().collect();
        for name in names {
            for spec in self.groups[&name].add_all_specs().to_vec() {
                let tops = resolved
                    .get(&spec.scope, spec.require_latest, &spec.spec)
                    .to_vec();
                process_add_all(
                    &mut self.groups,
                    &name,
                    &spec,
                    &tops,
                    &mut cache,
                    repos,
                    &mut diags,
                )?;
            }
        }

        for group in self.groups.values_mut() {
            for replace in &self.global_replaces {
                group.replace_spec(replace.clone());
            }
        }

        let order = sort_groups(&self.groups)?;
        info!(groups = order.len(), "building groups");

        let resolve_troves = self.resolve_trove_provides(&resolved, &mut cache)?;
        let mut matched_global: HashSet<TroveSpec> = HashSet::new();
        let mut staged: Vec<StagedComponent> = Vec::new();
        let mut conflicts = IndexMap::new();

        for name in &order {
            let mut group = self
                .groups
                .shift_remove(name)
                .ok_or_else(|| Error::NoSuchGroup(name.clone()))?;

            let (incoming, rest): (Vec<StagedComponent>, Vec<StagedComponent>) =
                staged.into_iter().partition(|s| &s.to_group == name);
            staged = rest;
            for component in incoming {
                group.add_trove(
                    component.handle.clone(),
                    true,
                    component.by_default,
                    &[],
                    vec![],
                    false,
                    AddReason::Copied {
                        from_group: component.from_group,
                    },
                );
                group.add_copied_from(component.handle);
            }

            let outcome = add_troves_to_group(
                &mut group,
                &self.groups,
                &resolved,
                &mut cache,
                repos,
                &mut diags,
            )?;
            matched_global.extend(outcome.matched_global);
            staged.extend(outcome.staged);
            group.set_build_refs(directive_refs(&group, &resolved));

            if group.is_empty() {
                return Err(Error::EmptyGroup(name.clone()));
            }

            if group.auto_resolve {
                let scope = ResolveScope::new(resolve_troves.clone(), repos);
                resolve_group_dependencies(&mut group, &mut cache, &scope)?;
            }
            if group.dep_check {
                let failures = check_group_dependencies(&group, &mut cache)?;
                if !failures.is_empty() {
                    return Err(Error::GroupDependencyFailure {
                        group: name.clone(),
                        failures,
                    });
                }
            }

            add_packages_for_components(&mut group, &mut cache)?;
            check_for_redirects(&mut cache, repos, &mut group)?;
            let group_conflicts = calc_size_and_check_hashes(&mut group, &mut cache)?;
            if !group_conflicts.is_empty() {
                conflicts.insert(name.clone(), group_conflicts);
            }

            self.groups.insert(name.clone(), group);
        }

        let unmatched: Vec<TroveSpec> = self
            .global_replaces
            .iter()
            .filter(|r| !matched_global.contains(&r.spec))
            .map(|r| r.spec.clone())
            .collect();
        if !unmatched.is_empty() {
            diags.push(Warning::UnmatchedGlobalReplaces { specs: unmatched });
        }

        Ok(BuildResult {
            order,
            conflicts,
            diagnostics: diags,
        })
    }

    /// Resolve every directive spec in bulk, bucketed by scope and
    /// flags, applying the set's label path and search flavor to specs
    /// that do not pin their own.
    fn resolve_all_specs<R: Repository>(&self, repos: &R) -> Result<ResolvedTroves> {
        type Bucket = (Option<String>, bool, bool);
        let mut buckets: IndexMap<Bucket, Vec<TroveSpec>> = IndexMap::new();
        let mut push = |scope: &Option<String>, latest: bool, missing: bool, spec: &TroveSpec| {
            let bucket = buckets.entry((scope.clone(), latest, missing)).or_default();
            if !bucket.contains(spec) {
                bucket.push(spec.clone());
            }
        };

        for group in self.groups.values() {
            for add in group.add_specs() {
                push(&add.scope, add.require_latest, add.allow_missing, &add.spec);
            }
            for replace in group.replace_specs() {
                push(
                    &replace.scope,
                    replace.require_latest,
                    replace.allow_missing,
                    &replace.spec,
                );
            }
            for add_all in group.add_all_specs() {
                push(
                    &add_all.scope,
                    add_all.require_latest,
                    add_all.allow_missing,
                    &add_all.spec,
                );
            }
            for diff in group.difference_specs() {
                push(&diff.scope, false, false, &diff.spec);
            }
        }
        for replace in &self.global_replaces {
            push(
                &replace.scope,
                replace.require_latest,
                replace.allow_missing,
                &replace.spec,
            );
        }
        for spec in &self.resolve_specs {
            push(&None, false, false, spec);
        }

        let mut resolved = ResolvedTroves::new();
        for ((scope, require_latest, allow_missing), specs) in buckets {
            let scoped_stack;
            let source: &dyn SearchSource = match &scope {
                Some(name) => {
                    let layer = self
                        .scopes
                        .get(name)
                        .ok_or_else(|| Error::NoSuchScope(name.clone()))?;
                    scoped_stack = SourceStack::new(vec![layer.as_ref(), repos]);
                    &scoped_stack
                }
                None => repos,
            };
            let found = source.find_troves(&specs, require_latest, allow_missing)?;
            for (spec, handles) in found {
                let narrowed = self.narrow(&spec, handles);
                if narrowed.is_empty() && !allow_missing {
                    return Err(Error::TroveNotFound(spec.to_string()));
                }
                resolved.insert(scope.clone(), require_latest, spec, narrowed);
            }
        }
        Ok(resolved)
    }

    /// Apply the set's search defaults to a spec's matches: filter by
    /// search flavor when the spec has none (keeping only the
    /// best-scoring flavors among the satisfying ones), and keep only
    /// the first label on the label path with any match when the spec
    /// pins no version.
    fn narrow(&self, spec: &TroveSpec, mut handles: Vec<TroveHandle>) -> Vec<TroveHandle> {
        if spec.flavor.is_none() && !self.search_flavor.is_empty() {
            handles.retain(|h| h.flavor.satisfies(&self.search_flavor));
            if let Some(best) = handles
                .iter()
                .map(|h| h.flavor.score(&self.search_flavor))
                .max()
            {
                handles.retain(|h| h.flavor.score(&self.search_flavor) == best);
            }
        }
        if spec.version.is_none() && !self.label_path.is_empty() {
            for label in self.label_path.labels() {
                let hits: Vec<_> = handles
                    .iter()
                    .filter(|h| &h.version.label == label)
                    .cloned()
                    .collect();
                if !hits.is_empty() {
                    return hits;
                }
            }
            return Vec::new();
        }
        handles
    }

    /// Provides of the resolve troves, for preferred dependency
    /// resolution.
    fn resolve_trove_provides(
        &self,
        resolved: &ResolvedTroves,
        cache: &mut TroveCache<'_>,
    ) -> Result<Vec<(TroveHandle, DependencySet)>> {
        let mut out = Vec::new();
        for spec in &self.resolve_specs {
            for handle in resolved.get(&None, false, spec) {
                let meta = cache.get(handle)?;
                out.push((handle.clone(), meta.provides.clone()));
            }
        }
        Ok(out)
    }
}

/// Every repository trove the group's own directives resolved to, for
/// provenance tracking on the finished group.
fn directive_refs(group: &SingleGroup, resolved: &ResolvedTroves) -> Vec<TroveHandle> {
    let mut refs: Vec<TroveHandle> = Vec::new();
    for add in group.add_specs() {
        refs.extend_from_slice(resolved.get(&add.scope, add.require_latest, &add.spec));
    }
    for replace in group.replace_specs() {
        refs.extend_from_slice(resolved.get(
            &replace.scope,
            replace.require_latest,
            &replace.spec,
        ));
    }
    for add_all in group.add_all_specs() {
        refs.extend_from_slice(resolved.get(
            &add_all.scope,
            add_all.require_latest,
            &add_all.spec,
        ));
    }
    for diff in group.difference_specs() {
        refs.extend_from_slice(resolved.get_any(&diff.scope, &diff.spec));
    }
    refs.sort();
    refs.dedup();
    refs
}
