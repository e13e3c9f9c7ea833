// src/depsolve.rs

//! Dependency closure for composed groups.
//!
//! autoResolve pulls providers for unresolved requirements into the
//! group until the membership is closed; depCheck verifies closure and
//! reports what is missing. Both look only at trove-resolvable
//! dependency classes: ABI and rpmlib requirements describe the host and
//! are skipped.

use std::collections::{HashMap, HashSet};

use tracing::{debug, info};

use crate::cache::TroveCache;
use crate::deps::{Dependency, DependencyClass, DependencySet};
use crate::error::Result;
use crate::group::{AddReason, SingleGroup};
use crate::handle::TroveHandle;
use crate::source::ProviderSource;

/// Classes no group member can provide.
pub const HOST_DEP_CLASSES: [DependencyClass; 2] =
    [DependencyClass::Abi, DependencyClass::RpmLib];

/// A provider source that prefers an explicit list of resolve troves
/// over the repository at large. Dependencies none of the resolve
/// troves provide fall through to the wrapped source.
pub struct ResolveScope<'a> {
    preferred: Vec<(TroveHandle, DependencySet)>,
    fallback: &'a dyn ProviderSource,
}

impl<'a> ResolveScope<'a> {
    pub fn new(
        preferred: Vec<(TroveHandle, DependencySet)>,
        fallback: &'a dyn ProviderSource,
    ) -> Self {
        Self {
            preferred,
            fallback,
        }
    }
}

impl ProviderSource for ResolveScope<'_> {
    fn resolve_dependencies(&self, deps: &[Dependency]) -> Result<Vec<Vec<TroveHandle>>> {
        let fallback = self.fallback.resolve_dependencies(deps)?;
        Ok(deps
            .iter()
            .zip(fallback)
            .map(|(dep, from_repo)| {
                let preferred: Vec<TroveHandle> = self
                    .preferred
                    .iter()
                    .filter(|(_, provides)| provides.contains(dep))
                    .map(|(handle, _)| handle.clone())
                    .collect();
                if preferred.is_empty() {
                    from_repo
                } else {
                    preferred
                }
            })
            .collect())
    }
}

/// One member's unmet requirements, for depCheck reporting.
pub type DependencyFailure = (TroveHandle, DependencySet);

fn member_set(group: &SingleGroup, by_default_only: bool) -> Vec<TroveHandle> {
    if by_default_only {
        group.iter_default_troves()
    } else {
        group.iter_trove_list(true, true)
    }
}

/// Pull providers into `group` until its requirements are closed.
///
/// Runs over the byDefault members first; when the group checks all
/// members, a second pass covers the rest, added switched off. Troves
/// added by the first pass never get re-added by the second, and
/// providers that are redirects are skipped.
pub fn resolve_group_dependencies(
    group: &mut SingleGroup,
    cache: &mut TroveCache<'_>,
    provider: &dyn ProviderSource,
) -> Result<()> {
    info!(group = %group.name, "resolving group dependencies");
    let passes: &[bool] = if group.check_only_by_default_deps {
        &[true]
    } else {
        &[true, false]
    };

    for &by_default_pass in passes {
        loop {
            let members = member_set(group, by_default_pass);
            cache.cache_troves(&members)?;

            let mut provides = DependencySet::new();
            let mut requires: Vec<(Dependency, TroveHandle)> = Vec::new();
            let mut seen = HashSet::new();
            for member in &members {
                let meta = cache.get(member)?;
                provides.union_with(&meta.provides);
                for dep in meta.requires.iter() {
                    if HOST_DEP_CLASSES.contains(&dep.class) {
                        continue;
                    }
                    if seen.insert(dep.clone()) {
                        requires.push((dep.clone(), member.clone()));
                    }
                }
            }

            let unmet: Vec<(Dependency, TroveHandle)> = requires
                .into_iter()
                .filter(|(dep, _)| !provides.contains(dep))
                .collect();
            if unmet.is_empty() {
                break;
            }

            let deps: Vec<Dependency> = unmet.iter().map(|(d, _)| d.clone()).collect();
            let providers = provider.resolve_dependencies(&deps)?;

            let mut progressed = false;
            for ((dep, requiring), candidates) in unmet.into_iter().zip(providers) {
                cache.cache_troves(&candidates)?;
                let chosen = candidates
                    .into_iter()
                    .find(|c| !cache.is_redirect(c) && !group.has_trove(c));
                let Some(chosen) = chosen else {
                    debug!(%dep, "no usable provider");
                    continue;
                };
                debug!(%dep, provider = %chosen, "adding dependency provider");
                group.add_trove(
                    chosen.clone(),
                    true,
                    by_default_pass,
                    &[],
                    vec![],
                    false,
                    AddReason::Dep {
                        requiring,
                        providing: chosen,
                    },
                );
                progressed = true;
            }
            if !progressed {
                break;
            }
        }
    }
    Ok(())
}

/// Verify the group's requirements are closed over its own provides.
/// Returns one entry per member with unmet requirements; empty means the
/// check passed.
pub fn check_group_dependencies(
    group: &SingleGroup,
    cache: &mut TroveCache<'_>,
) -> Result<Vec<DependencyFailure>> {
    info!(group = %group.name, "checking group dependency closure");
    let members = member_set(group, group.check_only_by_default_deps);
    cache.cache_troves(&members)?;

    let mut provides = DependencySet::new();
    for member in &members {
        provides.union_with(&cache.get(member)?.provides);
    }

    let mut failures: HashMap<TroveHandle, DependencySet> = HashMap::new();
    for member in &members {
        let unmet = cache
            .get(member)?
            .requires
            .unsatisfied_by(&provides, &HOST_DEP_CLASSES);
        if !unmet.is_empty() {
            failures.insert(member.clone(), unmet);
        }
    }

    let mut out: Vec<DependencyFailure> = failures.into_iter().collect();
    out.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flavor::Flavor;
    use crate::group::GroupOptions;
    use crate::label::Label;
    use crate::source::{MemorySource, TroveMetadata};
    use crate::version::{Revision, Version};

    fn handle(name: &str) -> TroveHandle {
        TroveHandle::new(
            name,
            Version::new(Label::new("repo", "ns", "1"), Revision::parse("1.0-1").unwrap()),
            Flavor::empty(),
        )
    }

    fn meta(provides: &[Dependency], requires: &[Dependency]) -> TroveMetadata {
        TroveMetadata {
            provides: provides.iter().cloned().collect(),
            requires: requires.iter().cloned().collect(),
            ..Default::default()
        }
    }

    #[test]
    fn resolution_closes_transitively() {
        // app -> libfoo -> libbar
        let mut source = MemorySource::new();
        source.insert(
            handle("app"),
            meta(&[], &[Dependency::soname("libfoo.so.1")]),
        );
        source.insert(
            handle("libfoo"),
            meta(
                &[Dependency::soname("libfoo.so.1")],
                &[Dependency::soname("libbar.so.1")],
            ),
        );
        source.insert(
            handle("libbar"),
            meta(&[Dependency::soname("libbar.so.1")], &[]),
        );

        let mut cache = TroveCache::new(&source);
        let mut group = SingleGroup::new("group-os", GroupOptions::default()).unwrap();
        group.add_trove(handle("app"), true, true, &[], vec![], false, AddReason::Added);

        resolve_group_dependencies(&mut group, &mut cache, &source).unwrap();

        assert!(group.has_trove(&handle("libfoo")));
        assert!(group.has_trove(&handle("libbar")));
        assert!(group.include_by_default(&handle("libfoo")));
        assert!(matches!(
            group.reason(&handle("libfoo")),
            Some(AddReason::Dep { requiring, .. }) if *requiring == handle("app")
        ));
        assert!(check_group_dependencies(&group, &mut cache).unwrap().is_empty());
    }

    #[test]
    fn redirect_providers_are_skipped() {
        let mut source = MemorySource::new();
        source.insert(
            handle("app"),
            meta(&[], &[Dependency::soname("libfoo.so.1")]),
        );
        let mut redirect = meta(&[Dependency::soname("libfoo.so.1")], &[]);
        redirect.is_redirect = true;
        source.insert(handle("libfoo-old"), redirect);
        source.insert(
            handle("libfoo"),
            meta(&[Dependency::soname("libfoo.so.1")], &[]),
        );

        let mut cache = TroveCache::new(&source);
        let mut group = SingleGroup::new("group-os", GroupOptions::default()).unwrap();
        group.add_trove(handle("app"), true, true, &[], vec![], false, AddReason::Added);

        resolve_group_dependencies(&mut group, &mut cache, &source).unwrap();
        assert!(!group.has_trove(&handle("libfoo-old")));
        assert!(group.has_trove(&handle("libfoo")));
    }

    #[test]
    fn check_reports_unmet_requirements() {
        let mut source = MemorySource::new();
        source.insert(
            handle("app"),
            meta(
                &[],
                &[
                    Dependency::soname("libgone.so.1"),
                    Dependency::new(DependencyClass::Abi, "x86_64"),
                ],
            ),
        );

        let mut cache = TroveCache::new(&source);
        let mut group = SingleGroup::new("group-os", GroupOptions::default()).unwrap();
        group.add_trove(handle("app"), true, true, &[], vec![], false, AddReason::Added);

        let failures = check_group_dependencies(&group, &mut cache).unwrap();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0, handle("app"));
        assert_eq!(failures[0].1.len(), 1, "ABI class is not checked");
    }

    #[test]
    fn resolve_scope_prefers_listed_troves() {
        let mut source = MemorySource::new();
        source.insert(
            handle("lib-from-repo"),
            meta(&[Dependency::soname("libx.so.1")], &[]),
        );

        let preferred = vec![(
            handle("lib-pinned"),
            [Dependency::soname("libx.so.1")]
                .into_iter()
                .collect::<DependencySet>(),
        )];
        let scope = ResolveScope::new(preferred, &source);
        let providers = scope
            .resolve_dependencies(&[
                Dependency::soname("libx.so.1"),
                Dependency::soname("liby.so.1"),
            ])
            .unwrap();
        assert_eq!(providers[0], vec![handle("lib-pinned")]);
        assert!(providers[1].is_empty(), "unmatched deps fall through");
    }

    #[test]
    fn second_pass_adds_switched_off_providers() {
        let mut source = MemorySource::new();
        source.insert(
            handle("app"),
            meta(&[], &[Dependency::soname("liboff.so.1")]),
        );
        source.insert(
            handle("liboff"),
            meta(&[Dependency::soname("liboff.so.1")], &[]),
        );

        let mut cache = TroveCache::new(&source);
        let options = GroupOptions {
            check_only_by_default_deps: false,
            ..GroupOptions::default()
        };
        let mut group = SingleGroup::new("group-os", options).unwrap();
        // app present but switched off: only the second pass sees it
        group.add_trove(handle("app"), true, false, &[], vec![], false, AddReason::Added);

        resolve_group_dependencies(&mut group, &mut cache, &source).unwrap();
        assert!(group.has_trove(&handle("liboff")));
        assert!(!group.include_by_default(&handle("liboff")));
    }
}
