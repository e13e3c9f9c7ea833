// src/redirect.rs

//! Redirect troves point at their replacements instead of carrying
//! content. Anywhere a directive resolves to a redirect, the engine
//! follows it to the real troves before adding anything; a finished
//! group may only keep a redirect when its targets are members too.

use std::collections::HashSet;

use tracing::debug;

use crate::cache::TroveCache;
use crate::error::{Error, Result};
use crate::group::SingleGroup;
use crate::handle::TroveHandle;
use crate::source::{SearchSource, TroveSpec};

/// Resolve `handle` through any chain of redirects to the concrete
/// troves it stands for. Non-redirects resolve to themselves; a redirect
/// with no targets resolves to nothing (the trove was withdrawn).
pub fn follow_redirect(
    cache: &mut TroveCache<'_>,
    search: &dyn SearchSource,
    handle: &TroveHandle,
) -> Result<Vec<TroveHandle>> {
    let mut out = Vec::new();
    let mut seen = HashSet::new();
    let mut work = vec![handle.clone()];

    while let Some(current) = work.pop() {
        let meta = cache.get(&current)?;
        if !meta.is_redirect {
            // a target reached along several chains is added once
            if !out.contains(&current) {
                out.push(current);
            }
            continue;
        }
        if !seen.insert(current.clone()) {
            return Err(Error::RedirectLoop(handle.clone()));
        }
        if meta.redirect_targets.is_empty() {
            debug!(%current, "redirect to nothing, trove withdrawn");
            continue;
        }
        // a target spec naming the redirect's own name and label with no
        // flavor would only find this redirect again; widen it to the
        // branch head to reach the real target
        let label = current.version.label.to_string();
        let (wide, narrow): (Vec<TroveSpec>, Vec<TroveSpec>) = meta
            .redirect_targets
            .clone()
            .into_iter()
            .partition(|spec| {
                spec.name == current.name
                    && spec.flavor.is_none()
                    && spec.version.as_deref() == Some(label.as_str())
            });
        let mut found = search.find_troves(&narrow, false, true)?;
        if !wide.is_empty() {
            for (spec, matches) in search.find_troves(&wide, true, true)? {
                found.insert(
                    spec,
                    matches.into_iter().filter(|t| *t != current).collect(),
                );
            }
        }
        for matches in found.into_values() {
            if matches.is_empty() {
                return Err(Error::RedirectTargetNotFound(current.clone()));
            }
            for target in matches {
                if target == *handle {
                    return Err(Error::RedirectLoop(handle.clone()));
                }
                work.push(target);
            }
        }
    }
    out.sort();
    Ok(out)
}

/// Strong-referenced redirects left in a finished group must have their
/// targets as members. Satisfied redirects are dropped from the group;
/// unsatisfied ones are fatal, listing every missing target. Weak
/// references inherited from collections are left alone.
pub fn check_for_redirects(
    cache: &mut TroveCache<'_>,
    search: &dyn SearchSource,
    group: &mut SingleGroup,
) -> Result<()> {
    let redirects: Vec<TroveHandle> = group
        .iter_trove_list(true, false)
        .into_iter()
        .filter(|h| cache.is_redirect(h))
        .collect();

    let mut missing = Vec::new();
    for redirect in redirects {
        let targets = follow_redirect(cache, search, &redirect)?;
        let absent: Vec<TroveHandle> = targets
            .iter()
            .filter(|t| !group.has_trove(t))
            .cloned()
            .collect();
        if absent.is_empty() {
            group.del_trove(&redirect);
        } else {
            missing.push((redirect, absent));
        }
    }

    if missing.is_empty() {
        Ok(())
    } else {
        Err(Error::RedirectMissingTargets {
            group: group.name.clone(),
            missing,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flavor::Flavor;
    use crate::group::{AddReason, GroupOptions};
    use crate::label::Label;
    use crate::source::{MemorySource, TroveMetadata};
    use crate::version::{Revision, Version};

    fn handle(name: &str, rev: &str) -> TroveHandle {
        TroveHandle::new(
            name,
            Version::new(Label::new("repo", "ns", "1"), Revision::parse(rev).unwrap()),
            Flavor::empty(),
        )
    }

    fn redirect_to(names: &[&str]) -> TroveMetadata {
        TroveMetadata {
            is_redirect: true,
            redirect_targets: names.iter().map(|n| TroveSpec::new(*n)).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn chain_resolves_to_leaf() {
        let mut source = MemorySource::new();
        source.insert(handle("old", "1.0-1"), redirect_to(&["mid"]));
        source.insert(handle("mid", "1.0-1"), redirect_to(&["new"]));
        source.insert(handle("new", "2.0-1"), TroveMetadata::default());

        let mut cache = TroveCache::new(&source);
        let resolved = follow_redirect(&mut cache, &source, &handle("old", "1.0-1")).unwrap();
        assert_eq!(resolved, vec![handle("new", "2.0-1")]);
    }

    #[test]
    fn self_redirect_is_a_loop() {
        let mut source = MemorySource::new();
        source.insert(handle("old", "1.0-1"), redirect_to(&["old"]));

        let mut cache = TroveCache::new(&source);
        assert!(matches!(
            follow_redirect(&mut cache, &source, &handle("old", "1.0-1")),
            Err(Error::RedirectLoop(_))
        ));
    }

    #[test]
    fn missing_target_is_fatal() {
        let mut source = MemorySource::new();
        source.insert(handle("old", "1.0-1"), redirect_to(&["gone"]));

        let mut cache = TroveCache::new(&source);
        assert!(matches!(
            follow_redirect(&mut cache, &source, &handle("old", "1.0-1")),
            Err(Error::RedirectTargetNotFound(_))
        ));
    }

    #[test]
    fn diamond_of_redirects_is_not_a_loop() {
        // old fans out to two redirects that both land on the same target
        let mut source = MemorySource::new();
        source.insert(handle("old", "1.0-1"), redirect_to(&["mid-a", "mid-b"]));
        source.insert(handle("mid-a", "1.0-1"), redirect_to(&["new"]));
        source.insert(handle("mid-b", "1.0-1"), redirect_to(&["new"]));
        source.insert(handle("new", "2.0-1"), TroveMetadata::default());

        let mut cache = TroveCache::new(&source);
        let resolved = follow_redirect(&mut cache, &source, &handle("old", "1.0-1")).unwrap();
        assert_eq!(
            resolved,
            vec![handle("new", "2.0-1")],
            "a target reached twice resolves once"
        );
    }

    #[test]
    fn same_label_target_widens_to_branch_head() {
        // a redirect whose target spec is its own name and label must not
        // resolve back into itself
        let mut source = MemorySource::new();
        source.insert(
            handle("foo", "1.0-1"),
            TroveMetadata {
                is_redirect: true,
                redirect_targets: vec![TroveSpec::with_version("foo", "repo@ns:1")],
                ..Default::default()
            },
        );
        source.insert(handle("foo", "2.0-1"), TroveMetadata::default());

        let mut cache = TroveCache::new(&source);
        let resolved = follow_redirect(&mut cache, &source, &handle("foo", "1.0-1")).unwrap();
        assert_eq!(resolved, vec![handle("foo", "2.0-1")]);
    }

    #[test]
    fn withdrawn_redirect_resolves_to_nothing() {
        let mut source = MemorySource::new();
        source.insert(handle("old", "1.0-1"), redirect_to(&[]));

        let mut cache = TroveCache::new(&source);
        let resolved = follow_redirect(&mut cache, &source, &handle("old", "1.0-1")).unwrap();
        assert!(resolved.is_empty());
    }

    fn group_with(members: &[(&TroveHandle, bool)]) -> SingleGroup {
        // (handle, explicit); everything byDefault on
        let mut group = SingleGroup::new("group-test", GroupOptions::default()).unwrap();
        for (handle, explicit) in members {
            group.add_trove(
                (*handle).clone(),
                *explicit,
                true,
                &[],
                vec![],
                false,
                AddReason::Added,
            );
        }
        group
    }

    #[test]
    fn explicit_redirect_without_target_member_is_fatal() {
        let mut source = MemorySource::new();
        source.insert(handle("old", "1.0-1"), redirect_to(&["new"]));
        source.insert(handle("new", "2.0-1"), TroveMetadata::default());

        let mut cache = TroveCache::new(&source);
        let mut group = group_with(&[(&handle("old", "1.0-1"), true)]);
        match check_for_redirects(&mut cache, &source, &mut group) {
            Err(Error::RedirectMissingTargets { group, missing }) => {
                assert_eq!(group, "group-test");
                assert_eq!(
                    missing,
                    vec![(handle("old", "1.0-1"), vec![handle("new", "2.0-1")])]
                );
            }
            other => panic!("expected missing targets, got {other:?}"),
        }
    }

    #[test]
    fn explicit_redirect_with_target_member_is_dropped() {
        let mut source = MemorySource::new();
        source.insert(handle("old", "1.0-1"), redirect_to(&["new"]));
        source.insert(handle("new", "2.0-1"), TroveMetadata::default());

        let mut cache = TroveCache::new(&source);
        let mut group = group_with(&[
            (&handle("old", "1.0-1"), true),
            (&handle("new", "2.0-1"), true),
        ]);
        check_for_redirects(&mut cache, &source, &mut group).unwrap();
        assert!(!group.has_trove(&handle("old", "1.0-1")));
        assert!(group.has_trove(&handle("new", "2.0-1")));
    }

    #[test]
    fn inherited_redirect_is_left_alone() {
        // only explicit members are checked; a redirect picked up from a
        // collection stays in the group untouched
        let mut source = MemorySource::new();
        source.insert(handle("old", "1.0-1"), redirect_to(&["gone"]));
        source.insert(handle("pkg", "1.0-1"), TroveMetadata::default());

        let mut cache = TroveCache::new(&source);
        let mut group = group_with(&[
            (&handle("old", "1.0-1"), false),
            (&handle("pkg", "1.0-1"), true),
        ]);
        check_for_redirects(&mut cache, &source, &mut group).unwrap();
        assert!(group.has_trove(&handle("old", "1.0-1")));
    }
}
