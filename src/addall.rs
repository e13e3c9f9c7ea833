// src/addall.rs

//! addAll: clone the membership of an existing group trove into a group
//! being built.
//!
//! With recursion the nested group structure is recreated: every
//! sub-group of the source gets a same-named group here, inheriting the
//! target group's policy settings. Two distinct versions of one
//! sub-group name cannot both be recreated, so that is fatal. Flatten
//! mode descends the same way but pours every leaf into the one target
//! group; no-recurse mode adds the direct children as they are,
//! sub-group troves included.
//!
//! Each added member records the source trove it came from, so later
//! default propagation can consult the source's own byDefault settings
//! instead of the usual AND rule.

use indexmap::IndexMap;
use tracing::debug;

use crate::cache::TroveCache;
use crate::diag::{Diagnostics, Warning};
use crate::error::{Error, Result};
use crate::group::{AddAllMode, AddAllSpec, AddReason, GroupOptions, SingleGroup};
use crate::handle::TroveHandle;
use crate::redirect::follow_redirect;
use crate::source::SearchSource;

/// Expand one addAll directive on `target`, creating sub-groups in
/// `groups` as needed. `tops` are the handles the directive's spec
/// resolved to; an empty list is a warning, not an error.
pub fn process_add_all(
    groups: &mut IndexMap<String, SingleGroup>,
    target: &str,
    spec: &AddAllSpec,
    tops: &[TroveHandle],
    cache: &mut TroveCache<'_>,
    search: &dyn SearchSource,
    diags: &mut Diagnostics,
) -> Result<()> {
    if tops.is_empty() {
        diags.push(Warning::SkippedAddAll {
            group: target.to_string(),
            spec: spec.spec.clone(),
        });
        return Ok(());
    }

    for top in tops {
        for source in follow_redirect(cache, search, top)? {
            expand_source(groups, target, spec, &source, cache)?;
        }
    }
    Ok(())
}

fn expand_source(
    groups: &mut IndexMap<String, SingleGroup>,
    target: &str,
    spec: &AddAllSpec,
    source: &TroveHandle,
    cache: &mut TroveCache<'_>,
) -> Result<()> {
    if source.name == target {
        return Err(Error::GroupAddedToItself {
            group: target.to_string(),
        });
    }
    debug!(%source, target, "expanding addAll");

    // sub-group name -> the version being recreated under that name
    let mut created: IndexMap<String, TroveHandle> = IndexMap::new();
    let mut work: Vec<(TroveHandle, String)> = vec![(source.clone(), target.to_string())];

    while let Some((coll, into)) = work.pop() {
        cache.cache_troves(std::slice::from_ref(&coll))?;
        for child in cache.children_of(&coll, true, false) {
            if child.handle.is_group() {
                match spec.mode {
                    AddAllMode::Recurse => {
                        let child_name = child.handle.name.clone();
                        match created.get(&child_name) {
                            Some(existing) if *existing != child.handle => {
                                return Err(Error::GroupAddAll {
                                    group: target.to_string(),
                                    from: source.clone(),
                                    conflict: child_name,
                                });
                            }
                            Some(_) => {}
                            None => {
                                created.insert(child_name.clone(), child.handle.clone());
                                if !groups.contains_key(&child_name) {
                                    let options = inherited_options(&groups[target]);
                                    groups.insert(
                                        child_name.clone(),
                                        SingleGroup::new(&child_name, options)?,
                                    );
                                }
                                work.push((child.handle.clone(), child_name.clone()));
                            }
                        }
                        groups
                            .get_mut(&into)
                            .ok_or_else(|| Error::NoSuchGroup(into.clone()))?
                            .add_new_group(
                                &child_name,
                                Some(child.by_default),
                                true,
                                vec![coll.clone()],
                            )?;
                    }
                    AddAllMode::Flatten => {
                        work.push((child.handle.clone(), into.clone()));
                    }
                    AddAllMode::NoRecurse => {
                        add_member(groups, &into, child.handle, child.by_default, &coll, source, spec)?;
                    }
                }
            } else {
                add_member(groups, &into, child.handle, child.by_default, &coll, source, spec)?;
            }
        }
    }

    let meta = cache.get(source)?;
    let scripts = meta.scripts.clone();
    let compatibility_class = meta.compatibility_class;
    let target_group = groups
        .get_mut(target)
        .ok_or_else(|| Error::NoSuchGroup(target.to_string()))?;
    if spec.copy_scripts {
        for (slot, script) in scripts {
            target_group.add_script(slot, script)?;
        }
    }
    if spec.copy_compatibility_class {
        if let Some(class) = compatibility_class {
            target_group.set_compatibility_class(class);
        }
    }
    Ok(())
}

fn add_member(
    groups: &mut IndexMap<String, SingleGroup>,
    into: &str,
    handle: TroveHandle,
    by_default: bool,
    default_source: &TroveHandle,
    source: &TroveHandle,
    spec: &AddAllSpec,
) -> Result<()> {
    groups
        .get_mut(into)
        .ok_or_else(|| Error::NoSuchGroup(into.to_string()))?
        .add_trove(
            handle,
            true,
            by_default,
            &[],
            vec![default_source.clone()],
            spec.require_latest,
            AddReason::AddAll {
                source: source.clone(),
            },
        );
    Ok(())
}

fn inherited_options(parent: &SingleGroup) -> GroupOptions {
    GroupOptions {
        dep_check: parent.dep_check,
        auto_resolve: parent.auto_resolve,
        check_only_by_default_deps: parent.check_only_by_default_deps,
        check_path_conflicts: parent.check_path_conflicts,
        by_default: true,
        image_group: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flavor::Flavor;
    use crate::label::Label;
    use crate::source::{ChildRef, MemorySource, TroveMetadata, TroveSpec};
    use crate::version::{Revision, Version};

    fn handle(name: &str, rev: &str) -> TroveHandle {
        TroveHandle::new(
            name,
            Version::new(Label::new("repo", "ns", "1"), Revision::parse(rev).unwrap()),
            Flavor::empty(),
        )
    }

    fn spec(mode: AddAllMode) -> AddAllSpec {
        AddAllSpec {
            spec: TroveSpec::new("group-dist"),
            scope: None,
            mode,
            copy_scripts: false,
            copy_compatibility_class: false,
            require_latest: false,
            allow_missing: false,
        }
    }

    fn group_map(name: &str) -> IndexMap<String, SingleGroup> {
        let mut map = IndexMap::new();
        map.insert(
            name.to_string(),
            SingleGroup::new(name, GroupOptions::default()).unwrap(),
        );
        map
    }

    fn dist_universe() -> MemorySource {
        // group-dist
        //   +- group-base (byDefault=true)
        //   |    +- bash (byDefault=true)
        //   +- emacs (byDefault=false)
        let mut source = MemorySource::new();
        source.insert(
            handle("group-dist", "1.0-1"),
            TroveMetadata {
                children: vec![
                    ChildRef::strong(handle("group-base", "1.0-1"), true),
                    ChildRef::strong(handle("emacs", "2.0-1"), false),
                ],
                ..Default::default()
            },
        );
        source.insert(
            handle("group-base", "1.0-1"),
            TroveMetadata {
                children: vec![ChildRef::strong(handle("bash", "5.0-1"), true)],
                ..Default::default()
            },
        );
        source.insert(handle("bash", "5.0-1"), TroveMetadata::default());
        source.insert(handle("emacs", "2.0-1"), TroveMetadata::default());
        source
    }

    #[test]
    fn recurse_recreates_structure() {
        let source = dist_universe();
        let mut cache = TroveCache::new(&source);
        let mut groups = group_map("group-os");
        let mut diags = Diagnostics::new();

        process_add_all(
            &mut groups,
            "group-os",
            &spec(AddAllMode::Recurse),
            &[handle("group-dist", "1.0-1")],
            &mut cache,
            &source,
            &mut diags,
        )
        .unwrap();

        let os = &groups["group-os"];
        assert!(os.has_new_group("group-base"));
        assert!(os.has_trove(&handle("emacs", "2.0-1")));
        assert!(!os.include_by_default(&handle("emacs", "2.0-1")));

        let base = &groups["group-base"];
        assert!(base.has_trove(&handle("bash", "5.0-1")));
        assert_eq!(
            os.reason(&handle("emacs", "2.0-1")),
            Some(&AddReason::AddAll {
                source: handle("group-dist", "1.0-1")
            })
        );
    }

    #[test]
    fn flatten_pours_leaves_into_target() {
        let source = dist_universe();
        let mut cache = TroveCache::new(&source);
        let mut groups = group_map("group-os");
        let mut diags = Diagnostics::new();

        process_add_all(
            &mut groups,
            "group-os",
            &spec(AddAllMode::Flatten),
            &[handle("group-dist", "1.0-1")],
            &mut cache,
            &source,
            &mut diags,
        )
        .unwrap();

        let os = &groups["group-os"];
        assert_eq!(groups.len(), 1, "flatten creates no sub-groups");
        assert!(os.has_trove(&handle("bash", "5.0-1")));
        assert!(os.has_trove(&handle("emacs", "2.0-1")));
    }

    #[test]
    fn duplicate_subgroup_versions_are_fatal() {
        let mut source = dist_universe();
        // a second group-dist child carrying a different group-base version
        source.insert(
            handle("group-extra", "1.0-1"),
            TroveMetadata {
                children: vec![ChildRef::strong(handle("group-base", "2.0-1"), true)],
                ..Default::default()
            },
        );
        source.insert(
            handle("group-base", "2.0-1"),
            TroveMetadata::default(),
        );

        let mut cache = TroveCache::new(&source);
        let mut groups = group_map("group-os");
        let mut diags = Diagnostics::new();

        process_add_all(
            &mut groups,
            "group-os",
            &spec(AddAllMode::Recurse),
            &[handle("group-dist", "1.0-1")],
            &mut cache,
            &source,
            &mut diags,
        )
        .unwrap();
        let result = process_add_all(
            &mut groups,
            "group-os",
            &spec(AddAllMode::Recurse),
            &[handle("group-extra", "1.0-1")],
            &mut cache,
            &source,
            &mut diags,
        );
        // separate directives may legitimately re-create the same name;
        // within one directive two versions of one name cannot coexist
        assert!(result.is_ok());

        source_conflict_within_one_directive();
    }

    fn source_conflict_within_one_directive() {
        let mut source = MemorySource::new();
        source.insert(
            handle("group-dist", "1.0-1"),
            TroveMetadata {
                children: vec![
                    ChildRef::strong(handle("group-a", "1.0-1"), true),
                    ChildRef::strong(handle("group-b", "1.0-1"), true),
                ],
                ..Default::default()
            },
        );
        source.insert(
            handle("group-a", "1.0-1"),
            TroveMetadata {
                children: vec![ChildRef::strong(handle("group-sub", "1.0-1"), true)],
                ..Default::default()
            },
        );
        source.insert(
            handle("group-b", "1.0-1"),
            TroveMetadata {
                children: vec![ChildRef::strong(handle("group-sub", "2.0-1"), true)],
                ..Default::default()
            },
        );
        source.insert(handle("group-sub", "1.0-1"), TroveMetadata::default());
        source.insert(handle("group-sub", "2.0-1"), TroveMetadata::default());

        let mut cache = TroveCache::new(&source);
        let mut groups = group_map("group-os");
        let mut diags = Diagnostics::new();

        let result = process_add_all(
            &mut groups,
            "group-os",
            &spec(AddAllMode::Recurse),
            &[handle("group-dist", "1.0-1")],
            &mut cache,
            &source,
            &mut diags,
        );
        assert!(matches!(
            result,
            Err(Error::GroupAddAll { conflict, .. }) if conflict == "group-sub"
        ));
    }

    #[test]
    fn scripts_and_compatibility_class_copied() {
        use crate::group::{GroupScript, ScriptSlot};

        let mut source = MemorySource::new();
        source.insert(
            handle("group-dist", "1.0-1"),
            TroveMetadata {
                compatibility_class: Some(2),
                scripts: vec![(
                    ScriptSlot::PostInstall,
                    GroupScript {
                        contents: "#!/bin/sh\n".into(),
                        conversions: vec![1],
                    },
                )],
                children: vec![ChildRef::strong(handle("bash", "5.0-1"), true)],
                ..Default::default()
            },
        );
        source.insert(handle("bash", "5.0-1"), TroveMetadata::default());

        let mut cache = TroveCache::new(&source);
        let mut groups = group_map("group-os");
        let mut diags = Diagnostics::new();
        let mut spec = spec(AddAllMode::Recurse);
        spec.copy_scripts = true;
        spec.copy_compatibility_class = true;

        process_add_all(
            &mut groups,
            "group-os",
            &spec,
            &[handle("group-dist", "1.0-1")],
            &mut cache,
            &source,
            &mut diags,
        )
        .unwrap();

        let os = &groups["group-os"];
        assert!(os.script(ScriptSlot::PostInstall).is_some());
        assert_eq!(os.compatibility_class(), Some(2));
    }

    #[test]
    fn unmatched_spec_warns() {
        let source = MemorySource::new();
        let mut cache = TroveCache::new(&source);
        let mut groups = group_map("group-os");
        let mut diags = Diagnostics::new();

        process_add_all(
            &mut groups,
            "group-os",
            &spec(AddAllMode::Recurse),
            &[],
            &mut cache,
            &source,
            &mut diags,
        )
        .unwrap();
        assert!(matches!(
            diags.warnings()[0],
            Warning::SkippedAddAll { .. }
        ));
    }
}
