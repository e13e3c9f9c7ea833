// tests/resolve.rs

//! Dependency resolution and checking through full builds.

mod common;

use common::{handle, spec, Universe};
use conary_groups::{
    AddReason, ByDefault, Dependency, Error, GroupOptions, GroupSet, TroveCache,
};

fn add(set: &mut GroupSet, name: &str) {
    set.default_group_mut()
        .add_spec(spec(name), ByDefault::Inherit, None, vec![], false, false);
}

#[test]
fn test_auto_resolve_pulls_provider_chain() {
    let mut universe = Universe::new();
    universe.package_with_deps("app", "1.0-1", &[], &[Dependency::soname("libfoo.so.1")]);
    universe.package_with_deps(
        "libfoo",
        "1.0-1",
        &[Dependency::soname("libfoo.so.1")],
        &[Dependency::soname("libbar.so.1")],
    );
    universe.package_with_deps("libbar", "1.0-1", &[Dependency::soname("libbar.so.1")], &[]);

    let options = GroupOptions {
        auto_resolve: true,
        dep_check: true,
        ..GroupOptions::default()
    };
    let mut set = GroupSet::new("group-os", options).unwrap();
    add(&mut set, "app");

    set.build_groups(&universe.source).unwrap();
    let os = set.group("group-os").unwrap();
    assert!(os.is_explicit(&handle("libfoo", "1.0-1")));
    assert!(os.is_explicit(&handle("libbar", "1.0-1")));
    assert!(os.include_by_default(&handle("libfoo", "1.0-1")));

    let reason = os.reason(&handle("libfoo", "1.0-1")).unwrap();
    assert!(matches!(
        reason,
        AddReason::Dep { requiring, .. } if *requiring == handle("app", "1.0-1")
    ));
    let mut cache = TroveCache::new(&universe.source);
    cache
        .cache_troves(&[handle("app", "1.0-1"), handle("libfoo", "1.0-1")])
        .unwrap();
    assert!(
        reason.describe(Some(&cache)).contains("libfoo.so.1"),
        "reason names the satisfied dependency"
    );
}

#[test]
fn test_dep_check_failure_is_fatal() {
    let mut universe = Universe::new();
    universe.package_with_deps("app", "1.0-1", &[], &[Dependency::soname("libgone.so.1")]);

    let options = GroupOptions {
        dep_check: true,
        ..GroupOptions::default()
    };
    let mut set = GroupSet::new("group-os", options).unwrap();
    add(&mut set, "app");

    match set.build_groups(&universe.source) {
        Err(Error::GroupDependencyFailure { group, failures }) => {
            assert_eq!(group, "group-os");
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].0, handle("app", "1.0-1"));
            assert!(failures[0].1.contains(&Dependency::soname("libgone.so.1")));
        }
        other => panic!("expected GroupDependencyFailure, got {other:?}"),
    }
}

#[test]
fn test_resolve_spec_overrides_repository_choice() {
    let mut universe = Universe::new();
    universe.package_with_deps("app", "1.0-1", &[], &[Dependency::soname("libx.so.1")]);
    // sorts before the pinned provider, so it would win by default
    universe.package_with_deps("aaa-libx", "1.0-1", &[Dependency::soname("libx.so.1")], &[]);
    universe.package_with_deps("zzz-libx", "2.0-1", &[Dependency::soname("libx.so.1")], &[]);

    let options = GroupOptions {
        auto_resolve: true,
        ..GroupOptions::default()
    };

    let mut set = GroupSet::new("group-os", options).unwrap();
    add(&mut set, "app");
    set.build_groups(&universe.source).unwrap();
    assert!(set.group("group-os").unwrap().has_trove(&handle("aaa-libx", "1.0-1")));

    let mut set = GroupSet::new("group-os", options).unwrap();
    add(&mut set, "app");
    set.add_resolve_spec(spec("zzz-libx"));
    set.build_groups(&universe.source).unwrap();
    let os = set.group("group-os").unwrap();
    assert!(os.has_trove(&handle("zzz-libx", "2.0-1")));
    assert!(!os.has_trove(&handle("aaa-libx", "1.0-1")));
}

#[test]
fn test_switched_off_members_are_not_checked_by_default() {
    let mut universe = Universe::new();
    universe.package_with_deps("bash", "5.0-1", &[], &[]);
    universe.package_with_deps(
        "broken",
        "1.0-1",
        &[],
        &[Dependency::soname("libgone.so.1")],
    );

    let options = GroupOptions {
        dep_check: true,
        ..GroupOptions::default()
    };
    let mut set = GroupSet::new("group-os", options).unwrap();
    add(&mut set, "bash");
    set.default_group_mut().add_spec(
        spec("broken"),
        ByDefault::False,
        None,
        vec![],
        false,
        false,
    );

    set.build_groups(&universe.source)
        .expect("switched-off requirements are not part of the default closure");
}
