// tests/common/mod.rs

//! Shared test utilities: a small in-memory trove universe builder.

#![allow(dead_code)]

use conary_groups::deps::Dependency;
use conary_groups::source::{ChildRef, FileEntry, FileId, FileStream, PathHash};
use conary_groups::{
    Flavor, Label, MemorySource, Revision, TroveHandle, TroveMetadata, TroveSpec, Version,
};

pub const TEST_LABEL: (&str, &str, &str) = ("conary.example.com", "rpl", "2");

/// Route composition traces through the test harness; filter with
/// `RUST_LOG=conary_groups=debug`.
pub fn init_tracing() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Handle on the standard test label with an empty flavor.
pub fn handle(name: &str, rev: &str) -> TroveHandle {
    let (repo, ns, tag) = TEST_LABEL;
    TroveHandle::new(
        name,
        Version::new(Label::new(repo, ns, tag), Revision::parse(rev).unwrap()),
        Flavor::empty(),
    )
}

pub fn spec(name: &str) -> TroveSpec {
    TroveSpec::new(name)
}

/// Builds a MemorySource holding packages, components, and group troves.
pub struct Universe {
    pub source: MemorySource,
}

impl Universe {
    pub fn new() -> Self {
        init_tracing();
        Self {
            source: MemorySource::new(),
        }
    }

    /// A package with the given components, all strong byDefault=true
    /// references, each component sized 100 bytes.
    pub fn package(&mut self, name: &str, rev: &str, components: &[&str]) -> TroveHandle {
        let pkg = handle(name, rev);
        let mut children = Vec::new();
        for component in components {
            let comp = handle(&format!("{name}:{component}"), rev);
            self.source.insert(
                comp.clone(),
                TroveMetadata {
                    size: Some(100),
                    ..Default::default()
                },
            );
            children.push(ChildRef::strong(comp, true));
        }
        self.source.insert(
            pkg.clone(),
            TroveMetadata {
                children,
                ..Default::default()
            },
        );
        pkg
    }

    /// Like [`Universe::package`] but with a byDefault setting per
    /// component reference.
    pub fn package_with_defaults(
        &mut self,
        name: &str,
        rev: &str,
        components: &[(&str, bool)],
    ) -> TroveHandle {
        let pkg = handle(name, rev);
        let mut children = Vec::new();
        for (component, by_default) in components {
            let comp = handle(&format!("{name}:{component}"), rev);
            self.source.insert(
                comp.clone(),
                TroveMetadata {
                    size: Some(100),
                    ..Default::default()
                },
            );
            children.push(ChildRef::strong(comp, *by_default));
        }
        self.source.insert(
            pkg.clone(),
            TroveMetadata {
                children,
                ..Default::default()
            },
        );
        pkg
    }

    /// Like [`Universe::package`] but with provides and requires on the
    /// package trove.
    pub fn package_with_deps(
        &mut self,
        name: &str,
        rev: &str,
        provides: &[Dependency],
        requires: &[Dependency],
    ) -> TroveHandle {
        let pkg = handle(name, rev);
        self.source.insert(
            pkg.clone(),
            TroveMetadata {
                size: Some(100),
                provides: provides.iter().cloned().collect(),
                requires: requires.iter().cloned().collect(),
                ..Default::default()
            },
        );
        pkg
    }

    /// A group trove with the given strong children.
    pub fn group_trove(
        &mut self,
        name: &str,
        rev: &str,
        children: &[(TroveHandle, bool)],
    ) -> TroveHandle {
        let group = handle(name, rev);
        self.source.insert(
            group.clone(),
            TroveMetadata {
                children: children
                    .iter()
                    .map(|(h, by_default)| ChildRef::strong(h.clone(), *by_default))
                    .collect(),
                ..Default::default()
            },
        );
        group
    }

    /// A standalone component trove carrying one regular file.
    pub fn component_with_file(
        &mut self,
        name: &str,
        rev: &str,
        path: &str,
        contents: &[u8],
    ) -> TroveHandle {
        let comp = handle(name, rev);
        let descriptor = [name.as_bytes(), path.as_bytes(), contents].concat();
        let file_id = FileId::of(&descriptor);
        self.source
            .insert_stream(file_id, FileStream::regular(contents, 0o644));
        let mut meta = TroveMetadata {
            size: Some(100),
            ..Default::default()
        };
        meta.path_hashes.insert(PathHash::of(path));
        meta.files.push(FileEntry {
            path: path.to_string(),
            file_id,
        });
        self.source.insert(comp.clone(), meta);
        comp
    }

    /// A redirect trove pointing at the named targets.
    pub fn redirect(&mut self, name: &str, rev: &str, targets: &[&str]) -> TroveHandle {
        let redirect = handle(name, rev);
        self.source.insert(
            redirect.clone(),
            TroveMetadata {
                is_redirect: true,
                redirect_targets: targets.iter().map(|t| TroveSpec::new(*t)).collect(),
                ..Default::default()
            },
        );
        redirect
    }
}
