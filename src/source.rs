// src/source.rs

//! Trove sources: the query and fetch interfaces the composition engine
//! consumes, plus the in-memory implementation used for tests and for
//! reference scopes.
//!
//! [`SearchSource`] resolves (name, version spec, flavor spec) queries to
//! matching handles. [`TroveSource`] fetches trove metadata and file
//! streams. [`ProviderSource`] answers "which troves provide these
//! dependencies" for the dependency resolver. A repository client
//! implements all three; [`MemorySource`] does so in memory.

use std::collections::HashMap;
use std::fmt;

use indexmap::IndexMap;
use sha2::{Digest, Sha256};

use crate::deps::{Dependency, DependencySet};
use crate::error::{Error, Result};
use crate::flavor::Flavor;
use crate::group::{GroupScript, ScriptSlot};
use crate::handle::TroveHandle;

/// A resolvable trove query: name, optional version spec, optional flavor
/// spec.
///
/// Version specs take one of three forms: a bare revision (`1.0-1` or
/// `1.0`), a label (`repo@ns:tag`), or a label plus revision
/// (`repo@ns:tag/1.0-1`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TroveSpec {
    pub name: String,
    pub version: Option<String>,
    pub flavor: Option<Flavor>,
}

impl TroveSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: None,
            flavor: None,
        }
    }

    pub fn with_version(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: Some(version.into()),
            flavor: None,
        }
    }

    pub fn with_flavor(mut self, flavor: Flavor) -> Self {
        self.flavor = Some(flavor);
        self
    }

    /// Whether a concrete handle matches this spec.
    pub fn matches(&self, handle: &TroveHandle) -> bool {
        if handle.name != self.name {
            return false;
        }
        if let Some(version_spec) = &self.version {
            if !version_spec_matches(version_spec, handle) {
                return false;
            }
        }
        if let Some(flavor_spec) = &self.flavor {
            if !handle.flavor.satisfies(flavor_spec) {
                return false;
            }
        }
        true
    }
}

impl fmt::Display for TroveSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if let Some(version) = &self.version {
            write!(f, "={version}")?;
        }
        if let Some(flavor) = &self.flavor {
            write!(f, "[{flavor}]")?;
        }
        Ok(())
    }
}

fn version_spec_matches(spec: &str, handle: &TroveHandle) -> bool {
    if let Some((label_part, revision_part)) = spec.split_once('/') {
        if label_part.contains('@') {
            return handle.version.label.to_string() == label_part
                && handle.version.revision.to_string() == revision_part;
        }
    }
    if spec.contains('@') {
        return handle.version.label.to_string() == spec;
    }
    // bare revision: match the full revision or just the upstream version
    handle.version.revision.to_string() == spec || handle.version.revision.version == spec
}

/// Fixed-size digest of a packaged file's path, for cheap conflict
/// pre-screening.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PathHash([u8; 8]);

impl PathHash {
    pub fn of(path: &str) -> Self {
        let digest = Sha256::digest(path.as_bytes());
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&digest[..8]);
        Self(bytes)
    }
}

impl fmt::Display for PathHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

/// Identity of one file stream; files with equal ids have identical
/// contents and metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileId([u8; 20]);

impl FileId {
    pub fn of(descriptor: &[u8]) -> Self {
        let digest = Sha256::digest(descriptor);
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&digest[..20]);
        Self(bytes)
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

/// File color for RPM capsule conflict arbitration. ELF64 beats ELF32
/// beats uncolored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum FileColor {
    #[default]
    None,
    Elf32,
    Elf64,
}

/// A file stream object: the content-bearing view of one packaged file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileStream {
    Regular {
        digest: [u8; 32],
        mode: u32,
        color: FileColor,
    },
    Symlink {
        target: String,
    },
    Directory {
        mode: u32,
    },
}

impl FileStream {
    pub fn regular(contents: &[u8], mode: u32) -> Self {
        Self::Regular {
            digest: Sha256::digest(contents).into(),
            mode,
            color: FileColor::None,
        }
    }

    pub fn with_color(self, color: FileColor) -> Self {
        match self {
            Self::Regular { digest, mode, .. } => Self::Regular {
                digest,
                mode,
                color,
            },
            other => other,
        }
    }

    /// Kind-specific binary compatibility: symlinks compare targets,
    /// regular files compare digest and mode, directories compare mode.
    pub fn compatible_with(&self, other: &FileStream) -> bool {
        match (self, other) {
            (
                Self::Regular {
                    digest: d1, mode: m1, ..
                },
                Self::Regular {
                    digest: d2, mode: m2, ..
                },
            ) => d1 == d2 && m1 == m2,
            (Self::Symlink { target: t1 }, Self::Symlink { target: t2 }) => t1 == t2,
            (Self::Directory { mode: m1 }, Self::Directory { mode: m2 }) => m1 == m2,
            _ => false,
        }
    }

    fn color(&self) -> FileColor {
        match self {
            Self::Regular { color, .. } => *color,
            _ => FileColor::None,
        }
    }
}

/// RPM file color comparison: 1 if `a` strictly wins, -1 if it loses,
/// 0 if the colors do not decide.
pub fn rpm_color_cmp(a: &FileStream, b: &FileStream) -> i32 {
    let (ca, cb) = (a.color(), b.color());
    if ca == cb {
        0
    } else if ca > cb {
        1
    } else {
        -1
    }
}

/// Capsule format a trove's content was imported from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CapsuleKind {
    Rpm,
    Deb,
}

/// One file carried by a trove.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub path: String,
    pub file_id: FileId,
}

/// A child reference inside a collection trove.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildRef {
    pub handle: TroveHandle,
    pub by_default: bool,
    pub is_strong: bool,
}

impl ChildRef {
    pub fn strong(handle: TroveHandle, by_default: bool) -> Self {
        Self {
            handle,
            by_default,
            is_strong: true,
        }
    }

    pub fn weak(handle: TroveHandle, by_default: bool) -> Self {
        Self {
            handle,
            by_default,
            is_strong: false,
        }
    }
}

/// Everything the composition engine needs to know about one trove.
#[derive(Debug, Clone, Default)]
pub struct TroveMetadata {
    pub children: Vec<ChildRef>,
    pub is_redirect: bool,
    pub redirect_targets: Vec<TroveSpec>,
    pub size: Option<u64>,
    pub path_hashes: std::collections::HashSet<PathHash>,
    pub capsule: Option<CapsuleKind>,
    pub files: Vec<FileEntry>,
    pub provides: DependencySet,
    pub requires: DependencySet,
    pub compatibility_class: Option<i32>,
    pub scripts: Vec<(ScriptSlot, GroupScript)>,
}

impl TroveMetadata {
    pub fn has_child(&self, handle: &TroveHandle) -> bool {
        self.children.iter().any(|c| &c.handle == handle)
    }

    pub fn include_by_default(&self, handle: &TroveHandle) -> Option<bool> {
        self.children
            .iter()
            .find(|c| &c.handle == handle)
            .map(|c| c.by_default)
    }
}

/// Resolves trove specs to matching handles.
pub trait SearchSource {
    /// Resolve each spec to zero or more handles. With
    /// `allow_missing=false`, an unmatched spec is a fatal
    /// [`Error::TroveNotFound`]; with `allow_missing=true` it resolves to
    /// an empty list. `require_latest` keeps only the newest revision per
    /// matching name and flavor.
    fn find_troves(
        &self,
        specs: &[TroveSpec],
        require_latest: bool,
        allow_missing: bool,
    ) -> Result<IndexMap<TroveSpec, Vec<TroveHandle>>>;
}

/// Fetches trove metadata and file streams.
pub trait TroveSource {
    fn get_troves(&self, handles: &[TroveHandle]) -> Result<Vec<TroveMetadata>>;

    fn has_troves(&self, handles: &[TroveHandle]) -> Result<Vec<bool>>;

    fn file_versions(&self, refs: &[(TroveHandle, FileId)]) -> Result<Vec<FileStream>>;
}

/// Answers provider queries for the dependency resolver.
pub trait ProviderSource {
    /// For each dependency, the handles known to provide it.
    fn resolve_dependencies(&self, deps: &[Dependency]) -> Result<Vec<Vec<TroveHandle>>>;
}

/// In-memory trove universe: search, fetch, and provider resolution over
/// a hand-built set of troves.
#[derive(Debug, Default)]
pub struct MemorySource {
    troves: IndexMap<TroveHandle, TroveMetadata>,
    streams: HashMap<FileId, FileStream>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, handle: TroveHandle, metadata: TroveMetadata) {
        self.troves.insert(handle, metadata);
    }

    pub fn insert_stream(&mut self, file_id: FileId, stream: FileStream) {
        self.streams.insert(file_id, stream);
    }

    pub fn contains(&self, handle: &TroveHandle) -> bool {
        self.troves.contains_key(handle)
    }

    pub fn handles(&self) -> impl Iterator<Item = &TroveHandle> {
        self.troves.keys()
    }

    fn matching(&self, spec: &TroveSpec, require_latest: bool) -> Vec<TroveHandle> {
        let mut matches: Vec<&TroveHandle> =
            self.troves.keys().filter(|h| spec.matches(h)).collect();
        if require_latest && !matches.is_empty() {
            let newest = matches
                .iter()
                .map(|h| &h.version)
                .max_by(|a, b| a.revision.compare(&b.revision))
                .cloned();
            if let Some(newest) = newest {
                matches.retain(|h| h.version.revision.compare(&newest.revision).is_eq());
            }
        }
        matches.sort();
        matches.into_iter().cloned().collect()
    }
}

impl SearchSource for MemorySource {
    fn find_troves(
        &self,
        specs: &[TroveSpec],
        require_latest: bool,
        allow_missing: bool,
    ) -> Result<IndexMap<TroveSpec, Vec<TroveHandle>>> {
        let mut results = IndexMap::new();
        for spec in specs {
            let matches = self.matching(spec, require_latest);
            if matches.is_empty() && !allow_missing {
                return Err(Error::TroveNotFound(spec.to_string()));
            }
            results.insert(spec.clone(), matches);
        }
        Ok(results)
    }
}

impl TroveSource for MemorySource {
    fn get_troves(&self, handles: &[TroveHandle]) -> Result<Vec<TroveMetadata>> {
        handles
            .iter()
            .map(|h| {
                self.troves
                    .get(h)
                    .cloned()
                    .ok_or_else(|| Error::Source(format!("no such trove: {h}")))
            })
            .collect()
    }

    fn has_troves(&self, handles: &[TroveHandle]) -> Result<Vec<bool>> {
        Ok(handles.iter().map(|h| self.troves.contains_key(h)).collect())
    }

    fn file_versions(&self, refs: &[(TroveHandle, FileId)]) -> Result<Vec<FileStream>> {
        refs.iter()
            .map(|(handle, file_id)| {
                self.streams
                    .get(file_id)
                    .cloned()
                    .ok_or_else(|| Error::Source(format!("no stream {file_id} for {handle}")))
            })
            .collect()
    }
}

impl ProviderSource for MemorySource {
    fn resolve_dependencies(&self, deps: &[Dependency]) -> Result<Vec<Vec<TroveHandle>>> {
        Ok(deps
            .iter()
            .map(|dep| {
                let mut providers: Vec<TroveHandle> = self
                    .troves
                    .iter()
                    .filter(|(_, meta)| !meta.is_redirect && meta.provides.contains(dep))
                    .map(|(handle, _)| handle.clone())
                    .collect();
                providers.sort();
                providers
            })
            .collect())
    }
}

/// An ordered stack of search sources; the first layer that matches a
/// spec shadows the rest.
pub struct SourceStack<'a> {
    layers: Vec<&'a dyn SearchSource>,
}

impl<'a> SourceStack<'a> {
    pub fn new(layers: Vec<&'a dyn SearchSource>) -> Self {
        Self { layers }
    }
}

impl SearchSource for SourceStack<'_> {
    fn find_troves(
        &self,
        specs: &[TroveSpec],
        require_latest: bool,
        allow_missing: bool,
    ) -> Result<IndexMap<TroveSpec, Vec<TroveHandle>>> {
        let mut results: IndexMap<TroveSpec, Vec<TroveHandle>> = specs
            .iter()
            .map(|spec| (spec.clone(), Vec::new()))
            .collect();
        let mut remaining: Vec<TroveSpec> = specs.to_vec();

        for layer in &self.layers {
            if remaining.is_empty() {
                break;
            }
            let layer_results = layer.find_troves(&remaining, require_latest, true)?;
            remaining = Vec::new();
            for (spec, matches) in layer_results {
                if matches.is_empty() {
                    remaining.push(spec);
                } else {
                    results.insert(spec, matches);
                }
            }
        }

        if !allow_missing {
            if let Some(spec) = remaining.first() {
                return Err(Error::TroveNotFound(spec.to_string()));
            }
        }
        Ok(results)
    }
}

/// A searchable view over one group's current membership, used to resolve
/// remove and replace specs against the group being composed.
#[derive(Debug)]
pub struct GroupTroveSource {
    members: Vec<TroveHandle>,
}

impl GroupTroveSource {
    pub fn new(members: Vec<TroveHandle>) -> Self {
        Self { members }
    }

    pub fn del_trove(&mut self, handle: &TroveHandle) {
        self.members.retain(|h| h != handle);
    }

    pub fn add_trove(&mut self, handle: TroveHandle) {
        self.members.push(handle);
    }

    pub fn find(
        &self,
        specs: &[TroveSpec],
    ) -> IndexMap<TroveSpec, Vec<TroveHandle>> {
        specs
            .iter()
            .map(|spec| {
                let mut matches: Vec<TroveHandle> = self
                    .members
                    .iter()
                    .filter(|h| spec.matches(h))
                    .cloned()
                    .collect();
                matches.sort();
                matches.dedup();
                (spec.clone(), matches)
            })
            .collect()
    }
}
