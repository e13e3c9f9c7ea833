// src/cache.rs

//! Memoizing trove store. Each handle is fetched from the upstream source
//! at most once per cache lifetime; everything downstream reads from here.
//!
//! On first fetch of a collection the cache reconstructs its weak
//! reference list (see [`TroveCache::reconstruct_children`]): some
//! historically produced troves did not recursively descend when writing
//! weak references, so the stored lists cannot be trusted. The
//! reconstruction is deliberately one level deep from cache-miss time;
//! any collection already cached has been through the same repair and is
//! recursively complete. Do not "fix" this to a full recursive rebuild:
//! that would change size and conflict results for old data.

use std::collections::HashSet;

use indexmap::IndexMap;
use tracing::debug;

use crate::error::{Error, Result};
use crate::handle::TroveHandle;
use crate::source::{ChildRef, FileId, FileStream, PathHash, TroveMetadata, TroveSource};

pub struct TroveCache<'a> {
    source: &'a dyn TroveSource,
    cache: IndexMap<TroveHandle, TroveMetadata>,
}

impl<'a> TroveCache<'a> {
    pub fn new(source: &'a dyn TroveSource) -> Self {
        Self {
            source,
            cache: IndexMap::new(),
        }
    }

    /// Fetch any handles not already cached, then repair their child
    /// lists. Fetch failures propagate unchanged; nothing is retried.
    pub fn cache_troves(&mut self, handles: &[TroveHandle]) -> Result<()> {
        let needed: Vec<TroveHandle> = {
            let mut seen = HashSet::new();
            handles
                .iter()
                .filter(|h| !self.cache.contains_key(*h) && seen.insert((*h).clone()))
                .cloned()
                .collect()
        };
        if needed.is_empty() {
            return Ok(());
        }
        debug!(count = needed.len(), "fetching trove definitions");
        let metas = self.source.get_troves(&needed)?;
        for (handle, meta) in needed.iter().zip(metas) {
            self.cache.insert(handle.clone(), meta);
        }
        for handle in &needed {
            self.reconstruct_children(handle)?;
        }
        Ok(())
    }

    /// Synthesize missing weak references for a freshly fetched
    /// collection: cache its child collections (repairing them in turn),
    /// then add any of their children the parent does not already
    /// reference as weak references. One level deep only; cached
    /// collections are assumed recursively complete.
    fn reconstruct_children(&mut self, handle: &TroveHandle) -> Result<()> {
        let child_colls: Vec<ChildRef> = match self.cache.get(handle) {
            Some(meta) => meta
                .children
                .iter()
                .filter(|c| c.handle.is_collection())
                .cloned()
                .collect(),
            None => return Ok(()),
        };
        if child_colls.is_empty() {
            return Ok(());
        }

        let coll_handles: Vec<TroveHandle> =
            child_colls.iter().map(|c| c.handle.clone()).collect();
        self.cache_troves(&coll_handles)?;

        let mut present: HashSet<TroveHandle> = self
            .cache
            .get(handle)
            .map(|meta| meta.children.iter().map(|c| c.handle.clone()).collect())
            .unwrap_or_default();

        let mut additions = Vec::new();
        for coll in &child_colls {
            if !coll.is_strong {
                continue;
            }
            let Some(child_meta) = self.cache.get(&coll.handle) else {
                continue;
            };
            for grandchild in &child_meta.children {
                let by_default = coll.by_default && grandchild.by_default;
                if present.insert(grandchild.handle.clone()) {
                    additions.push(ChildRef::weak(grandchild.handle.clone(), by_default));
                }
            }
        }

        if !additions.is_empty() {
            if let Some(meta) = self.cache.get_mut(handle) {
                meta.children.extend(additions);
            }
        }
        Ok(())
    }

    pub fn is_cached(&self, handle: &TroveHandle) -> bool {
        self.cache.contains_key(handle)
    }

    pub fn metadata(&self, handle: &TroveHandle) -> Option<&TroveMetadata> {
        self.cache.get(handle)
    }

    /// Cached metadata, fetching on miss.
    pub fn get(&mut self, handle: &TroveHandle) -> Result<&TroveMetadata> {
        if !self.cache.contains_key(handle) {
            self.cache_troves(std::slice::from_ref(handle))?;
        }
        self.cache
            .get(handle)
            .ok_or_else(|| Error::Source(format!("no such trove: {handle}")))
    }

    pub fn is_redirect(&self, handle: &TroveHandle) -> bool {
        self.cache.get(handle).is_some_and(|m| m.is_redirect)
    }

    /// Child references of a cached collection, filtered by strength.
    pub fn children_of(
        &self,
        handle: &TroveHandle,
        strong_refs: bool,
        weak_refs: bool,
    ) -> Vec<ChildRef> {
        self.cache
            .get(handle)
            .map(|meta| {
                meta.children
                    .iter()
                    .filter(|c| if c.is_strong { strong_refs } else { weak_refs })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn include_by_default(&self, parent: &TroveHandle, child: &TroveHandle) -> bool {
        self.cache
            .get(parent)
            .and_then(|meta| meta.include_by_default(child))
            .unwrap_or(false)
    }

    /// Cached entries answer true immediately; the rest are forwarded.
    pub fn has_troves(&self, handles: &[TroveHandle]) -> Result<Vec<bool>> {
        let mut results = vec![false; handles.len()];
        let mut forward = Vec::new();
        let mut forward_idx = Vec::new();
        for (i, handle) in handles.iter().enumerate() {
            if self.cache.contains_key(handle) {
                results[i] = true;
            } else {
                forward.push(handle.clone());
                forward_idx.push(i);
            }
        }
        if !forward.is_empty() {
            for (i, has) in forward_idx.into_iter().zip(self.source.has_troves(&forward)?) {
                results[i] = has;
            }
        }
        Ok(results)
    }

    pub fn sizes(&mut self, handles: &[TroveHandle]) -> Result<Vec<Option<u64>>> {
        self.cache_troves(handles)?;
        Ok(handles
            .iter()
            .map(|h| self.cache.get(h).and_then(|m| m.size))
            .collect())
    }

    pub fn path_hashes(&mut self, handles: &[TroveHandle]) -> Result<Vec<HashSet<PathHash>>> {
        self.cache_troves(handles)?;
        Ok(handles
            .iter()
            .map(|h| {
                self.cache
                    .get(h)
                    .map(|m| m.path_hashes.clone())
                    .unwrap_or_default()
            })
            .collect())
    }

    pub fn file_versions(&self, refs: &[(TroveHandle, FileId)]) -> Result<Vec<FileStream>> {
        self.source.file_versions(refs)
    }
}
