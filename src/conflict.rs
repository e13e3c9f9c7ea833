// src/conflict.rs

//! Group size accounting and path conflict detection.
//!
//! Two default-install members may not carry different contents at one
//! path. Candidates are pre-screened with the troves' path hash sets;
//! only sets with overlapping hashes have their file lists compared.
//! Sharing a path is fine when the file ids match, when the streams are
//! binary-compatible, or for documentation paths. When every trove
//! involved came from an RPM capsule, file color arbitration applies:
//! a strict color winner (ELF64 over ELF32 over uncolored) resolves the
//! conflict the way RPM would.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::cache::TroveCache;
use crate::error::{Error, Result};
use crate::group::SingleGroup;
use crate::handle::TroveHandle;
use crate::source::{rpm_color_cmp, CapsuleKind, FileId, FileStream, PathHash};

const DOC_PREFIX: &str = "/usr/share/doc/";

/// A set of troves carrying incompatible contents at shared paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathConflict {
    pub troves: Vec<TroveHandle>,
    pub paths: Vec<String>,
}

/// Compute the group's installed size and, when the group asks for it,
/// its path conflicts.
///
/// Size is the sum over default-install members; any member without a
/// recorded size leaves the group size unknown, except redirects, which
/// are fatal here because they cannot be installed at all.
pub fn calc_size_and_check_hashes(
    group: &mut SingleGroup,
    cache: &mut TroveCache<'_>,
) -> Result<Vec<PathConflict>> {
    let members = group.iter_default_troves();
    cache.cache_troves(&members)?;

    let mut total: u64 = 0;
    let mut complete = true;
    for member in &members {
        let meta = cache.get(member)?;
        if meta.is_redirect {
            return Err(Error::RedirectInGroup(member.clone()));
        }
        match meta.size {
            Some(size) => total += size,
            // collections have no content of their own
            None if member.is_collection() => {}
            None => complete = false,
        }
    }
    group.set_size(complete.then_some(total));

    if !group.check_path_conflicts {
        return Ok(Vec::new());
    }
    hash_conflicts(group, cache, &members)
}

fn hash_conflicts(
    group: &SingleGroup,
    cache: &mut TroveCache<'_>,
    members: &[TroveHandle],
) -> Result<Vec<PathConflict>> {
    let candidates: Vec<TroveHandle> = members
        .iter()
        .filter(|m| !m.is_collection())
        .cloned()
        .collect();
    let hash_sets = cache.path_hashes(&candidates)?;

    // union candidates whose hash sets overlap
    let mut set_of = (0..candidates.len()).collect::<Vec<usize>>();
    let mut first_with: HashMap<PathHash, usize> = HashMap::new();
    for (idx, hashes) in hash_sets.iter().enumerate() {
        for hash in hashes {
            match first_with.get(hash) {
                Some(&other) => {
                    let merged = set_of[other];
                    let old = set_of[idx];
                    for slot in set_of.iter_mut() {
                        if *slot == old {
                            *slot = merged;
                        }
                    }
                }
                None => {
                    first_with.insert(*hash, idx);
                }
            }
        }
    }

    let mut sets: HashMap<usize, Vec<usize>> = HashMap::new();
    for (idx, set) in set_of.iter().enumerate() {
        sets.entry(*set).or_default().push(idx);
    }

    let mut conflicts = Vec::new();
    for indices in sets.into_values().filter(|s| s.len() > 1) {
        if let Some(conflict) = examine_set(group, cache, &candidates, &indices)? {
            conflicts.push(conflict);
        }
    }
    conflicts.sort_by(|a, b| a.troves.cmp(&b.troves));
    Ok(conflicts)
}

fn examine_set(
    group: &SingleGroup,
    cache: &mut TroveCache<'_>,
    candidates: &[TroveHandle],
    indices: &[usize],
) -> Result<Option<PathConflict>> {
    debug!(
        group = %group.name,
        troves = indices.len(),
        "examining path hash overlap"
    );

    let mut paths: HashMap<String, Vec<(usize, FileId)>> = HashMap::new();
    for &idx in indices {
        let meta = cache.get(&candidates[idx])?;
        for file in &meta.files {
            paths
                .entry(file.path.clone())
                .or_default()
                .push((idx, file.file_id));
        }
    }

    let mut streams: HashMap<FileId, FileStream> = HashMap::new();
    let mut conflict_paths: Vec<String> = Vec::new();
    let mut involved: HashSet<usize> = HashSet::new();

    for (path, entries) in &paths {
        if entries.len() < 2 {
            continue;
        }
        if entries.iter().all(|(_, id)| *id == entries[0].1) {
            continue;
        }
        if path.starts_with(DOC_PREFIX) {
            continue;
        }

        let missing: Vec<(TroveHandle, FileId)> = entries
            .iter()
            .filter(|(_, id)| !streams.contains_key(id))
            .map(|(idx, id)| (candidates[*idx].clone(), *id))
            .collect();
        if !missing.is_empty() {
            let fetched = cache.file_versions(&missing)?;
            for ((_, id), stream) in missing.iter().zip(fetched) {
                streams.insert(*id, stream);
            }
        }

        let entry_streams: Vec<&FileStream> =
            entries.iter().map(|(_, id)| &streams[id]).collect();
        let compatible = entry_streams
            .iter()
            .all(|s| s.compatible_with(entry_streams[0]));
        if compatible {
            continue;
        }

        let all_rpm = entries.iter().all(|(idx, _)| {
            cache
                .metadata(&candidates[*idx])
                .is_some_and(|m| m.capsule == Some(CapsuleKind::Rpm))
        });
        if all_rpm && has_color_winner(&entry_streams) {
            continue;
        }

        conflict_paths.push(path.to_string());
        involved.extend(entries.iter().map(|(idx, _)| *idx));
    }

    if conflict_paths.is_empty() {
        return Ok(None);
    }
    conflict_paths.sort();
    let mut troves: Vec<TroveHandle> =
        involved.into_iter().map(|idx| candidates[idx].clone()).collect();
    troves.sort();
    Ok(Some(PathConflict {
        troves,
        paths: conflict_paths,
    }))
}

/// One stream strictly out-colors every other.
fn has_color_winner(streams: &[&FileStream]) -> bool {
    streams.iter().copied().any(|candidate| {
        streams
            .iter()
            .copied()
            .filter(|other| !std::ptr::eq(*other, candidate))
            .all(|other| rpm_color_cmp(candidate, other) == 1)
    })
}
