// src/lib.rs

//! Conary Group Composition
//!
//! Builds the membership of group troves: collections that pin an exact
//! set of (name, version, flavor) troves so a whole system can be
//! installed and updated as one unit.
//!
//! # Architecture
//!
//! - Directive-driven: groups record add/remove/replace/addAll/difference
//!   directives, then one `build_groups` pass composes everything
//! - Bulk resolution: every directive spec is resolved against the
//!   repository up front, one query per search configuration
//! - Ordered composition: groups are topologically sorted so sub-groups
//!   are final before their parents are composed
//! - Memoized fetches: a trove cache guarantees each trove definition is
//!   fetched at most once per build
//! - Closure checking: groups can auto-resolve dependency providers into
//!   themselves and verify their membership is dependency-closed
//! - Conflict detection: default-install members may not carry
//!   incompatible contents at one path

pub mod addall;
pub mod cache;
pub mod compose;
pub mod conflict;
pub mod deps;
pub mod depsolve;
pub mod diag;
mod error;
pub mod flavor;
pub mod graph;
pub mod group;
pub mod handle;
pub mod label;
pub mod pipeline;
pub mod redirect;
pub mod source;
pub mod version;

pub use cache::TroveCache;
pub use conflict::PathConflict;
pub use deps::{Dependency, DependencyClass, DependencySet};
pub use diag::{Diagnostics, Warning};
pub use error::{Error, Result};
pub use flavor::{Flavor, FlavorOp};
pub use group::{
    AddAllMode, AddReason, ByDefault, GroupOptions, GroupScript, ScriptSlot, SingleGroup,
};
pub use handle::TroveHandle;
pub use label::{Label, LabelPath};
pub use pipeline::{BuildResult, GroupSet, Repository};
pub use source::{
    ChildRef, MemorySource, ProviderSource, SearchSource, TroveMetadata, TroveSource, TroveSpec,
};
pub use version::{Revision, Version};
