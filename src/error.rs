// src/error.rs

//! Crate-wide error type for group composition ("cook" errors).
//!
//! Everything here is user-facing and fatal to the running `build_groups`
//! call; recoverable conditions are reported through
//! [`crate::diag::Diagnostics`] instead.

use thiserror::Error;

use crate::deps::DependencySet;
use crate::handle::TroveHandle;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Cyclic group inclusion found while ordering groups.
    #[error("cyclic group inclusion: {}", format_cycles(.cycles))]
    GroupCycles { cycles: Vec<Vec<String>> },

    /// depCheck mode found unresolved requirements.
    #[error("dependency failure in group {group}: {}", format_failed_deps(.failures))]
    GroupDependencyFailure {
        group: String,
        failures: Vec<(TroveHandle, DependencySet)>,
    },

    /// addAll with recurse hit multiple distinct sub-groups with one name.
    #[error(
        "cannot addAll {from} into {group}: multiple versions of {conflict} \
         are included, and addAll cannot decide which to recreate"
    )]
    GroupAddAll {
        group: String,
        from: TroveHandle,
        conflict: String,
    },

    /// A group ended composition with no members at all.
    #[error("{0} has no troves in it")]
    EmptyGroup(String),

    /// Structural inclusion of a group into itself.
    #[error("tried to add {group} to itself; this would create a cycle")]
    GroupAddedToItself { group: String },

    /// addNewGroup named a group that was never created.
    #[error("group {0} does not exist")]
    NoSuchGroup(String),

    /// createGroup tried to reuse a name.
    #[error("group {0} was already created")]
    GroupExists(String),

    /// A directive named a search reference that was never registered.
    #[error("unknown search reference: {0}")]
    NoSuchScope(String),

    /// Group names must follow the "group-" convention.
    #[error("group names must start with \"group-\": {0}")]
    BadGroupName(String),

    /// A group script slot may only be filled once.
    #[error("script already set for group {group}")]
    ScriptAlreadySet { group: String },

    /// A redirect trove resolved back to itself.
    #[error(
        "redirect redirects to itself: {0}; check your search path or remove \
         the redirect from the recipe"
    )]
    RedirectLoop(TroveHandle),

    /// A redirect's targets could not be found at all.
    #[error(
        "could not find redirect target for {0}; check your search path or \
         remove the redirect from the recipe"
    )]
    RedirectTargetNotFound(TroveHandle),

    /// Redirects left in a finished group whose targets are not members.
    #[error(
        "if you include a redirect in this group, you must also include the \
         target of the redirect; the following troves are missing targets:{}",
        format_missing_targets(.missing)
    )]
    RedirectMissingTargets {
        group: String,
        missing: Vec<(TroveHandle, Vec<TroveHandle>)>,
    },

    /// Redirects cannot be packaged, so they have no size.
    #[error("cannot include redirect {0} in a group")]
    RedirectInGroup(TroveHandle),

    /// Bulk resolution failed with allowMissing=false.
    #[error("trove not found: {0}")]
    TroveNotFound(String),

    /// A directive recorded with contradictory flags.
    #[error("can only specify one of flatten and recurse")]
    AddAllFlattenAndRecurse,

    /// Fetch failure from the underlying trove source, propagated unchanged.
    #[error("trove source error: {0}")]
    Source(String),

    /// Malformed label string.
    #[error("invalid label '{0}'")]
    InvalidLabel(String),

    /// Malformed version or flavor string.
    #[error("parse error: {0}")]
    Parse(String),
}

fn format_cycles(cycles: &[Vec<String>]) -> String {
    cycles
        .iter()
        .map(|c| format!("({})", c.join(", ")))
        .collect::<Vec<_>>()
        .join("; ")
}

fn format_failed_deps(failures: &[(TroveHandle, DependencySet)]) -> String {
    failures
        .iter()
        .map(|(handle, deps)| format!("{handle} requires {deps}"))
        .collect::<Vec<_>>()
        .join("; ")
}

fn format_missing_targets(missing: &[(TroveHandle, Vec<TroveHandle>)]) -> String {
    let mut out = String::new();
    for (redirect, targets) in missing {
        out.push_str(&format!("\n{redirect}:"));
        for target in targets {
            out.push_str(&format!("\n -> {target}"));
        }
    }
    out
}
