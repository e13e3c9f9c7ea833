// src/diag.rs

//! Warning accumulator threaded through composition.
//!
//! The engine never writes warnings to a process-wide logger; it records
//! them here and the caller decides how to surface them. Trace output
//! still goes through `tracing`.

use std::fmt;

use crate::handle::TroveHandle;
use crate::source::TroveSpec;

/// A non-fatal condition observed during composition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    /// An add directive matched nothing in the repository.
    SkippedAdd { group: String, spec: TroveSpec },
    /// An addAll directive matched nothing in the repository.
    SkippedAddAll { group: String, spec: TroveSpec },
    /// Remove specs that matched no member of the group.
    UnmatchedRemoves { group: String, specs: Vec<TroveSpec> },
    /// Replace specs that matched no member of the group.
    UnmatchedReplaces { group: String, specs: Vec<TroveSpec> },
    /// Global replace specs that matched nothing in any group.
    UnmatchedGlobalReplaces { specs: Vec<TroveSpec> },
    /// A replace spec matched members that are only implicit; those
    /// cannot be replaced.
    ImplicitReplace {
        group: String,
        handles: Vec<TroveHandle>,
    },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SkippedAdd { group, spec } => {
                write!(f, "{group}: skipping add('{spec}'), not found in repository")
            }
            Self::SkippedAddAll { group, spec } => {
                write!(f, "{group}: skipping addAll('{spec}'), not found in repository")
            }
            Self::UnmatchedRemoves { group, specs } => {
                write!(f, "{group}: remove specs matched nothing: {}", join(specs))
            }
            Self::UnmatchedReplaces { group, specs } => {
                write!(f, "{group}: replace specs matched nothing: {}", join(specs))
            }
            Self::UnmatchedGlobalReplaces { specs } => {
                write!(f, "global replace specs matched nothing: {}", join(specs))
            }
            Self::ImplicitReplace { group, handles } => {
                let names: Vec<String> = handles.iter().map(|h| h.to_string()).collect();
                write!(
                    f,
                    "{group}: replace matched troves that are not explicit and \
                     cannot be replaced: {}",
                    names.join(", ")
                )
            }
        }
    }
}

fn join(specs: &[TroveSpec]) -> String {
    specs
        .iter()
        .map(|s| format!("'{s}'"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Collected warnings for one `build_groups` run.
#[derive(Debug, Default)]
pub struct Diagnostics {
    warnings: Vec<Warning>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, warning: Warning) {
        self.warnings.push(warning);
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Warning> {
        self.warnings.iter()
    }
}
