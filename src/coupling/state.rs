//! Lifecycle states of a coupling session.

use std::fmt;

/// Where a session is in its lifecycle.
///
/// `Constructed` only exists while the session is being built; a session
/// handed to the caller starts in `Initializing`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum CouplingState {
    Constructed,
    /// Topology may be created; no coupling data exists yet.
    Initializing,
    /// Time stepping; topology is frozen.
    Active,
    /// Transport released; the session cannot be reused.
    Finalized,
}

impl fmt::Display for CouplingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CouplingState::Constructed => "constructed",
            CouplingState::Initializing => "initializing",
            CouplingState::Active => "active",
            CouplingState::Finalized => "finalized",
        };
        f.write_str(s)
    }
}
