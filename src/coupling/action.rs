//! Required actions and the ledger tracking which are pending.
//!
//! The set of actions is closed. Only the coupling session raises or clears
//! them; adapters read [`ActionLedger::is_pending`] and acknowledge with
//! [`ActionLedger::mark_satisfied`].

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::coupling_error::CouplingError;

/// An obligation the protocol places on the participant.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RequiredAction {
    /// Write initial values before `initialize_data`.
    WriteInitialData,
    /// Store the solver state; a new time window begins.
    WriteIterationCheckpoint,
    /// Restore the stored state; the window's iteration is repeated.
    ReadIterationCheckpoint,
}

impl RequiredAction {
    pub const ALL: [RequiredAction; 3] = [
        RequiredAction::WriteInitialData,
        RequiredAction::WriteIterationCheckpoint,
        RequiredAction::ReadIterationCheckpoint,
    ];

    /// Stable, well-known name of the action.
    pub const fn as_str(self) -> &'static str {
        match self {
            RequiredAction::WriteInitialData => "write-initial-data",
            RequiredAction::WriteIterationCheckpoint => "write-iteration-checkpoint",
            RequiredAction::ReadIterationCheckpoint => "read-iteration-checkpoint",
        }
    }

    const fn slot(self) -> usize {
        match self {
            RequiredAction::WriteInitialData => 0,
            RequiredAction::WriteIterationCheckpoint => 1,
            RequiredAction::ReadIterationCheckpoint => 2,
        }
    }
}

impl fmt::Display for RequiredAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pending/satisfied flag per [`RequiredAction`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ActionLedger {
    pending: [bool; 3],
}

impl ActionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_pending(&self, action: RequiredAction) -> bool {
        self.pending[action.slot()]
    }

    /// Acknowledges a pending action.
    ///
    /// # Errors
    /// `NotPending` if the protocol did not request `action`.
    pub fn mark_satisfied(&mut self, action: RequiredAction) -> Result<(), CouplingError> {
        if !self.is_pending(action) {
            return Err(CouplingError::NotPending(action));
        }
        self.pending[action.slot()] = false;
        log::debug!("action {action} satisfied");
        Ok(())
    }

    /// All currently pending actions, in declaration order.
    pub fn pending(&self) -> impl Iterator<Item = RequiredAction> + '_ {
        RequiredAction::ALL
            .into_iter()
            .filter(|&a| self.is_pending(a))
    }

    pub(crate) fn require(&mut self, action: RequiredAction) {
        if !self.pending[action.slot()] {
            log::debug!("action {action} required");
        }
        self.pending[action.slot()] = true;
    }

    pub(crate) fn clear(&mut self, action: RequiredAction) {
        self.pending[action.slot()] = false;
    }
}
