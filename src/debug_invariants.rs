//! Invariant checks shared by the mesh and data stores.

use crate::coupling_error::CouplingError;

/// Structural self-checks for stores that are mutated incrementally.
pub trait DebugInvariants {
    /// Validate invariants and return the first violation found.
    fn validate_invariants(&self) -> Result<(), CouplingError>;

    /// Panic on the first violation when invariant checking is compiled in.
    fn debug_assert_invariants(&self) {
        crate::debug_invariants!(self.validate_invariants(), "store invariant violated");
    }
}

/// Run a fallible check and panic on error when invariant checking is enabled
/// (debug builds, `check-invariants`, or `strict-invariants`).
#[macro_export]
macro_rules! debug_invariants {
    ($expr:expr, $($ctx:tt)*) => {
        if cfg!(any(debug_assertions, feature = "strict-invariants", feature = "check-invariants")) {
            if let Err(e) = $expr {
                panic!(concat!("[invariants] ", $($ctx)*, ": {}"), e);
            }
        }
    };
}
