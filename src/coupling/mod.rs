//! Coupling module: configuration, the time-window protocol and the
//! transport boundary.
//!
//! [`session::CouplingSession`] is the entry point. It runs the lifecycle
//! `Initializing → Active → Finalized` and drives a [`transport::Transport`]
//! at the end of every time window.

/// Required actions raised by the protocol.
pub mod action;
/// Serde-backed coupling descriptor and its validation.
pub mod config;
/// Convergence measures of implicit schemes.
pub mod convergence;
/// In-process transport for two threads.
pub mod local;
/// Time-window clock.
pub mod scheme;
/// The coupling state machine.
pub mod session;
pub mod state;
/// Boundary to the transport and mapping collaborator.
pub mod transport;

pub use action::{ActionLedger, RequiredAction};
pub use config::{
    ConvergencePolicy, CouplingConfig, MappingDirection, MeasureKind, ParticipantConfig, Role,
    SchemeConfig, SchemeKind, SchemeOrder,
};
pub use local::LocalTransport;
pub use session::CouplingSession;
pub use state::CouplingState;
pub use transport::{Transport, TransportError};
