//! # edcflow Poll
//!
//! Polling discipline for entities whose state machine lives in the
//! remote connector: contract negotiations and transfer processes.

pub mod cancel;
pub mod policy;
pub mod poller;

pub use cancel::CancelToken;
pub use policy::{
    Observation, PollPolicy, StateClass, TerminalStates, NEGOTIATION_FINALIZED, TRANSFER_COMPLETED,
};
pub use poller::{Clock, ManualClock, Poller, StateProbe, TokioClock};
