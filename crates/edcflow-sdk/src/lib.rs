//! # edcflow SDK
//!
//! Client SDK for driving a dataspace connector's management API through
//! the provider setup and consumer negotiation/transfer sequence.

pub mod catalog;
pub mod client;
pub mod flow;
pub mod negotiation;
pub mod payload;
pub mod transfer;

pub use client::{ManagementClient, RegistrationMode};
pub use flow::{Consumer, ConsumerFlow, ContractScope, FlowReport, ProviderSetup, ProvisionedOffer};
pub use negotiation::{ContractAgreement, NegotiationDriver, NegotiationRequest};
pub use transfer::{TransferDriver, TransferRequest};

/// Prelude module for common imports.
pub mod prelude {
    pub use crate::client::{ManagementClient, RegistrationMode};
    pub use crate::flow::{Consumer, ConsumerFlow, FlowReport, ProviderSetup};
    pub use crate::negotiation::{NegotiationDriver, NegotiationRequest};
    pub use crate::transfer::{TransferDriver, TransferRequest};
    pub use edcflow_core::prelude::*;
    pub use edcflow_poll::{CancelToken, PollPolicy, TerminalStates};
}
