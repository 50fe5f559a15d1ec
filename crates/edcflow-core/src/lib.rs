//! # edcflow Core
//!
//! Core types and errors shared by every edcflow crate.
//!
//! This crate provides the fundamental building blocks:
//! - [`ApiVariant`] - Which management API revision a connector speaks
//! - [`DataAddress`] - Tagged source/sink descriptions
//! - [`Asset`] - Publishable dataset records and the policy/contract shapes bound to them
//! - [`ConnectorEndpoint`] - Explicit per-connector configuration
//! - [`EdcError`] - Error taxonomy

pub mod address;
pub mod asset;
pub mod config;
pub mod error;
pub mod types;

// Re-exports for convenience
pub use address::{DataAddress, ObjectLocation};
pub use asset::{
    Asset, AssetBuilder, AssetSelector, CatalogOffer, ContractDefinition, DataPlaneDescriptor,
    PolicyTemplate,
};
pub use config::ConnectorEndpoint;
pub use error::{EdcError, ErrorKind, Result};
pub use types::*;

/// Prelude module for common imports
pub mod prelude {
    pub use crate::address::{DataAddress, ObjectLocation};
    pub use crate::asset::{
        Asset, AssetSelector, CatalogOffer, ContractDefinition, DataPlaneDescriptor,
        PolicyTemplate,
    };
    pub use crate::config::ConnectorEndpoint;
    pub use crate::error::{EdcError, ErrorKind, Result};
    pub use crate::types::{ApiVariant, Endpoint, ResourceKind};
}
