//! Common types used across edcflow.

use std::fmt;

use serde::{Deserialize, Serialize};

/// EDC vocabulary namespace.
pub const EDC_NAMESPACE: &str = "https://w3id.org/edc/v0.0.1/ns/";

/// ODRL vocabulary namespace.
pub const ODRL_NAMESPACE: &str = "http://www.w3.org/ns/odrl/2/";

/// Remote ODRL JSON-LD context document.
pub const ODRL_CONTEXT: &str = "http://www.w3.org/ns/odrl.jsonld";

/// Exchange protocol spoken by JSON-LD era connectors.
pub const DSP_PROTOCOL: &str = "dataspace-protocol-http";

/// Exchange protocol spoken by legacy connectors.
pub const IDS_PROTOCOL: &str = "ids-multipart";

/// Management API revision a connector exposes.
///
/// Each revision differs in paths, payload envelopes and the names of the
/// fields we read back from responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ApiVariant {
    /// `v1/data` API with flat bodies and `ids-multipart` exchange.
    Legacy,
    /// JSON-LD bodies with every term prefixed `edc:`.
    Namespaced,
    /// JSON-LD bodies relying on `@vocab` for unprefixed terms.
    #[default]
    JsonLd,
}

/// A management API endpoint, with the path parameters it needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint<'a> {
    DataPlaneInstances,
    Assets,
    PolicyDefinitions,
    ContractDefinitions,
    CatalogRequest,
    Negotiations,
    Negotiation(&'a str),
    TransferProcesses,
    TransferProcess(&'a str),
    Deprovision(&'a str),
}

impl ApiVariant {
    /// Relative path of `endpoint` below the management base URL.
    pub fn path(&self, endpoint: Endpoint<'_>) -> String {
        let (root, assets, transfers) = match self {
            ApiVariant::Legacy => ("v1/data/", "v1/data/assets", "v1/data/transferprocess"),
            ApiVariant::Namespaced => ("v2/", "v2/assets", "v2/transferprocesses"),
            ApiVariant::JsonLd => ("v2/", "v3/assets", "v2/transferprocesses"),
        };

        match endpoint {
            Endpoint::DataPlaneInstances => match self {
                ApiVariant::Legacy => "v1/data/instances".to_string(),
                _ => "instances".to_string(),
            },
            Endpoint::Assets => assets.to_string(),
            Endpoint::PolicyDefinitions => format!("{root}policydefinitions"),
            Endpoint::ContractDefinitions => format!("{root}contractdefinitions"),
            Endpoint::CatalogRequest => format!("{root}catalog/request"),
            Endpoint::Negotiations => format!("{root}contractnegotiations"),
            Endpoint::Negotiation(id) => format!("{root}contractnegotiations/{id}"),
            Endpoint::TransferProcesses => transfers.to_string(),
            Endpoint::TransferProcess(id) => format!("{transfers}/{id}"),
            Endpoint::Deprovision(id) => format!("{transfers}/{id}/deprovision"),
        }
    }

    /// Field carrying the identifier of a created entity.
    pub fn id_field(&self) -> &'static str {
        match self {
            ApiVariant::Legacy => "id",
            ApiVariant::Namespaced | ApiVariant::JsonLd => "@id",
        }
    }

    /// Field carrying the lifecycle state of negotiations and transfers.
    pub fn state_field(&self) -> &'static str {
        match self {
            ApiVariant::Namespaced => "edc:state",
            ApiVariant::Legacy | ApiVariant::JsonLd => "state",
        }
    }

    /// Field carrying the agreement id of a finalized negotiation.
    pub fn agreement_field(&self) -> &'static str {
        match self {
            ApiVariant::Namespaced => "edc:contractAgreementId",
            ApiVariant::Legacy | ApiVariant::JsonLd => "contractAgreementId",
        }
    }

    /// Key holding the offered datasets in a catalog response.
    pub fn catalog_key(&self) -> &'static str {
        match self {
            ApiVariant::Legacy => "contractOffers",
            ApiVariant::Namespaced | ApiVariant::JsonLd => "dcat:dataset",
        }
    }

    /// Protocol the connector uses to talk to its counterpart.
    pub fn exchange_protocol(&self) -> &'static str {
        match self {
            ApiVariant::Legacy => IDS_PROTOCOL,
            ApiVariant::Namespaced | ApiVariant::JsonLd => DSP_PROTOCOL,
        }
    }

    /// Returns true if bodies carry a JSON-LD `@context`.
    pub fn is_json_ld(&self) -> bool {
        !matches!(self, ApiVariant::Legacy)
    }
}

impl fmt::Display for ApiVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ApiVariant::Legacy => "legacy",
            ApiVariant::Namespaced => "namespaced",
            ApiVariant::JsonLd => "json-ld",
        };
        f.write_str(name)
    }
}

/// The remote entities this crate creates or observes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    DataPlane,
    Asset,
    Policy,
    ContractDefinition,
    Catalog,
    Negotiation,
    TransferProcess,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResourceKind::DataPlane => "data plane",
            ResourceKind::Asset => "asset",
            ResourceKind::Policy => "policy",
            ResourceKind::ContractDefinition => "contract definition",
            ResourceKind::Catalog => "catalog",
            ResourceKind::Negotiation => "contract negotiation",
            ResourceKind::TransferProcess => "transfer process",
        };
        f.write_str(name)
    }
}
