//! Provider-side records: assets, policies, contract definitions and
//! the data planes that serve them, plus the offers consumers read back.

use serde::{Deserialize, Serialize};

use crate::address::DataAddress;
use crate::error::{EdcError, Result};

/// Instance id used when registering a data plane without an explicit one.
pub const DEFAULT_DATAPLANE_ID: &str = "http-pull-provider-dataplane";

/// Source types every registered data plane accepts.
pub const ALLOWED_SOURCE_TYPES: [&str; 1] = ["HttpData"];

/// Destination types every registered data plane accepts.
pub const ALLOWED_DEST_TYPES: [&str; 2] = ["HttpProxy", "HttpData"];

/// A publishable dataset reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    /// Caller-chosen id. When absent the connector assigns one.
    #[serde(default)]
    pub id: Option<String>,

    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub version: String,

    #[serde(default = "default_content_type")]
    pub content_type: String,

    /// Where the connector reads the asset's bytes from.
    pub data_address: DataAddress,
}

fn default_content_type() -> String {
    "application/json".to_string()
}

/// Builder for creating Assets with a fluent API.
#[derive(Debug, Default)]
pub struct AssetBuilder {
    id: Option<String>,
    name: Option<String>,
    description: String,
    version: String,
    content_type: Option<String>,
    data_address: Option<DataAddress>,
}

impl AssetBuilder {
    /// Create a new AssetBuilder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the asset id.
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Set the display name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the version string.
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Set the content type (defaults to `application/json`).
    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Set the source data address.
    pub fn data_address(mut self, address: DataAddress) -> Self {
        self.data_address = Some(address);
        self
    }

    /// Build the Asset.
    pub fn build(self) -> Result<Asset> {
        let name = self
            .name
            .ok_or_else(|| EdcError::Configuration("Asset name is required".to_string()))?;
        let data_address = self.data_address.ok_or_else(|| {
            EdcError::Configuration(format!("Asset {name} needs a data address"))
        })?;

        Ok(Asset {
            id: self.id,
            name,
            description: self.description,
            version: self.version,
            content_type: self.content_type.unwrap_or_else(default_content_type),
            data_address,
        })
    }
}

impl Asset {
    /// Create a new AssetBuilder.
    pub fn builder() -> AssetBuilder {
        AssetBuilder::new()
    }
}

/// The usage policies we know how to author.
///
/// Only the unrestricted shape exists; richer ODRL is authored elsewhere.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PolicyTemplate {
    /// A single `USE` permission without constraints.
    UnrestrictedUse {
        /// Asset the permission targets, if the variant names one.
        #[serde(default)]
        target: Option<String>,
    },
}

impl Default for PolicyTemplate {
    fn default() -> Self {
        PolicyTemplate::UnrestrictedUse { target: None }
    }
}

/// Which assets a contract definition applies to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AssetSelector {
    /// Empty criteria list.
    #[default]
    All,
    /// Equality criterion on the asset id.
    AssetId(String),
}

/// Binds an access policy and a contract policy to a set of assets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractDefinition {
    #[serde(default)]
    pub id: Option<String>,
    pub access_policy_id: String,
    pub contract_policy_id: String,
    #[serde(default)]
    pub selector: AssetSelector,
}

impl ContractDefinition {
    /// Use one policy for both access and contract.
    pub fn new(policy_id: impl Into<String>, selector: AssetSelector) -> Self {
        let policy_id = policy_id.into();
        Self {
            id: None,
            access_policy_id: policy_id.clone(),
            contract_policy_id: policy_id,
            selector,
        }
    }

    /// Set an explicit id.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// A dataset advertised in a counterpart's catalog, with the policy it is
/// offered under.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogOffer {
    pub offer_id: String,
    pub asset_id: String,
    /// The offered policy, repeated verbatim when negotiating.
    pub policy: serde_json::Value,
}

/// A transfer endpoint registered with a connector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataPlaneDescriptor {
    #[serde(default = "default_dataplane_id")]
    pub id: String,
    pub transfer_url: String,
    pub public_api_url: String,
}

fn default_dataplane_id() -> String {
    DEFAULT_DATAPLANE_ID.to_string()
}

impl DataPlaneDescriptor {
    /// Descriptor with the default instance id.
    pub fn new(transfer_url: impl Into<String>, public_api_url: impl Into<String>) -> Self {
        Self {
            id: default_dataplane_id(),
            transfer_url: transfer_url.into(),
            public_api_url: public_api_url.into(),
        }
    }
}
