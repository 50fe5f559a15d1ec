//! Management API client.

use std::time::Duration;

use edcflow_core::{
    ApiVariant, Asset, CatalogOffer, ConnectorEndpoint, ContractDefinition, DataPlaneDescriptor,
    EdcError, Endpoint, PolicyTemplate, ResourceKind, Result,
};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::catalog;
use crate::negotiation::NegotiationRequest;
use crate::payload;
use crate::transfer::TransferRequest;

/// Per-request timeout applied by [`ManagementClient::new`].
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Header carrying the static management API credential.
const API_KEY_HEADER: HeaderName = HeaderName::from_static("x-api-key");

/// What to do when data plane registration is answered with a non-2xx status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationMode {
    /// Log a warning and carry on.
    #[default]
    WarnOnFailure,
    /// Fail with [`EdcError::UnexpectedStatus`].
    Strict,
}

/// Client for one connector's management API.
#[derive(Debug, Clone)]
pub struct ManagementClient {
    /// Where the connector lives.
    endpoint: ConnectorEndpoint,

    /// Which API revision it speaks.
    variant: ApiVariant,

    /// HTTP client.
    http_client: reqwest::Client,
}

impl ManagementClient {
    /// Build a client, attaching the API key header when configured.
    ///
    /// Every request, bodiless or not, is sent as `application/json`.
    pub fn new(endpoint: ConnectorEndpoint, variant: ApiVariant) -> Result<Self> {
        endpoint.validate()?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(key) = &endpoint.api_key {
            let mut value = HeaderValue::from_str(key).map_err(|_| {
                EdcError::Configuration("API key contains invalid header characters".to_string())
            })?;
            value.set_sensitive(true);
            headers.insert(API_KEY_HEADER, value);
        }

        let http_client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(DEFAULT_REQUEST_TIMEOUT)
            .build()
            .map_err(|e| EdcError::Configuration(e.to_string()))?;

        Ok(Self::with_http_client(endpoint, variant, http_client))
    }

    /// Use a preconfigured reqwest client.
    pub fn with_http_client(
        endpoint: ConnectorEndpoint,
        variant: ApiVariant,
        http_client: reqwest::Client,
    ) -> Self {
        Self {
            endpoint,
            variant,
            http_client,
        }
    }

    pub fn endpoint(&self) -> &ConnectorEndpoint {
        &self.endpoint
    }

    pub fn variant(&self) -> ApiVariant {
        self.variant
    }

    /// Register a data plane instance.
    ///
    /// The response body is not interpreted. Returns the status code.
    pub async fn register_dataplane(
        &self,
        descriptor: &DataPlaneDescriptor,
        mode: RegistrationMode,
    ) -> Result<u16> {
        let url = self.url(Endpoint::DataPlaneInstances);
        let response = self.post(&url, &payload::dataplane(descriptor)).await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            match mode {
                RegistrationMode::Strict => {
                    return Err(EdcError::UnexpectedStatus {
                        endpoint: url,
                        status: status.as_u16(),
                        body,
                    })
                }
                RegistrationMode::WarnOnFailure => {
                    warn!(
                        "Data plane {} registration returned {}: {}",
                        descriptor.id, status, body
                    );
                }
            }
        } else {
            info!("Registered data plane {} at {}", descriptor.id, url);
        }

        Ok(status.as_u16())
    }

    /// Create an asset, returning its id.
    pub async fn create_asset(&self, asset: &Asset) -> Result<String> {
        let url = self.url(Endpoint::Assets);
        let body = self
            .post_json(&url, &payload::asset(self.variant, asset))
            .await?;
        let id = self.resolve_id(&url, ResourceKind::Asset, asset.id.as_deref(), &body)?;
        info!("Created asset {}", id);
        Ok(id)
    }

    /// Create a policy definition, returning its id.
    pub async fn create_policy(
        &self,
        policy_id: Option<&str>,
        template: &PolicyTemplate,
    ) -> Result<String> {
        let url = self.url(Endpoint::PolicyDefinitions);
        let body = self
            .post_json(&url, &payload::policy(self.variant, policy_id, template))
            .await?;
        let id = self.resolve_id(&url, ResourceKind::Policy, policy_id, &body)?;
        info!("Created policy {}", id);
        Ok(id)
    }

    /// Create a contract definition, returning its id.
    pub async fn create_contract_definition(
        &self,
        definition: &ContractDefinition,
    ) -> Result<String> {
        let url = self.url(Endpoint::ContractDefinitions);
        let body = self
            .post_json(&url, &payload::contract_definition(self.variant, definition))
            .await?;
        let id = self.resolve_id(
            &url,
            ResourceKind::ContractDefinition,
            definition.id.as_deref(),
            &body,
        )?;
        info!(
            "Created contract definition {} (access {}, contract {})",
            id, definition.access_policy_id, definition.contract_policy_id
        );
        Ok(id)
    }

    /// Ask this connector to fetch a counterpart's catalog.
    pub async fn query_catalog(&self, provider_url: &str) -> Result<Vec<CatalogOffer>> {
        let url = self.url(Endpoint::CatalogRequest);
        let body = self
            .post_json(&url, &payload::catalog_request(self.variant, provider_url))
            .await?;
        let offers = catalog::offers_from_response(self.variant, &url, &body)?;
        info!("Catalog of {} offers {} datasets", provider_url, offers.len());
        Ok(offers)
    }

    /// Start a contract negotiation, returning the negotiation id.
    pub async fn initiate_negotiation(&self, request: &NegotiationRequest) -> Result<String> {
        let url = self.url(Endpoint::Negotiations);
        let body = self
            .post_json(&url, &payload::negotiation(self.variant, request))
            .await?;
        self.resolve_id(&url, ResourceKind::Negotiation, None, &body)
    }

    /// Current representation of a negotiation.
    pub async fn negotiation(&self, id: &str) -> Result<Value> {
        let url = self.url(Endpoint::Negotiation(id));
        self.get_json(&url).await
    }

    /// Start a transfer process, returning the transfer id.
    pub async fn initiate_transfer(&self, request: &TransferRequest) -> Result<String> {
        let url = self.url(Endpoint::TransferProcesses);
        let body = self
            .post_json(&url, &payload::transfer(self.variant, request))
            .await?;
        self.resolve_id(&url, ResourceKind::TransferProcess, None, &body)
    }

    /// Current representation of a transfer process.
    pub async fn transfer(&self, id: &str) -> Result<Value> {
        let url = self.url(Endpoint::TransferProcess(id));
        self.get_json(&url).await
    }

    /// Release resources provisioned for a transfer, such as a storage token.
    pub async fn deprovision(&self, transfer_id: &str) -> Result<()> {
        let url = self.url(Endpoint::Deprovision(transfer_id));
        debug!(url = %url, "POST");
        let response = self
            .http_client
            .post(&url)
            .send()
            .await
            .map_err(|e| transport(&url, e))?;
        check_status(&url, response).await?;
        info!("Deprovisioned transfer {}", transfer_id);
        Ok(())
    }

    /// Read the lifecycle state out of a negotiation or transfer body.
    pub fn state_of(&self, endpoint: &str, body: &Value) -> Result<String> {
        self.string_field(endpoint, body, self.variant.state_field())
    }

    /// Read the agreement id out of a finalized negotiation body.
    pub fn agreement_of(&self, endpoint: &str, body: &Value) -> Result<String> {
        self.string_field(endpoint, body, self.variant.agreement_field())
    }

    /// Absolute URL of `endpoint`.
    pub fn url(&self, endpoint: Endpoint<'_>) -> String {
        self.endpoint.join(&self.variant.path(endpoint))
    }

    fn string_field(&self, endpoint: &str, body: &Value, field: &str) -> Result<String> {
        body.get(field)
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                EdcError::protocol(endpoint, format!("response has no string field {field:?}"))
            })
    }

    /// Pick the id of a created entity.
    ///
    /// A caller-supplied id must be echoed back; if the response omits it
    /// the supplied id stands. Without a supplied id the server's is required.
    fn resolve_id(
        &self,
        endpoint: &str,
        resource: ResourceKind,
        supplied: Option<&str>,
        body: &Value,
    ) -> Result<String> {
        let returned = body.get(self.variant.id_field()).and_then(Value::as_str);

        match (supplied, returned) {
            (Some(supplied), Some(returned)) if supplied != returned => Err(EdcError::protocol(
                endpoint,
                format!("{resource} created as {returned:?}, expected {supplied:?}"),
            )),
            (Some(supplied), _) => Ok(supplied.to_string()),
            (None, Some(returned)) => Ok(returned.to_string()),
            (None, None) => Err(EdcError::protocol(
                endpoint,
                format!("{resource} response has no {:?} field", self.variant.id_field()),
            )),
        }
    }

    async fn post(&self, url: &str, body: &Value) -> Result<reqwest::Response> {
        debug!(url = %url, body = %body, "POST");
        self.http_client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| transport(url, e))
    }

    async fn post_json(&self, url: &str, body: &Value) -> Result<Value> {
        let response = self.post(url, body).await?;
        read_json(url, response).await
    }

    async fn get_json(&self, url: &str) -> Result<Value> {
        debug!(url = %url, "GET");
        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| transport(url, e))?;
        read_json(url, response).await
    }
}

fn transport(url: &str, err: reqwest::Error) -> EdcError {
    EdcError::Transport {
        endpoint: url.to_string(),
        message: err.to_string(),
    }
}

async fn check_status(url: &str, response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(EdcError::UnexpectedStatus {
        endpoint: url.to_string(),
        status: status.as_u16(),
        body,
    })
}

/// Successful body as JSON. An empty body reads as `null`.
async fn read_json(url: &str, response: reqwest::Response) -> Result<Value> {
    let response = check_status(url, response).await?;
    let text = response.text().await.map_err(|e| transport(url, e))?;
    debug!(url = %url, body = %text, "Response");

    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(&text)
        .map_err(|e| EdcError::protocol(url, format!("response is not JSON: {e}")))
}
