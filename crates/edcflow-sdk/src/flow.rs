//! The provider setup and consumer pipeline, end to end.

use chrono::{DateTime, Utc};
use edcflow_core::{
    Asset, AssetSelector, CatalogOffer, ContractDefinition, DataAddress, DataPlaneDescriptor,
    EdcError, Endpoint, PolicyTemplate, ResourceKind, Result,
};
use edcflow_poll::{CancelToken, Clock, PollPolicy, TokioClock};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::catalog;
use crate::client::{ManagementClient, RegistrationMode};
use crate::negotiation::{NegotiationDriver, NegotiationRequest};
use crate::transfer::{TransferDriver, TransferRequest};

/// Which assets the provider's contract definition covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ContractScope {
    /// Only the asset published by this setup.
    #[default]
    PublishedAsset,
    /// Every asset on the connector.
    AllAssets,
}

/// Everything a provider publishes before consumers can negotiate.
#[derive(Debug, Clone)]
pub struct ProviderSetup {
    /// Registered first when present.
    pub dataplane: Option<DataPlaneDescriptor>,
    pub registration: RegistrationMode,
    pub asset: Asset,
    pub policy_id: Option<String>,
    /// A template without a target is pointed at the published asset.
    pub policy: PolicyTemplate,
    pub contract_definition_id: Option<String>,
    pub scope: ContractScope,
}

/// Ids of what [`ProviderSetup::provision`] created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionedOffer {
    pub asset_id: String,
    pub policy_id: String,
    pub contract_definition_id: String,
}

impl ProviderSetup {
    /// Publish `asset` under an unrestricted policy.
    pub fn new(asset: Asset) -> Self {
        Self {
            dataplane: None,
            registration: RegistrationMode::default(),
            asset,
            policy_id: None,
            policy: PolicyTemplate::default(),
            contract_definition_id: None,
            scope: ContractScope::default(),
        }
    }

    /// Register `dataplane` before publishing.
    pub fn with_dataplane(mut self, dataplane: DataPlaneDescriptor, mode: RegistrationMode) -> Self {
        self.dataplane = Some(dataplane);
        self.registration = mode;
        self
    }

    pub fn with_policy_id(mut self, id: impl Into<String>) -> Self {
        self.policy_id = Some(id.into());
        self
    }

    pub fn with_contract_definition_id(mut self, id: impl Into<String>) -> Self {
        self.contract_definition_id = Some(id.into());
        self
    }

    pub fn with_scope(mut self, scope: ContractScope) -> Self {
        self.scope = scope;
        self
    }

    /// Run the provider side: data plane, asset, policy, contract definition.
    pub async fn provision(&self, client: &ManagementClient) -> Result<ProvisionedOffer> {
        if let Some(dataplane) = &self.dataplane {
            client.register_dataplane(dataplane, self.registration).await?;
        }

        let asset_id = client.create_asset(&self.asset).await?;

        let policy = match &self.policy {
            PolicyTemplate::UnrestrictedUse { target: None } => PolicyTemplate::UnrestrictedUse {
                target: Some(asset_id.clone()),
            },
            explicit => explicit.clone(),
        };
        let policy_id = client
            .create_policy(self.policy_id.as_deref(), &policy)
            .await?;

        let selector = match self.scope {
            ContractScope::PublishedAsset => AssetSelector::AssetId(asset_id.clone()),
            ContractScope::AllAssets => AssetSelector::All,
        };
        let mut definition = ContractDefinition::new(policy_id.clone(), selector);
        definition.id = self.contract_definition_id.clone();
        let contract_definition_id = client.create_contract_definition(&definition).await?;

        Ok(ProvisionedOffer {
            asset_id,
            policy_id,
            contract_definition_id,
        })
    }
}

/// One consumer run: catalog, negotiation, transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumerFlow {
    pub name: String,
    /// Provider's exchange protocol endpoint.
    pub provider_protocol_url: String,
    #[serde(default = "default_provider_id")]
    pub connector_id: String,
    #[serde(default = "default_consumer_id")]
    pub consumer_id: String,
    #[serde(default = "default_provider_id")]
    pub provider_id: String,
    pub destination: DataAddress,
    /// Force or suppress the deprovision call. Defaults to whatever the
    /// destination needs.
    #[serde(default)]
    pub deprovision: Option<bool>,
}

fn default_provider_id() -> String {
    "provider".to_string()
}

fn default_consumer_id() -> String {
    "consumer".to_string()
}

impl ConsumerFlow {
    pub fn new(
        name: impl Into<String>,
        provider_protocol_url: impl Into<String>,
        destination: DataAddress,
    ) -> Self {
        Self {
            name: name.into(),
            provider_protocol_url: provider_protocol_url.into(),
            connector_id: default_provider_id(),
            consumer_id: default_consumer_id(),
            provider_id: default_provider_id(),
            destination,
            deprovision: None,
        }
    }

    pub fn should_deprovision(&self) -> bool {
        self.deprovision
            .unwrap_or_else(|| self.destination.requires_deprovision())
    }
}

/// What a finished consumer flow produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowReport {
    pub flow: String,
    pub offer: CatalogOffer,
    pub negotiation_id: String,
    pub agreement_id: String,
    pub transfer_id: String,
    pub deprovisioned: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// The consumer connector with its negotiation and transfer drivers.
#[derive(Debug, Clone)]
pub struct Consumer<C: Clock = TokioClock> {
    client: ManagementClient,
    negotiation: NegotiationDriver<C>,
    transfer: TransferDriver<C>,
}

impl Consumer<TokioClock> {
    pub fn new(
        client: ManagementClient,
        negotiation_policy: PollPolicy,
        transfer_policy: PollPolicy,
    ) -> Self {
        Self {
            negotiation: NegotiationDriver::new(client.clone(), negotiation_policy),
            transfer: TransferDriver::new(client.clone(), transfer_policy),
            client,
        }
    }
}

impl<C: Clock> Consumer<C> {
    pub fn from_drivers(
        client: ManagementClient,
        negotiation: NegotiationDriver<C>,
        transfer: TransferDriver<C>,
    ) -> Self {
        Self {
            client,
            negotiation,
            transfer,
        }
    }

    pub fn client(&self) -> &ManagementClient {
        &self.client
    }

    /// Query the provider's catalog and take the first offer.
    pub async fn select_offer(&self, provider_protocol_url: &str) -> Result<CatalogOffer> {
        let offers = self.client.query_catalog(provider_protocol_url).await?;
        let offer = catalog::select_first(offers, &self.client.url(Endpoint::CatalogRequest))?;
        info!("Selected offer {} for asset {}", offer.offer_id, offer.asset_id);
        Ok(offer)
    }

    /// Run one flow to completion.
    pub async fn run(&self, flow: &ConsumerFlow, cancel: &CancelToken) -> Result<FlowReport> {
        let started_at = Utc::now();
        info!("Starting flow {}", flow.name);

        ensure_live(cancel, ResourceKind::Catalog, &flow.provider_protocol_url)?;
        let offer = self.select_offer(&flow.provider_protocol_url).await?;

        let negotiation = NegotiationRequest {
            connector_id: flow.connector_id.clone(),
            consumer_id: flow.consumer_id.clone(),
            provider_id: flow.provider_id.clone(),
            counter_party_address: flow.provider_protocol_url.clone(),
            offer: offer.clone(),
        };
        ensure_live(cancel, ResourceKind::Negotiation, &offer.offer_id)?;
        let negotiation_id = self.negotiation.negotiate(&negotiation).await?;
        let agreement = self
            .negotiation
            .await_finalized(&negotiation_id, cancel)
            .await?;

        let transfer = TransferRequest {
            connector_id: flow.connector_id.clone(),
            counter_party_address: flow.provider_protocol_url.clone(),
            agreement_id: agreement.agreement_id.clone(),
            asset_id: offer.asset_id.clone(),
            destination: flow.destination.clone(),
            managed_resources: false,
        };
        ensure_live(cancel, ResourceKind::TransferProcess, &agreement.agreement_id)?;
        let transfer_id = self.transfer.initiate(&transfer).await?;
        self.transfer.await_completed(&transfer_id, cancel).await?;

        let deprovisioned = flow.should_deprovision();
        if deprovisioned {
            self.transfer.deprovision(&transfer_id).await?;
        }

        info!("Flow {} finished", flow.name);
        Ok(FlowReport {
            flow: flow.name.clone(),
            offer,
            negotiation_id,
            agreement_id: agreement.agreement_id,
            transfer_id,
            deprovisioned,
            started_at,
            finished_at: Utc::now(),
        })
    }
}

/// Refuse to start a state-changing call once `cancel` has fired.
fn ensure_live(cancel: &CancelToken, resource: ResourceKind, id: &str) -> Result<()> {
    if cancel.is_cancelled() {
        info!("Flow cancelled before {} {}", resource, id);
        return Err(EdcError::Cancelled {
            resource,
            id: id.to_string(),
        });
    }
    Ok(())
}

impl<C: Clock + Clone + 'static> Consumer<C> {
    /// Run independent flows as separate tasks sharing one cancel token.
    ///
    /// Results come back in the order of `flows`.
    pub async fn run_concurrently(
        &self,
        flows: Vec<ConsumerFlow>,
        cancel: &CancelToken,
    ) -> Vec<(String, Result<FlowReport>)> {
        let handles = flows.into_iter().map(|flow| {
            let consumer = self.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move {
                let result = consumer.run(&flow, &cancel).await;
                if let Err(err) = &result {
                    error!("Flow {} failed: {}", flow.name, err);
                }
                (flow.name, result)
            })
        });

        join_all(handles)
            .await
            .into_iter()
            .map(|joined| match joined {
                Ok(outcome) => outcome,
                Err(err) => std::panic::resume_unwind(err.into_panic()),
            })
            .collect()
    }
}
