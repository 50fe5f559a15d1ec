//! Contract negotiation: submit an offer and wait for the agreement.

use async_trait::async_trait;
use edcflow_core::{CatalogOffer, Endpoint, ResourceKind, Result};
use edcflow_poll::{
    CancelToken, Clock, Observation, PollPolicy, Poller, StateProbe, TerminalStates, TokioClock,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::client::ManagementClient;

/// Everything needed to open a negotiation on a catalog offer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NegotiationRequest {
    pub connector_id: String,
    pub consumer_id: String,
    pub provider_id: String,
    /// Provider's exchange protocol endpoint.
    pub counter_party_address: String,
    /// The offer, repeated unchanged.
    pub offer: CatalogOffer,
}

/// Outcome of a finalized negotiation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractAgreement {
    pub negotiation_id: String,
    pub agreement_id: String,
}

/// Reads a negotiation's state.
pub struct NegotiationProbe<'a> {
    client: &'a ManagementClient,
    id: &'a str,
}

impl<'a> NegotiationProbe<'a> {
    pub fn new(client: &'a ManagementClient, id: &'a str) -> Self {
        Self { client, id }
    }
}

#[async_trait]
impl StateProbe for NegotiationProbe<'_> {
    fn resource(&self) -> ResourceKind {
        ResourceKind::Negotiation
    }

    fn id(&self) -> &str {
        self.id
    }

    async fn observe(&self) -> Result<Observation> {
        let body = self.client.negotiation(self.id).await?;
        let endpoint = self.client.url(Endpoint::Negotiation(self.id));
        let state = self.client.state_of(&endpoint, &body)?;
        Ok(Observation { state, body })
    }
}

/// Drives negotiations on one consumer connector.
#[derive(Debug, Clone)]
pub struct NegotiationDriver<C: Clock = TokioClock> {
    client: ManagementClient,
    poller: Poller<C>,
    terminal: TerminalStates,
}

impl NegotiationDriver<TokioClock> {
    /// Driver waiting for `FINALIZED` under `policy`.
    pub fn new(client: ManagementClient, policy: PollPolicy) -> Self {
        Self::with_poller(client, Poller::new(policy), TerminalStates::negotiation())
    }
}

impl<C: Clock> NegotiationDriver<C> {
    pub fn with_poller(client: ManagementClient, poller: Poller<C>, terminal: TerminalStates) -> Self {
        Self {
            client,
            poller,
            terminal,
        }
    }

    /// Submit the negotiation, returning its id.
    pub async fn negotiate(&self, request: &NegotiationRequest) -> Result<String> {
        let id = self.client.initiate_negotiation(request).await?;
        info!(
            "Negotiation {} started for asset {} with {}",
            id, request.offer.asset_id, request.counter_party_address
        );
        Ok(id)
    }

    /// Wait for the negotiation to finalize and return the agreement.
    ///
    /// The agreement id is read from the finalizing response only.
    pub async fn await_finalized(
        &self,
        negotiation_id: &str,
        cancel: &CancelToken,
    ) -> Result<ContractAgreement> {
        let probe = NegotiationProbe::new(&self.client, negotiation_id);
        let observation = self.poller.poll(&probe, &self.terminal, cancel).await?;

        let endpoint = self.client.url(Endpoint::Negotiation(negotiation_id));
        let agreement_id = self.client.agreement_of(&endpoint, &observation.body)?;
        info!("Negotiation {} finalized as agreement {}", negotiation_id, agreement_id);

        Ok(ContractAgreement {
            negotiation_id: negotiation_id.to_string(),
            agreement_id,
        })
    }
}
