//! Transfer processes: start, wait for completion, release credentials.

use async_trait::async_trait;
use edcflow_core::{DataAddress, Endpoint, ResourceKind, Result};
use edcflow_poll::{
    CancelToken, Clock, Observation, PollPolicy, Poller, StateProbe, TerminalStates, TokioClock,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::client::ManagementClient;

/// A request to move an agreed asset into `destination`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequest {
    pub connector_id: String,
    /// Provider's exchange protocol endpoint.
    pub counter_party_address: String,
    pub agreement_id: String,
    pub asset_id: String,
    pub destination: DataAddress,
    #[serde(default)]
    pub managed_resources: bool,
}

/// Reads a transfer process's state.
pub struct TransferProbe<'a> {
    client: &'a ManagementClient,
    id: &'a str,
}

impl<'a> TransferProbe<'a> {
    pub fn new(client: &'a ManagementClient, id: &'a str) -> Self {
        Self { client, id }
    }
}

#[async_trait]
impl StateProbe for TransferProbe<'_> {
    fn resource(&self) -> ResourceKind {
        ResourceKind::TransferProcess
    }

    fn id(&self) -> &str {
        self.id
    }

    async fn observe(&self) -> Result<Observation> {
        let body = self.client.transfer(self.id).await?;
        let endpoint = self.client.url(Endpoint::TransferProcess(self.id));
        let state = self.client.state_of(&endpoint, &body)?;
        Ok(Observation { state, body })
    }
}

/// Drives transfer processes on one consumer connector.
#[derive(Debug, Clone)]
pub struct TransferDriver<C: Clock = TokioClock> {
    client: ManagementClient,
    poller: Poller<C>,
    terminal: TerminalStates,
}

impl TransferDriver<TokioClock> {
    /// Driver waiting for `COMPLETED` under `policy`.
    pub fn new(client: ManagementClient, policy: PollPolicy) -> Self {
        Self::with_poller(client, Poller::new(policy), TerminalStates::transfer())
    }
}

impl<C: Clock> TransferDriver<C> {
    pub fn with_poller(client: ManagementClient, poller: Poller<C>, terminal: TerminalStates) -> Self {
        Self {
            client,
            poller,
            terminal,
        }
    }

    /// Start the transfer, returning its id.
    pub async fn initiate(&self, request: &TransferRequest) -> Result<String> {
        let id = self.client.initiate_transfer(request).await?;
        info!(
            "Transfer {} started under agreement {} into {}",
            id,
            request.agreement_id,
            request.destination.type_name()
        );
        Ok(id)
    }

    /// Wait until the transfer completes. Returns the completing response body.
    pub async fn await_completed(
        &self,
        transfer_id: &str,
        cancel: &CancelToken,
    ) -> Result<serde_json::Value> {
        let probe = TransferProbe::new(&self.client, transfer_id);
        let observation = self.poller.poll(&probe, &self.terminal, cancel).await?;
        info!("Transfer {} completed", transfer_id);
        Ok(observation.body)
    }

    /// Release transfer-scoped resources such as an object-storage token.
    pub async fn deprovision(&self, transfer_id: &str) -> Result<()> {
        self.client.deprovision(transfer_id).await
    }
}
