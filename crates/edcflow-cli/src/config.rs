//! Scenario YAML parsing with environment variable substitution.

use std::path::Path;
use std::sync::LazyLock;
use std::time::Duration;

use anyhow::{Context, Result};
use edcflow_core::{ApiVariant, Asset, ConnectorEndpoint, DataAddress, DataPlaneDescriptor};
use edcflow_poll::{
    PollPolicy, Poller, TerminalStates, NEGOTIATION_FINALIZED, TRANSFER_COMPLETED,
};
use edcflow_sdk::{
    Consumer, ConsumerFlow, ContractScope, ManagementClient, NegotiationDriver, ProviderSetup,
    RegistrationMode, TransferDriver,
};
use regex::{Captures, Regex};
use serde::Deserialize;
use serde_yaml::Value;

static ENV_VAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("valid env var regex"));

/// A provider, a consumer, what the provider offers and what the consumer runs.
#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub variant: ApiVariant,
    pub provider: ConnectorConfig,
    pub consumer: ConnectorConfig,
    /// Applies to both data plane registrations.
    #[serde(default)]
    pub registration: RegistrationMode,
    #[serde(default)]
    pub offer: Option<OfferConfig>,
    #[serde(default)]
    pub poll: PollSettings,
    #[serde(default)]
    pub flows: Vec<FlowConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConnectorConfig {
    #[serde(flatten)]
    pub endpoint: ConnectorEndpoint,
    #[serde(default)]
    pub dataplane: Option<DataPlaneDescriptor>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OfferConfig {
    pub asset: Asset,
    #[serde(default)]
    pub policy_id: Option<String>,
    #[serde(default)]
    pub contract_definition_id: Option<String>,
    #[serde(default)]
    pub scope: ContractScope,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PollSettings {
    #[serde(default)]
    pub negotiation: PollConfig,
    #[serde(default)]
    pub transfer: PollConfig,
}

/// One driver's poll budget, in YAML-friendly units.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PollConfig {
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    #[serde(default)]
    pub max_attempts: Option<u32>,
    /// `null` polls without a deadline.
    #[serde(default = "default_deadline_secs")]
    pub deadline_secs: Option<u64>,
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
    #[serde(default = "default_max_interval_ms")]
    pub max_interval_ms: u64,
    #[serde(default = "default_max_consecutive_errors")]
    pub max_consecutive_errors: u32,
    /// States that end the wait with an error.
    #[serde(default)]
    pub failure_states: Vec<String>,
}

fn default_interval_ms() -> u64 {
    1000
}

fn default_deadline_secs() -> Option<u64> {
    Some(300)
}

fn default_backoff_multiplier() -> f64 {
    1.0
}

fn default_max_interval_ms() -> u64 {
    30_000
}

fn default_max_consecutive_errors() -> u32 {
    3
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            max_attempts: None,
            deadline_secs: default_deadline_secs(),
            backoff_multiplier: default_backoff_multiplier(),
            max_interval_ms: default_max_interval_ms(),
            max_consecutive_errors: default_max_consecutive_errors(),
            failure_states: Vec::new(),
        }
    }
}

impl PollConfig {
    pub fn policy(&self) -> PollPolicy {
        PollPolicy {
            interval: Duration::from_millis(self.interval_ms),
            max_attempts: self.max_attempts,
            deadline: self.deadline_secs.map(Duration::from_secs),
            backoff_multiplier: self.backoff_multiplier,
            max_interval: Duration::from_millis(self.max_interval_ms),
            max_consecutive_errors: self.max_consecutive_errors,
        }
    }

    pub fn terminal(&self, success: &str) -> TerminalStates {
        TerminalStates::success_only(success).with_failures(self.failure_states.iter().cloned())
    }
}

/// A consumer flow. Ids and the provider address default from the scenario.
#[derive(Debug, Clone, Deserialize)]
pub struct FlowConfig {
    pub name: String,
    pub destination: DataAddress,
    #[serde(default)]
    pub provider_protocol_url: Option<String>,
    #[serde(default)]
    pub connector_id: Option<String>,
    #[serde(default)]
    pub consumer_id: Option<String>,
    #[serde(default)]
    pub provider_id: Option<String>,
    #[serde(default)]
    pub deprovision: Option<bool>,
}

impl Scenario {
    pub fn provider_client(&self) -> Result<ManagementClient> {
        ManagementClient::new(self.provider.endpoint.clone(), self.variant)
            .context("Invalid provider connector settings")
    }

    pub fn consumer_client(&self) -> Result<ManagementClient> {
        ManagementClient::new(self.consumer.endpoint.clone(), self.variant)
            .context("Invalid consumer connector settings")
    }

    /// The provider's exchange protocol address consumers negotiate with.
    pub fn provider_protocol_url(&self) -> Result<&str> {
        self.provider
            .endpoint
            .protocol_url()
            .context("provider.protocol_url is required to reach the provider")
    }

    pub fn provider_setup(&self) -> Option<ProviderSetup> {
        let offer = self.offer.as_ref()?;
        let mut setup = ProviderSetup::new(offer.asset.clone()).with_scope(offer.scope);
        if let Some(dataplane) = &self.provider.dataplane {
            setup = setup.with_dataplane(dataplane.clone(), self.registration);
        }
        if let Some(id) = &offer.policy_id {
            setup = setup.with_policy_id(id);
        }
        if let Some(id) = &offer.contract_definition_id {
            setup = setup.with_contract_definition_id(id);
        }
        Some(setup)
    }

    pub fn consumer_flows(&self) -> Result<Vec<ConsumerFlow>> {
        self.flows
            .iter()
            .map(|flow| -> Result<ConsumerFlow> {
                let provider_url = match &flow.provider_protocol_url {
                    Some(url) => url.clone(),
                    None => self.provider_protocol_url()?.to_string(),
                };
                let mut consumer_flow =
                    ConsumerFlow::new(&flow.name, provider_url, flow.destination.clone());
                if let Some(id) = &flow.connector_id {
                    consumer_flow.connector_id = id.clone();
                }
                if let Some(id) = &flow.consumer_id {
                    consumer_flow.consumer_id = id.clone();
                }
                if let Some(id) = &flow.provider_id {
                    consumer_flow.provider_id = id.clone();
                }
                consumer_flow.deprovision = flow.deprovision;
                Ok(consumer_flow)
            })
            .collect()
    }

    /// Consumer with drivers configured from `poll`.
    pub fn consumer(&self, client: ManagementClient) -> Consumer {
        let negotiation = NegotiationDriver::with_poller(
            client.clone(),
            Poller::new(self.poll.negotiation.policy()),
            self.poll.negotiation.terminal(NEGOTIATION_FINALIZED),
        );
        let transfer = TransferDriver::with_poller(
            client.clone(),
            Poller::new(self.poll.transfer.policy()),
            self.poll.transfer.terminal(TRANSFER_COMPLETED),
        );
        Consumer::from_drivers(client, negotiation, transfer)
    }
}

/// Substitute `${VAR_NAME}` patterns with environment variable values.
///
/// # Errors
///
/// Returns an error naming every referenced variable that is not set.
pub fn substitute_env_vars(input: &str) -> Result<String> {
    let mut missing = Vec::new();
    let result = expand(input, &mut missing);
    ensure_set(&missing)?;
    Ok(result)
}

fn ensure_set(missing: &[String]) -> Result<()> {
    if !missing.is_empty() {
        anyhow::bail!("Missing environment variable(s): {}", missing.join(", "));
    }
    Ok(())
}

fn expand(input: &str, missing: &mut Vec<String>) -> String {
    ENV_VAR_RE
        .replace_all(input, |cap: &Captures<'_>| match std::env::var(&cap[1]) {
            Ok(val) => val,
            Err(_) => {
                if !missing.iter().any(|m| m == &cap[1]) {
                    missing.push(cap[1].to_string());
                }
                cap[0].to_string()
            }
        })
        .into_owned()
}

/// Expand references inside the string scalars of a parsed document.
///
/// Keys, comments and structure are never touched. A scalar that is a single
/// reference takes the type of its value, so `interval_ms: ${INTERVAL}` works.
fn substitute_in_scalars(value: &mut Value, missing: &mut Vec<String>) {
    match value {
        Value::String(text) => {
            let whole = ENV_VAR_RE
                .find(text)
                .is_some_and(|m| m.start() == 0 && m.end() == text.len());
            let expanded = expand(text, missing);
            *value = if whole {
                typed_scalar(expanded)
            } else {
                Value::String(expanded)
            };
        }
        Value::Sequence(items) => {
            for item in items {
                substitute_in_scalars(item, missing);
            }
        }
        Value::Mapping(mapping) => {
            for (_, item) in mapping.iter_mut() {
                substitute_in_scalars(item, missing);
            }
        }
        Value::Tagged(tagged) => substitute_in_scalars(&mut tagged.value, missing),
        Value::Null | Value::Bool(_) | Value::Number(_) => {}
    }
}

fn typed_scalar(text: String) -> Value {
    match serde_yaml::from_str::<Value>(&text) {
        Ok(parsed @ (Value::Number(_) | Value::Bool(_))) => parsed,
        _ => Value::String(text),
    }
}

/// Parse a scenario YAML string, expanding env vars in its values.
pub fn parse_scenario_str(yaml_str: &str) -> Result<Scenario> {
    let mut document: Value =
        serde_yaml::from_str(yaml_str).context("Failed to parse scenario YAML")?;
    let mut missing = Vec::new();
    substitute_in_scalars(&mut document, &mut missing);
    ensure_set(&missing)?;

    // Re-reading the emitted text keeps plain-scalar coercions such as a
    // numeric api key landing in a string field.
    let substituted = serde_yaml::to_string(&document).context("Failed to render scenario YAML")?;
    let scenario: Scenario =
        serde_yaml::from_str(&substituted).context("Failed to parse scenario YAML")?;
    scenario
        .provider
        .endpoint
        .validate()
        .context("Invalid provider connector settings")?;
    scenario
        .consumer
        .endpoint
        .validate()
        .context("Invalid consumer connector settings")?;
    Ok(scenario)
}

/// Parse a scenario YAML file.
pub fn parse_scenario(path: &Path) -> Result<Scenario> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read scenario file: {}", path.display()))?;
    parse_scenario_str(&content)
}
