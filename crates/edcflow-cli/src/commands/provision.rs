use std::path::Path;

use anyhow::{Context, Result};
use edcflow_sdk::ProvisionedOffer;

use crate::commands::{print_json, register_dataplane};
use crate::config::{self, Scenario};

/// Execute the `provision` command: data planes, then the provider's offer.
pub async fn execute(scenario_path: &Path) -> Result<()> {
    let scenario = config::parse_scenario(scenario_path)
        .with_context(|| format!("Failed to parse scenario: {}", scenario_path.display()))?;

    let offer = provision(&scenario).await?;
    print_json(&offer)
}

/// Register both data planes and publish the offer.
pub async fn provision(scenario: &Scenario) -> Result<ProvisionedOffer> {
    let setup = scenario
        .provider_setup()
        .context("Scenario has no offer section to provision")?;

    tracing::info!(
        variant = %scenario.variant,
        provider = scenario.provider.endpoint.management_url,
        "Provisioning provider"
    );

    let provider = scenario.provider_client()?;
    let offer = setup
        .provision(&provider)
        .await
        .context("Provider setup failed")?;

    if let Some(dataplane) = &scenario.consumer.dataplane {
        let consumer = scenario.consumer_client()?;
        register_dataplane("Consumer", &consumer, dataplane, scenario.registration).await?;
    }

    println!(
        "Published asset {} under policy {} (contract definition {})",
        offer.asset_id, offer.policy_id, offer.contract_definition_id
    );
    Ok(offer)
}
