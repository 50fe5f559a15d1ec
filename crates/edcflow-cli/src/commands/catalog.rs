use std::path::Path;

use anyhow::{Context, Result};

use crate::commands::print_json;
use crate::config;

/// Execute the `catalog` command: list what the provider offers the consumer.
pub async fn execute(scenario_path: &Path) -> Result<()> {
    let scenario = config::parse_scenario(scenario_path)
        .with_context(|| format!("Failed to parse scenario: {}", scenario_path.display()))?;

    let provider_url = scenario.provider_protocol_url()?;
    let consumer = scenario.consumer_client()?;
    let offers = consumer
        .query_catalog(provider_url)
        .await
        .with_context(|| format!("Catalog request for {provider_url} failed"))?;

    if offers.is_empty() {
        println!("Catalog of {provider_url} offers no datasets.");
        return Ok(());
    }
    print_json(&offers)
}
