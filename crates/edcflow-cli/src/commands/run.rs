use std::path::Path;

use anyhow::{Context, Result};

use crate::commands::{cancel_on_ctrl_c, print_json, provision};
use crate::config;

/// Execute the `run` command: provision, then drive every consumer flow.
pub async fn execute(scenario_path: &Path, skip_provision: bool) -> Result<()> {
    let scenario = config::parse_scenario(scenario_path)
        .with_context(|| format!("Failed to parse scenario: {}", scenario_path.display()))?;

    let flows = scenario.consumer_flows()?;
    if flows.is_empty() {
        anyhow::bail!("Scenario defines no consumer flows");
    }

    if skip_provision || scenario.offer.is_none() {
        tracing::info!("Skipping provider setup");
    } else {
        provision::provision(&scenario).await?;
    }

    let cancel = cancel_on_ctrl_c();
    let consumer = scenario.consumer(scenario.consumer_client()?);

    tracing::info!(flows = flows.len(), "Running consumer flows");
    let results = consumer.run_concurrently(flows, &cancel).await;

    let mut failed = Vec::new();
    for (name, result) in results {
        match result {
            Ok(report) => {
                let seconds = (report.finished_at - report.started_at).num_milliseconds() as f64
                    / 1000.0;
                println!(
                    "Flow '{}' completed in {:.2}s: agreement {}, transfer {}{}",
                    name,
                    seconds,
                    report.agreement_id,
                    report.transfer_id,
                    if report.deprovisioned {
                        " (deprovisioned)"
                    } else {
                        ""
                    }
                );
                print_json(&report)?;
            }
            Err(err) => {
                println!("Flow '{name}' FAILED: {err}");
                failed.push(name);
            }
        }
    }

    if failed.is_empty() {
        Ok(())
    } else {
        anyhow::bail!("{} flow(s) failed: {}", failed.len(), failed.join(", "))
    }
}
