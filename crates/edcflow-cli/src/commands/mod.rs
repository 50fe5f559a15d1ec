pub mod catalog;
pub mod provision;
pub mod run;

use anyhow::{Context, Result};
use edcflow_core::DataPlaneDescriptor;
use edcflow_poll::CancelToken;
use edcflow_sdk::{ManagementClient, RegistrationMode};
use serde::Serialize;
use tracing::warn;

/// Token that fires on the first Ctrl-C.
pub fn cancel_on_ctrl_c() -> CancelToken {
    let cancel = CancelToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling in-flight waits");
            trigger.cancel();
        }
    });
    cancel
}

/// Register `dataplane` on the connector behind `client`.
pub async fn register_dataplane(
    label: &str,
    client: &ManagementClient,
    dataplane: &DataPlaneDescriptor,
    mode: RegistrationMode,
) -> Result<()> {
    let status = client
        .register_dataplane(dataplane, mode)
        .await
        .with_context(|| format!("Failed to register {label} data plane {}", dataplane.id))?;
    println!("{label} data plane {}: HTTP {status}", dataplane.id);
    Ok(())
}

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
