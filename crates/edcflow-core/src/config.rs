//! Per-connector endpoint configuration.

use serde::{Deserialize, Serialize};

use crate::error::{EdcError, Result};

/// Where one connector can be reached.
///
/// Built once at startup and handed by reference to every component that
/// talks to the connector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectorEndpoint {
    /// Base URL of the management API.
    pub management_url: String,

    /// Exchange protocol endpoint counterparts use to reach this connector.
    #[serde(default)]
    pub protocol_url: Option<String>,

    /// Static `X-API-Key` credential, if the management API requires one.
    #[serde(default)]
    pub api_key: Option<String>,
}

impl ConnectorEndpoint {
    /// Endpoint without protocol URL or credential.
    pub fn new(management_url: impl Into<String>) -> Self {
        Self {
            management_url: management_url.into(),
            protocol_url: None,
            api_key: None,
        }
    }

    /// Set the exchange protocol URL.
    pub fn with_protocol_url(mut self, url: impl Into<String>) -> Self {
        self.protocol_url = Some(url.into());
        self
    }

    /// Set the API key.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Absolute URL of `path` below the management base URL.
    pub fn join(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.management_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// The exchange protocol URL, required when acting as a provider.
    pub fn protocol_url(&self) -> Result<&str> {
        self.protocol_url.as_deref().ok_or_else(|| {
            EdcError::Configuration(format!(
                "connector at {} has no protocol_url",
                self.management_url
            ))
        })
    }

    /// Validate that the URLs look usable.
    pub fn validate(&self) -> Result<()> {
        let urls = std::iter::once(self.management_url.as_str()).chain(self.protocol_url.as_deref());
        for url in urls {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(EdcError::Configuration(format!(
                    "expected an http(s) URL, got {url:?}"
                )));
            }
        }
        Ok(())
    }
}
