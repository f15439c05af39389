//! corsproxy.io relay strategy.
//!
//! The target URL is passed, percent-encoded, as the entire query string and
//! the origin's body comes back unchanged.

use async_trait::async_trait;
use reqwest::Url;

use super::{FetchStrategy, ensure_success, no_cache, with_cache_buster};
use crate::error::FetchError;

/// Base URL for the corsproxy.io relay.
const CORSPROXY_BASE: &str = "https://corsproxy.io";

/// Relays the request through corsproxy.io.
#[derive(Clone)]
pub struct CorsProxyRelay {
    client: reqwest::Client,
    base_url: String,
}

impl CorsProxyRelay {
    pub fn new(client: reqwest::Client) -> Self {
        Self::with_base_url(client, CORSPROXY_BASE)
    }

    /// Create a relay with a custom base URL (for testing).
    pub fn with_base_url(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn relay_url(&self, resource: &Url) -> String {
        format!(
            "{}/?{}",
            self.base_url,
            urlencoding::encode(with_cache_buster(resource).as_str())
        )
    }
}

#[async_trait]
impl FetchStrategy for CorsProxyRelay {
    fn name(&self) -> &'static str {
        "corsproxy"
    }

    async fn attempt(&self, resource: &Url) -> Result<String, FetchError> {
        let response = no_cache(self.client.get(self.relay_url(resource)))
            .send()
            .await?;
        let body = ensure_success(response)?.text().await?;
        Ok(body)
    }
}
