//! AllOrigins relay strategy.
//!
//! AllOrigins fetches a URL on our behalf and returns it wrapped in JSON:
//!
//! ```json
//! { "contents": "Online: 5 / Today: 12 / ...", "status": { "http_code": 200 } }
//! ```
//!
//! `contents` is `null` when the relay itself could not reach the origin.
//!
//! # API Reference
//!
//! See: <https://allorigins.win/>

use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;

use super::{FetchStrategy, ensure_success, no_cache, with_cache_buster};
use crate::error::FetchError;

/// Base URL for the AllOrigins relay.
const ALLORIGINS_BASE: &str = "https://api.allorigins.win";

/// Relays the request through AllOrigins' JSON endpoint.
#[derive(Clone)]
pub struct AllOriginsRelay {
    client: reqwest::Client,
    base_url: String,
}

impl AllOriginsRelay {
    pub fn new(client: reqwest::Client) -> Self {
        Self::with_base_url(client, ALLORIGINS_BASE)
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
            "{}/get?url={}",
            self.base_url,
            urlencoding::encode(with_cache_buster(resource).as_str())
        )
    }
}

/// Envelope returned by the `/get` endpoint.
#[derive(Debug, Deserialize)]
struct AllOriginsEnvelope {
    #[serde(default)]
    contents: Option<String>,
}

#[async_trait]
impl FetchStrategy for AllOriginsRelay {
    fn name(&self) -> &'static str {
        "allorigins"
    }

    async fn attempt(&self, resource: &Url) -> Result<String, FetchError> {
        let response = no_cache(self.client.get(self.relay_url(resource)))
            .send()
            .await?;
        let envelope = ensure_success(response)?
            .json::<AllOriginsEnvelope>()
            .await
            .map_err(|e| FetchError::Envelope(e.to_string()))?;

        envelope
            .contents
            .ok_or_else(|| FetchError::Envelope("missing contents".to_string()))
    }
}
