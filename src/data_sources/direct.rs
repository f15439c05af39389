//! Direct request to the origin, with no relay in between.

use async_trait::async_trait;
use reqwest::Url;

use super::{FetchStrategy, ensure_success, no_cache, with_cache_buster};
use crate::error::FetchError;

/// Fetches the resource from the origin itself.
#[derive(Clone)]
pub struct DirectFetch {
    client: reqwest::Client,
}

impl DirectFetch {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl FetchStrategy for DirectFetch {
    fn name(&self) -> &'static str {
        "direct"
    }

    async fn attempt(&self, resource: &Url) -> Result<String, FetchError> {
        let response = no_cache(self.client.get(with_cache_buster(resource)))
            .send()
            .await?;
        let body = ensure_success(response)?.text().await?;
        Ok(body)
    }
}
