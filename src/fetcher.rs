//! Ordered fallback over fetch strategies.
//!
//! Strategies are tried one after another, never in parallel. The first one
//! to return a body containing the parser's validity marker wins and the rest
//! are never attempted. A failed attempt is logged and the next strategy is
//! tried immediately; there are no retries.

use reqwest::Url;
use tracing::{debug, error, warn};

use crate::data_sources::FetchStrategy;
use crate::error::{FetchError, SyncError, SyncResult};
use crate::parser::has_validity_marker;

/// Result of running the whole strategy chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// A strategy produced a usable payload.
    Payload {
        body: String,
        /// Name of the strategy that succeeded.
        strategy: &'static str,
    },

    /// Every strategy failed.
    Exhausted,
}

/// Runs a fixed, ordered list of strategies against one resource.
pub struct FallbackFetcher {
    strategies: Vec<Box<dyn FetchStrategy>>,
}

impl FallbackFetcher {
    /// Create a fetcher. At least one strategy is required.
    pub fn new(strategies: Vec<Box<dyn FetchStrategy>>) -> SyncResult<Self> {
        if strategies.is_empty() {
            return Err(SyncError::NoStrategies);
        }
        Ok(Self { strategies })
    }

    /// Names of the configured strategies, in order.
    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Fetch `resource` through the first strategy that works.
    ///
    /// Returns an error only when the resource itself is malformed; network
    /// trouble of any kind ends in [`FetchOutcome::Exhausted`].
    pub async fn fetch(&self, resource: &str) -> SyncResult<FetchOutcome> {
        let url = Url::parse(resource).map_err(|e| SyncError::InvalidResource {
            url: resource.to_string(),
            reason: e.to_string(),
        })?;

        for strategy in &self.strategies {
            match attempt_usable(strategy.as_ref(), &url).await {
                Ok(body) => {
                    debug!(
                        strategy = strategy.name(),
                        bytes = body.len(),
                        "Fetch strategy succeeded"
                    );
                    return Ok(FetchOutcome::Payload {
                        body,
                        strategy: strategy.name(),
                    });
                }
                Err(e) => {
                    warn!(
                        strategy = strategy.name(),
                        error = %e,
                        "Fetch strategy failed, trying next"
                    );
                }
            }
        }

        error!(
            resource = %url,
            strategies = self.strategies.len(),
            "All fetch strategies failed"
        );
        Ok(FetchOutcome::Exhausted)
    }
}

async fn attempt_usable(strategy: &dyn FetchStrategy, url: &Url) -> Result<String, FetchError> {
    let body = strategy.attempt(url).await?;
    if has_validity_marker(&body) {
        Ok(body)
    } else {
        Err(FetchError::Unusable)
    }
}
