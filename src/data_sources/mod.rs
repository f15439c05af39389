//! Acquisition strategies for the upstream status feed.
//!
//! The feed is one logical resource, but reaching it directly is unreliable,
//! so each strategy here is a different network path to the same URL:
//!
//! - [`allorigins`]: AllOrigins relay, wraps the body in a JSON envelope
//! - [`corsproxy`]: corsproxy.io relay, passes the body through as text
//! - [`direct`]: plain request to the origin
//!
//! Every strategy defeats caches on its own: it appends a fresh `t=` query
//! parameter to the resource URL and sends no-cache request headers.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::{CACHE_CONTROL, EXPIRES, HeaderMap, HeaderValue, PRAGMA};
use reqwest::{RequestBuilder, Response, Url};

use crate::error::FetchError;

pub mod allorigins;
pub mod corsproxy;
pub mod direct;

pub use allorigins::AllOriginsRelay;
pub use corsproxy::CorsProxyRelay;
pub use direct::DirectFetch;

/// Query parameter carrying the cache-busting value.
const CACHE_BUST_PARAM: &str = "t";

/// Last cache-bust value handed out, in epoch milliseconds.
static LAST_CACHE_BUST: AtomicI64 = AtomicI64::new(0);

/// One way of reaching the upstream resource.
#[async_trait]
pub trait FetchStrategy: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Make a single attempt to fetch `resource`, returning the raw body.
    async fn attempt(&self, resource: &Url) -> Result<String, FetchError>;
}

/// Build the HTTP client shared by all strategies.
///
/// The timeout applies to each attempt as a whole, so a hung relay cannot
/// stall the rest of the chain.
pub fn http_client(attempt_timeout: Duration) -> anyhow::Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .timeout(attempt_timeout)
        .default_headers(no_cache_headers())
        .build()?;
    Ok(client)
}

/// The production strategy order: both relays first, direct last.
pub fn default_strategies(client: reqwest::Client) -> Vec<Box<dyn FetchStrategy>> {
    vec![
        Box::new(AllOriginsRelay::new(client.clone())),
        Box::new(CorsProxyRelay::new(client.clone())),
        Box::new(DirectFetch::new(client)),
    ]
}

fn no_cache_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        CACHE_CONTROL,
        HeaderValue::from_static("no-cache, no-store, must-revalidate"),
    );
    headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));
    headers.insert(EXPIRES, HeaderValue::from_static("0"));
    headers
}

/// Attach the no-cache headers to a single request.
///
/// Clients built by [`http_client`] already send them; strategies apply them
/// again so a caller-provided client behaves the same.
pub(crate) fn no_cache(request: RequestBuilder) -> RequestBuilder {
    request.headers(no_cache_headers())
}

/// Copy of `resource` with a cache-busting query parameter that differs on every call.
pub fn with_cache_buster(resource: &Url) -> Url {
    let mut busted = resource.clone();
    busted
        .query_pairs_mut()
        .append_pair(CACHE_BUST_PARAM, &next_cache_bust().to_string());
    busted
}

/// Current epoch millis, bumped past the last issued value if the clock has not moved.
fn next_cache_bust() -> i64 {
    let now = Utc::now().timestamp_millis();
    let previous = LAST_CACHE_BUST
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
            Some(now.max(last + 1))
        })
        .unwrap_or(now);
    now.max(previous + 1)
}

/// Reject non-success responses.
pub(crate) fn ensure_success(response: Response) -> Result<Response, FetchError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(FetchError::Status(status))
    }
}
