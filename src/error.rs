//! Error types for the acquisition pipeline.
//!
//! Two levels exist. [`FetchError`] describes why a single strategy attempt
//! failed; the fetcher logs it and moves on, so it never reaches callers.
//! [`SyncError`] is a failure of the cycle itself and surfaces as
//! [`SyncStatus::SynchronizerFailure`](crate::model::SyncStatus).

use reqwest::StatusCode;

/// Why one strategy attempt did not produce a usable payload.
#[derive(thiserror::Error, Debug)]
pub enum FetchError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("upstream responded with status {0}")]
    Status(StatusCode),

    #[error("relay envelope could not be decoded: {0}")]
    Envelope(String),

    #[error("payload does not contain the validity marker")]
    Unusable,
}

/// A failure of the acquisition cycle that is not a clean network failure.
#[derive(thiserror::Error, Debug)]
pub enum SyncError {
    #[error("invalid resource url '{url}': {reason}")]
    InvalidResource { url: String, reason: String },

    #[error("no fetch strategies configured")]
    NoStrategies,

    #[error("acquisition task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Convenience result type for cycle-level operations.
pub type SyncResult<T> = Result<T, SyncError>;
