//! Apex Stats - resilient acquisition and trend tracking for a plaintext status feed.
//!
//! # Overview
//!
//! The upstream feed is a short line of text (`Online: 5 / Today: 12 / ...`)
//! that is only reliably reachable through third-party relays. This crate
//! fetches it through an ordered chain of network paths, parses it into a
//! typed [`model::Snapshot`], and derives per-metric trends plus a rolling
//! seven-day history that survives restarts.
//!
//! # Pipeline
//!
//! ```text
//! AcquisitionService ─▶ FallbackFetcher ─▶ [AllOrigins, corsproxy, direct]
//!        │                    │
//!        │                    ▼
//!        │               parse_stats_text ─▶ Snapshot
//!        ▼
//!   update_trends + HistoryStore ─▶ StatsView
//! ```
//!
//! # Modules
//!
//! - [`model`]: Snapshot, trend and history types
//! - [`parser`]: Tolerant text parser
//! - [`data_sources`]: Fetch strategies (relays and direct)
//! - [`fetcher`]: Ordered fallback over strategies
//! - [`aggregation`]: Trend computation
//! - [`history`]: Day-bucketed rolling history
//! - [`storage`]: Persistence backends for the history blob
//! - [`service`]: Single-flight refresh cycle and read model
//! - [`api`]: HTTP read interface
//! - [`config`]: Environment configuration
//! - [`error`]: Error types

pub mod aggregation;
pub mod api;
pub mod config;
pub mod data_sources;
pub mod error;
pub mod fetcher;
pub mod history;
pub mod model;
pub mod parser;
pub mod service;
pub mod storage;
