//! HTTP read interface for Apex Stats.
//!
//! This is the narrow surface a renderer talks to. It can read the current
//! view and ask for a refresh; it cannot write anything else into the pipeline.
//!
//! - `GET /stats`: snapshot, trends, history and status in one document
//! - `GET /history`: just the seven-point series
//! - `POST /refresh`: start a refresh cycle in the background
//! - `GET /health`: liveness

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{info, instrument};

use crate::model::{HistoryPoint, Snapshot, StatsView, SyncStatus, TrendBoard};
use crate::service::AcquisitionService;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<AcquisitionService>,
}

/// Build the router with all routes and request tracing.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/stats", get(get_stats))
        .route("/history", get(get_history))
        .route("/refresh", post(post_refresh))
        .route("/health", get(health_check))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}

/// Country entry as served, with its flag code resolved.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CountryView {
    pub name: String,
    pub count: u64,
    pub percentage: u8,
    pub flag_code: Option<&'static str>,
}

/// Snapshot as served.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotView {
    pub online: u64,
    pub today: u64,
    pub new_users: u64,
    pub all_time: u64,
    pub countries: Vec<CountryView>,
    pub captured_at: DateTime<Utc>,
}

impl From<Snapshot> for SnapshotView {
    fn from(snapshot: Snapshot) -> Self {
        Self {
            online: snapshot.online,
            today: snapshot.today,
            new_users: snapshot.new_users,
            all_time: snapshot.all_time,
            countries: snapshot
                .countries
                .into_iter()
                .map(|c| CountryView {
                    flag_code: c.flag_code(),
                    name: c.name,
                    count: c.count,
                    percentage: c.percentage,
                })
                .collect(),
            captured_at: snapshot.captured_at,
        }
    }
}

/// Response for GET /stats.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    pub snapshot: Option<SnapshotView>,
    pub trends: TrendBoard,
    pub history: Vec<HistoryPoint>,
    pub status: Option<SyncStatus>,
    pub error: Option<String>,
    pub syncing: bool,
    pub last_attempt: Option<DateTime<Utc>>,
}

impl From<StatsView> for StatsResponse {
    fn from(view: StatsView) -> Self {
        Self {
            snapshot: view.snapshot.map(SnapshotView::from),
            trends: view.trends,
            history: view.history,
            status: view.status,
            error: view.error,
            syncing: view.syncing,
            last_attempt: view.last_attempt,
        }
    }
}

/// GET /stats - Current snapshot and everything derived from it.
///
/// # Response
///
/// ```json
/// {
///     "snapshot": {
///         "online": 5, "today": 12, "newUsers": 2, "allTime": 900,
///         "countries": [{ "name": "Mexico", "count": 3, "percentage": 75, "flagCode": "mx" }],
///         "capturedAt": "2024-03-10T12:00:00Z"
///     },
///     "trends": { "online": { "magnitude": 50.0, "direction": "up" }, ... },
///     "history": [{ "dayLabel": "Mon", "current": 4, "peak": 9 }, ...],
///     "status": "fresh",
///     "error": null,
///     "syncing": false,
///     "lastAttempt": "2024-03-10T12:00:00Z"
/// }
/// ```
#[instrument(skip(state))]
pub async fn get_stats(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(state.service.view().await.into())
}

/// GET /history - The seven-point history series, oldest first.
#[instrument(skip(state))]
pub async fn get_history(State(state): State<AppState>) -> Json<Vec<HistoryPoint>> {
    Json(state.service.history().await)
}

/// POST /refresh - Start a refresh cycle.
///
/// Returns `202 Accepted` immediately; the result shows up in `GET /stats`.
/// A refresh requested while one is running is folded into it.
#[instrument(skip(state))]
pub async fn post_refresh(State(state): State<AppState>) -> impl IntoResponse {
    info!(already_syncing = state.service.is_syncing(), "Refresh requested");
    state.service.trigger_refresh();
    StatusCode::ACCEPTED
}

/// GET /health - Simple health check endpoint.
pub async fn health_check() -> impl IntoResponse {
    StatusCode::OK
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    use super::*;
    use crate::fetcher::FallbackFetcher;
    use crate::fetcher::tests::{Script, ScriptedStrategy};
    use crate::history::HistoryStore;
    use crate::model::CountryStat;
    use crate::storage::MemoryBackend;

    fn app() -> Router {
        let (only, _) = ScriptedStrategy::boxed("only", Script::Status(503));
        let service = AcquisitionService::new(
            FallbackFetcher::new(vec![only]).unwrap(),
            "https://stats.example.com/api/stats",
            HistoryStore::new(Arc::new(MemoryBackend::new()), "test.history"),
        );
        router(AppState {
            service: Arc::new(service),
        })
    }

    #[tokio::test]
    async fn test_health_route() {
        let response = app()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_refresh_requires_post() {
        let response = app()
            .oneshot(Request::get("/refresh").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[test]
    fn test_snapshot_view_resolves_flags() {
        let snapshot = Snapshot {
            countries: vec![
                CountryStat {
                    name: "Brazil".to_string(),
                    count: 3,
                    percentage: 75,
                },
                CountryStat {
                    name: "Narnia".to_string(),
                    count: 1,
                    percentage: 25,
                },
            ],
            ..Snapshot::empty(Utc::now())
        };

        let view = SnapshotView::from(snapshot);

        assert_eq!(view.countries[0].flag_code, Some("br"));
        assert_eq!(view.countries[1].flag_code, None);
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["countries"][0]["flagCode"], "br");
    }
}
