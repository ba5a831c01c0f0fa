//! HTTP request handlers.

use super::AppState;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::Deserialize;
use serde_json::json;

const DEFAULT_REPORT_HOURS: u32 = 24;
const DEFAULT_RECENT_LIMIT: u32 = 20;
const MAX_RECENT_LIMIT: u32 = 500;

// ============================================================================
// Reports
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ReportQuery {
    #[serde(default)]
    pub hours: Option<u32>,
    #[serde(default)]
    pub target: Option<String>,
}

pub async fn handle_status(
    State(state): State<AppState>,
    Query(query): Query<ReportQuery>,
) -> impl IntoResponse {
    let hours = query.hours.unwrap_or(DEFAULT_REPORT_HOURS);
    Json(state.monitor.get_report(hours, query.target.as_deref()))
}

#[derive(Debug, Deserialize)]
pub struct UptimeQuery {
    #[serde(default)]
    pub target: Option<String>,
}

pub async fn handle_uptime(
    State(state): State<AppState>,
    Query(query): Query<UptimeQuery>,
) -> impl IntoResponse {
    Json(state.monitor.uptime_summary(query.target.as_deref()))
}

// ============================================================================
// Checks
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct RecentQuery {
    #[serde(default)]
    pub limit: Option<u32>,
}

pub async fn handle_recent(
    State(state): State<AppState>,
    Query(query): Query<RecentQuery>,
) -> impl IntoResponse {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_RECENT_LIMIT)
        .min(MAX_RECENT_LIMIT);
    Json(state.monitor.recent(limit))
}

#[derive(Debug, Deserialize)]
pub struct CheckRequest {
    pub url: String,
}

pub async fn handle_check(
    State(state): State<AppState>,
    Json(req): Json<CheckRequest>,
) -> impl IntoResponse {
    match state.monitor.run_on_demand_probe(&req.url).await {
        Ok(record) => Json(record).into_response(),
        Err(e) => {
            (StatusCode::BAD_REQUEST, Json(json!({ "error": e.to_string() }))).into_response()
        }
    }
}

// ============================================================================
// Health
// ============================================================================

pub async fn handle_health(State(state): State<AppState>) -> impl IntoResponse {
    match state.monitor.total_checks() {
        Ok(total) => Json(json!({ "status": "healthy", "total_checks": total })).into_response(),
        Err(e) => {
            tracing::error!("Health check failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "status": "unhealthy", "error": e.to_string() })),
            )
                .into_response()
        }
    }
}
