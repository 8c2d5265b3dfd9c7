use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;

use crate::outage::{FetchError, OutageCategory};
use crate::refresh::ControllerSnapshot;
use crate::registry::OutageRegistry;

/// State label shown when the last result reports no outage.
pub const NO_OUTAGE_STATE: &str = "Няма аварии";

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<OutageRegistry>,
}

impl AppState {
    pub fn new(registry: Arc<OutageRegistry>) -> Self {
        Self { registry }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/outages", get(list_outages))
        .route("/outages/{identifier}", get(get_outage))
        .route("/outages/{identifier}/refresh", post(refresh_outage))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

/// Consumer-facing view of one identifier: the cached result plus
/// availability and scheduling info.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusView {
    pub identifier: String,
    /// False when the last refresh failed; the result below is then stale.
    pub available: bool,
    pub state: String,
    pub has_outage: bool,
    pub category: OutageCategory,
    pub outage_type: String,
    pub details: Vec<String>,
    pub last_check: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
    pub next_check: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub policy: Option<String>,
}

impl From<&ControllerSnapshot> for StatusView {
    fn from(s: &ControllerSnapshot) -> Self {
        let r = s.result.as_ref();
        let category = r.map(|r| r.category).unwrap_or(OutageCategory::Unknown);
        let state = match r {
            Some(r) if r.has_outage => r.category.label().to_string(),
            Some(_) => NO_OUTAGE_STATE.to_string(),
            None => OutageCategory::Unknown.label().to_string(),
        };
        Self {
            identifier: s.identifier.clone(),
            available: s.last_update_success,
            state,
            has_outage: r.is_some_and(|r| r.has_outage),
            category,
            outage_type: category.label().to_string(),
            details: r.map(|r| r.details.clone()).unwrap_or_default(),
            last_check: r.map(|r| {
                r.fetched_at
                    .with_timezone(&Local)
                    .format("%Y-%m-%d %H:%M:%S")
                    .to_string()
            }),
            timestamp: r.map(|r| r.fetched_at),
            next_check: s.next_refresh_at,
            last_error: s.last_error.as_ref().map(|e| e.to_string()),
            policy: r.map(|r| r.policy.clone()),
        }
    }
}

#[derive(Debug)]
pub enum ApiError {
    UnknownIdentifier(String),
    Refresh(FetchError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            ApiError::UnknownIdentifier(id) => (
                StatusCode::NOT_FOUND,
                serde_json::json!({
                    "error": format!("identifier {id} is not registered"),
                    "kind": "not_found",
                }),
            ),
            ApiError::Refresh(e) => {
                let status = match e {
                    FetchError::Timeout => StatusCode::GATEWAY_TIMEOUT,
                    _ => StatusCode::BAD_GATEWAY,
                };
                (
                    status,
                    serde_json::json!({ "error": e.to_string(), "kind": e.kind() }),
                )
            }
        };
        (status, Json(body)).into_response()
    }
}

async fn list_outages(State(state): State<AppState>) -> Json<Vec<StatusView>> {
    let views = state
        .registry
        .snapshots()
        .iter()
        .map(StatusView::from)
        .collect();
    Json(views)
}

async fn get_outage(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
) -> Result<Json<StatusView>, ApiError> {
    let controller = state
        .registry
        .get(&identifier)
        .ok_or(ApiError::UnknownIdentifier(identifier))?;
    Ok(Json(StatusView::from(&controller.snapshot())))
}

/// On-demand refresh. Joins an attempt already in flight for the identifier.
async fn refresh_outage(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
) -> Result<Json<StatusView>, ApiError> {
    let controller = state
        .registry
        .get(&identifier)
        .ok_or(ApiError::UnknownIdentifier(identifier))?;
    controller.refresh().await.map_err(ApiError::Refresh)?;
    Ok(Json(StatusView::from(&controller.snapshot())))
}
