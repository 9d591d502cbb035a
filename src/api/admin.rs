use crate::api::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

/// POST /api/config
///
/// Applies runtime credential overrides. Values are never echoed back or
/// logged; only the key names appear in the response.
pub async fn apply_overrides(
    State(state): State<Arc<AppState>>,
    Json(values): Json<HashMap<String, String>>,
) -> Response {
    let keys: Vec<String> = values.keys().cloned().collect();
    state.secrets.set_many(values);
    info!(keys = ?keys, "runtime config overrides applied");
    (
        StatusCode::OK,
        Json(serde_json::json!({ "updated": keys })),
    )
        .into_response()
}

/// GET /api/config
///
/// Lists which keys are overridden, with values masked.
pub async fn list_overrides(State(state): State<Arc<AppState>>) -> Response {
    let masked: HashMap<String, &'static str> = state
        .secrets
        .override_keys()
        .into_iter()
        .map(|k| (k, "********"))
        .collect();
    (StatusCode::OK, Json(serde_json::json!({ "overrides": masked }))).into_response()
}
