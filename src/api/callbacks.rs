use crate::api::AppState;
use crate::payments::types::ProviderName;
use crate::services::reconciler::{normalize_callback_payload, ReconciliationResult};
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

/// POST /callbacks/{provider}
///
/// Always answers 200 regardless of the reconciliation outcome: several
/// PSPs retry aggressively on any non-2xx, and a dropped callback is
/// recoverable while a retry storm is not.
pub async fn handle_callback(
    State(state): State<Arc<AppState>>,
    Path(provider): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    body: Bytes,
) -> Response {
    let provider_hint = ProviderName::from_str(&provider).ok();
    let payload = normalize_callback_payload(&body, &query);

    state.comm_log.log(
        "callback-received",
        serde_json::json!({ "provider": provider, "payload": payload }),
        "callback",
    );

    let result = state.reconciler.reconcile(provider_hint, &payload);
    info!(provider = %provider, result = ?result, "callback reconciled");

    let body = match result {
        ReconciliationResult::Matched { order_id, .. } => {
            serde_json::json!({ "matched": true, "orderId": order_id })
        }
        ReconciliationResult::Fallback { order_id } => {
            serde_json::json!({ "matched": true, "orderId": order_id, "fallback": true })
        }
        ReconciliationResult::NoMatch => serde_json::json!({ "matched": false }),
    };
    (StatusCode::OK, Json(body)).into_response()
}
