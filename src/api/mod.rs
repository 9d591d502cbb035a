pub mod admin;
pub mod callbacks;
pub mod payments;

use crate::services::comm_log::CommLogSink;
use crate::services::orchestrator::PaymentOrchestrator;
use crate::services::order_store::OrderStore;
use crate::services::reconciler::CallbackReconciler;
use crate::services::runtime_config::RuntimeConfigStore;
use axum::routing::{get, post};
use axum::{Json, Router};
use std::sync::Arc;

/// Shared handler state: the orchestrator, the reconciler, and the
/// stores they operate on.
pub struct AppState {
    pub orchestrator: Arc<PaymentOrchestrator>,
    pub reconciler: Arc<CallbackReconciler>,
    pub store: Arc<OrderStore>,
    pub secrets: Arc<RuntimeConfigStore>,
    pub comm_log: CommLogSink,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/payments", post(payments::submit_payment))
        .route("/api/payments/{order_id}", get(payments::get_order))
        .route("/callbacks/{provider}", post(callbacks::handle_callback))
        .route(
            "/api/config",
            get(admin::list_overrides).post(admin::apply_overrides),
        )
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
