use crate::api::AppState;
use crate::error::AppError;
use crate::payments::error::PaymentError;
use crate::payments::types::{CardDetails, Money, PaymentIntent, ProviderName};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRequest {
    pub amount: String,
    pub currency: String,
    pub method: String,
    pub customer_name: String,
    pub customer_email: String,
    #[serde(default)]
    pub card_number: Option<String>,
    #[serde(default)]
    pub card_expiry_month: Option<String>,
    #[serde(default)]
    pub card_expiry_year: Option<String>,
    #[serde(default)]
    pub card_cvv: Option<String>,
    #[serde(default)]
    pub card_holder_name: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SubmitRequest {
    fn into_intent(self) -> Result<PaymentIntent, PaymentError> {
        let amount = Decimal::from_str(self.amount.trim()).map_err(|_| {
            PaymentError::Validation {
                message: format!("amount '{}' is not a valid decimal", self.amount),
                field: Some("amount".to_string()),
            }
        })?;
        let method = ProviderName::from_str(&self.method)?;
        let card = match (
            self.card_number,
            self.card_expiry_month,
            self.card_expiry_year,
            self.card_cvv,
        ) {
            (Some(number), Some(expiry_month), Some(expiry_year), Some(cvv)) => {
                Some(CardDetails {
                    number,
                    expiry_month,
                    expiry_year,
                    cvv,
                    holder_name: self.card_holder_name.unwrap_or_default(),
                })
            }
            _ => None,
        };
        Ok(PaymentIntent {
            amount: Money::new(amount, &self.currency),
            method,
            customer_name: self.customer_name,
            customer_email: self.customer_email,
            card,
        })
    }
}

/// POST /api/payments
pub async fn submit_payment(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SubmitRequest>,
) -> Result<Json<SubmitResponse>, AppError> {
    let intent = request.into_intent()?;
    let result = state.orchestrator.submit(&intent).await?;

    Ok(Json(SubmitResponse {
        success: result.outcome.success,
        payment_url: result.outcome.redirect_url,
        order_number: Some(result.order_id),
        transaction_id: result.outcome.provider_transaction_id,
        error: result.outcome.error_message,
    }))
}

#[derive(Debug, Deserialize)]
pub struct OrderQuery {
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    pub order_id: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
}

/// GET /api/payments/{order_id}
///
/// `timeout_secs` lets the cashier page poll with its own pending window
/// instead of the server default.
pub async fn get_order(
    State(state): State<Arc<AppState>>,
    Path(order_id): Path<String>,
    Query(query): Query<OrderQuery>,
) -> Response {
    match state.orchestrator.order_state(&order_id) {
        Some((order, status)) => {
            let status = match query.timeout_secs {
                Some(secs) => state
                    .store
                    .status_of(&order_id, std::time::Duration::from_secs(secs))
                    .unwrap_or(status),
                None => status,
            };
            info!(order_id = %order_id, status = ?status, "order status queried");
            let body = OrderResponse {
                order_id: order.order_id,
                status: format!("{:?}", status).to_lowercase(),
                transaction_id: if order.transaction_id.is_empty() {
                    None
                } else {
                    Some(order.transaction_id)
                },
                error_message: order.error_message,
                created_at: order.created_at.to_rfc3339(),
                completed_at: order.completed_at.map(|t| t.to_rfc3339()),
            };
            (StatusCode::OK, Json(body)).into_response()
        }
        None => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "status": "not_found", "orderId": order_id })),
        )
            .into_response(),
    }
}
