//! API-boundary error type.

use crate::payments::error::PaymentError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

/// Wrapper carrying domain errors across the HTTP boundary. The response
/// body uses `user_message()`, so configuration detail stays in the logs.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Payment(#[from] PaymentError),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Payment(err) => StatusCode::from_u16(err.http_status_code())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            AppError::Payment(err) => err.user_message(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "success": false,
            "error": self.user_message(),
        });
        (self.status_code(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payment_errors_map_to_their_http_status() {
        let err = AppError::from(PaymentError::UnsupportedMethod {
            method: "skrill".to_string(),
        });
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);

        let err = AppError::from(PaymentError::Timeout {
            provider: "zota".to_string(),
            seconds: 30,
        });
        assert_eq!(err.status_code(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[test]
    fn configuration_detail_stays_out_of_the_body() {
        let err = AppError::from(PaymentError::missing_config("praxis", "PRAXIS_MERCHANT_SECRET"));
        assert_eq!(err.user_message(), "Payment initialization failed");
    }
}
