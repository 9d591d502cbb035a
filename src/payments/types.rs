use crate::payments::error::PaymentError;
use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::str::FromStr;

/// Closed set of supported cashier providers. Unknown method strings are
/// rejected before any dispatch happens.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ProviderName {
    Praxis,
    Zota,
    Jmf,
    Smilepayz,
    SwiftGoldPay,
    NuveiHosted,
    NuveiConnect,
    Paypal,
    Luxtak,
    Paysolutions,
}

impl ProviderName {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderName::Praxis => "praxis",
            ProviderName::Zota => "zota",
            ProviderName::Jmf => "jmf",
            ProviderName::Smilepayz => "smilepayz",
            ProviderName::SwiftGoldPay => "swiftgoldpay",
            ProviderName::NuveiHosted => "nuvei",
            ProviderName::NuveiConnect => "nuvei_connect",
            ProviderName::Paypal => "paypal",
            ProviderName::Luxtak => "luxtak",
            ProviderName::Paysolutions => "paysolutions",
        }
    }

    pub fn all() -> &'static [ProviderName] {
        &[
            ProviderName::Praxis,
            ProviderName::Zota,
            ProviderName::Jmf,
            ProviderName::Smilepayz,
            ProviderName::SwiftGoldPay,
            ProviderName::NuveiHosted,
            ProviderName::NuveiConnect,
            ProviderName::Paypal,
            ProviderName::Luxtak,
            ProviderName::Paysolutions,
        ]
    }
}

impl std::fmt::Display for ProviderName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ProviderName {
    type Err = PaymentError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "praxis" | "card" => Ok(ProviderName::Praxis),
            "zota" => Ok(ProviderName::Zota),
            "jmf" => Ok(ProviderName::Jmf),
            "smilepayz" => Ok(ProviderName::Smilepayz),
            "swiftgoldpay" | "swift_gold_pay" | "sgp" => Ok(ProviderName::SwiftGoldPay),
            "nuvei" | "nuvei_hosted" | "nuvei-hosted" | "gpay" | "apple-pay-nuvei" => {
                Ok(ProviderName::NuveiHosted)
            }
            "nuvei_connect" | "nuvei-connect" | "simply_connect" => Ok(ProviderName::NuveiConnect),
            "paypal" => Ok(ProviderName::Paypal),
            "luxtak" => Ok(ProviderName::Luxtak),
            "paysolutions" => Ok(ProviderName::Paysolutions),
            _ => Err(PaymentError::UnsupportedMethod {
                method: value.trim().to_string(),
            }),
        }
    }
}

/// Monetary value in decimal major units. Amounts never touch floating
/// point; each adapter converts to its provider's unit convention.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Money {
    pub amount: Decimal,
    pub currency: String,
}

impl Money {
    pub fn new(amount: Decimal, currency: &str) -> Self {
        Self {
            amount,
            currency: currency.trim().to_uppercase(),
        }
    }

    pub fn validate_positive(&self) -> Result<(), PaymentError> {
        if self.amount <= Decimal::ZERO {
            return Err(PaymentError::Validation {
                message: "amount must be greater than zero".to_string(),
                field: Some("amount".to_string()),
            });
        }
        if self.currency.trim().is_empty() {
            return Err(PaymentError::Validation {
                message: "currency is required".to_string(),
                field: Some("currency".to_string()),
            });
        }
        Ok(())
    }

    /// Fixed two decimal places, e.g. "25.00".
    pub fn as_major_2dp(&self) -> String {
        format!("{:.2}", self.amount)
    }

    /// Up to two decimal places with trailing zeros trimmed, e.g. "25",
    /// "25.5".
    pub fn as_major_trimmed(&self) -> String {
        self.amount.round_dp(2).normalize().to_string()
    }

    /// Integer minor units (cents), truncated.
    pub fn as_minor_units(&self) -> i64 {
        (self.amount * Decimal::from(100)).trunc().to_i64().unwrap_or(0)
    }

    /// Integer major units, rounded to zero decimals.
    pub fn as_major_rounded(&self) -> i64 {
        self.amount.round().to_i64().unwrap_or(0)
    }
}

/// Card details forwarded by the cashier form. Only providers that charge
/// the card directly require them; never logged in clear.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardDetails {
    pub number: String,
    pub expiry_month: String,
    pub expiry_year: String,
    pub cvv: String,
    pub holder_name: String,
}

/// Normalized, provider-agnostic description of a requested payment.
/// Built per request, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub amount: Money,
    pub method: ProviderName,
    pub customer_name: String,
    pub customer_email: String,
    pub card: Option<CardDetails>,
}

/// Provider-agnostic result of attempting to create a payment.
///
/// Invariant: `success == true` requires `redirect_url` to be present.
/// A provider reporting success with no redirect target is reported as a
/// failure by the adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedOutcome {
    pub success: bool,
    pub redirect_url: Option<String>,
    pub provider_order_id: Option<String>,
    pub provider_transaction_id: Option<String>,
    pub error_message: Option<String>,
    pub raw_payload: Option<JsonValue>,
}

impl NormalizedOutcome {
    pub fn approved(redirect_url: String) -> Self {
        Self {
            success: true,
            redirect_url: Some(redirect_url),
            provider_order_id: None,
            provider_transaction_id: None,
            error_message: None,
            raw_payload: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            redirect_url: None,
            provider_order_id: None,
            provider_transaction_id: None,
            error_message: Some(message.into()),
            raw_payload: None,
        }
    }

    pub fn with_order_id(mut self, order_id: impl Into<String>) -> Self {
        self.provider_order_id = Some(order_id.into());
        self
    }

    pub fn with_transaction_id(mut self, transaction_id: impl Into<String>) -> Self {
        self.provider_transaction_id = Some(transaction_id.into());
        self
    }

    pub fn with_raw(mut self, raw: JsonValue) -> Self {
        self.raw_payload = Some(raw);
        self
    }
}

/// Lifecycle states of an order. `Timeout` is a query-time classification
/// of a stale `Pending` order and is never written to the store.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Completed,
    Failed,
    Timeout,
}

/// Mutable order record owned exclusively by the order store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderState {
    pub order_id: String,
    pub transaction_id: String,
    pub status: OrderStatus,
    pub callback_payload: Option<JsonValue>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Generates the internal order identifier for the card/generic flow:
/// 16 lowercase hex characters derived from a random UUID.
pub fn generate_order_id() -> String {
    let raw = uuid::Uuid::new_v4().simple().to_string();
    raw[..16].to_string()
}
