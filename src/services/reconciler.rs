//! Callback reconciliation.
//!
//! Providers report settlement on wildly different schemas. The
//! reconciler extracts candidate order identifiers and a status string
//! from a normalized callback payload, matches them against the order
//! store, and applies the mapped transition. When the callback carries
//! no identifier at all but names a provider and reports success, the
//! most recently created pending order inside a short window is settled
//! instead; that heuristic can misattribute under concurrency and is
//! surfaced as `Fallback` so the caller can log it distinctly. A
//! callback whose explicit identifier matches nothing is dropped.

use crate::payments::types::{OrderStatus, ProviderName};
use crate::services::order_store::OrderStore;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

const ID_KEYS: &[&str] = &[
    "order_id",
    "orderId",
    "orderID",
    "merchantOrderID",
    "merchant_unique_id",
    "out_trade_no",
    "orderNo",
    "order_number",
    "orderNumber",
    "referenceNo",
    "reference_id",
    "referenceId",
    "refno",
    "clientUniqueId",
    "clientRequestId",
    "custom_id",
];

const STATUS_KEYS: &[&str] = &[
    "status",
    "trade_status",
    "transaction_status",
    "payment_status",
    "order_status",
    "statusCode",
    "ppp_status",
    "result",
];

// Objects worth descending into one level when probing for fields.
const NESTED_KEYS: &[&str] = &["data", "response", "session", "transaction", "order"];

/// Status of a callback after vocabulary mapping. Strings outside the
/// known sets map to `Unknown` and are never treated as success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackStatus {
    Completed,
    Failed,
    Pending,
    Unknown,
}

pub fn map_status(raw: &str) -> CallbackStatus {
    match raw.trim().to_lowercase().as_str() {
        "success" | "succeeded" | "successful" | "approved" | "completed" | "complete"
        | "paid" | "settled" | "captured" | "trade_success" | "payment_success" | "ok"
        | "s-2000" | "10000" | "1" => CallbackStatus::Completed,
        "failed" | "failure" | "declined" | "rejected" | "error" | "cancelled" | "canceled"
        | "expired" | "trade_failed" | "chargeback" => CallbackStatus::Failed,
        "pending" | "processing" | "in_progress" | "created" | "initiated" | "waiting"
        | "open" | "trade_pending" | "unpaid" => CallbackStatus::Pending,
        _ => CallbackStatus::Unknown,
    }
}

/// How a callback was applied to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconciliationResult {
    /// An extracted identifier matched a stored order.
    Matched {
        order_id: String,
        status: OrderStatus,
    },
    /// The callback carried no identifier; the most recent pending
    /// order was settled on the strength of the provider hint alone.
    Fallback { order_id: String },
    /// Nothing matched; the callback was acknowledged and dropped.
    NoMatch,
}

pub struct CallbackReconciler {
    store: Arc<OrderStore>,
    recency_window: Duration,
}

impl CallbackReconciler {
    pub fn new(store: Arc<OrderStore>, recency_window: Duration) -> Self {
        Self {
            store,
            recency_window,
        }
    }

    /// Applies a callback payload. Safe to call repeatedly with the same
    /// payload: completion keeps its original timestamp and the fallback
    /// only fires while a pending order exists in the window.
    pub fn reconcile(
        &self,
        provider: Option<ProviderName>,
        payload: &JsonValue,
    ) -> ReconciliationResult {
        let ids = extract_candidate_ids(payload);
        let status = extract_status(payload)
            .map(|raw| map_status(&raw))
            .unwrap_or(CallbackStatus::Unknown);

        for id in &ids {
            if self.store.get(id).is_some() {
                return self.apply(id, status, payload);
            }
        }

        // The recency guess is reserved for callbacks that carry no
        // identifier at all. A callback with an explicit id that matches
        // nothing belongs to some other deployment or a pre-restart
        // order; settling a different order with its payload would be
        // worse than dropping it.
        if ids.is_empty() && provider.is_some() && status == CallbackStatus::Completed {
            if let Some(pending) = self.store.most_recent_pending(self.recency_window) {
                warn!(
                    order_id = %pending.order_id,
                    provider = ?provider,
                    candidate_ids = ?ids,
                    "callback matched by recency fallback, not by identifier"
                );
                self.store
                    .mark_completed(&pending.order_id, payload.clone());
                return ReconciliationResult::Fallback {
                    order_id: pending.order_id,
                };
            }
        }

        warn!(
            provider = ?provider,
            candidate_ids = ?ids,
            "callback matched no stored order"
        );
        ReconciliationResult::NoMatch
    }

    fn apply(
        &self,
        order_id: &str,
        status: CallbackStatus,
        payload: &JsonValue,
    ) -> ReconciliationResult {
        match status {
            CallbackStatus::Completed => {
                self.store.mark_completed(order_id, payload.clone());
                info!(order_id = order_id, "callback settled order as completed");
                ReconciliationResult::Matched {
                    order_id: order_id.to_string(),
                    status: OrderStatus::Completed,
                }
            }
            CallbackStatus::Failed => {
                self.store.mark_failed(order_id, "provider reported failure");
                ReconciliationResult::Matched {
                    order_id: order_id.to_string(),
                    status: OrderStatus::Failed,
                }
            }
            CallbackStatus::Pending => {
                // Intermediate notification; the order stays as it is.
                ReconciliationResult::Matched {
                    order_id: order_id.to_string(),
                    status: OrderStatus::Pending,
                }
            }
            CallbackStatus::Unknown => {
                self.store
                    .mark_failed(order_id, "unrecognized status in provider callback");
                warn!(order_id = order_id, "callback carried an unknown status");
                ReconciliationResult::Matched {
                    order_id: order_id.to_string(),
                    status: OrderStatus::Failed,
                }
            }
        }
    }
}

/// Normalizes a raw callback body into a JSON object. Providers send
/// JSON, form-urlencoded bodies, or nothing but query parameters; the
/// query pairs are merged in under their own keys without overwriting
/// body fields.
pub fn normalize_callback_payload(
    body: &[u8],
    query: &HashMap<String, String>,
) -> JsonValue {
    let mut value = if body.is_empty() {
        JsonValue::Object(serde_json::Map::new())
    } else if let Ok(json) = serde_json::from_slice::<JsonValue>(body) {
        json
    } else if let Ok(form) = serde_urlencoded::from_bytes::<HashMap<String, String>>(body) {
        JsonValue::Object(
            form.into_iter()
                .map(|(k, v)| (k, JsonValue::String(v)))
                .collect(),
        )
    } else {
        JsonValue::Object(serde_json::Map::new())
    };

    if let JsonValue::Object(map) = &mut value {
        for (k, v) in query {
            map.entry(k.clone())
                .or_insert_with(|| JsonValue::String(v.clone()));
        }
    }
    value
}

fn value_as_id(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        JsonValue::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn extract_candidate_ids(payload: &JsonValue) -> Vec<String> {
    let mut ids = Vec::new();
    let mut push_from = |node: &JsonValue| {
        for key in ID_KEYS {
            if let Some(id) = node.get(*key).and_then(value_as_id) {
                if !ids.contains(&id) {
                    ids.push(id);
                }
            }
        }
    };
    push_from(payload);
    for key in NESTED_KEYS {
        if let Some(node) = payload.get(*key) {
            push_from(node);
        }
    }
    ids
}

fn extract_status(payload: &JsonValue) -> Option<String> {
    let probe = |node: &JsonValue| {
        for key in STATUS_KEYS {
            if let Some(raw) = node.get(*key) {
                match raw {
                    JsonValue::String(s) if !s.trim().is_empty() => {
                        return Some(s.trim().to_string())
                    }
                    JsonValue::Number(n) => return Some(n.to_string()),
                    _ => {}
                }
            }
        }
        None
    };
    if let Some(status) = probe(payload) {
        return Some(status);
    }
    for key in NESTED_KEYS {
        if let Some(status) = payload.get(*key).and_then(|n| probe(n)) {
            return Some(status);
        }
    }
    None
}
