use crate::payments::types::{OrderState, OrderStatus};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use dashmap::DashMap;
use serde_json::Value as JsonValue;
use std::time::Duration;
use tracing::info;

/// In-memory, sharded order map. The only shared mutable state in the
/// service; every transition is an atomic per-key upsert, so a callback
/// and the submit path can interleave freely without losing writes.
///
/// Entries are never deleted and live for the process lifetime.
#[derive(Debug, Default)]
pub struct OrderStore {
    orders: DashMap<String, OrderState>,
}

impl OrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a dispatched payment. If a callback already landed for this
    /// key (possible under extreme races), its terminal status and payload
    /// are kept; only the transaction id is filled in.
    pub fn create_pending(&self, order_id: &str, transaction_id: &str) {
        let now = Utc::now();
        self.orders
            .entry(order_id.to_string())
            .and_modify(|order| {
                if order.transaction_id.is_empty() {
                    order.transaction_id = transaction_id.to_string();
                }
            })
            .or_insert_with(|| OrderState {
                order_id: order_id.to_string(),
                transaction_id: transaction_id.to_string(),
                status: OrderStatus::Pending,
                callback_payload: None,
                error_message: None,
                created_at: now,
                completed_at: None,
            });
        info!(order_id = order_id, "order recorded as pending");
    }

    /// Applies a matched callback. Upsert semantics: a callback arriving
    /// before `create_pending` inserts the record rather than being lost.
    /// Re-applying an identical callback keeps the original completion
    /// timestamp, so retries from the PSP are harmless.
    pub fn mark_completed(&self, order_id: &str, payload: JsonValue) {
        let now = Utc::now();
        self.orders
            .entry(order_id.to_string())
            .and_modify(|order| {
                if order.status != OrderStatus::Completed {
                    order.completed_at = Some(now);
                }
                order.status = OrderStatus::Completed;
                order.callback_payload = Some(payload.clone());
                order.error_message = None;
            })
            .or_insert_with(|| OrderState {
                order_id: order_id.to_string(),
                transaction_id: String::new(),
                status: OrderStatus::Completed,
                callback_payload: Some(payload),
                error_message: None,
                created_at: now,
                completed_at: Some(now),
            });
        info!(order_id = order_id, "order marked completed");
    }

    pub fn mark_failed(&self, order_id: &str, reason: &str) {
        let now = Utc::now();
        self.orders
            .entry(order_id.to_string())
            .and_modify(|order| {
                order.status = OrderStatus::Failed;
                order.error_message = Some(reason.to_string());
            })
            .or_insert_with(|| OrderState {
                order_id: order_id.to_string(),
                transaction_id: String::new(),
                status: OrderStatus::Failed,
                callback_payload: None,
                error_message: Some(reason.to_string()),
                created_at: now,
                completed_at: None,
            });
        info!(order_id = order_id, reason = reason, "order marked failed");
    }

    pub fn set_transaction_id(&self, order_id: &str, transaction_id: &str) {
        if let Some(mut order) = self.orders.get_mut(order_id) {
            order.transaction_id = transaction_id.to_string();
        }
    }

    pub fn get(&self, order_id: &str) -> Option<OrderState> {
        self.orders.get(order_id).map(|o| o.clone())
    }

    /// Query-time status classification: a Pending order older than
    /// `pending_timeout` reads as Timeout. Nothing is written; the server
    /// never proactively expires entries.
    pub fn status_of(&self, order_id: &str, pending_timeout: Duration) -> Option<OrderStatus> {
        let order = self.orders.get(order_id)?;
        if order.status == OrderStatus::Pending && Self::older_than(order.created_at, pending_timeout)
        {
            return Some(OrderStatus::Timeout);
        }
        Some(order.status)
    }

    /// Most recently created Pending order within `max_age`. O(n) scan
    /// over the live set; used only as the callback-less fallback.
    pub fn most_recent_pending(&self, max_age: Duration) -> Option<OrderState> {
        self.orders
            .iter()
            .filter(|o| {
                o.status == OrderStatus::Pending && !Self::older_than(o.created_at, max_age)
            })
            .max_by_key(|o| o.created_at)
            .map(|o| o.clone())
    }

    /// Most recently completed order within `max_age`, by completion time.
    pub fn most_recent_completed(&self, max_age: Duration) -> Option<OrderState> {
        self.orders
            .iter()
            .filter(|o| {
                o.status == OrderStatus::Completed
                    && o.completed_at
                        .map(|t| !Self::older_than(t, max_age))
                        .unwrap_or(false)
            })
            .max_by_key(|o| o.completed_at)
            .map(|o| o.clone())
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    fn older_than(instant: DateTime<Utc>, age: Duration) -> bool {
        let age = ChronoDuration::from_std(age).unwrap_or(ChronoDuration::MAX);
        Utc::now() - instant > age
    }

    #[cfg(test)]
    pub(crate) fn insert_raw(&self, state: OrderState) {
        self.orders.insert(state.order_id.clone(), state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aged_pending(order_id: &str, age_secs: i64) -> OrderState {
        OrderState {
            order_id: order_id.to_string(),
            transaction_id: "tx".to_string(),
            status: OrderStatus::Pending,
            callback_payload: None,
            error_message: None,
            created_at: Utc::now() - ChronoDuration::seconds(age_secs),
            completed_at: None,
        }
    }

    #[test]
    fn created_order_reads_back_as_pending() {
        let store = OrderStore::new();
        store.create_pending("abc123", "tx-1");
        let order = store.get("abc123").expect("order exists");
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.transaction_id, "tx-1");
        assert_eq!(
            store.status_of("abc123", Duration::from_secs(1800)),
            Some(OrderStatus::Pending)
        );
    }

    #[test]
    fn callback_before_create_is_not_lost() {
        let store = OrderStore::new();
        store.mark_completed("early", serde_json::json!({"status": "SUCCESS"}));
        // The submit path lands afterwards; the terminal status survives.
        store.create_pending("early", "tx-9");
        let order = store.get("early").expect("order exists");
        assert_eq!(order.status, OrderStatus::Completed);
        assert_eq!(order.transaction_id, "tx-9");
        assert!(order.callback_payload.is_some());
    }

    #[test]
    fn completion_is_idempotent_under_retries() {
        let store = OrderStore::new();
        store.create_pending("abc123", "tx-1");
        let payload = serde_json::json!({"status": "SUCCESS", "tid": "99"});
        store.mark_completed("abc123", payload.clone());
        let first = store.get("abc123").expect("order exists");

        store.mark_completed("abc123", payload.clone());
        let second = store.get("abc123").expect("order exists");

        assert_eq!(second.status, OrderStatus::Completed);
        assert_eq!(second.callback_payload, Some(payload));
        assert_eq!(second.completed_at, first.completed_at);
    }

    #[test]
    fn failure_records_the_reason() {
        let store = OrderStore::new();
        store.create_pending("abc123", "tx-1");
        store.mark_failed("abc123", "declined by provider");
        let order = store.get("abc123").expect("order exists");
        assert_eq!(order.status, OrderStatus::Failed);
        assert_eq!(order.error_message.as_deref(), Some("declined by provider"));
    }

    #[test]
    fn stale_pending_classifies_as_timeout_without_mutation() {
        let store = OrderStore::new();
        store.insert_raw(aged_pending("old", 3600));
        assert_eq!(
            store.status_of("old", Duration::from_secs(1800)),
            Some(OrderStatus::Timeout)
        );
        // The stored record is untouched.
        assert_eq!(store.get("old").expect("exists").status, OrderStatus::Pending);
    }

    #[test]
    fn most_recent_pending_respects_the_window() {
        let store = OrderStore::new();
        store.insert_raw(aged_pending("older", 600));
        store.insert_raw(aged_pending("newer", 300));
        store.insert_raw(aged_pending("ancient", 2400));

        let hit = store
            .most_recent_pending(Duration::from_secs(1800))
            .expect("a pending order in the window");
        assert_eq!(hit.order_id, "newer");

        // Window that excludes everything.
        assert!(store.most_recent_pending(Duration::from_secs(60)).is_none());
    }

    #[test]
    fn most_recent_completed_uses_completion_time() {
        let store = OrderStore::new();
        store.mark_completed("done-1", serde_json::json!({"n": 1}));
        store.mark_completed("done-2", serde_json::json!({"n": 2}));
        let hit = store
            .most_recent_completed(Duration::from_secs(1800))
            .expect("a completed order in the window");
        assert_eq!(hit.order_id, "done-2");
    }

    #[tokio::test]
    async fn concurrent_transitions_do_not_lose_updates() {
        use std::sync::Arc;

        let store = Arc::new(OrderStore::new());
        let mut handles = Vec::new();
        for i in 0..32 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                let order_id = format!("order-{}", i % 8);
                store.create_pending(&order_id, "tx");
                store.mark_completed(&order_id, serde_json::json!({"i": i}));
            }));
        }
        futures::future::join_all(handles).await;

        assert_eq!(store.len(), 8);
        for i in 0..8 {
            let order = store.get(&format!("order-{}", i)).expect("order exists");
            assert_eq!(order.status, OrderStatus::Completed);
        }
    }
}
