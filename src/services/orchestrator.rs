//! Payment orchestrator.
//!
//! Validates incoming intents, dispatches them to the right provider
//! adapter, and records the resulting order state. The orchestrator never
//! talks to a provider wire format directly; adapters own that.

use crate::payments::error::{PaymentError, PaymentResult};
use crate::payments::factory::PaymentProviderFactory;
use crate::payments::types::{NormalizedOutcome, OrderState, OrderStatus, PaymentIntent};
use crate::services::order_store::OrderStore;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Result of a submission: the internal order id plus the normalized
/// provider outcome the API layer renders.
#[derive(Debug, Clone)]
pub struct SubmitResult {
    pub order_id: String,
    pub outcome: NormalizedOutcome,
}

pub struct PaymentOrchestrator {
    factory: Arc<PaymentProviderFactory>,
    store: Arc<OrderStore>,
    pending_timeout: Duration,
}

impl PaymentOrchestrator {
    pub fn new(
        factory: Arc<PaymentProviderFactory>,
        store: Arc<OrderStore>,
        pending_timeout: Duration,
    ) -> Self {
        Self {
            factory,
            store,
            pending_timeout,
        }
    }

    /// Validates and dispatches a payment intent.
    ///
    /// The order is recorded as pending before the provider is called, so
    /// a callback racing the provider response always finds a row to
    /// merge into. A provider claiming success without a redirect target
    /// is reported as a failure. For callback-only providers a rejected
    /// create leaves the order pending, because the authoritative outcome
    /// arrives later on the callback channel.
    pub async fn submit(&self, intent: &PaymentIntent) -> PaymentResult<SubmitResult> {
        intent.amount.validate_positive()?;
        let provider = self.factory.get_provider(&intent.method)?;
        let order_id = provider.new_order_id();
        self.store.create_pending(&order_id, "");
        info!(
            order_id = %order_id,
            provider = %intent.method,
            amount = %intent.amount.as_major_2dp(),
            currency = %intent.amount.currency,
            "payment submitted"
        );

        let mut outcome = match provider.create_intent(intent, &order_id).await {
            Ok(outcome) => outcome,
            Err(err) => {
                if provider.callback_only() {
                    warn!(
                        order_id = %order_id,
                        provider = %intent.method,
                        error = %err,
                        "provider call failed, awaiting callback"
                    );
                } else {
                    self.store.mark_failed(&order_id, &err.to_string());
                }
                return Err(err);
            }
        };

        if outcome.success && outcome.redirect_url.is_none() {
            warn!(
                order_id = %order_id,
                provider = %intent.method,
                "provider reported success without a redirect target"
            );
            outcome = NormalizedOutcome::failed("provider returned no redirect target")
                .with_order_id(order_id.clone());
        }

        if outcome.success {
            if let Some(transaction_id) = outcome.provider_transaction_id.as_deref() {
                self.store.set_transaction_id(&order_id, transaction_id);
            }
        } else if !provider.callback_only() {
            let reason = outcome
                .error_message
                .as_deref()
                .unwrap_or("payment was not accepted");
            self.store.mark_failed(&order_id, reason);
        }

        Ok(SubmitResult { order_id, outcome })
    }

    /// Looks up an order, classifying stale pending orders as timed out.
    pub fn order_state(&self, order_id: &str) -> Option<(OrderState, OrderStatus)> {
        let state = self.store.get(order_id)?;
        let status = self
            .store
            .status_of(order_id, self.pending_timeout)
            .unwrap_or(state.status);
        Some((state, status))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payments::provider::PaymentProvider;
    use crate::payments::types::{Money, ProviderName};
    use crate::payments::PaymentResult;
    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedProvider {
        name: ProviderName,
        callback_only: bool,
        calls: AtomicUsize,
        result: Box<dyn Fn() -> PaymentResult<NormalizedOutcome> + Send + Sync>,
    }

    #[async_trait]
    impl PaymentProvider for ScriptedProvider {
        async fn create_intent(
            &self,
            _intent: &PaymentIntent,
            _order_id: &str,
        ) -> PaymentResult<NormalizedOutcome> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            (self.result)()
        }

        fn name(&self) -> ProviderName {
            self.name
        }

        fn callback_only(&self) -> bool {
            self.callback_only
        }
    }

    fn factory_with(provider: Arc<ScriptedProvider>) -> Arc<PaymentProviderFactory> {
        let mut providers: HashMap<
            ProviderName,
            Arc<dyn PaymentProvider>,
        > = HashMap::new();
        providers.insert(provider.name(), provider);
        Arc::new(PaymentProviderFactory::from_providers(providers))
    }

    fn intent(method: ProviderName) -> PaymentIntent {
        PaymentIntent {
            amount: Money::new(Decimal::new(2500, 2), "USD"),
            method,
            customer_name: "Jane Doe".to_string(),
            customer_email: "jane@example.com".to_string(),
            card: None,
        }
    }

    fn orchestrator(provider: Arc<ScriptedProvider>) -> (PaymentOrchestrator, Arc<OrderStore>) {
        let store = Arc::new(OrderStore::new());
        let orchestrator = PaymentOrchestrator::new(
            factory_with(provider),
            store.clone(),
            Duration::from_secs(900),
        );
        (orchestrator, store)
    }

    #[tokio::test]
    async fn invalid_amount_is_rejected_before_dispatch() {
        let provider = Arc::new(ScriptedProvider {
            name: ProviderName::Zota,
            callback_only: false,
            calls: AtomicUsize::new(0),
            result: Box::new(|| Ok(NormalizedOutcome::approved("https://x".to_string()))),
        });
        let (orchestrator, store) = orchestrator(provider.clone());

        let mut bad = intent(ProviderName::Zota);
        bad.amount = Money::new(Decimal::ZERO, "USD");
        let err = orchestrator.submit(&bad).await.unwrap_err();
        assert!(matches!(err, PaymentError::Validation { .. }));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn unknown_method_never_reaches_a_provider() {
        let provider = Arc::new(ScriptedProvider {
            name: ProviderName::Zota,
            callback_only: false,
            calls: AtomicUsize::new(0),
            result: Box::new(|| Ok(NormalizedOutcome::approved("https://x".to_string()))),
        });
        let (orchestrator, _store) = orchestrator(provider.clone());

        let err = orchestrator
            .submit(&intent(ProviderName::Paypal))
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::UnsupportedMethod { .. }));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn successful_submission_records_pending_order_with_redirect() {
        let provider = Arc::new(ScriptedProvider {
            name: ProviderName::Zota,
            callback_only: false,
            calls: AtomicUsize::new(0),
            result: Box::new(|| {
                Ok(NormalizedOutcome::approved("https://pay.example/1".to_string())
                    .with_transaction_id("tx-77"))
            }),
        });
        let (orchestrator, store) = orchestrator(provider);

        let result = orchestrator
            .submit(&intent(ProviderName::Zota))
            .await
            .expect("submission succeeds");
        assert!(result.outcome.success);
        assert_eq!(
            result.outcome.redirect_url.as_deref(),
            Some("https://pay.example/1")
        );

        let state = store.get(&result.order_id).expect("order recorded");
        assert_eq!(state.status, OrderStatus::Pending);
        assert_eq!(state.transaction_id, "tx-77");
    }

    #[tokio::test]
    async fn success_without_redirect_is_demoted_to_failure() {
        let provider = Arc::new(ScriptedProvider {
            name: ProviderName::Zota,
            callback_only: false,
            calls: AtomicUsize::new(0),
            result: Box::new(|| {
                Ok(NormalizedOutcome {
                    success: true,
                    redirect_url: None,
                    provider_order_id: None,
                    provider_transaction_id: None,
                    error_message: None,
                    raw_payload: None,
                })
            }),
        });
        let (orchestrator, store) = orchestrator(provider);

        let result = orchestrator
            .submit(&intent(ProviderName::Zota))
            .await
            .expect("submission returns an outcome");
        assert!(!result.outcome.success);
        let state = store.get(&result.order_id).expect("order recorded");
        assert_eq!(state.status, OrderStatus::Failed);
    }

    #[tokio::test]
    async fn declined_create_marks_order_failed() {
        let provider = Arc::new(ScriptedProvider {
            name: ProviderName::Zota,
            callback_only: false,
            calls: AtomicUsize::new(0),
            result: Box::new(|| Ok(NormalizedOutcome::failed("card declined"))),
        });
        let (orchestrator, store) = orchestrator(provider);

        let result = orchestrator
            .submit(&intent(ProviderName::Zota))
            .await
            .expect("submission returns an outcome");
        assert!(!result.outcome.success);
        let state = store.get(&result.order_id).expect("order recorded");
        assert_eq!(state.status, OrderStatus::Failed);
        assert_eq!(state.error_message.as_deref(), Some("card declined"));
    }

    #[tokio::test]
    async fn callback_only_provider_failure_leaves_order_pending() {
        let provider = Arc::new(ScriptedProvider {
            name: ProviderName::Luxtak,
            callback_only: true,
            calls: AtomicUsize::new(0),
            result: Box::new(|| {
                Err(PaymentError::Transport {
                    provider: "luxtak".to_string(),
                    message: "connection reset".to_string(),
                })
            }),
        });
        let (orchestrator, store) = orchestrator(provider);

        let err = orchestrator
            .submit(&intent(ProviderName::Luxtak))
            .await
            .unwrap_err();
        assert!(err.is_retryable());

        // The pending order survives for the callback to settle.
        assert_eq!(store.len(), 1);
        let state = store
            .most_recent_pending(Duration::from_secs(60))
            .expect("order still pending");
        assert_eq!(state.status, OrderStatus::Pending);
    }

    #[tokio::test]
    async fn callback_settles_a_submitted_order() {
        use crate::services::reconciler::{CallbackReconciler, ReconciliationResult};

        let provider = Arc::new(ScriptedProvider {
            name: ProviderName::Zota,
            callback_only: false,
            calls: AtomicUsize::new(0),
            result: Box::new(|| {
                Ok(NormalizedOutcome::approved(
                    "https://pay.example/abc".to_string(),
                ))
            }),
        });
        let (orchestrator, store) = orchestrator(provider);

        let result = orchestrator
            .submit(&intent(ProviderName::Zota))
            .await
            .expect("submission succeeds");
        assert_eq!(
            result.outcome.redirect_url.as_deref(),
            Some("https://pay.example/abc")
        );
        let (_, status) = orchestrator
            .order_state(&result.order_id)
            .expect("order exists");
        assert_eq!(status, OrderStatus::Pending);

        let reconciler = CallbackReconciler::new(store, Duration::from_secs(1800));
        let payload = serde_json::json!({
            "order_id": result.order_id,
            "status": "SUCCESS",
        });
        let applied = reconciler.reconcile(Some(ProviderName::Zota), &payload);
        assert!(matches!(applied, ReconciliationResult::Matched { .. }));

        let (_, status) = orchestrator
            .order_state(&result.order_id)
            .expect("order exists");
        assert_eq!(status, OrderStatus::Completed);
    }

    #[tokio::test]
    async fn stale_pending_orders_read_as_timed_out() {
        let provider = Arc::new(ScriptedProvider {
            name: ProviderName::Zota,
            callback_only: false,
            calls: AtomicUsize::new(0),
            result: Box::new(|| Ok(NormalizedOutcome::approved("https://pay.example/1".to_string()))),
        });
        let (orchestrator, store) = orchestrator(provider.clone());
        let result = orchestrator
            .submit(&intent(ProviderName::Zota))
            .await
            .expect("submission succeeds");

        let (_, fresh_status) = orchestrator
            .order_state(&result.order_id)
            .expect("order exists");
        assert_eq!(fresh_status, OrderStatus::Pending);

        // Age the order past the pending window.
        let mut aged = store.get(&result.order_id).expect("order exists");
        aged.created_at = chrono::Utc::now() - chrono::Duration::hours(1);
        store.insert_raw(aged);
        let (state, stale_status) = orchestrator
            .order_state(&result.order_id)
            .expect("order exists");
        assert_eq!(stale_status, OrderStatus::Timeout);
        // Classification never mutates the stored row.
        assert_eq!(state.status, OrderStatus::Pending);
    }
}
