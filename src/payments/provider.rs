use crate::payments::error::{PaymentError, PaymentResult};
use crate::payments::types::{generate_order_id, NormalizedOutcome, PaymentIntent, ProviderName};
use async_trait::async_trait;

/// One adapter per PSP. Adapters translate a normalized intent into the
/// provider's wire format, sign it, send it and fold the heterogeneous
/// response back into a `NormalizedOutcome`. Provider-specific failures
/// never escape as panics; everything comes back as a typed error.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Creates a payment at the provider for the given intent. `order_id`
    /// is the store key this payment is tracked under.
    async fn create_intent(
        &self,
        intent: &PaymentIntent,
        order_id: &str,
    ) -> PaymentResult<NormalizedOutcome>;

    /// Capture-after-approval flows: finalizes a previously created order.
    /// Providers without a two-phase flow keep the default.
    async fn finalize_order(&self, _provider_ref: &str) -> PaymentResult<NormalizedOutcome> {
        Err(PaymentError::UnsupportedMethod {
            method: format!("{}:finalize", self.name()),
        })
    }

    fn name(&self) -> ProviderName;

    /// True when the real outcome arrives only via callback. A failed
    /// create leaves the order Pending for these flows.
    fn callback_only(&self) -> bool {
        false
    }

    /// Order identifier convention for this provider's flow. Default is
    /// the generic 16-hex id; providers with their own trade-number
    /// format override this so callbacks key into the store correctly.
    fn new_order_id(&self) -> String {
        generate_order_id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payments::types::Money;
    use rust_decimal::Decimal;

    struct MockProvider;

    #[async_trait]
    impl PaymentProvider for MockProvider {
        async fn create_intent(
            &self,
            _intent: &PaymentIntent,
            order_id: &str,
        ) -> PaymentResult<NormalizedOutcome> {
            Ok(
                NormalizedOutcome::approved("https://pay.example/session".to_string())
                    .with_order_id(order_id)
                    .with_transaction_id("mock-tx-1"),
            )
        }

        fn name(&self) -> ProviderName {
            ProviderName::Zota
        }
    }

    #[tokio::test]
    async fn trait_can_be_implemented_by_mock_provider() {
        let provider: Box<dyn PaymentProvider> = Box::new(MockProvider);
        let intent = PaymentIntent {
            amount: Money::new(Decimal::new(2500, 2), "USD"),
            method: ProviderName::Zota,
            customer_name: "Jane Doe".to_string(),
            customer_email: "jane@example.com".to_string(),
            card: None,
        };
        let outcome = provider
            .create_intent(&intent, "abcdef0123456789")
            .await
            .expect("mock create succeeds");
        assert!(outcome.success);
        assert_eq!(outcome.provider_order_id.as_deref(), Some("abcdef0123456789"));

        let finalize = provider.finalize_order("ref-1").await;
        assert!(matches!(
            finalize,
            Err(PaymentError::UnsupportedMethod { .. })
        ));
        assert!(!provider.callback_only());
        assert_eq!(provider.new_order_id().len(), 16);
    }
}
