use crate::payments::error::{PaymentError, PaymentResult};
use crate::payments::provider::PaymentProvider;
use crate::payments::types::{NormalizedOutcome, PaymentIntent, ProviderName};
use crate::payments::utils::PaymentHttpClient;
use crate::services::comm_log::CommLogSink;
use crate::services::runtime_config::RuntimeConfigStore;
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// OAuth-authenticated provider with a two-phase flow: create an order
/// and redirect the customer to PayPal's approval page, then capture it
/// once the customer returns. Access tokens are cached in the instance
/// and refreshed one minute before they expire.
pub struct PaypalProvider {
    secrets: Arc<RuntimeConfigStore>,
    http: PaymentHttpClient,
    comm_log: CommLogSink,
    token: RwLock<Option<CachedToken>>,
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct PaypalConfig {
    base_url: String,
    client_id: String,
    client_secret: String,
    return_url: String,
    cancel_url: String,
    brand_name: String,
}

impl PaypalConfig {
    fn load(secrets: &RuntimeConfigStore) -> PaymentResult<Self> {
        let required = |key: &str| {
            secrets
                .get(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| PaymentError::missing_config("paypal", key))
        };
        let base = secrets
            .get("PUBLIC_BASE_URL")
            .unwrap_or_else(|| "http://localhost:8000".to_string());
        let base = base.trim_end_matches('/').to_string();
        Ok(Self {
            base_url: secrets
                .get("PAYPAL_BASE_URL")
                .unwrap_or_else(|| "https://api-m.sandbox.paypal.com".to_string())
                .trim_end_matches('/')
                .to_string(),
            client_id: required("PAYPAL_CLIENT_ID")?,
            client_secret: required("PAYPAL_CLIENT_SECRET")?,
            return_url: format!("{}/return/paypal", base),
            cancel_url: format!("{}/return/paypal?cancelled=1", base),
            brand_name: secrets
                .get("PAYPAL_BRAND_NAME")
                .unwrap_or_else(|| "Cashier".to_string()),
        })
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

impl PaypalProvider {
    pub fn new(secrets: Arc<RuntimeConfigStore>, comm_log: CommLogSink) -> PaymentResult<Self> {
        let http = PaymentHttpClient::new(Duration::from_secs(30))?;
        Ok(Self {
            secrets,
            http,
            comm_log,
            token: RwLock::new(None),
        })
    }

    async fn access_token(&self, config: &PaypalConfig) -> PaymentResult<String> {
        {
            let cached = self.token.read().await;
            if let Some(token) = cached.as_ref() {
                if token.expires_at > Utc::now() {
                    return Ok(token.access_token.clone());
                }
            }
        }

        debug!("paypal access token expired or absent, refreshing");
        let request = self
            .http
            .client()
            .post(format!("{}/v1/oauth2/token", config.base_url))
            .basic_auth(&config.client_id, Some(&config.client_secret))
            .form(&[("grant_type", "client_credentials")]);
        let (status, body) = self.http.execute("paypal", request).await?;
        if !status.is_success() {
            return Err(PaymentError::Transport {
                provider: "paypal".to_string(),
                message: format!("token endpoint answered HTTP {}", status),
            });
        }
        let parsed: TokenResponse = PaymentHttpClient::decode("paypal", &body)?;

        // Refresh a minute early so in-flight calls never race expiry.
        let expires_at =
            Utc::now() + ChronoDuration::seconds((parsed.expires_in - 60).max(0));
        let mut cached = self.token.write().await;
        *cached = Some(CachedToken {
            access_token: parsed.access_token.clone(),
            expires_at,
        });
        Ok(parsed.access_token)
    }

    fn approval_link(order: &JsonValue) -> Option<String> {
        order
            .get("links")
            .and_then(|v| v.as_array())
            .and_then(|links| {
                links.iter().find(|link| {
                    matches!(
                        link.get("rel").and_then(|r| r.as_str()),
                        Some("approve") | Some("payer-action")
                    )
                })
            })
            .and_then(|link| link.get("href"))
            .and_then(|v| v.as_str())
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    }

    /// A capture only settles when both the HTTP status and the order's
    /// own `status` field agree; anything else is a failed capture with
    /// PayPal's message attached when one exists.
    fn capture_outcome(
        return_url: &str,
        provider_ref: &str,
        http_ok: bool,
        parsed: JsonValue,
    ) -> NormalizedOutcome {
        let completed = parsed
            .get("status")
            .and_then(|v| v.as_str())
            .map(|s| s == "COMPLETED")
            .unwrap_or(false);
        if http_ok && completed {
            NormalizedOutcome::approved(return_url.to_string())
                .with_transaction_id(provider_ref)
                .with_raw(parsed)
        } else {
            let message = parsed
                .get("message")
                .and_then(|v| v.as_str())
                .unwrap_or("capture was not completed")
                .to_string();
            NormalizedOutcome::failed(message)
                .with_transaction_id(provider_ref)
                .with_raw(parsed)
        }
    }
}

#[async_trait]
impl PaymentProvider for PaypalProvider {
    async fn create_intent(
        &self,
        intent: &PaymentIntent,
        order_id: &str,
    ) -> PaymentResult<NormalizedOutcome> {
        let config = PaypalConfig::load(&self.secrets)?;
        let token = self.access_token(&config).await?;

        let payload = serde_json::json!({
            "intent": "CAPTURE",
            "purchase_units": [{
                "reference_id": order_id,
                "custom_id": order_id,
                "amount": {
                    "currency_code": intent.amount.currency,
                    "value": intent.amount.as_major_2dp(),
                },
            }],
            "payment_source": {
                "paypal": {
                    "experience_context": {
                        "brand_name": config.brand_name,
                        "user_action": "PAY_NOW",
                        "return_url": config.return_url,
                        "cancel_url": config.cancel_url,
                    }
                }
            },
        });

        self.comm_log.log(
            "paypal-outbound",
            serde_json::json!({ "reference_id": order_id, "value": intent.amount.as_major_2dp() }),
            "paypal",
        );

        let request = self
            .http
            .client()
            .post(format!("{}/v2/checkout/orders", config.base_url))
            .bearer_auth(&token)
            .json(&payload);
        let (status, body) = self.http.execute("paypal", request).await?;
        self.comm_log.log(
            "paypal-inbound",
            serde_json::json!({ "status": status.as_u16(), "reference_id": order_id }),
            "paypal",
        );

        let parsed: JsonValue = PaymentHttpClient::decode("paypal", &body)?;
        match (status.is_success(), Self::approval_link(&parsed)) {
            (true, Some(approval_url)) => {
                info!(reference_id = order_id, "paypal order created");
                let mut outcome = NormalizedOutcome::approved(approval_url)
                    .with_order_id(order_id)
                    .with_raw(parsed.clone());
                if let Some(paypal_id) = parsed.get("id").and_then(|v| v.as_str()) {
                    outcome = outcome.with_transaction_id(paypal_id);
                }
                Ok(outcome)
            }
            _ => {
                let message = parsed
                    .get("message")
                    .and_then(|v| v.as_str())
                    .unwrap_or("order was not created")
                    .to_string();
                Ok(NormalizedOutcome::failed(message)
                    .with_order_id(order_id)
                    .with_raw(parsed))
            }
        }
    }

    /// Captures a previously approved order. The customer already passed
    /// through PayPal's pages, so the redirect of a successful capture
    /// points back at the cashier's own return page.
    async fn finalize_order(&self, provider_ref: &str) -> PaymentResult<NormalizedOutcome> {
        let config = PaypalConfig::load(&self.secrets)?;
        let token = self.access_token(&config).await?;

        let request = self
            .http
            .client()
            .post(format!(
                "{}/v2/checkout/orders/{}/capture",
                config.base_url, provider_ref
            ))
            .bearer_auth(&token)
            .header("Content-Type", "application/json");
        let (status, body) = self.http.execute("paypal", request).await?;
        self.comm_log.log(
            "paypal-capture-inbound",
            serde_json::json!({ "status": status.as_u16(), "paypal_order_id": provider_ref }),
            "paypal",
        );

        let parsed: JsonValue = PaymentHttpClient::decode("paypal", &body)?;
        let outcome =
            Self::capture_outcome(&config.return_url, provider_ref, status.is_success(), parsed);
        if outcome.success {
            info!(paypal_order_id = provider_ref, "paypal order captured");
        }
        Ok(outcome)
    }

    fn name(&self) -> ProviderName {
        ProviderName::Paypal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn approval_link_prefers_approve_or_payer_action_rels() {
        let order = serde_json::json!({
            "id": "5O190127TN364715T",
            "links": [
                { "rel": "self", "href": "https://api.sandbox.paypal.com/v2/checkout/orders/5O1" },
                { "rel": "approve", "href": "https://www.sandbox.paypal.com/checkoutnow?token=5O1" }
            ]
        });
        assert_eq!(
            PaypalProvider::approval_link(&order).as_deref(),
            Some("https://www.sandbox.paypal.com/checkoutnow?token=5O1")
        );

        let payer_action = serde_json::json!({
            "links": [
                { "rel": "payer-action", "href": "https://www.sandbox.paypal.com/agreements/approve?token=X" }
            ]
        });
        assert!(PaypalProvider::approval_link(&payer_action).is_some());

        let none = serde_json::json!({ "links": [ { "rel": "self", "href": "https://x" } ] });
        assert!(PaypalProvider::approval_link(&none).is_none());
    }

    #[test]
    fn capture_settles_only_on_completed_status() {
        let return_url = "https://cashier.example/return/paypal";

        let completed = serde_json::json!({ "id": "5O1", "status": "COMPLETED" });
        let outcome = PaypalProvider::capture_outcome(return_url, "5O1", true, completed);
        assert!(outcome.success);
        assert_eq!(outcome.redirect_url.as_deref(), Some(return_url));
        assert_eq!(outcome.provider_transaction_id.as_deref(), Some("5O1"));

        // Declined instrument: HTTP 200 but the order never completes.
        let declined = serde_json::json!({
            "id": "5O1",
            "status": "PAYER_ACTION_REQUIRED",
            "message": "INSTRUMENT_DECLINED"
        });
        let outcome = PaypalProvider::capture_outcome(return_url, "5O1", true, declined);
        assert!(!outcome.success);
        assert_eq!(outcome.error_message.as_deref(), Some("INSTRUMENT_DECLINED"));

        // Error body without a status field.
        let rejected = serde_json::json!({ "message": "ORDER_NOT_APPROVED" });
        let outcome = PaypalProvider::capture_outcome(return_url, "5O1", false, rejected);
        assert!(!outcome.success);
        assert_eq!(outcome.error_message.as_deref(), Some("ORDER_NOT_APPROVED"));
    }

    #[tokio::test]
    async fn cached_token_is_reused_until_it_expires() {
        let secrets = Arc::new(RuntimeConfigStore::new());
        secrets.set("PAYPAL_CLIENT_ID", "cid");
        secrets.set("PAYPAL_CLIENT_SECRET", "cs");
        let provider =
            PaypalProvider::new(secrets.clone(), CommLogSink::new(None)).expect("provider builds");
        let config = PaypalConfig::load(&secrets).expect("config loads");

        {
            let mut cached = provider.token.write().await;
            *cached = Some(CachedToken {
                access_token: "cached-token".to_string(),
                expires_at: Utc::now() + ChronoDuration::minutes(5),
            });
        }
        let token = provider.access_token(&config).await.expect("cache hit");
        assert_eq!(token, "cached-token");
    }

    #[test]
    fn missing_client_secret_is_a_configuration_error() {
        let secrets = RuntimeConfigStore::new();
        secrets.set("PAYPAL_CLIENT_ID", "cid");
        let err = PaypalConfig::load(&secrets).unwrap_err();
        assert!(matches!(err, PaymentError::Configuration { .. }));
    }
}
