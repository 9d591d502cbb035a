use crate::payments::crypto::{concat_sha256_hex, form_checksum};
use crate::payments::error::{PaymentError, PaymentResult};
use crate::payments::provider::PaymentProvider;
use crate::payments::types::{NormalizedOutcome, PaymentIntent, ProviderName};
use crate::payments::utils::PaymentHttpClient;
use crate::services::comm_log::CommLogSink;
use crate::services::runtime_config::RuntimeConfigStore;
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Url;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Hosted payment page. No API call is made at submission time: the
/// redirect is the payment page URL itself, carrying the order fields
/// plus a `checksum` computed as SHA-256 over the secret followed by
/// every field value in the order the fields appear.
pub struct NuveiHostedProvider {
    secrets: Arc<RuntimeConfigStore>,
    comm_log: CommLogSink,
}

#[derive(Debug, Clone)]
struct NuveiHostedConfig {
    payment_page_url: String,
    merchant_id: String,
    merchant_site_id: String,
    secret_key: String,
    success_url: String,
    error_url: String,
    notify_url: String,
}

impl NuveiHostedConfig {
    fn load(secrets: &RuntimeConfigStore) -> PaymentResult<Self> {
        let required = |key: &str| {
            secrets
                .get(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| PaymentError::missing_config("nuvei-hosted", key))
        };
        let base = secrets
            .get("PUBLIC_BASE_URL")
            .unwrap_or_else(|| "http://localhost:8000".to_string());
        let base = base.trim_end_matches('/').to_string();
        Ok(Self {
            payment_page_url: secrets.get("NUVEI_PAYMENT_PAGE_URL").unwrap_or_else(|| {
                "https://ppp-test.safecharge.com/ppp/purchase.do".to_string()
            }),
            merchant_id: required("NUVEI_MERCHANT_ID")?,
            merchant_site_id: required("NUVEI_MERCHANT_SITE_ID")?,
            secret_key: required("NUVEI_SECRET_KEY")?,
            success_url: format!("{}/return/nuvei?outcome=success", base),
            error_url: format!("{}/return/nuvei?outcome=error", base),
            notify_url: format!("{}/callbacks/nuvei-hosted", base),
        })
    }
}

impl NuveiHostedProvider {
    pub fn new(secrets: Arc<RuntimeConfigStore>, comm_log: CommLogSink) -> Self {
        Self { secrets, comm_log }
    }

    /// Field order is fixed by the page contract; the checksum covers the
    /// values in exactly this order.
    fn page_fields<'a>(
        config: &'a NuveiHostedConfig,
        order_id: &'a str,
        amount: &'a str,
        currency: &'a str,
        email: &'a str,
        timestamp: &'a str,
    ) -> Vec<(&'static str, &'a str)> {
        vec![
            ("merchant_id", &config.merchant_id),
            ("merchant_site_id", &config.merchant_site_id),
            ("total_amount", amount),
            ("currency", currency),
            ("user_token_id", email),
            ("item_name_1", "Deposit"),
            ("item_amount_1", amount),
            ("item_quantity_1", "1"),
            ("time_stamp", timestamp),
            ("version", "4.0.0"),
            ("merchant_unique_id", order_id),
            ("success_url", &config.success_url),
            ("error_url", &config.error_url),
            ("notify_url", &config.notify_url),
        ]
    }
}

#[async_trait]
impl PaymentProvider for NuveiHostedProvider {
    async fn create_intent(
        &self,
        intent: &PaymentIntent,
        order_id: &str,
    ) -> PaymentResult<NormalizedOutcome> {
        let config = NuveiHostedConfig::load(&self.secrets)?;
        let amount = intent.amount.as_major_2dp();
        let timestamp = Utc::now().format("%Y-%m-%d.%H:%M:%S").to_string();

        let fields = Self::page_fields(
            &config,
            order_id,
            &amount,
            &intent.amount.currency,
            &intent.customer_email,
            &timestamp,
        );
        let values: Vec<&str> = fields.iter().map(|(_, v)| *v).collect();
        let checksum = form_checksum(&config.secret_key, &values);

        let mut params: Vec<(&str, &str)> = fields.clone();
        params.push(("checksum", &checksum));
        let redirect = Url::parse_with_params(&config.payment_page_url, &params).map_err(|e| {
            PaymentError::Parse {
                provider: "nuvei-hosted".to_string(),
                message: format!("payment page url is invalid: {}", e),
            }
        })?;

        self.comm_log.log(
            "nuvei-hosted-outbound",
            serde_json::json!({ "merchant_unique_id": order_id, "total_amount": amount }),
            "nuvei",
        );
        info!(order_id = order_id, "nuvei hosted payment page prepared");

        Ok(NormalizedOutcome::approved(redirect.to_string()).with_order_id(order_id))
    }

    fn name(&self) -> ProviderName {
        ProviderName::NuveiHosted
    }
}

/// Server-to-server `openOrder.do` flow. The request is authorized by a
/// SHA-256 checksum over `merchantId + merchantSiteId + clientRequestId +
/// amount + currency + timeStamp + secret`; a SUCCESS answer yields a
/// `sessionToken` that the cashier's own checkout page consumes.
pub struct NuveiConnectProvider {
    secrets: Arc<RuntimeConfigStore>,
    http: PaymentHttpClient,
    comm_log: CommLogSink,
}

#[derive(Debug, Clone)]
struct NuveiConnectConfig {
    api_base_url: String,
    merchant_id: String,
    merchant_site_id: String,
    secret_key: String,
    checkout_url: String,
}

impl NuveiConnectConfig {
    fn load(secrets: &RuntimeConfigStore) -> PaymentResult<Self> {
        let required = |key: &str| {
            secrets
                .get(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| PaymentError::missing_config("nuvei-connect", key))
        };
        let base = secrets
            .get("PUBLIC_BASE_URL")
            .unwrap_or_else(|| "http://localhost:8000".to_string());
        Ok(Self {
            api_base_url: secrets
                .get("NUVEI_API_BASE_URL")
                .unwrap_or_else(|| "https://ppp-test.nuvei.com/ppp/api/v1".to_string())
                .trim_end_matches('/')
                .to_string(),
            merchant_id: required("NUVEI_MERCHANT_ID")?,
            merchant_site_id: required("NUVEI_MERCHANT_SITE_ID")?,
            secret_key: required("NUVEI_SECRET_KEY")?,
            checkout_url: format!(
                "{}/checkout/nuvei",
                base.trim_end_matches('/')
            ),
        })
    }
}

impl NuveiConnectProvider {
    pub fn new(secrets: Arc<RuntimeConfigStore>, comm_log: CommLogSink) -> PaymentResult<Self> {
        let http = PaymentHttpClient::new(Duration::from_secs(30))?;
        Ok(Self {
            secrets,
            http,
            comm_log,
        })
    }

    fn open_order_checksum(
        config: &NuveiConnectConfig,
        client_request_id: &str,
        amount: &str,
        currency: &str,
        time_stamp: &str,
    ) -> String {
        concat_sha256_hex(&[
            &config.merchant_id,
            &config.merchant_site_id,
            client_request_id,
            amount,
            currency,
            time_stamp,
            &config.secret_key,
        ])
    }
}

#[async_trait]
impl PaymentProvider for NuveiConnectProvider {
    async fn create_intent(
        &self,
        intent: &PaymentIntent,
        order_id: &str,
    ) -> PaymentResult<NormalizedOutcome> {
        let config = NuveiConnectConfig::load(&self.secrets)?;
        let amount = intent.amount.as_major_2dp();
        // yyyyMMddHHmmss, as the checksum recipe requires.
        let time_stamp = Utc::now().format("%Y%m%d%H%M%S").to_string();
        let checksum = Self::open_order_checksum(
            &config,
            order_id,
            &amount,
            &intent.amount.currency,
            &time_stamp,
        );

        let payload = serde_json::json!({
            "merchantId": config.merchant_id,
            "merchantSiteId": config.merchant_site_id,
            "clientRequestId": order_id,
            "clientUniqueId": order_id,
            "currency": intent.amount.currency,
            "amount": amount,
            "timeStamp": time_stamp,
            "checksum": checksum,
        });

        self.comm_log.log(
            "nuvei-connect-outbound",
            serde_json::json!({ "clientRequestId": order_id, "amount": amount }),
            "nuvei",
        );

        let url = format!("{}/openOrder.do", config.api_base_url);
        let request = self.http.client().post(&url).json(&payload);
        let (status, body) = self.http.execute("nuvei-connect", request).await?;
        self.comm_log.log(
            "nuvei-connect-inbound",
            serde_json::json!({ "status": status.as_u16(), "clientRequestId": order_id }),
            "nuvei",
        );

        let parsed: JsonValue = PaymentHttpClient::decode("nuvei-connect", &body)?;
        let is_success = parsed
            .get("status")
            .and_then(|v| v.as_str())
            .map(|s| s.eq_ignore_ascii_case("SUCCESS"))
            .unwrap_or(false);
        let session_token = parsed
            .get("sessionToken")
            .and_then(|v| v.as_str())
            .filter(|v| !v.is_empty());

        match (is_success, session_token) {
            (true, Some(token)) => {
                info!(client_request_id = order_id, "nuvei order opened");
                let redirect = format!("{}?sessionToken={}", config.checkout_url, token);
                let mut outcome = NormalizedOutcome::approved(redirect)
                    .with_order_id(order_id)
                    .with_raw(parsed.clone());
                if let Some(nuvei_order) = parsed.get("orderId").and_then(|v| v.as_str()) {
                    outcome = outcome.with_transaction_id(nuvei_order);
                }
                Ok(outcome)
            }
            _ => {
                let reason = parsed
                    .get("reason")
                    .and_then(|v| v.as_str())
                    .filter(|v| !v.is_empty())
                    .unwrap_or("order was not opened")
                    .to_string();
                Ok(NormalizedOutcome::failed(reason)
                    .with_order_id(order_id)
                    .with_raw(parsed))
            }
        }
    }

    fn name(&self) -> ProviderName {
        ProviderName::NuveiConnect
    }
}
