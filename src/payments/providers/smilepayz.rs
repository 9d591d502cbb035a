use crate::payments::crypto::rsa_sha256_pkcs1_sign;
use crate::payments::error::{PaymentError, PaymentResult};
use crate::payments::provider::PaymentProvider;
use crate::payments::types::{NormalizedOutcome, PaymentIntent, ProviderName};
use crate::payments::utils::PaymentHttpClient;
use crate::services::comm_log::CommLogSink;
use crate::services::runtime_config::RuntimeConfigStore;
use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use rand::Rng;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Pay-in provider with header-based asymmetric signing: the canonical
/// string `timestamp|merchant_secret|minified_body` is RSA-SHA256 signed
/// and sent as `X-SIGNATURE` alongside `X-PARTNER-ID`/`X-TIMESTAMP`.
/// Amounts go out as integer major units, rounded. The create call only
/// acknowledges the pay-in; the real outcome arrives via callback.
pub struct SmilepayzProvider {
    secrets: Arc<RuntimeConfigStore>,
    http: PaymentHttpClient,
    comm_log: CommLogSink,
}

#[derive(Debug, Clone)]
struct SmilepayzConfig {
    endpoint: String,
    partner_id: String,
    merchant_secret: String,
    private_key_pem: String,
    merchant_name: String,
    payment_method: String,
    redirect_url: String,
    callback_url: String,
}

impl SmilepayzConfig {
    fn load(secrets: &RuntimeConfigStore) -> PaymentResult<Self> {
        let required = |key: &str| {
            secrets
                .get(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| PaymentError::missing_config("smilepayz", key))
        };
        let base = secrets
            .get("PUBLIC_BASE_URL")
            .unwrap_or_else(|| "http://localhost:8000".to_string());
        let base = base.trim_end_matches('/').to_string();
        Ok(Self {
            endpoint: secrets.get("SMILEPAYZ_ENDPOINT").unwrap_or_else(|| {
                "https://sandbox-gateway.smilepayz.com/v2.0/transaction/pay-in".to_string()
            }),
            partner_id: required("SMILEPAYZ_PARTNER_ID")?,
            merchant_secret: required("SMILEPAYZ_MERCHANT_SECRET")?,
            private_key_pem: required("SMILEPAYZ_RSA_PRIVATE_KEY")?,
            merchant_name: secrets
                .get("SMILEPAYZ_MERCHANT_NAME")
                .unwrap_or_else(|| "Cashier".to_string()),
            payment_method: secrets
                .get("SMILEPAYZ_PAYMENT_METHOD")
                .unwrap_or_else(|| "BANK".to_string()),
            redirect_url: format!("{}/return/smilepayz", base),
            callback_url: format!("{}/callbacks/smilepayz", base),
        })
    }
}

#[derive(Debug, Deserialize)]
struct SmilepayzResponse {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Option<SmilepayzData>,
}

#[derive(Debug, Deserialize)]
struct SmilepayzData {
    #[serde(default, rename = "paymentUrl")]
    payment_url: Option<String>,
    #[serde(default, rename = "transactionNo")]
    transaction_no: Option<String>,
}

impl SmilepayzProvider {
    pub fn new(secrets: Arc<RuntimeConfigStore>, comm_log: CommLogSink) -> PaymentResult<Self> {
        let http = PaymentHttpClient::new(Duration::from_secs(30))?;
        Ok(Self {
            secrets,
            http,
            comm_log,
        })
    }

    fn canonical_string(timestamp: &str, merchant_secret: &str, minified_body: &str) -> String {
        format!("{}|{}|{}", timestamp, merchant_secret, minified_body)
    }
}

#[async_trait]
impl PaymentProvider for SmilepayzProvider {
    async fn create_intent(
        &self,
        intent: &PaymentIntent,
        order_id: &str,
    ) -> PaymentResult<NormalizedOutcome> {
        let config = SmilepayzConfig::load(&self.secrets)?;

        let payload = serde_json::json!({
            "orderNo": order_id,
            "purpose": "Deposit",
            "merchant": {
                "merchantId": config.partner_id,
                "merchantName": config.merchant_name,
            },
            "money": {
                "amount": intent.amount.as_major_rounded().to_string(),
                "currency": intent.amount.currency,
            },
            "payer": { "name": intent.customer_name },
            "paymentMethod": config.payment_method,
            "redirectUrl": config.redirect_url,
            "callbackUrl": config.callback_url,
        });
        let minified = serde_json::to_string(&payload).map_err(|e| PaymentError::Parse {
            provider: "smilepayz".to_string(),
            message: format!("failed to serialize request body: {}", e),
        })?;

        // ISO 8601 with offset, e.g. 2025-09-01T22:58:39+00:00.
        let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, false);
        let canonical = Self::canonical_string(&timestamp, &config.merchant_secret, &minified);
        let signature = rsa_sha256_pkcs1_sign("smilepayz", &config.private_key_pem, &canonical)?;

        self.comm_log.log(
            "smilepayz-outbound",
            serde_json::json!({ "orderNo": order_id, "timestamp": timestamp }),
            "smilepayz",
        );

        let request = self
            .http
            .client()
            .post(&config.endpoint)
            .header("X-PARTNER-ID", &config.partner_id)
            .header("X-TIMESTAMP", &timestamp)
            .header("X-SIGNATURE", &signature)
            .header("Content-Type", "application/json")
            .body(minified);
        let (status, body) = self.http.execute("smilepayz", request).await?;
        self.comm_log.log(
            "smilepayz-inbound",
            serde_json::json!({ "status": status.as_u16(), "orderNo": order_id }),
            "smilepayz",
        );

        let parsed: SmilepayzResponse = PaymentHttpClient::decode("smilepayz", &body)?;
        let payment_url = parsed
            .data
            .as_ref()
            .and_then(|d| d.payment_url.as_deref())
            .filter(|v| !v.is_empty());
        match payment_url {
            Some(url) => {
                info!(order_no = order_id, "smilepayz pay-in accepted");
                let mut outcome =
                    NormalizedOutcome::approved(url.to_string()).with_order_id(order_id);
                if let Some(tx) = parsed.data.as_ref().and_then(|d| d.transaction_no.as_deref()) {
                    outcome = outcome.with_transaction_id(tx);
                }
                Ok(outcome)
            }
            None => Ok(NormalizedOutcome::failed(
                parsed
                    .message
                    .or(parsed.code)
                    .unwrap_or_else(|| "pay-in was not accepted".to_string()),
            )
            .with_order_id(order_id)),
        }
    }

    fn name(&self) -> ProviderName {
        ProviderName::Smilepayz
    }

    fn callback_only(&self) -> bool {
        true
    }

    /// Plain seven-digit order numbers in the 3,000,000 range.
    fn new_order_id(&self) -> String {
        let mut rng = rand::thread_rng();
        rng.gen_range(3_000_000u32..4_000_000).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_string_joins_with_pipes() {
        let canonical =
            SmilepayzProvider::canonical_string("2025-09-01T22:58:39+00:00", "secret", "{\"a\":1}");
        assert_eq!(canonical, "2025-09-01T22:58:39+00:00|secret|{\"a\":1}");
    }

    #[test]
    fn response_parses_with_and_without_payment_url() {
        let ok: SmilepayzResponse = serde_json::from_value(serde_json::json!({
            "code": "200",
            "data": { "paymentUrl": "https://pay.smilepayz.example/1", "transactionNo": "t-1" }
        }))
        .expect("success shape parses");
        assert_eq!(
            ok.data.as_ref().and_then(|d| d.payment_url.as_deref()),
            Some("https://pay.smilepayz.example/1")
        );

        let rejected: SmilepayzResponse = serde_json::from_value(serde_json::json!({
            "code": "4001",
            "message": "invalid signature"
        }))
        .expect("failure shape parses");
        assert!(rejected.data.is_none());
        assert_eq!(rejected.message.as_deref(), Some("invalid signature"));
    }

    #[test]
    fn order_numbers_are_seven_digit_decimals() {
        let secrets = Arc::new(RuntimeConfigStore::new());
        let provider =
            SmilepayzProvider::new(secrets, CommLogSink::new(None)).expect("provider builds");
        for _ in 0..16 {
            let id = provider.new_order_id();
            assert_eq!(id.len(), 7);
            assert!(id.starts_with('3'));
            assert!(id.chars().all(|c| c.is_ascii_digit()));
        }
        assert!(provider.callback_only());
    }

    #[test]
    fn missing_private_key_is_a_configuration_error() {
        let secrets = RuntimeConfigStore::new();
        secrets.set("SMILEPAYZ_PARTNER_ID", "p");
        secrets.set("SMILEPAYZ_MERCHANT_SECRET", "s");
        let err = SmilepayzConfig::load(&secrets).unwrap_err();
        assert!(matches!(err, PaymentError::Configuration { .. }));
    }
}
