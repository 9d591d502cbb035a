use crate::payments::crypto::hmac_sha256_hex;
use crate::payments::error::{PaymentError, PaymentResult};
use crate::payments::provider::PaymentProvider;
use crate::payments::types::{NormalizedOutcome, PaymentIntent, ProviderName};
use crate::payments::utils::PaymentHttpClient;
use crate::services::comm_log::CommLogSink;
use crate::services::runtime_config::RuntimeConfigStore;
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

const OK_SENTINEL: &str = "S-2000";
const CUSTOMER_EXISTS_SENTINEL: &str = "S-4004";

/// Three-call deposit flow: obtain an access token, register (or
/// re-register) the customer, then create the deposit. Every call is
/// authenticated with an HMAC-SHA256 `x-signature` over
/// `client_id + timestamp + body` ("{}" when there is no body).
///
/// The gateway is slow on first contact, so the client timeout here is
/// longer than for the other providers.
pub struct SwiftGoldPayProvider {
    secrets: Arc<RuntimeConfigStore>,
    http: PaymentHttpClient,
    comm_log: CommLogSink,
}

#[derive(Debug, Clone)]
struct SwiftGoldPayConfig {
    base_url: String,
    client_id: String,
    client_secret: String,
    client_ref_id: String,
    apigw_api_id: String,
    signing_key: String,
    callback_url: String,
}

impl SwiftGoldPayConfig {
    fn load(secrets: &RuntimeConfigStore) -> PaymentResult<Self> {
        let required = |key: &str| {
            secrets
                .get(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| PaymentError::missing_config("swiftgoldpay", key))
        };
        let base = secrets
            .get("PUBLIC_BASE_URL")
            .unwrap_or_else(|| "http://localhost:8000".to_string());
        Ok(Self {
            base_url: secrets
                .get("SWIFTGOLDPAY_BASE_URL")
                .unwrap_or_else(|| "https://uat-api.swiftgoldpay.com".to_string())
                .trim_end_matches('/')
                .to_string(),
            client_id: required("SWIFTGOLDPAY_CLIENT_ID")?,
            client_secret: required("SWIFTGOLDPAY_CLIENT_SECRET")?,
            client_ref_id: required("SWIFTGOLDPAY_CLIENT_REF_ID")?,
            apigw_api_id: required("SWIFTGOLDPAY_APIGW_API_ID")?,
            signing_key: required("SWIFTGOLDPAY_SIGNING_KEY")?,
            callback_url: format!(
                "{}/callbacks/swiftgoldpay",
                base.trim_end_matches('/')
            ),
        })
    }
}

impl SwiftGoldPayProvider {
    pub fn new(secrets: Arc<RuntimeConfigStore>, comm_log: CommLogSink) -> PaymentResult<Self> {
        let http = PaymentHttpClient::new(Duration::from_secs(40))?;
        Ok(Self {
            secrets,
            http,
            comm_log,
        })
    }

    fn sign(config: &SwiftGoldPayConfig, timestamp: &str, body: &str) -> PaymentResult<String> {
        let message = format!("{}{}{}", config.client_id, timestamp, body);
        hmac_sha256_hex(&config.signing_key, &message)
    }

    fn status_code_of(body: &JsonValue) -> Option<&str> {
        body.get("statusCode")
            .or_else(|| body.get("status_code"))
            .and_then(|v| v.as_str())
    }

    async fn signed_post(
        &self,
        config: &SwiftGoldPayConfig,
        path: &str,
        body: &JsonValue,
        bearer: Option<&str>,
    ) -> PaymentResult<JsonValue> {
        let body_text = serde_json::to_string(body).map_err(|e| PaymentError::Parse {
            provider: "swiftgoldpay".to_string(),
            message: format!("failed to serialize request body: {}", e),
        })?;
        let timestamp = Utc::now().timestamp_millis().to_string();
        let signature = Self::sign(config, &timestamp, &body_text)?;

        let mut request = self
            .http
            .client()
            .post(format!("{}{}", config.base_url, path))
            .header("client_id", &config.client_id)
            .header("client_secret", &config.client_secret)
            .header("client_ref_id", &config.client_ref_id)
            .header("x-apigw-api-id", &config.apigw_api_id)
            .header("x-timestamp", &timestamp)
            .header("x-signature", &signature)
            .header("Content-Type", "application/json")
            .body(body_text);
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }

        let (status, response_body) = self.http.execute("swiftgoldpay", request).await?;
        self.comm_log.log(
            "swiftgoldpay-inbound",
            serde_json::json!({ "path": path, "status": status.as_u16() }),
            "swiftgoldpay",
        );
        PaymentHttpClient::decode("swiftgoldpay", &response_body)
    }

    async fn fetch_token(&self, config: &SwiftGoldPayConfig) -> PaymentResult<String> {
        let body = serde_json::json!({});
        let parsed = self
            .signed_post(config, "/v1/auth/token", &body, None)
            .await?;
        if Self::status_code_of(&parsed) != Some(OK_SENTINEL) {
            return Err(PaymentError::Transport {
                provider: "swiftgoldpay".to_string(),
                message: "token request was rejected".to_string(),
            });
        }
        parsed
            .get("data")
            .and_then(|d| d.get("accessToken"))
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| PaymentError::Parse {
                provider: "swiftgoldpay".to_string(),
                message: "token response is missing data.accessToken".to_string(),
            })
    }

    async fn ensure_customer(
        &self,
        config: &SwiftGoldPayConfig,
        token: &str,
        intent: &PaymentIntent,
    ) -> PaymentResult<()> {
        let body = serde_json::json!({
            "customerName": intent.customer_name,
            "customerEmail": intent.customer_email,
        });
        let parsed = self
            .signed_post(config, "/v1/customer/register", &body, Some(token))
            .await?;
        // An already-registered customer is fine.
        match Self::status_code_of(&parsed) {
            Some(OK_SENTINEL) | Some(CUSTOMER_EXISTS_SENTINEL) => Ok(()),
            other => Err(PaymentError::Transport {
                provider: "swiftgoldpay".to_string(),
                message: format!(
                    "customer registration was rejected ({})",
                    other.unwrap_or("no status code")
                ),
            }),
        }
    }
}

#[async_trait]
impl PaymentProvider for SwiftGoldPayProvider {
    async fn create_intent(
        &self,
        intent: &PaymentIntent,
        order_id: &str,
    ) -> PaymentResult<NormalizedOutcome> {
        let config = SwiftGoldPayConfig::load(&self.secrets)?;

        self.comm_log.log(
            "swiftgoldpay-outbound",
            serde_json::json!({ "orderRefId": order_id, "amount": intent.amount.as_major_2dp() }),
            "swiftgoldpay",
        );

        let token = self.fetch_token(&config).await?;
        self.ensure_customer(&config, &token, intent).await?;

        let deposit_body = serde_json::json!({
            "orderRefId": order_id,
            "amount": intent.amount.as_major_2dp(),
            "currency": intent.amount.currency,
            "customerEmail": intent.customer_email,
            "callbackUrl": config.callback_url,
        });
        let parsed = self
            .signed_post(&config, "/v1/deposit/create", &deposit_body, Some(&token))
            .await?;

        if Self::status_code_of(&parsed) != Some(OK_SENTINEL) {
            let message = parsed
                .get("message")
                .and_then(|v| v.as_str())
                .unwrap_or("deposit was not created")
                .to_string();
            return Ok(NormalizedOutcome::failed(message)
                .with_order_id(order_id)
                .with_raw(parsed));
        }

        let payment_url = parsed
            .get("data")
            .and_then(|d| d.get("payment_url").or_else(|| d.get("paymentUrl")))
            .and_then(|v| v.as_str())
            .filter(|v| !v.is_empty())
            .map(str::to_string);
        match payment_url {
            Some(url) => {
                info!(order_ref = order_id, "swiftgoldpay deposit created");
                let mut outcome = NormalizedOutcome::approved(url)
                    .with_order_id(order_id)
                    .with_raw(parsed.clone());
                if let Some(tx) = parsed
                    .get("data")
                    .and_then(|d| d.get("transactionId"))
                    .and_then(|v| v.as_str())
                {
                    outcome = outcome.with_transaction_id(tx);
                }
                Ok(outcome)
            }
            None => Ok(NormalizedOutcome::failed(
                "deposit accepted but no payment url returned".to_string(),
            )
            .with_order_id(order_id)
            .with_raw(parsed)),
        }
    }

    fn name(&self) -> ProviderName {
        ProviderName::SwiftGoldPay
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SwiftGoldPayConfig {
        SwiftGoldPayConfig {
            base_url: "https://uat-api.swiftgoldpay.com".to_string(),
            client_id: "client-1".to_string(),
            client_secret: "cs-1".to_string(),
            client_ref_id: "ref-1".to_string(),
            apigw_api_id: "gw-1".to_string(),
            signing_key: "signing-key".to_string(),
            callback_url: "https://cashier.example/callbacks/swiftgoldpay".to_string(),
        }
    }

    #[test]
    fn signature_covers_client_id_timestamp_and_body() {
        let cfg = config();
        let sig = SwiftGoldPayProvider::sign(&cfg, "1735689600000", "{}").expect("hmac signs");
        let expected =
            hmac_sha256_hex("signing-key", "client-11735689600000{}").expect("hmac signs");
        assert_eq!(sig, expected);
        assert_eq!(sig.len(), 64);
    }

    #[test]
    fn status_code_is_probed_in_both_spellings() {
        let camel = serde_json::json!({ "statusCode": "S-2000" });
        assert_eq!(SwiftGoldPayProvider::status_code_of(&camel), Some("S-2000"));
        let snake = serde_json::json!({ "status_code": "S-4004" });
        assert_eq!(SwiftGoldPayProvider::status_code_of(&snake), Some("S-4004"));
        let missing = serde_json::json!({ "data": {} });
        assert!(SwiftGoldPayProvider::status_code_of(&missing).is_none());
    }

    #[test]
    fn missing_signing_key_is_a_configuration_error() {
        let secrets = RuntimeConfigStore::new();
        secrets.set("SWIFTGOLDPAY_CLIENT_ID", "c");
        secrets.set("SWIFTGOLDPAY_CLIENT_SECRET", "s");
        secrets.set("SWIFTGOLDPAY_CLIENT_REF_ID", "r");
        secrets.set("SWIFTGOLDPAY_APIGW_API_ID", "g");
        let err = SwiftGoldPayConfig::load(&secrets).unwrap_err();
        assert!(matches!(err, PaymentError::Configuration { .. }));
    }
}
