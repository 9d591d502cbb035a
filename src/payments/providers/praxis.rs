use crate::payments::crypto::{aes_cbc_encrypt_field, concat_sha384_hex};
use crate::payments::error::{PaymentError, PaymentResult};
use crate::payments::provider::PaymentProvider;
use crate::payments::types::{NormalizedOutcome, PaymentIntent, ProviderName};
use crate::payments::utils::PaymentHttpClient;
use crate::services::comm_log::CommLogSink;
use crate::services::runtime_config::RuntimeConfigStore;
use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Card cashier provider. Requests carry an AES-encrypted card number and
/// a SHA-384 request signature in the `GT-Authentication` header; the
/// amount goes out in integer minor units.
///
/// The response carries `redirect_url` at the top level for the plain
/// flow, or nested under `response` for the step-up challenge variant —
/// both locations are probed explicitly.
pub struct PraxisProvider {
    secrets: Arc<RuntimeConfigStore>,
    http: PaymentHttpClient,
    comm_log: CommLogSink,
}

#[derive(Debug, Clone)]
struct PraxisConfig {
    endpoint: String,
    merchant_id: String,
    application_key: String,
    merchant_secret: String,
    gateway: String,
    notification_url: String,
    return_url: String,
}

impl PraxisConfig {
    fn load(secrets: &RuntimeConfigStore) -> PaymentResult<Self> {
        let required = |key: &str| {
            secrets
                .get(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| PaymentError::missing_config("praxis", key))
        };
        let base_url = secrets
            .get("PUBLIC_BASE_URL")
            .unwrap_or_else(|| "http://localhost:8000".to_string());
        Ok(Self {
            endpoint: secrets
                .get("PRAXIS_ENDPOINT")
                .unwrap_or_else(|| "https://pci-gw-test.praxispay.com/api/direct-process".to_string()),
            merchant_id: required("PRAXIS_MERCHANT_ID")?,
            application_key: required("PRAXIS_APPLICATION_KEY")?,
            merchant_secret: required("PRAXIS_MERCHANT_SECRET")?,
            gateway: secrets
                .get("PRAXIS_GATEWAY")
                .unwrap_or_else(|| "CC".to_string()),
            notification_url: format!("{}/callbacks/praxis", base_url.trim_end_matches('/')),
            return_url: format!("{}/return/praxis", base_url.trim_end_matches('/')),
        })
    }
}

impl PraxisProvider {
    pub fn new(secrets: Arc<RuntimeConfigStore>, comm_log: CommLogSink) -> PaymentResult<Self> {
        let http = PaymentHttpClient::new(Duration::from_secs(30))?;
        Ok(Self {
            secrets,
            http,
            comm_log,
        })
    }

    /// SHA-384 over the provider-defined field order, which is not the
    /// JSON field order of the request body.
    fn sign_request(
        config: &PraxisConfig,
        timestamp: &str,
        cid: &str,
        order_id: &str,
        currency: &str,
        amount_minor: &str,
        encrypted_card: &str,
    ) -> String {
        concat_sha384_hex(&[
            &config.merchant_id,
            &config.application_key,
            timestamp,
            "sale",
            cid,
            order_id,
            currency,
            amount_minor,
            &config.gateway,
            &config.notification_url,
            &config.return_url,
            encrypted_card,
            &config.merchant_secret,
        ])
    }

    fn probe_redirect(body: &JsonValue) -> Option<String> {
        // Plain flow: top level. Challenge flow: nested "response" object.
        body.get("redirect_url")
            .and_then(|v| v.as_str())
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .or_else(|| {
                body.get("response")
                    .and_then(|r| r.get("redirect_url"))
                    .and_then(|v| v.as_str())
                    .filter(|v| !v.is_empty())
                    .map(str::to_string)
            })
    }

    fn probe_transaction_id(body: &JsonValue) -> Option<String> {
        let from = |node: &JsonValue| {
            node.get("transaction")
                .and_then(|t| t.get("transaction_id").or_else(|| t.get("tid")))
                .map(|v| match v {
                    JsonValue::String(s) => s.clone(),
                    other => other.to_string(),
                })
        };
        from(body).or_else(|| body.get("response").and_then(|r| from(r)))
    }
}

#[async_trait]
impl PaymentProvider for PraxisProvider {
    async fn create_intent(
        &self,
        intent: &PaymentIntent,
        order_id: &str,
    ) -> PaymentResult<NormalizedOutcome> {
        let config = PraxisConfig::load(&self.secrets)?;
        let card = intent.card.as_ref().ok_or_else(|| PaymentError::Validation {
            message: "card details are required for this payment method".to_string(),
            field: Some("card".to_string()),
        })?;

        let timestamp = Utc::now().timestamp().to_string();
        let cid = {
            let mut rng = rand::thread_rng();
            rng.gen_range(1_000_000u64..10_000_000).to_string()
        };
        let amount_minor = intent.amount.as_minor_units().to_string();
        let encrypted_number =
            aes_cbc_encrypt_field("praxis", &card.number, &config.merchant_secret, &timestamp)?;
        let encrypted_cvv =
            aes_cbc_encrypt_field("praxis", &card.cvv, &config.merchant_secret, &timestamp)?;

        let signature = Self::sign_request(
            &config,
            &timestamp,
            &cid,
            order_id,
            &intent.amount.currency,
            &amount_minor,
            &encrypted_number,
        );

        let payload = serde_json::json!({
            "merchant_id": config.merchant_id,
            "application_key": config.application_key,
            "transaction_type": "sale",
            "currency": intent.amount.currency,
            "amount": intent.amount.as_minor_units(),
            "card_data": {
                "card_number": encrypted_number,
                "card_exp": format!("{}/{}", card.expiry_month, card.expiry_year),
                "cvv": encrypted_cvv,
                "card_holder": card.holder_name,
            },
            "cid": cid,
            "order_id": order_id,
            "gateway": config.gateway,
            "notification_url": config.notification_url,
            "return_url": config.return_url,
            "customer_data": {
                "full_name": intent.customer_name,
                "email": intent.customer_email,
            },
            "version": "1.3",
            "timestamp": timestamp,
        });

        self.comm_log.log(
            "praxis-outbound",
            serde_json::json!({ "order_id": order_id, "cid": cid, "amount": amount_minor }),
            "praxis",
        );

        let request = self
            .http
            .client()
            .post(&config.endpoint)
            .header("GT-Authentication", &signature)
            .json(&payload);
        let (status, body) = self.http.execute("praxis", request).await?;
        self.comm_log.log(
            "praxis-inbound",
            serde_json::json!({ "status": status.as_u16(), "order_id": order_id }),
            "praxis",
        );

        let parsed: JsonValue = PaymentHttpClient::decode("praxis", &body)?;
        if let Some(redirect_url) = Self::probe_redirect(&parsed) {
            info!(order_id = order_id, "praxis sale accepted");
            let mut outcome = NormalizedOutcome::approved(redirect_url)
                .with_order_id(order_id)
                .with_raw(parsed.clone());
            if let Some(tid) = Self::probe_transaction_id(&parsed) {
                outcome = outcome.with_transaction_id(tid);
            }
            return Ok(outcome);
        }

        let description = parsed
            .get("description")
            .and_then(|v| v.as_str())
            .unwrap_or("payment was not accepted")
            .to_string();
        Ok(NormalizedOutcome::failed(description)
            .with_order_id(order_id)
            .with_raw(parsed))
    }

    fn name(&self) -> ProviderName {
        ProviderName::Praxis
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> PraxisConfig {
        PraxisConfig {
            endpoint: "https://pci-gw-test.praxispay.com/api/direct-process".to_string(),
            merchant_id: "merchant-1".to_string(),
            application_key: "app-key".to_string(),
            merchant_secret: "topsecret".to_string(),
            gateway: "CC".to_string(),
            notification_url: "https://cashier.example/callbacks/praxis".to_string(),
            return_url: "https://cashier.example/return/praxis".to_string(),
        }
    }

    #[test]
    fn request_signature_is_deterministic() {
        let cfg = config();
        let a = PraxisProvider::sign_request(&cfg, "1735689600", "1234567", "abc123", "USD", "2500", "enc");
        let b = PraxisProvider::sign_request(&cfg, "1735689600", "1234567", "abc123", "USD", "2500", "enc");
        assert_eq!(a, b);
        assert_eq!(a.len(), 96); // SHA-384 hex

        let other = PraxisProvider::sign_request(&cfg, "1735689601", "1234567", "abc123", "USD", "2500", "enc");
        assert_ne!(a, other);
    }

    #[test]
    fn redirect_is_probed_in_both_locations() {
        let flat = serde_json::json!({ "redirect_url": "https://3ds.example/a" });
        assert_eq!(
            PraxisProvider::probe_redirect(&flat).as_deref(),
            Some("https://3ds.example/a")
        );

        let nested = serde_json::json!({ "response": { "redirect_url": "https://3ds.example/b" } });
        assert_eq!(
            PraxisProvider::probe_redirect(&nested).as_deref(),
            Some("https://3ds.example/b")
        );

        let neither = serde_json::json!({ "status": -1, "description": "declined" });
        assert!(PraxisProvider::probe_redirect(&neither).is_none());
    }

    #[test]
    fn transaction_id_handles_numeric_and_string_forms() {
        let numeric = serde_json::json!({ "transaction": { "transaction_id": 991 } });
        assert_eq!(
            PraxisProvider::probe_transaction_id(&numeric).as_deref(),
            Some("991")
        );
        let nested = serde_json::json!({ "response": { "transaction": { "tid": "abc" } } });
        assert_eq!(
            PraxisProvider::probe_transaction_id(&nested).as_deref(),
            Some("abc")
        );
    }

    #[test]
    fn missing_secret_is_a_configuration_error() {
        let secrets = RuntimeConfigStore::new();
        secrets.set("PRAXIS_MERCHANT_ID", "m");
        // application key and merchant secret absent
        let err = PraxisConfig::load(&secrets).unwrap_err();
        assert!(matches!(err, PaymentError::Configuration { .. }));
    }
}
