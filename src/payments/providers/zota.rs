use crate::payments::crypto::concat_sha256_hex;
use crate::payments::error::{PaymentError, PaymentResult};
use crate::payments::provider::PaymentProvider;
use crate::payments::types::{NormalizedOutcome, PaymentIntent, ProviderName};
use crate::payments::utils::PaymentHttpClient;
use crate::services::comm_log::CommLogSink;
use crate::services::runtime_config::RuntimeConfigStore;
use async_trait::async_trait;
use rand::Rng;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Deposit provider signed with a SHA-256 digest over
/// `endpoint_id + merchant_order_id + amount + email + secret`.
/// Amounts are 2-dp decimal strings, order ids use the `R-3xxxxxx`
/// trade-number convention shared with the callback.
///
/// Successful responses carry `depositUrl`/`orderID` either at the top
/// level or under `data`; both locations are probed before giving up.
pub struct ZotaProvider {
    secrets: Arc<RuntimeConfigStore>,
    http: PaymentHttpClient,
    comm_log: CommLogSink,
}

#[derive(Debug, Clone)]
struct ZotaConfig {
    base_url: String,
    endpoint_id: String,
    secret_key: String,
    redirect_url: String,
    callback_url: String,
    checkout_url: String,
}

impl ZotaConfig {
    fn load(secrets: &RuntimeConfigStore) -> PaymentResult<Self> {
        let required = |key: &str| {
            secrets
                .get(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| PaymentError::missing_config("zota", key))
        };
        let base = secrets
            .get("PUBLIC_BASE_URL")
            .unwrap_or_else(|| "http://localhost:8000".to_string());
        let base = base.trim_end_matches('/').to_string();
        Ok(Self {
            base_url: secrets
                .get("ZOTA_BASE_URL")
                .unwrap_or_else(|| "https://api.zotapay-sandbox.com".to_string()),
            endpoint_id: required("ZOTA_ENDPOINT_ID")?,
            secret_key: required("ZOTA_SECRET_KEY")?,
            redirect_url: format!("{}/return/zota", base),
            callback_url: format!("{}/callbacks/zota", base),
            checkout_url: format!("{}/checkout", base),
        })
    }
}

#[derive(Debug, Deserialize)]
struct ZotaResponse {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Option<ZotaDepositData>,
    // Some deployments answer with the deposit fields at the top level.
    #[serde(default, rename = "depositUrl")]
    deposit_url: Option<String>,
    #[serde(default, rename = "orderID")]
    order_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ZotaDepositData {
    #[serde(default, rename = "depositUrl")]
    deposit_url: Option<String>,
    #[serde(default, rename = "orderID")]
    order_id: Option<String>,
}

impl ZotaResponse {
    fn deposit_url(&self) -> Option<&str> {
        self.deposit_url
            .as_deref()
            .filter(|v| !v.is_empty())
            .or_else(|| {
                self.data
                    .as_ref()
                    .and_then(|d| d.deposit_url.as_deref())
                    .filter(|v| !v.is_empty())
            })
    }

    fn provider_order_id(&self) -> Option<&str> {
        self.order_id
            .as_deref()
            .or_else(|| self.data.as_ref().and_then(|d| d.order_id.as_deref()))
    }
}

impl ZotaProvider {
    pub fn new(secrets: Arc<RuntimeConfigStore>, comm_log: CommLogSink) -> PaymentResult<Self> {
        let http = PaymentHttpClient::new(Duration::from_secs(30))?;
        Ok(Self {
            secrets,
            http,
            comm_log,
        })
    }

    fn sign_deposit(
        config: &ZotaConfig,
        merchant_order_id: &str,
        amount: &str,
        customer_email: &str,
    ) -> String {
        concat_sha256_hex(&[
            &config.endpoint_id,
            merchant_order_id,
            amount,
            customer_email,
            &config.secret_key,
        ])
    }
}

#[async_trait]
impl PaymentProvider for ZotaProvider {
    async fn create_intent(
        &self,
        intent: &PaymentIntent,
        order_id: &str,
    ) -> PaymentResult<NormalizedOutcome> {
        let config = ZotaConfig::load(&self.secrets)?;
        let amount = intent.amount.as_major_trimmed();
        let signature = Self::sign_deposit(&config, order_id, &amount, &intent.customer_email);

        let (first_name, last_name) = split_name(&intent.customer_name);
        let payload = serde_json::json!({
            "merchantOrderID": order_id,
            "merchantOrderDesc": "Deposit",
            "orderAmount": amount,
            "orderCurrency": intent.amount.currency,
            "customerEmail": intent.customer_email,
            "customerFirstName": first_name,
            "customerLastName": last_name,
            "redirectUrl": config.redirect_url,
            "callbackUrl": config.callback_url,
            "checkoutUrl": config.checkout_url,
            "signature": signature,
        });

        self.comm_log.log(
            "zota-outbound",
            serde_json::json!({ "merchantOrderID": order_id, "orderAmount": amount }),
            "zota",
        );

        let url = format!(
            "{}/api/v1/deposit/request/{}/",
            config.base_url.trim_end_matches('/'),
            config.endpoint_id
        );
        let request = self.http.client().post(&url).json(&payload);
        let (status, body) = self.http.execute("zota", request).await?;
        self.comm_log.log(
            "zota-inbound",
            serde_json::json!({ "status": status.as_u16(), "merchantOrderID": order_id }),
            "zota",
        );

        let parsed: ZotaResponse = PaymentHttpClient::decode("zota", &body)?;
        match (status.is_success(), parsed.deposit_url()) {
            (true, Some(deposit_url)) => {
                info!(merchant_order_id = order_id, "zota deposit created");
                let mut outcome = NormalizedOutcome::approved(deposit_url.to_string())
                    .with_order_id(order_id);
                if let Some(provider_id) = parsed.provider_order_id() {
                    outcome = outcome.with_transaction_id(provider_id);
                }
                Ok(outcome)
            }
            _ => Ok(NormalizedOutcome::failed(
                parsed
                    .message
                    .or(parsed.code)
                    .unwrap_or_else(|| format!("HTTP {}", status)),
            )
            .with_order_id(order_id)),
        }
    }

    fn name(&self) -> ProviderName {
        ProviderName::Zota
    }

    /// Trade-number convention: `R-` plus a random seven-digit number in
    /// the 3,000,000 range, echoed back in callbacks as merchantOrderID.
    fn new_order_id(&self) -> String {
        let mut rng = rand::thread_rng();
        format!("R-{}", rng.gen_range(3_000_000u32..4_000_000))
    }
}

fn split_name(full_name: &str) -> (String, String) {
    match full_name.trim().split_once(' ') {
        Some((first, last)) => (first.to_string(), last.trim().to_string()),
        None => (full_name.trim().to_string(), "Customer".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ZotaConfig {
        ZotaConfig {
            base_url: "https://api.zotapay-sandbox.com".to_string(),
            endpoint_id: "400009".to_string(),
            secret_key: "zota-secret".to_string(),
            redirect_url: "https://cashier.example/return/zota".to_string(),
            callback_url: "https://cashier.example/callbacks/zota".to_string(),
            checkout_url: "https://cashier.example/checkout".to_string(),
        }
    }

    #[test]
    fn deposit_signature_covers_the_documented_fields() {
        let cfg = config();
        let sig = ZotaProvider::sign_deposit(&cfg, "R-3000001", "25", "jane@example.com");
        let expected =
            concat_sha256_hex(&["400009", "R-3000001", "25", "jane@example.com", "zota-secret"]);
        assert_eq!(sig, expected);
    }

    #[test]
    fn deposit_url_is_probed_top_level_then_under_data() {
        let flat: ZotaResponse = serde_json::from_value(serde_json::json!({
            "code": "200",
            "depositUrl": "https://pay.zota.example/a",
            "orderID": "z-1"
        }))
        .expect("flat shape parses");
        assert_eq!(flat.deposit_url(), Some("https://pay.zota.example/a"));
        assert_eq!(flat.provider_order_id(), Some("z-1"));

        let nested: ZotaResponse = serde_json::from_value(serde_json::json!({
            "code": "200",
            "data": { "depositUrl": "https://pay.zota.example/b", "orderID": "z-2" }
        }))
        .expect("nested shape parses");
        assert_eq!(nested.deposit_url(), Some("https://pay.zota.example/b"));
        assert_eq!(nested.provider_order_id(), Some("z-2"));

        let failure: ZotaResponse = serde_json::from_value(serde_json::json!({
            "code": "400",
            "message": "invalid signature"
        }))
        .expect("failure shape parses");
        assert!(failure.deposit_url().is_none());
    }

    #[test]
    fn trade_numbers_use_the_r_prefix_range() {
        let secrets = Arc::new(RuntimeConfigStore::new());
        let provider =
            ZotaProvider::new(secrets, CommLogSink::new(None)).expect("provider builds");
        for _ in 0..16 {
            let id = provider.new_order_id();
            assert!(id.starts_with("R-3"), "unexpected id {}", id);
            assert_eq!(id.len(), 9);
        }
    }

    #[test]
    fn split_name_handles_single_names() {
        assert_eq!(
            split_name("Jane Doe"),
            ("Jane".to_string(), "Doe".to_string())
        );
        assert_eq!(
            split_name("Cher"),
            ("Cher".to_string(), "Customer".to_string())
        );
    }
}
