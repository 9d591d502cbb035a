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

const SUCCESS_CODE: &str = "10000";

/// Basic-auth trade provider using the shared `R-` trade-number
/// convention. The create call hands back a payment url; settlement is
/// reported exclusively through the callback, so a declined create
/// leaves the order pending rather than failed.
pub struct LuxtakProvider {
    secrets: Arc<RuntimeConfigStore>,
    http: PaymentHttpClient,
    comm_log: CommLogSink,
}

#[derive(Debug, Clone)]
struct LuxtakConfig {
    endpoint: String,
    app_id: String,
    auth_token: String,
    notify_url: String,
    return_url: String,
}

impl LuxtakConfig {
    fn load(secrets: &RuntimeConfigStore) -> PaymentResult<Self> {
        let required = |key: &str| {
            secrets
                .get(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| PaymentError::missing_config("luxtak", key))
        };
        let base = secrets
            .get("PUBLIC_BASE_URL")
            .unwrap_or_else(|| "http://localhost:8000".to_string());
        let base = base.trim_end_matches('/').to_string();
        Ok(Self {
            endpoint: secrets
                .get("LUXTAK_ENDPOINT")
                .unwrap_or_else(|| "https://gateway.luxtak.com/trade/create".to_string()),
            app_id: required("LUXTAK_APP_ID")?,
            auth_token: required("LUXTAK_AUTH_TOKEN")?,
            notify_url: format!("{}/callbacks/luxtak", base),
            return_url: format!("{}/return/luxtak", base),
        })
    }
}

#[derive(Debug, Deserialize)]
struct LuxtakResponse {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    data: Option<LuxtakTradeData>,
}

#[derive(Debug, Deserialize)]
struct LuxtakTradeData {
    #[serde(default)]
    trade_no: Option<String>,
    #[serde(default)]
    out_trade_no: Option<String>,
    #[serde(default)]
    trade_status: Option<String>,
    #[serde(default)]
    payment_url: Option<String>,
}

impl LuxtakProvider {
    pub fn new(secrets: Arc<RuntimeConfigStore>, comm_log: CommLogSink) -> PaymentResult<Self> {
        let http = PaymentHttpClient::new(Duration::from_secs(30))?;
        Ok(Self {
            secrets,
            http,
            comm_log,
        })
    }
}

#[async_trait]
impl PaymentProvider for LuxtakProvider {
    async fn create_intent(
        &self,
        intent: &PaymentIntent,
        order_id: &str,
    ) -> PaymentResult<NormalizedOutcome> {
        let config = LuxtakConfig::load(&self.secrets)?;
        let buyer_id = {
            let mut rng = rand::thread_rng();
            format!("buyer_{}", rng.gen_range(7_000_000u32..8_000_000))
        };

        let payload = serde_json::json!({
            "app_id": config.app_id,
            "out_trade_no": order_id,
            "order_currency": intent.amount.currency,
            "order_amount": intent.amount.as_major_2dp(),
            "subject": "Deposit",
            "buyer_id": buyer_id,
            "customer": {
                "name": intent.customer_name,
                "email": intent.customer_email,
            },
            "notify_url": config.notify_url,
            "return_url": config.return_url,
        });

        self.comm_log.log(
            "luxtak-outbound",
            serde_json::json!({ "out_trade_no": order_id, "order_amount": intent.amount.as_major_2dp() }),
            "luxtak",
        );

        let request = self
            .http
            .client()
            .post(&config.endpoint)
            .basic_auth(&config.app_id, Some(&config.auth_token))
            .json(&payload);
        let (status, body) = self.http.execute("luxtak", request).await?;
        self.comm_log.log(
            "luxtak-inbound",
            serde_json::json!({ "status": status.as_u16(), "out_trade_no": order_id }),
            "luxtak",
        );

        let parsed: LuxtakResponse = PaymentHttpClient::decode("luxtak", &body)?;
        let accepted = parsed.code.as_deref() == Some(SUCCESS_CODE);
        let payment_url = parsed
            .data
            .as_ref()
            .and_then(|d| d.payment_url.as_deref())
            .filter(|v| !v.is_empty());
        match (accepted, payment_url) {
            (true, Some(url)) => {
                info!(out_trade_no = order_id, "luxtak trade created");
                let mut outcome =
                    NormalizedOutcome::approved(url.to_string()).with_order_id(order_id);
                if let Some(trade_no) = parsed.data.as_ref().and_then(|d| d.trade_no.as_deref()) {
                    outcome = outcome.with_transaction_id(trade_no);
                }
                Ok(outcome)
            }
            _ => Ok(NormalizedOutcome::failed(
                parsed
                    .msg
                    .unwrap_or_else(|| "trade was not created".to_string()),
            )
            .with_order_id(order_id)),
        }
    }

    fn name(&self) -> ProviderName {
        ProviderName::Luxtak
    }

    fn callback_only(&self) -> bool {
        true
    }

    /// Same `R-` trade-number shape the callback echoes back.
    fn new_order_id(&self) -> String {
        let mut rng = rand::thread_rng();
        format!("R-{}", rng.gen_range(3_000_000u32..4_000_000))
    }
}
