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

/// Bearer-token provider with an unusual wire contract: the create call
/// is a POST whose parameters travel entirely in the query string, and
/// reference numbers must be purely numeric.
pub struct PaysolutionsProvider {
    secrets: Arc<RuntimeConfigStore>,
    http: PaymentHttpClient,
    comm_log: CommLogSink,
}

#[derive(Debug, Clone)]
struct PaysolutionsConfig {
    endpoint: String,
    merchant_id: String,
    api_token: String,
}

impl PaysolutionsConfig {
    fn load(secrets: &RuntimeConfigStore) -> PaymentResult<Self> {
        let required = |key: &str| {
            secrets
                .get(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| PaymentError::missing_config("paysolutions", key))
        };
        Ok(Self {
            endpoint: secrets.get("PAYSOLUTIONS_ENDPOINT").unwrap_or_else(|| {
                "https://apis.paysolutions.asia/order/orderdetailpost".to_string()
            }),
            merchant_id: required("PAYSOLUTIONS_MERCHANT_ID")?,
            api_token: required("PAYSOLUTIONS_API_TOKEN")?,
        })
    }
}

#[derive(Debug, Deserialize)]
struct PaysolutionsResponse {
    #[serde(default, rename = "orderNo")]
    order_no: Option<String>,
    #[serde(default, rename = "postUrl")]
    post_url: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl PaysolutionsProvider {
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
impl PaymentProvider for PaysolutionsProvider {
    async fn create_intent(
        &self,
        intent: &PaymentIntent,
        order_id: &str,
    ) -> PaymentResult<NormalizedOutcome> {
        let config = PaysolutionsConfig::load(&self.secrets)?;
        let total = intent.amount.as_major_2dp();

        self.comm_log.log(
            "paysolutions-outbound",
            serde_json::json!({ "referenceNo": order_id, "total": total }),
            "paysolutions",
        );

        // Parameters go in the query string even though this is a POST.
        let request = self
            .http
            .client()
            .post(&config.endpoint)
            .bearer_auth(&config.api_token)
            .query(&[
                ("merchantID", config.merchant_id.as_str()),
                ("productDetail", "Deposit"),
                ("customerEmail", intent.customer_email.as_str()),
                ("customerName", intent.customer_name.as_str()),
                ("total", total.as_str()),
                ("referenceNo", order_id),
            ]);
        let (status, body) = self.http.execute("paysolutions", request).await?;
        self.comm_log.log(
            "paysolutions-inbound",
            serde_json::json!({ "status": status.as_u16(), "referenceNo": order_id }),
            "paysolutions",
        );

        let parsed: PaysolutionsResponse = PaymentHttpClient::decode("paysolutions", &body)?;
        let post_url = parsed.post_url.as_deref().filter(|v| !v.is_empty());
        match (status.is_success(), post_url) {
            (true, Some(url)) => {
                info!(reference_no = order_id, "paysolutions order created");
                let mut outcome =
                    NormalizedOutcome::approved(url.to_string()).with_order_id(order_id);
                if let Some(order_no) = parsed.order_no.as_deref() {
                    outcome = outcome.with_transaction_id(order_no);
                }
                Ok(outcome)
            }
            _ => Ok(NormalizedOutcome::failed(
                parsed
                    .message
                    .unwrap_or_else(|| format!("HTTP {}", status)),
            )
            .with_order_id(order_id)),
        }
    }

    fn name(&self) -> ProviderName {
        ProviderName::Paysolutions
    }

    /// Reference numbers must be numeric only.
    fn new_order_id(&self) -> String {
        let mut rng = rand::thread_rng();
        rng.gen_range(1_000_000_000u64..10_000_000_000).to_string()
    }
}
