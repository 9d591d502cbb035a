use crate::payments::crypto::concat_sha256_hex;
use crate::payments::error::{PaymentError, PaymentResult};
use crate::payments::provider::PaymentProvider;
use crate::payments::types::{NormalizedOutcome, PaymentIntent, ProviderName};
use crate::payments::utils::PaymentHttpClient;
use crate::services::comm_log::CommLogSink;
use crate::services::runtime_config::RuntimeConfigStore;
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

const ORDER_DESCRIPTION: &str = "Deposit";
const SESSION_EXPIRY_MINUTES: u32 = 60;

/// Hosted-checkout provider authenticated by a hash over
/// `order_number + amount + currency + description + api_password`.
/// The redirect target only ever appears under the nested `response`
/// object; there is no flat variant for this provider.
pub struct JmfProvider {
    secrets: Arc<RuntimeConfigStore>,
    http: PaymentHttpClient,
    comm_log: CommLogSink,
}

#[derive(Debug, Clone)]
struct JmfConfig {
    endpoint: String,
    merchant_key: String,
    api_password: String,
    success_url: String,
    cancel_url: String,
}

impl JmfConfig {
    fn load(secrets: &RuntimeConfigStore) -> PaymentResult<Self> {
        let required = |key: &str| {
            secrets
                .get(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| PaymentError::missing_config("jmf", key))
        };
        let base = secrets
            .get("PUBLIC_BASE_URL")
            .unwrap_or_else(|| "http://localhost:8000".to_string());
        let base = base.trim_end_matches('/').to_string();
        Ok(Self {
            endpoint: required("JMF_ENDPOINT")?,
            merchant_key: required("JMF_MERCHANT_KEY")?,
            api_password: required("JMF_API_PASSWORD")?,
            success_url: format!("{}/return/jmf", base),
            cancel_url: format!("{}/return/jmf?cancelled=1", base),
        })
    }
}

#[derive(Debug, Deserialize)]
struct JmfResponse {
    #[serde(default)]
    response: Option<JmfNestedResponse>,
    #[serde(default)]
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct JmfNestedResponse {
    #[serde(default)]
    redirect_url: Option<String>,
    #[serde(default)]
    id: Option<String>,
}

impl JmfProvider {
    pub fn new(secrets: Arc<RuntimeConfigStore>, comm_log: CommLogSink) -> PaymentResult<Self> {
        let http = PaymentHttpClient::new(Duration::from_secs(30))?;
        Ok(Self {
            secrets,
            http,
            comm_log,
        })
    }

    fn order_hash(config: &JmfConfig, order_number: &str, amount: &str, currency: &str) -> String {
        concat_sha256_hex(&[
            order_number,
            amount,
            currency,
            ORDER_DESCRIPTION,
            &config.api_password,
        ])
    }
}

#[async_trait]
impl PaymentProvider for JmfProvider {
    async fn create_intent(
        &self,
        intent: &PaymentIntent,
        order_id: &str,
    ) -> PaymentResult<NormalizedOutcome> {
        let config = JmfConfig::load(&self.secrets)?;
        let amount = intent.amount.as_major_2dp();
        let hash = Self::order_hash(&config, order_id, &amount, &intent.amount.currency);

        let payload = serde_json::json!({
            "merchant_key": config.merchant_key,
            "operation": "purchase",
            "order": {
                "number": order_id,
                "amount": amount,
                "currency": intent.amount.currency,
                "description": ORDER_DESCRIPTION,
            },
            "session_expiry": SESSION_EXPIRY_MINUTES,
            "success_url": config.success_url,
            "cancel_url": config.cancel_url,
            "customer": {
                "name": intent.customer_name,
                "email": intent.customer_email,
            },
            "hash": hash,
        });

        self.comm_log.log(
            "jmf-outbound",
            serde_json::json!({ "order": order_id, "amount": amount }),
            "jmf",
        );

        let request = self.http.client().post(&config.endpoint).json(&payload);
        let (status, body) = self.http.execute("jmf", request).await?;
        self.comm_log.log(
            "jmf-inbound",
            serde_json::json!({ "status": status.as_u16(), "order": order_id }),
            "jmf",
        );

        let parsed: JmfResponse = PaymentHttpClient::decode("jmf", &body)?;
        let redirect = parsed
            .response
            .as_ref()
            .and_then(|r| r.redirect_url.as_deref())
            .filter(|v| !v.is_empty());
        match redirect {
            Some(redirect_url) => {
                info!(order = order_id, "jmf checkout session created");
                let mut outcome =
                    NormalizedOutcome::approved(redirect_url.to_string()).with_order_id(order_id);
                if let Some(session_id) = parsed.response.as_ref().and_then(|r| r.id.as_deref()) {
                    outcome = outcome.with_transaction_id(session_id);
                }
                Ok(outcome)
            }
            None => Ok(NormalizedOutcome::failed(
                parsed
                    .error_message
                    .unwrap_or_else(|| "checkout session was not created".to_string()),
            )
            .with_order_id(order_id)),
        }
    }

    fn name(&self) -> ProviderName {
        ProviderName::Jmf
    }
}
