use crate::payments::error::{PaymentError, PaymentResult};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::warn;

/// Thin wrapper around `reqwest::Client` with a bounded per-call timeout.
///
/// Transport failures, timeouts and undecodable bodies surface as three
/// distinct `PaymentError` variants so adapters and callers can tell them
/// apart.
#[derive(Clone)]
pub struct PaymentHttpClient {
    client: Client,
    timeout: Duration,
}

impl PaymentHttpClient {
    pub fn new(timeout: Duration) -> PaymentResult<Self> {
        let client = Client::builder().timeout(timeout).build().map_err(|e| {
            PaymentError::Transport {
                provider: "http".to_string(),
                message: format!("failed to initialize HTTP client: {}", e),
            }
        })?;
        Ok(Self { client, timeout })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Sends a prepared request and returns status plus raw body text.
    /// A client-side timeout maps to `Timeout`, everything else on the
    /// wire to `Transport`.
    pub async fn execute(
        &self,
        provider: &str,
        request: RequestBuilder,
    ) -> PaymentResult<(StatusCode, String)> {
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                PaymentError::Timeout {
                    provider: provider.to_string(),
                    seconds: self.timeout.as_secs(),
                }
            } else {
                PaymentError::Transport {
                    provider: provider.to_string(),
                    message: format!("provider request failed: {}", e),
                }
            }
        })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| PaymentError::Transport {
            provider: provider.to_string(),
            message: format!("failed to read provider response: {}", e),
        })?;

        if !status.is_success() {
            warn!(
                provider = provider,
                status = %status,
                "provider returned non-success HTTP status"
            );
        }
        Ok((status, body))
    }

    /// Decodes a provider response body into `T`, reporting `Parse` on any
    /// shape mismatch.
    pub fn decode<T: DeserializeOwned>(provider: &str, body: &str) -> PaymentResult<T> {
        serde_json::from_str::<T>(body).map_err(|e| PaymentError::Parse {
            provider: provider.to_string(),
            message: format!("invalid provider JSON response: {}", e),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Sample {
        code: String,
    }

    #[test]
    fn decode_reports_parse_errors_with_provider_context() {
        let ok: Sample =
            PaymentHttpClient::decode("zota", r#"{"code":"200"}"#).expect("valid json decodes");
        assert_eq!(ok.code, "200");

        let err = PaymentHttpClient::decode::<Sample>("zota", "not json").unwrap_err();
        match err {
            PaymentError::Parse { provider, .. } => assert_eq!(provider, "zota"),
            other => panic!("expected parse error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn transport_failure_is_distinguishable() {
        let http = PaymentHttpClient::new(Duration::from_secs(2)).expect("client builds");
        // Reserved TEST-NET address, nothing listens there.
        let request = http.client().get("http://192.0.2.1:9/").timeout(Duration::from_millis(200));
        let err = http.execute("zota", request).await.unwrap_err();
        assert!(matches!(
            err,
            PaymentError::Transport { .. } | PaymentError::Timeout { .. }
        ));
    }
}
