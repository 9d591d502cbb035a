use chrono::Utc;
use serde_json::Value as JsonValue;
use std::time::Duration;
use tracing::{debug, info};

/// Best-effort communication log: every provider exchange is traced
/// locally and, when an endpoint is configured, mirrored to a remote sink
/// as fire-and-forget JSON. Delivery failures are swallowed; this sink
/// must never affect a payment's outcome.
#[derive(Clone)]
pub struct CommLogSink {
    endpoint: Option<String>,
    client: reqwest::Client,
}

impl CommLogSink {
    pub fn new(endpoint: Option<String>) -> Self {
        Self {
            endpoint: endpoint.filter(|e| !e.trim().is_empty()),
            client: reqwest::Client::new(),
        }
    }

    pub fn log(&self, event_type: &str, data: JsonValue, category: &str) {
        info!(
            event_type = event_type,
            category = category,
            "comm log event"
        );

        let Some(endpoint) = self.endpoint.clone() else {
            return;
        };
        let client = self.client.clone();
        let entry = serde_json::json!({
            "type": event_type,
            "category": category,
            "timestamp": Utc::now().to_rfc3339(),
            "data": data,
        });
        tokio::spawn(async move {
            let result = client
                .post(&endpoint)
                .timeout(Duration::from_secs(5))
                .json(&entry)
                .send()
                .await;
            if let Err(e) = result {
                debug!(error = %e, "comm log delivery failed");
            }
        });
    }
}
