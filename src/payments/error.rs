use thiserror::Error;

pub type PaymentResult<T> = Result<T, PaymentError>;

/// Error taxonomy for the payment core. Transport, timeout and parse
/// failures are distinct variants so callers can tell them apart.
#[derive(Debug, Clone, Error)]
pub enum PaymentError {
    #[error("Validation error: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    #[error("Configuration error: provider={provider}")]
    Configuration { provider: String },

    #[error("Transport error: provider={provider}, message={message}")]
    Transport { provider: String, message: String },

    #[error("Timeout after {seconds}s: provider={provider}")]
    Timeout { provider: String, seconds: u64 },

    #[error("Parse error: provider={provider}, message={message}")]
    Parse { provider: String, message: String },

    #[error("Unsupported payment method: {method}")]
    UnsupportedMethod { method: String },

    #[error("Reconciliation mismatch: {message}")]
    ReconciliationMismatch { message: String },
}

impl PaymentError {
    pub fn is_retryable(&self) -> bool {
        match self {
            PaymentError::Validation { .. } => false,
            PaymentError::Configuration { .. } => false,
            PaymentError::Transport { .. } => true,
            PaymentError::Timeout { .. } => true,
            PaymentError::Parse { .. } => false,
            PaymentError::UnsupportedMethod { .. } => false,
            PaymentError::ReconciliationMismatch { .. } => false,
        }
    }

    pub fn http_status_code(&self) -> u16 {
        match self {
            PaymentError::Validation { .. } => 400,
            PaymentError::Configuration { .. } => 500,
            PaymentError::Transport { .. } => 502,
            PaymentError::Timeout { .. } => 504,
            PaymentError::Parse { .. } => 502,
            PaymentError::UnsupportedMethod { .. } => 400,
            PaymentError::ReconciliationMismatch { .. } => 200,
        }
    }

    /// Message safe to show to end users. Configuration detail (which
    /// credential is missing) never leaks here.
    pub fn user_message(&self) -> String {
        match self {
            PaymentError::Validation { message, .. } => message.clone(),
            PaymentError::Configuration { .. } => "Payment initialization failed".to_string(),
            PaymentError::Transport { .. } => {
                "Payment provider is temporarily unavailable".to_string()
            }
            PaymentError::Timeout { .. } => {
                "Payment provider did not respond in time".to_string()
            }
            PaymentError::Parse { .. } => "Payment failed, please try again".to_string(),
            PaymentError::UnsupportedMethod { method } => {
                format!("Unsupported payment method: {}", method)
            }
            PaymentError::ReconciliationMismatch { .. } => "No callback received".to_string(),
        }
    }

    pub fn missing_config(provider: &str, key: &str) -> Self {
        // The key name goes to logs only, never to the user-facing message.
        tracing::error!(provider = provider, key = key, "missing provider credential");
        PaymentError::Configuration {
            provider: provider.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_status_mapping_is_correct() {
        assert_eq!(
            PaymentError::Validation {
                message: "bad".to_string(),
                field: None
            }
            .http_status_code(),
            400
        );
        assert_eq!(
            PaymentError::Timeout {
                provider: "zota".to_string(),
                seconds: 30
            }
            .http_status_code(),
            504
        );
        assert_eq!(
            PaymentError::UnsupportedMethod {
                method: "skrill".to_string()
            }
            .http_status_code(),
            400
        );
    }

    #[test]
    fn retryable_flags_are_set() {
        assert!(PaymentError::Transport {
            provider: "zota".to_string(),
            message: "connection reset".to_string()
        }
        .is_retryable());
        assert!(!PaymentError::Parse {
            provider: "jmf".to_string(),
            message: "unexpected shape".to_string()
        }
        .is_retryable());
    }

    #[test]
    fn configuration_errors_never_leak_the_missing_key() {
        let err = PaymentError::missing_config("praxis", "PRAXIS_MERCHANT_SECRET");
        assert_eq!(err.user_message(), "Payment initialization failed");
        assert!(!err.to_string().contains("MERCHANT_SECRET"));
    }
}
