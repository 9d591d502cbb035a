use crate::payments::error::{PaymentError, PaymentResult};
use crate::payments::provider::PaymentProvider;
use crate::payments::providers::{
    JmfProvider, LuxtakProvider, NuveiConnectProvider, NuveiHostedProvider, PaypalProvider,
    PaysolutionsProvider, PraxisProvider, SmilepayzProvider, SwiftGoldPayProvider, ZotaProvider,
};
use crate::payments::types::ProviderName;
use crate::services::comm_log::CommLogSink;
use crate::services::runtime_config::RuntimeConfigStore;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone)]
pub struct PaymentFactoryConfig {
    pub enabled_providers: Vec<ProviderName>,
}

impl PaymentFactoryConfig {
    pub fn from_env() -> PaymentResult<Self> {
        let enabled_raw = std::env::var("ENABLED_PAYMENT_PROVIDERS").unwrap_or_default();
        if enabled_raw.trim().is_empty() {
            return Ok(Self {
                enabled_providers: ProviderName::all().to_vec(),
            });
        }

        let mut enabled_providers = Vec::new();
        for part in enabled_raw.split(',') {
            let value = part.trim();
            if value.is_empty() {
                continue;
            }
            enabled_providers.push(ProviderName::from_str(value)?);
        }
        if enabled_providers.is_empty() {
            return Err(PaymentError::Validation {
                message: "at least one payment provider must be enabled".to_string(),
                field: Some("ENABLED_PAYMENT_PROVIDERS".to_string()),
            });
        }
        Ok(Self { enabled_providers })
    }
}

/// Builds every enabled provider once at startup. Providers hold the
/// shared runtime config store and read their credentials on each call,
/// so a missing secret surfaces at submission time rather than here and
/// a rotated secret takes effect without a restart.
pub struct PaymentProviderFactory {
    providers: HashMap<ProviderName, Arc<dyn PaymentProvider>>,
}

impl PaymentProviderFactory {
    pub fn build(
        config: &PaymentFactoryConfig,
        secrets: Arc<RuntimeConfigStore>,
        comm_log: CommLogSink,
    ) -> PaymentResult<Self> {
        let mut providers: HashMap<ProviderName, Arc<dyn PaymentProvider>> = HashMap::new();
        for name in &config.enabled_providers {
            let provider: Arc<dyn PaymentProvider> = match name {
                ProviderName::Praxis => {
                    Arc::new(PraxisProvider::new(secrets.clone(), comm_log.clone())?)
                }
                ProviderName::Zota => {
                    Arc::new(ZotaProvider::new(secrets.clone(), comm_log.clone())?)
                }
                ProviderName::Jmf => {
                    Arc::new(JmfProvider::new(secrets.clone(), comm_log.clone())?)
                }
                ProviderName::Smilepayz => {
                    Arc::new(SmilepayzProvider::new(secrets.clone(), comm_log.clone())?)
                }
                ProviderName::SwiftGoldPay => {
                    Arc::new(SwiftGoldPayProvider::new(secrets.clone(), comm_log.clone())?)
                }
                ProviderName::NuveiHosted => {
                    Arc::new(NuveiHostedProvider::new(secrets.clone(), comm_log.clone()))
                }
                ProviderName::NuveiConnect => {
                    Arc::new(NuveiConnectProvider::new(secrets.clone(), comm_log.clone())?)
                }
                ProviderName::Paypal => {
                    Arc::new(PaypalProvider::new(secrets.clone(), comm_log.clone())?)
                }
                ProviderName::Luxtak => {
                    Arc::new(LuxtakProvider::new(secrets.clone(), comm_log.clone())?)
                }
                ProviderName::Paysolutions => {
                    Arc::new(PaysolutionsProvider::new(secrets.clone(), comm_log.clone())?)
                }
            };
            providers.insert(*name, provider);
        }
        info!(count = providers.len(), "payment providers initialized");
        Ok(Self { providers })
    }

    #[cfg(test)]
    pub(crate) fn from_providers(
        providers: HashMap<ProviderName, Arc<dyn PaymentProvider>>,
    ) -> Self {
        Self { providers }
    }

    pub fn get_provider(&self, provider: &ProviderName) -> PaymentResult<Arc<dyn PaymentProvider>> {
        self.providers
            .get(provider)
            .cloned()
            .ok_or_else(|| PaymentError::UnsupportedMethod {
                method: provider.to_string(),
            })
    }

    pub fn list_available_providers(&self) -> Vec<ProviderName> {
        self.providers.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn factory() -> PaymentProviderFactory {
        let config = PaymentFactoryConfig {
            enabled_providers: ProviderName::all().to_vec(),
        };
        PaymentProviderFactory::build(
            &config,
            Arc::new(RuntimeConfigStore::new()),
            CommLogSink::new(None),
        )
        .expect("factory builds without secrets present")
    }

    #[test]
    fn every_provider_is_constructible_without_secrets() {
        let factory = factory();
        for name in ProviderName::all() {
            let provider = factory.get_provider(name).expect("provider registered");
            assert_eq!(&provider.name(), name);
        }
    }

    #[test]
    fn disabled_providers_are_not_registered() {
        let config = PaymentFactoryConfig {
            enabled_providers: vec![ProviderName::Zota],
        };
        let factory = PaymentProviderFactory::build(
            &config,
            Arc::new(RuntimeConfigStore::new()),
            CommLogSink::new(None),
        )
        .expect("factory builds");
        assert!(factory.get_provider(&ProviderName::Zota).is_ok());
        assert!(matches!(
            factory.get_provider(&ProviderName::Paypal),
            Err(PaymentError::UnsupportedMethod { .. })
        ));
    }

    #[test]
    fn callback_only_flags_match_the_provider_contracts() {
        let factory = factory();
        for name in [ProviderName::Smilepayz, ProviderName::Luxtak] {
            assert!(factory.get_provider(&name).unwrap().callback_only());
        }
        for name in [
            ProviderName::Praxis,
            ProviderName::Paypal,
            ProviderName::Zota,
        ] {
            assert!(!factory.get_provider(&name).unwrap().callback_only());
        }
    }
}
