use dashmap::DashMap;
use std::env;

/// Key/value override layer on top of environment configuration.
///
/// Providers read credentials through this store on every request, so an
/// operator can rotate a secret at runtime without a restart. Overrides
/// are process-local and, like order state, do not survive restarts.
#[derive(Debug, Default)]
pub struct RuntimeConfigStore {
    overrides: DashMap<String, String>,
}

impl RuntimeConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override first, environment second.
    pub fn get(&self, key: &str) -> Option<String> {
        if let Some(value) = self.overrides.get(key) {
            return Some(value.clone());
        }
        env::var(key).ok()
    }

    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        self.overrides.insert(key.into(), value.into());
    }

    pub fn set_many<I, K, V>(&self, entries: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (key, value) in entries {
            self.set(key, value);
        }
    }

    pub fn remove(&self, key: &str) {
        self.overrides.remove(key);
    }

    /// Current override keys, for the admin surface. Values are masked by
    /// the caller; this store never logs them.
    pub fn override_keys(&self) -> Vec<String> {
        self.overrides.iter().map(|e| e.key().clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn override_wins_over_environment() {
        let store = RuntimeConfigStore::new();
        env::set_var("RUNTIME_CONFIG_TEST_KEY", "from-env");
        assert_eq!(
            store.get("RUNTIME_CONFIG_TEST_KEY").as_deref(),
            Some("from-env")
        );

        store.set("RUNTIME_CONFIG_TEST_KEY", "from-override");
        assert_eq!(
            store.get("RUNTIME_CONFIG_TEST_KEY").as_deref(),
            Some("from-override")
        );

        store.remove("RUNTIME_CONFIG_TEST_KEY");
        assert_eq!(
            store.get("RUNTIME_CONFIG_TEST_KEY").as_deref(),
            Some("from-env")
        );
        env::remove_var("RUNTIME_CONFIG_TEST_KEY");
    }

    #[test]
    fn missing_key_returns_none() {
        let store = RuntimeConfigStore::new();
        assert!(store.get("RUNTIME_CONFIG_TEST_ABSENT").is_none());
    }

    #[test]
    fn set_many_applies_all_entries() {
        let store = RuntimeConfigStore::new();
        store.set_many(vec![("A_KEY", "1"), ("B_KEY", "2")]);
        assert_eq!(store.get("A_KEY").as_deref(), Some("1"));
        assert_eq!(store.get("B_KEY").as_deref(), Some("2"));
        assert_eq!(store.override_keys().len(), 2);
    }
}
