// Preference Store Port
// Durable string key/value storage, the backing facility of the persisted queue

use crate::error::Result;
use async_trait::async_trait;

/// Durable key/value store (host "preferences" style)
#[async_trait]
pub trait PreferenceStore: Send + Sync {
    /// Read a raw value; `None` when the key was never written
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write a raw value, replacing any previous one
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Write several values. Adapters that can do so apply them in one transaction.
    async fn set_many(&self, entries: &[(&str, String)]) -> Result<()> {
        for (key, value) in entries {
            self.set(key, value).await?;
        }
        Ok(())
    }

    /// Read a boolean; unparseable values fall back to `default`
    async fn get_bool(&self, key: &str, default: bool) -> Result<bool> {
        Ok(self
            .get(key)
            .await?
            .and_then(|raw| parse_bool(&raw))
            .unwrap_or(default))
    }

    async fn set_bool(&self, key: &str, value: bool) -> Result<()> {
        self.set(key, encode_bool(value)).await
    }
}

pub fn encode_bool(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}

pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::error::AppError;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    /// In-memory preference store. Clones share the same map, which lets a
    /// test "restart" an engine against the store an earlier engine wrote.
    #[derive(Clone, Default)]
    pub struct InMemoryPreferenceStore {
        values: Arc<Mutex<HashMap<String, String>>>,
        fail_reads: Arc<Mutex<bool>>,
        failing_write: Arc<Mutex<Option<usize>>>,
        writes: Arc<Mutex<usize>>,
    }

    impl InMemoryPreferenceStore {
        pub fn new() -> Self {
            Self::default()
        }

        /// Make every subsequent read fail (simulates an unreadable store)
        pub fn set_fail_reads(&self, fail: bool) {
            *self.fail_reads.lock().unwrap() = fail;
        }

        /// Make write number `n` (as counted by `write_count`) fail once, leaving
        /// the stored values untouched
        pub fn fail_write_at(&self, n: usize) {
            *self.failing_write.lock().unwrap() = Some(n);
        }

        pub fn raw(&self, key: &str) -> Option<String> {
            self.values.lock().unwrap().get(key).cloned()
        }

        pub fn insert_raw(&self, key: &str, value: &str) {
            self.values
                .lock()
                .unwrap()
                .insert(key.to_string(), value.to_string());
        }

        /// Number of `set`/`set_many` calls so far, failed ones included
        pub fn write_count(&self) -> usize {
            *self.writes.lock().unwrap()
        }

        fn begin_write(&self, key: &str) -> Result<()> {
            let mut writes = self.writes.lock().unwrap();
            *writes += 1;
            let mut failing = self.failing_write.lock().unwrap();
            if *failing == Some(*writes) {
                *failing = None;
                return Err(AppError::Persistence(format!("write of {key} failed")));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl PreferenceStore for InMemoryPreferenceStore {
        async fn get(&self, key: &str) -> Result<Option<String>> {
            if *self.fail_reads.lock().unwrap() {
                return Err(AppError::Persistence(format!("read of {key} failed")));
            }
            Ok(self.values.lock().unwrap().get(key).cloned())
        }

        async fn set(&self, key: &str, value: &str) -> Result<()> {
            self.begin_write(key)?;
            self.values
                .lock()
                .unwrap()
                .insert(key.to_string(), value.to_string());
            Ok(())
        }

        async fn set_many(&self, entries: &[(&str, String)]) -> Result<()> {
            self.begin_write(entries.first().map(|(k, _)| *k).unwrap_or_default())?;
            let mut values = self.values.lock().unwrap();
            for (key, value) in entries {
                values.insert(key.to_string(), value.clone());
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mocks::InMemoryPreferenceStore;
    use super::*;

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("true"), Some(true));
        assert_eq!(parse_bool(" 1 "), Some(true));
        assert_eq!(parse_bool("False"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[tokio::test]
    async fn test_bool_defaults() {
        let store = InMemoryPreferenceStore::new();
        assert!(store.get_bool("missing", true).await.unwrap());

        store.insert_raw("garbled", "yes please");
        assert!(!store.get_bool("garbled", false).await.unwrap());

        store.set_bool("flag", true).await.unwrap();
        assert_eq!(store.raw("flag").as_deref(), Some("true"));
    }
}
