// Installation Tracker Port
// Records which catalogue entries have been imported successfully

use crate::error::Result;
use async_trait::async_trait;

#[async_trait]
pub trait InstallationTracker: Send + Sync {
    /// Record that the owner's files were imported
    async fn mark_installed(&self, owner_id: &str) -> Result<()>;

    async fn is_installed(&self, owner_id: &str) -> Result<bool>;

    /// Every owner id recorded so far
    async fn installed_ids(&self) -> Result<Vec<String>>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// In-memory tracker that also records every `mark_installed` call
    #[derive(Clone, Default)]
    pub struct RecordingInstallationTracker {
        calls: Arc<Mutex<Vec<String>>>,
    }

    impl RecordingInstallationTracker {
        pub fn new() -> Self {
            Self::default()
        }

        /// Owner ids in call order, duplicates included
        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl InstallationTracker for RecordingInstallationTracker {
        async fn mark_installed(&self, owner_id: &str) -> Result<()> {
            self.calls.lock().unwrap().push(owner_id.to_string());
            Ok(())
        }

        async fn is_installed(&self, owner_id: &str) -> Result<bool> {
            Ok(self.calls.lock().unwrap().iter().any(|id| id == owner_id))
        }

        async fn installed_ids(&self) -> Result<Vec<String>> {
            let mut ids = self.calls.lock().unwrap().clone();
            ids.sort();
            ids.dedup();
            Ok(ids)
        }
    }
}
