// Persisted Queue Store
// Line codec over a PreferenceStore: items as `path|owner` lines, flag stored separately

use crate::domain::QueueState;
use crate::error::Result;
use crate::port::preference_store::encode_bool;
use crate::port::PreferenceStore;
use std::sync::Arc;
use tracing::{debug, warn};

/// Key holding the newline-joined item lines
pub const QUEUE_ITEMS_KEY: &str = "porter.import_queue.items";

/// Key holding the "is processing" flag
pub const QUEUE_PROCESSING_KEY: &str = "porter.import_queue.processing";

/// Key holding the interactive-import preference
pub const QUEUE_INTERACTIVE_KEY: &str = "porter.import_queue.interactive";

/// Interactive imports are the default until the user turns them off
pub const DEFAULT_INTERACTIVE: bool = true;

#[derive(Clone)]
pub struct PersistedQueueStore {
    prefs: Arc<dyn PreferenceStore>,
}

impl PersistedQueueStore {
    pub fn new(prefs: Arc<dyn PreferenceStore>) -> Self {
        Self { prefs }
    }

    /// Write items and flag together
    pub async fn save(&self, state: &QueueState) -> Result<()> {
        self.prefs
            .set_many(&[
                (QUEUE_ITEMS_KEY, state.encode_items()),
                (QUEUE_PROCESSING_KEY, encode_bool(state.processing).to_string()),
            ])
            .await?;

        debug!(
            items = state.items.len(),
            processing = state.processing,
            "Queue state persisted"
        );
        Ok(())
    }

    /// Load the persisted state. Never fails: anything unreadable is an empty queue.
    pub async fn load(&self) -> QueueState {
        let items = match self.prefs.get(QUEUE_ITEMS_KEY).await {
            Ok(Some(raw)) => QueueState::decode_items(&raw),
            Ok(None) => Default::default(),
            Err(e) => {
                warn!(error = %e, "Queue store unreadable, starting with an empty queue");
                Default::default()
            }
        };

        let processing = match self.prefs.get_bool(QUEUE_PROCESSING_KEY, false).await {
            Ok(flag) => flag,
            Err(e) => {
                warn!(error = %e, "Processing flag unreadable, assuming idle");
                false
            }
        };

        QueueState { items, processing }
    }

    pub async fn load_interactive(&self) -> bool {
        self.prefs
            .get_bool(QUEUE_INTERACTIVE_KEY, DEFAULT_INTERACTIVE)
            .await
            .unwrap_or_else(|e| {
                warn!(error = %e, "Interactive preference unreadable, using default");
                DEFAULT_INTERACTIVE
            })
    }

    pub async fn save_interactive(&self, interactive: bool) -> Result<()> {
        self.prefs.set_bool(QUEUE_INTERACTIVE_KEY, interactive).await
    }
}
