// Startup recovery for the import queue
//
// The durable store never contains the in-flight item: it is removed (durability
// point B) before dispatch. A persisted `processing = true` therefore means a run
// was interrupted; the interrupted item is gone and must not be re-run.

use crate::domain::QueueState;
use tracing::{info, warn};

/// What the engine must do with freshly loaded state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryPlan {
    /// Nothing was running; start idle
    Clean,
    /// Flag set but nothing left: clear the flag and persist immediately
    ClearStaleFlag,
    /// A run was interrupted with items left: clear the flag and resume
    /// processing on the next idle tick (never synchronously during startup)
    ResumeOnNextTick { remaining: usize },
}

impl RecoveryPlan {
    /// Decide how to recover from `state` as loaded at process start
    pub fn for_state(state: &QueueState) -> Self {
        match (state.processing, state.items.len()) {
            (false, _) => RecoveryPlan::Clean,
            (true, 0) => {
                warn!("Stale processing flag with an empty queue, clearing it");
                RecoveryPlan::ClearStaleFlag
            }
            (true, remaining) => {
                info!(
                    remaining = remaining,
                    "Import run was interrupted, resuming with the remaining items"
                );
                RecoveryPlan::ResumeOnNextTick { remaining }
            }
        }
    }

    pub fn needs_persist(&self) -> bool {
        matches!(self, RecoveryPlan::ClearStaleFlag)
    }
}
