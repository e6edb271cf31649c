// Import Dispatch Domain Model

use serde::{Deserialize, Serialize};

/// What the engine hands to the import executor for one dispatch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportRequest {
    pub source_path: String,
    pub owner_id: String,
    pub interactive: bool,
}

/// Outcome reported by the import executor for one dispatch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ImportOutcome {
    Completed { name: String },
    Cancelled { name: String },
    Failed { name: String, message: String },
}

impl ImportOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ImportOutcome::Completed { .. })
    }

    pub fn name(&self) -> &str {
        match self {
            ImportOutcome::Completed { name }
            | ImportOutcome::Cancelled { name }
            | ImportOutcome::Failed { name, .. } => name,
        }
    }
}

impl std::fmt::Display for ImportOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImportOutcome::Completed { .. } => write!(f, "COMPLETED"),
            ImportOutcome::Cancelled { .. } => write!(f, "CANCELLED"),
            ImportOutcome::Failed { .. } => write!(f, "FAILED"),
        }
    }
}
