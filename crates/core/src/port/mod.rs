// Port Layer - Interfaces for external collaborators

pub mod import_executor;
pub mod installation_tracker;
pub mod preference_store;
pub mod product_catalog;
pub mod time_provider;

// Re-exports
pub use import_executor::{
    DispatchId, DispatchOutcome, ExecutionError, ImportExecutor, OutcomeReporter,
};
pub use installation_tracker::InstallationTracker;
pub use preference_store::PreferenceStore;
pub use product_catalog::ProductCatalog;
pub use time_provider::TimeProvider;
