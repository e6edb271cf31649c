// Bundle Porter Infrastructure - SQLite Adapters
// Implements: PreferenceStore, InstallationTracker, ProductCatalog (read-only)

mod catalog_reader;
mod connection;
mod error;
mod installation_history;
mod migration;
mod preference_store;

pub use catalog_reader::{decode_blob_path, SqliteProductCatalog};
pub use connection::{create_pool, open_catalog_pool};
pub use installation_history::SqliteInstallationTracker;
pub use migration::{current_version, run_migrations};
pub use preference_store::SqlitePreferenceStore;
