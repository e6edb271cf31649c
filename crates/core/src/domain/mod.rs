// Domain Layer - Pure business logic and entities

pub mod asset;
pub mod error;
pub mod import;
pub mod product;
pub mod queue;

// Re-exports
pub use asset::{AssetCategory, ProductAsset};
pub use error::DomainError;
pub use import::{ImportOutcome, ImportRequest};
pub use product::{CatalogProduct, CatalogRow, ProductSource, ResolvedProduct};
pub use queue::{QueueItem, QueueState};
