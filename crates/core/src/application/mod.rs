// Application Layer - Use Cases and Business Logic

pub mod assets;
pub mod catalog;
pub mod import_queue;
pub mod local_assets;
pub mod recovery;
pub mod resolver;
pub mod runner;

// Re-exports
pub use assets::{find_product_assets, find_product_packages};
pub use catalog::CatalogService;
pub use import_queue::{
    EngineMessage, EnginePhase, ImportQueue, PersistedQueueStore, QueueEvent, QueueStatus, Tick,
};
pub use local_assets::load_local_assets;
pub use recovery::RecoveryPlan;
pub use resolver::{CanonicalConvention, PathResolver, ResolverConfig};
pub use runner::{
    shutdown_channel, spawn_queue_runner, QueueHandle, QueueRunner, ShutdownSender, ShutdownToken,
};
