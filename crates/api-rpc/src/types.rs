//! RPC Request/Response Types
//!
//! JSON-RPC method parameters and results. Methods without parameters take none.

use porter_core::application::QueueStatus;
use porter_core::domain::{CatalogProduct, ProductAsset};
use serde::{Deserialize, Serialize};

/// queue.enqueue.v1 - Append files for one owner
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnqueueRequest {
    pub paths: Vec<String>,
    #[serde(default)]
    pub owner_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnqueueResponse {
    pub added: usize,
    pub remaining: usize,
}

/// queue.start.v1 / queue.clear.v1 result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueAck {
    pub processing: bool,
    pub remaining: usize,
}

/// queue.status.v1 result
pub type StatusResponse = QueueStatus;

/// queue.interactive.v1 - Read, or set when `interactive` is given
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InteractiveRequest {
    #[serde(default)]
    pub interactive: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractiveResponse {
    pub interactive: bool,
}

/// catalog.resolve.v1 - Locate a product folder.
/// Without `library_root` the catalogue's root is used.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolveRequest {
    #[serde(default)]
    pub library_root: Option<String>,
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub shop_tag: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolveResponse {
    pub library_root: String,
    pub path: Option<String>,
}

/// catalog.assets.v1 - Importable files under a folder
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetsRequest {
    pub root: String,
    #[serde(default)]
    pub packages_only: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetsResponse {
    pub root: String,
    pub assets: Vec<ProductAsset>,
}

/// catalog.products.v1 result entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductEntry {
    #[serde(flatten)]
    pub product: CatalogProduct,
    pub installed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductsResponse {
    pub library_root: Option<String>,
    pub products: Vec<ProductEntry>,
}
