//! RPC Method Handlers
//!
//! Implements the business logic for each JSON-RPC method.

use crate::error::{catalog_unavailable, to_rpc_error};
use crate::types::{
    AssetsRequest, AssetsResponse, EnqueueRequest, EnqueueResponse, InteractiveRequest,
    InteractiveResponse, ProductEntry, ProductsResponse, QueueAck, ResolveRequest,
    ResolveResponse, StatusResponse,
};
use jsonrpsee::types::ErrorObjectOwned;
use porter_core::application::{
    find_product_assets, find_product_packages, CatalogService, PathResolver, QueueHandle,
};
use porter_core::domain::ResolvedProduct;
use porter_core::error::AppError;
use porter_core::port::InstallationTracker;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// RPC Handler with injected dependencies
pub struct RpcHandler {
    queue: QueueHandle,
    resolver: PathResolver,
    catalog: Option<Arc<CatalogService>>,
    tracker: Arc<dyn InstallationTracker>,
}

impl RpcHandler {
    pub fn new(
        queue: QueueHandle,
        resolver: PathResolver,
        catalog: Option<Arc<CatalogService>>,
        tracker: Arc<dyn InstallationTracker>,
    ) -> Self {
        Self {
            queue,
            resolver,
            catalog,
            tracker,
        }
    }

    /// queue.enqueue.v1
    pub async fn enqueue(
        &self,
        params: EnqueueRequest,
    ) -> Result<EnqueueResponse, ErrorObjectOwned> {
        if params.paths.is_empty() {
            return Err(to_rpc_error(AppError::Validation(
                "paths must not be empty".to_string(),
            )));
        }

        let requested = params.paths.len();
        let added = self
            .queue
            .enqueue(params.paths, params.owner_id)
            .await
            .map_err(to_rpc_error)?;
        let status = self.queue.status().await.map_err(to_rpc_error)?;

        info!(requested = requested, added = added, "Enqueue via RPC");
        Ok(EnqueueResponse {
            added,
            remaining: status.remaining,
        })
    }

    /// queue.start.v1
    pub async fn start(&self) -> Result<QueueAck, ErrorObjectOwned> {
        self.queue.start().await.map_err(to_rpc_error)?;
        self.ack().await
    }

    /// queue.clear.v1
    pub async fn clear(&self) -> Result<QueueAck, ErrorObjectOwned> {
        self.queue.clear().await.map_err(to_rpc_error)?;
        self.ack().await
    }

    /// queue.status.v1
    pub async fn status(&self) -> Result<StatusResponse, ErrorObjectOwned> {
        self.queue.status().await.map_err(to_rpc_error)
    }

    /// queue.interactive.v1
    pub async fn interactive(
        &self,
        params: InteractiveRequest,
    ) -> Result<InteractiveResponse, ErrorObjectOwned> {
        if let Some(interactive) = params.interactive {
            self.queue
                .set_interactive(interactive)
                .await
                .map_err(to_rpc_error)?;
        }
        let status = self.queue.status().await.map_err(to_rpc_error)?;
        Ok(InteractiveResponse {
            interactive: status.interactive,
        })
    }

    /// catalog.resolve.v1
    pub async fn resolve(&self, params: ResolveRequest) -> Result<ResolveResponse, ErrorObjectOwned> {
        let library_root = match params.library_root.filter(|r| !r.is_empty()) {
            Some(root) => PathBuf::from(root),
            None => self.catalog_root().await?,
        };

        let product = ResolvedProduct {
            id: params.id,
            name: params.name,
            root_folder_path: None,
            shop_tag: params.shop_tag,
        };

        // Directory probing is blocking IO
        let resolver = self.resolver.clone();
        let root = library_root.clone();
        let found = tokio::task::spawn_blocking(move || resolver.resolve(&root, &product))
            .await
            .map_err(|e| to_rpc_error(AppError::Internal(e.to_string())))?;

        Ok(ResolveResponse {
            library_root: library_root.to_string_lossy().into_owned(),
            path: found.map(|p| p.to_string_lossy().into_owned()),
        })
    }

    /// catalog.assets.v1
    pub async fn assets(&self, params: AssetsRequest) -> Result<AssetsResponse, ErrorObjectOwned> {
        if params.root.is_empty() {
            return Err(to_rpc_error(AppError::Validation(
                "root must not be empty".to_string(),
            )));
        }

        let root = params.root.clone();
        let packages_only = params.packages_only;
        let assets = tokio::task::spawn_blocking(move || {
            let root = Path::new(&root);
            if packages_only {
                find_product_packages(root)
            } else {
                find_product_assets(root)
            }
        })
        .await
        .map_err(|e| to_rpc_error(AppError::Internal(e.to_string())))?;

        Ok(AssetsResponse {
            root: params.root,
            assets,
        })
    }

    /// catalog.products.v1
    pub async fn products(&self) -> Result<ProductsResponse, ErrorObjectOwned> {
        let catalog = self.catalog.as_ref().ok_or_else(catalog_unavailable)?;

        let library_root = catalog.library_root().await.map_err(to_rpc_error)?;
        let products = catalog.load_products().await.map_err(to_rpc_error)?;
        let installed: HashSet<String> = self
            .tracker
            .installed_ids()
            .await
            .map_err(to_rpc_error)?
            .into_iter()
            .collect();

        Ok(ProductsResponse {
            library_root: library_root.map(|r| r.to_string_lossy().into_owned()),
            products: products
                .into_iter()
                .map(|product| ProductEntry {
                    installed: installed.contains(&product.id),
                    product,
                })
                .collect(),
        })
    }

    async fn ack(&self) -> Result<QueueAck, ErrorObjectOwned> {
        let status = self.queue.status().await.map_err(to_rpc_error)?;
        Ok(QueueAck {
            processing: status.processing,
            remaining: status.remaining,
        })
    }

    async fn catalog_root(&self) -> Result<PathBuf, ErrorObjectOwned> {
        let catalog = self.catalog.as_ref().ok_or_else(catalog_unavailable)?;
        catalog
            .library_root()
            .await
            .map_err(to_rpc_error)?
            .ok_or_else(|| {
                to_rpc_error(AppError::NotFound(
                    "Catalogue has no library root".to_string(),
                ))
            })
    }
}
