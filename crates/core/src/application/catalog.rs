// Catalogue Service - products from the catalogue database plus local assets

use crate::application::assets::find_product_assets;
use crate::application::local_assets::load_local_assets;
use crate::application::resolver::PathResolver;
use crate::domain::{CatalogProduct, CatalogRow, ProductSource, ResolvedProduct};
use crate::error::Result;
use crate::port::ProductCatalog;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Shop name shown for rows without a shop
pub const UNKNOWN_SHOP_NAME: &str = "Unknown";

/// Cached thumbnail extensions, in lookup order
const THUMBNAIL_CACHE_EXTENSIONS: &[&str] = &["png", "jpg"];

pub struct CatalogService {
    catalog: Arc<dyn ProductCatalog>,
    resolver: PathResolver,
    thumbnail_cache: Option<PathBuf>,
}

impl CatalogService {
    pub fn new(
        catalog: Arc<dyn ProductCatalog>,
        resolver: PathResolver,
        thumbnail_cache: Option<PathBuf>,
    ) -> Self {
        Self {
            catalog,
            resolver,
            thumbnail_cache,
        }
    }

    pub async fn library_root(&self) -> Result<Option<PathBuf>> {
        Ok(self
            .catalog
            .library_root()
            .await?
            .filter(|root| !root.is_empty())
            .map(PathBuf::from))
    }

    /// Every catalogue product with folder, thumbnail and assets filled in,
    /// followed by the local assets
    pub async fn load_products(&self) -> Result<Vec<CatalogProduct>> {
        let root = self.library_root().await?;
        if root.is_none() {
            warn!("Catalogue has no library root; product folders cannot be resolved");
        }

        let rows = self.catalog.load_rows().await?;
        let mut products: Vec<CatalogProduct> = rows
            .into_iter()
            .map(|row| self.build_product(root.as_deref(), row))
            .collect();

        if let Some(root) = &root {
            products.extend(load_local_assets(root));
        }

        info!(count = products.len(), "Catalogue loaded");
        Ok(products)
    }

    /// Known folder if it still exists, else the resolver's best guess
    pub fn resolve_folder(&self, library_root: &Path, product: &ResolvedProduct) -> Option<PathBuf> {
        self.resolver.resolve(library_root, product)
    }

    fn build_product(&self, root: Option<&Path>, row: CatalogRow) -> CatalogProduct {
        let shop_tag = row.shop_subdomain.filter(|s| !s.is_empty());
        let resolved = ResolvedProduct {
            id: row.id.clone(),
            name: row.name.clone(),
            root_folder_path: None,
            shop_tag: shop_tag.clone(),
        };

        let folder = root.and_then(|root| self.resolver.resolve(root, &resolved));
        let assets = folder.as_deref().map(find_product_assets).unwrap_or_default();

        CatalogProduct {
            thumbnail_path: self.cached_thumbnail(&row.id),
            id: row.id,
            name: row.name,
            shop_name: row.shop_name.unwrap_or_else(|| UNKNOWN_SHOP_NAME.to_string()),
            shop_tag,
            thumbnail_url: row.thumbnail_url.filter(|u| !u.is_empty()),
            root_folder_path: folder.map(|f| f.to_string_lossy().into_owned()),
            assets,
            source: ProductSource::Catalog,
        }
    }

    fn cached_thumbnail(&self, id: &str) -> Option<String> {
        let cache = self.thumbnail_cache.as_ref()?;
        THUMBNAIL_CACHE_EXTENSIONS
            .iter()
            .map(|ext| cache.join(format!("{id}.{ext}")))
            .find(|path| path.is_file())
            .map(|path| path.to_string_lossy().into_owned())
    }
}
