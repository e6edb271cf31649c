// Product Catalog Port
// Read-only access to the catalogue database

use crate::domain::CatalogRow;
use crate::error::Result;
use async_trait::async_trait;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    /// Library root folder configured in the catalogue, if any
    async fn library_root(&self) -> Result<Option<String>>;

    /// Every purchasable product row
    async fn load_rows(&self) -> Result<Vec<CatalogRow>>;
}
