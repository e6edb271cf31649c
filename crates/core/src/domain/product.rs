// Product Domain Model

use super::asset::ProductAsset;
use serde::{Deserialize, Serialize};

/// The fields the path resolver needs from a catalogue entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedProduct {
    pub id: String,
    pub name: String,
    pub root_folder_path: Option<String>,
    pub shop_tag: Option<String>,
}

impl ResolvedProduct {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            root_folder_path: None,
            shop_tag: None,
        }
    }

    pub fn with_shop_tag(mut self, shop_tag: impl Into<String>) -> Self {
        self.shop_tag = Some(shop_tag.into());
        self
    }
}

/// Raw product row as stored in the catalogue database
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogRow {
    pub id: String,
    pub name: String,
    pub shop_name: Option<String>,
    pub shop_subdomain: Option<String>,
    pub thumbnail_url: Option<String>,
}

/// Where a catalogue entry came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductSource {
    Catalog,
    Local,
}

/// A browsable product with its resolved folder and importable files
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogProduct {
    pub id: String,
    pub name: String,
    pub shop_name: String,
    pub shop_tag: Option<String>,
    pub thumbnail_url: Option<String>,
    pub thumbnail_path: Option<String>,
    pub root_folder_path: Option<String>,
    pub assets: Vec<ProductAsset>,
    pub source: ProductSource,
}

impl CatalogProduct {
    pub fn as_resolved(&self) -> ResolvedProduct {
        ResolvedProduct {
            id: self.id.clone(),
            name: self.name.clone(),
            root_folder_path: self.root_folder_path.clone(),
            shop_tag: self.shop_tag.clone(),
        }
    }

    /// Full paths of every importable package file
    pub fn package_paths(&self) -> Vec<String> {
        self.assets
            .iter()
            .filter(|a| a.category == super::AssetCategory::Package)
            .map(|a| a.full_path.clone())
            .collect()
    }
}
