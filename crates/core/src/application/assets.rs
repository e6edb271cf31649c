// Product asset scan - importable files inside a product folder

use crate::domain::{AssetCategory, ProductAsset};
use std::path::Path;
use tracing::{debug, trace};
use walkdir::WalkDir;

/// Every supported file under `root`, recursively, in path order.
/// A missing root or unreadable entries are skipped, never an error.
pub fn find_product_assets(root: &Path) -> Vec<ProductAsset> {
    scan(root, AssetCategory::is_supported)
}

/// Only the package archives under `root`
pub fn find_product_packages(root: &Path) -> Vec<ProductAsset> {
    scan(root, |category| category == AssetCategory::Package)
}

fn scan(root: &Path, keep: impl Fn(AssetCategory) -> bool) -> Vec<ProductAsset> {
    if !root.is_dir() {
        debug!(root = %root.display(), "Product folder missing, no assets");
        return Vec::new();
    }

    let mut assets = Vec::new();
    for entry in WalkDir::new(root).follow_links(false).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                trace!(error = %e, "Skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let asset = ProductAsset::from_path(entry.path());
        if keep(asset.category) {
            assets.push(asset);
        }
    }
    assets
}
