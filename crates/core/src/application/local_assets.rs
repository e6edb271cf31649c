// Local asset loader - hand-managed products under `{library_root}/LocalAssets`

use crate::domain::{AssetCategory, CatalogProduct, ProductAsset, ProductSource};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const LOCAL_ASSETS_DIR: &str = "LocalAssets";
pub const LOCAL_ID_PREFIX: &str = "local_";
pub const LOCAL_SHOP_NAME: &str = "Local";

/// Thumbnail extensions in preference order
const THUMBNAIL_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "tga", "psd"];

/// One product per subfolder of `LocalAssets`. Folders without a package are skipped.
pub fn load_local_assets(library_root: &Path) -> Vec<CatalogProduct> {
    if library_root.as_os_str().is_empty() {
        return Vec::new();
    }

    let local_root = library_root.join(LOCAL_ASSETS_DIR);
    let entries = match fs::read_dir(&local_root) {
        Ok(entries) => entries,
        Err(_) => {
            debug!(path = %local_root.display(), "No local assets folder");
            return Vec::new();
        }
    };

    let mut folders: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();
    folders.sort();

    let products: Vec<CatalogProduct> = folders.iter().filter_map(|f| load_folder(f)).collect();
    info!(count = products.len(), "Local assets loaded");
    products
}

fn load_folder(folder: &Path) -> Option<CatalogProduct> {
    let name = folder.file_name()?.to_string_lossy().into_owned();
    let files = root_files(folder);

    let assets: Vec<ProductAsset> = files
        .iter()
        .map(|f| ProductAsset::from_path(f))
        .filter(|a| a.category == AssetCategory::Package)
        .collect();
    if assets.is_empty() {
        warn!(folder = %folder.display(), "Local asset folder has no package, skipping");
        return None;
    }

    Some(CatalogProduct {
        id: format!("{LOCAL_ID_PREFIX}{name}"),
        name,
        shop_name: LOCAL_SHOP_NAME.to_string(),
        shop_tag: None,
        thumbnail_url: None,
        thumbnail_path: find_thumbnail(&files).map(|p| p.to_string_lossy().into_owned()),
        root_folder_path: Some(folder.to_string_lossy().into_owned()),
        assets,
        source: ProductSource::Local,
    })
}

/// Files directly inside `folder`, sorted by name
fn root_files(folder: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = fs::read_dir(folder)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| p.is_file())
                .collect()
        })
        .unwrap_or_default();
    files.sort();
    files
}

fn find_thumbnail(files: &[PathBuf]) -> Option<&PathBuf> {
    THUMBNAIL_EXTENSIONS.iter().find_map(|wanted| {
        files.iter().find(|f| {
            f.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case(wanted))
        })
    })
}
