// Asset Domain Model

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Coarse grouping of importable files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetCategory {
    Package,
    Texture,
    Model,
    Audio,
    Other,
}

impl AssetCategory {
    /// Classify a file extension. Accepts `"png"`, `".png"` or `".PNG"`.
    pub fn from_extension(extension: &str) -> Self {
        let ext = extension.trim_start_matches('.').to_ascii_lowercase();
        match ext.as_str() {
            "unitypackage" => AssetCategory::Package,
            "png" | "jpg" | "jpeg" | "tga" | "psd" => AssetCategory::Texture,
            "fbx" | "obj" | "blend" => AssetCategory::Model,
            "wav" | "mp3" | "ogg" => AssetCategory::Audio,
            _ => AssetCategory::Other,
        }
    }

    /// Classify a path by its extension; no extension is `Other`
    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(Self::from_extension)
            .unwrap_or(AssetCategory::Other)
    }

    pub fn is_supported(self) -> bool {
        self != AssetCategory::Other
    }
}

impl std::fmt::Display for AssetCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AssetCategory::Package => write!(f, "package"),
            AssetCategory::Texture => write!(f, "texture"),
            AssetCategory::Model => write!(f, "model"),
            AssetCategory::Audio => write!(f, "audio"),
            AssetCategory::Other => write!(f, "other"),
        }
    }
}

/// A file inside a product folder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductAsset {
    pub file_name: String,
    pub full_path: String,
    pub category: AssetCategory,
}

impl ProductAsset {
    pub fn from_path(path: &Path) -> Self {
        Self {
            file_name: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            full_path: path.to_string_lossy().into_owned(),
            category: AssetCategory::from_path(path),
        }
    }
}
