// Path Resolver - locate a product folder when no folder handle is known
//
// Strategies, first hit wins:
//   1. canonical paths under the library root (configurable convention order)
//   2. the same conventions one level up, plus a bare `{id}` folder
//   3. keyword scan of the root's subfolders and their children

use crate::domain::ResolvedProduct;
use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, trace};

/// Prefix of the canonical `{root}/{prefix}{id}` folder
pub const DEFAULT_CANONICAL_PREFIX: &str = "b";

/// Name tokens shorter than this are too generic to match on
pub const MIN_KEYWORD_CHARS: usize = 2;

/// Separators between name tokens, besides whitespace (full-width forms included)
const KEYWORD_SEPARATORS: &[char] = &['/', '(', ')', '[', ']', '\u{3000}', '\u{FF0F}', '.', '-', '_'];

/// Folder layout conventions tried as canonical paths
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalConvention {
    /// `{root}/{prefix}{id}`
    Prefixed,
    /// `{root}/{shop_tag}/{id}`
    ShopScoped,
}

impl FromStr for CanonicalConvention {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "prefixed" => Ok(CanonicalConvention::Prefixed),
            "shop" | "shop_scoped" => Ok(CanonicalConvention::ShopScoped),
            other => Err(AppError::Config(format!(
                "Unknown canonical folder convention: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverConfig {
    pub prefix: String,
    pub canonical_order: Vec<CanonicalConvention>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_CANONICAL_PREFIX.to_string(),
            canonical_order: vec![CanonicalConvention::Prefixed, CanonicalConvention::ShopScoped],
        }
    }
}

impl ResolverConfig {
    /// Parse a comma separated convention list such as `"shop,prefixed"`.
    /// Repeats are dropped; an empty list is an error.
    pub fn parse_order(raw: &str) -> Result<Vec<CanonicalConvention>> {
        let mut order = Vec::new();
        for part in raw.split(',').filter(|p| !p.trim().is_empty()) {
            let convention = part.parse()?;
            if !order.contains(&convention) {
                order.push(convention);
            }
        }

        if order.is_empty() {
            return Err(AppError::Config(
                "Canonical folder order must name at least one convention".to_string(),
            ));
        }
        Ok(order)
    }

    pub fn with_order(mut self, order: Vec<CanonicalConvention>) -> Self {
        self.canonical_order = order;
        self
    }
}

/// Stateless folder lookup; cheap to clone and share
#[derive(Debug, Clone, Default)]
pub struct PathResolver {
    config: ResolverConfig,
}

impl PathResolver {
    pub fn new(config: ResolverConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Best-matching folder for `product`, or `None`.
    ///
    /// A `root_folder_path` that still exists is returned as is. A missing
    /// library root always yields `None`.
    pub fn resolve(&self, library_root: &Path, product: &ResolvedProduct) -> Option<PathBuf> {
        if let Some(known) = product.root_folder_path.as_deref() {
            let known = Path::new(known);
            if known.is_dir() {
                return Some(known.to_path_buf());
            }
        }

        if !library_root.is_dir() {
            debug!(root = %library_root.display(), "Library root missing, cannot resolve");
            return None;
        }

        let id = product.id.as_str();
        let shop = product.shop_tag.as_deref().filter(|s| !s.is_empty());

        let found = self
            .canonical_candidates(library_root, id, shop)
            .into_iter()
            .chain(self.parent_candidates(library_root, id, shop))
            .find(|candidate| candidate.is_dir())
            .or_else(|| keyword_scan(library_root, &FolderMatcher::new(id, shop, &product.name)));

        match &found {
            Some(path) => debug!(id = %id, path = %path.display(), "Product folder resolved"),
            None => debug!(id = %id, name = %product.name, "No folder found for product"),
        }
        found
    }

    fn canonical_candidates(&self, root: &Path, id: &str, shop: Option<&str>) -> Vec<PathBuf> {
        if id.is_empty() {
            return Vec::new();
        }

        self.config
            .canonical_order
            .iter()
            .filter_map(|convention| match convention {
                CanonicalConvention::Prefixed => {
                    Some(root.join(format!("{}{}", self.config.prefix, id)))
                }
                CanonicalConvention::ShopScoped => shop.map(|shop| root.join(shop).join(id)),
            })
            .collect()
    }

    fn parent_candidates(&self, root: &Path, id: &str, shop: Option<&str>) -> Vec<PathBuf> {
        let Some(parent) = root.parent().filter(|p| p.is_dir()) else {
            return Vec::new();
        };
        if id.is_empty() {
            return Vec::new();
        }

        let mut candidates = vec![
            parent.join(format!("{}{}", self.config.prefix, id)),
            parent.join(id),
        ];
        if let Some(shop) = shop {
            candidates.push(parent.join(shop).join(id));
        }
        candidates
    }
}

/// Split a display name into lower-cased search keywords
pub fn tokenize(name: &str) -> Vec<String> {
    name.split(|c: char| c.is_whitespace() || KEYWORD_SEPARATORS.contains(&c))
        .filter(|token| token.chars().count() >= MIN_KEYWORD_CHARS)
        .map(str::to_lowercase)
        .collect()
}

/// Folder-name predicate for the keyword scan
struct FolderMatcher {
    id: String,
    shop: Option<String>,
    keywords: Vec<String>,
}

impl FolderMatcher {
    fn new(id: &str, shop: Option<&str>, name: &str) -> Self {
        Self {
            id: id.to_string(),
            shop: shop.map(str::to_lowercase),
            keywords: tokenize(name),
        }
    }

    fn matches(&self, folder: &Path) -> bool {
        let Some(name) = folder.file_name().map(|n| n.to_string_lossy()) else {
            return false;
        };

        if !self.id.is_empty() && name.contains(self.id.as_str()) {
            return true;
        }

        let lowered = name.to_lowercase();
        if let Some(shop) = &self.shop {
            if lowered.contains(shop.as_str()) {
                return true;
            }
        }
        self.keywords.iter().any(|kw| lowered.contains(kw.as_str()))
    }
}

/// Top-level folders in name order, each followed by its own children
fn keyword_scan(root: &Path, matcher: &FolderMatcher) -> Option<PathBuf> {
    for dir in subdirectories(root) {
        if matcher.matches(&dir) {
            return Some(dir);
        }
        if let Some(hit) = subdirectories(&dir).into_iter().find(|n| matcher.matches(n)) {
            return Some(hit);
        }
    }
    None
}

/// Immediate subfolders sorted by name; unreadable folders yield nothing
fn subdirectories(dir: &Path) -> Vec<PathBuf> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            trace!(dir = %dir.display(), error = %e, "Skipping unreadable folder");
            return Vec::new();
        }
    };

    let mut dirs: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect();
    dirs.sort();
    dirs
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn product(id: &str, name: &str) -> ResolvedProduct {
        ResolvedProduct::new(id, name)
    }

    /// `{tmp}/lib` as library root, so the parent fallbacks have somewhere to look
    fn library() -> (TempDir, PathBuf) {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("lib");
        fs::create_dir(&root).unwrap();
        (tmp, root)
    }

    fn mkdir(path: PathBuf) -> PathBuf {
        fs::create_dir_all(&path).unwrap();
        path
    }

    #[test]
    fn test_tokenize() {
        assert_eq!(
            tokenize("Cute Avatar (Ver.2) [PC]　衣装／Set_A-B"),
            vec!["cute", "avatar", "ver", "pc", "衣装", "set"]
        );
        assert!(tokenize("A B c").is_empty());
    }

    #[test]
    fn test_parse_order() {
        assert_eq!(
            ResolverConfig::parse_order("shop, prefixed,shop").unwrap(),
            vec![CanonicalConvention::ShopScoped, CanonicalConvention::Prefixed]
        );
        assert!(ResolverConfig::parse_order(" , ").is_err());
        assert!(ResolverConfig::parse_order("nested").is_err());
    }

    #[test]
    fn test_missing_root_yields_none() {
        let tmp = TempDir::new().unwrap();
        let resolver = PathResolver::default();
        assert_eq!(resolver.resolve(&tmp.path().join("nope"), &product("1", "Avatar")), None);
    }

    #[test]
    fn test_canonical_hit() {
        let (_tmp, root) = library();
        let expected = mkdir(root.join("b12345"));
        mkdir(root.join("Avatar stuff"));

        let found = PathResolver::default().resolve(&root, &product("12345", "Avatar"));
        assert_eq!(found, Some(expected));
    }

    #[test]
    fn test_canonical_order_is_configurable() {
        let (_tmp, root) = library();
        let prefixed = mkdir(root.join("b7"));
        let scoped = mkdir(root.join("shopname").join("7"));
        let item = product("7", "Thing").with_shop_tag("shopname");

        assert_eq!(PathResolver::default().resolve(&root, &item), Some(prefixed));

        let shop_first = ResolverConfig::default().with_order(vec![
            CanonicalConvention::ShopScoped,
            CanonicalConvention::Prefixed,
        ]);
        assert_eq!(PathResolver::new(shop_first).resolve(&root, &item), Some(scoped));
    }

    #[test]
    fn test_parent_fallbacks() {
        let (tmp, root) = library();
        let resolver = PathResolver::default();

        let bare = mkdir(tmp.path().join("55"));
        assert_eq!(resolver.resolve(&root, &product("55", "x")), Some(bare));

        let prefixed = mkdir(tmp.path().join("b55"));
        assert_eq!(resolver.resolve(&root, &product("55", "x")), Some(prefixed));

        let scoped = mkdir(tmp.path().join("myshop").join("66"));
        let item = product("66", "x").with_shop_tag("myshop");
        assert_eq!(resolver.resolve(&root, &item), Some(scoped));
    }

    #[test]
    fn test_keyword_hit_case_insensitive() {
        let (_tmp, root) = library();
        mkdir(root.join("Unrelated"));
        let expected = mkdir(root.join("my_CUTE_outfit"));

        let found = PathResolver::default().resolve(&root, &product("999", "Cute Outfit"));
        assert_eq!(found, Some(expected));
    }

    #[test]
    fn test_nested_id_hit() {
        let (_tmp, root) = library();
        let expected = mkdir(root.join("Downloads").join("item_4242_v2"));

        let found = PathResolver::default().resolve(&root, &product("4242", "zz"));
        assert_eq!(found, Some(expected));
    }

    #[test]
    fn test_top_level_children_checked_before_next_sibling() {
        let (_tmp, root) = library();
        let nested = mkdir(root.join("a_misc").join("Hair pack"));
        mkdir(root.join("z_hair"));

        let found = PathResolver::default().resolve(&root, &product("1", "Hair"));
        assert_eq!(found, Some(nested));
    }

    #[test]
    fn test_shop_tag_hit() {
        let (_tmp, root) = library();
        let expected = mkdir(root.join("From-SomeShop"));

        let item = product("1", "zz").with_shop_tag("someshop");
        assert_eq!(PathResolver::default().resolve(&root, &item), Some(expected));
    }

    #[test]
    fn test_empty_needles_never_match() {
        let (_tmp, root) = library();
        mkdir(root.join("anything"));

        let item = product("", "a").with_shop_tag("");
        assert_eq!(PathResolver::default().resolve(&root, &item), None);
    }

    #[test]
    fn test_known_folder_short_circuits() {
        let (tmp, root) = library();
        let known = mkdir(tmp.path().join("elsewhere"));
        mkdir(root.join("b1"));

        let mut item = product("1", "x");
        item.root_folder_path = Some(known.to_string_lossy().into_owned());
        assert_eq!(PathResolver::default().resolve(&root, &item), Some(known));
    }
}
