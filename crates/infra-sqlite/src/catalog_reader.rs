// SQLite ProductCatalog Implementation (read-only catalogue database)

use crate::connection::open_catalog_pool;
use crate::error::map_sqlx_error;
use async_trait::async_trait;
use porter_core::domain::CatalogRow;
use porter_core::error::Result;
use porter_core::port::ProductCatalog;
use sqlx::SqlitePool;
use std::path::Path;
use tracing::{debug, info, warn};

/// UTF-16 results shorter than this are taken to be a misread UTF-8 blob
const MIN_UTF16_PATH_CHARS: usize = 3;

type ProductTuple = (String, String, Option<String>, Option<String>, Option<String>);

pub struct SqliteProductCatalog {
    pool: SqlitePool,
}

impl SqliteProductCatalog {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn open(path: &Path) -> Result<Self> {
        let pool = open_catalog_pool(path).await?;
        info!(path = %path.display(), "Catalogue database opened read-only");
        Ok(Self::new(pool))
    }
}

#[async_trait]
impl ProductCatalog for SqliteProductCatalog {
    /// `preferences.item_directory_path`, stored either as TEXT or as a blob
    async fn library_root(&self) -> Result<Option<String>> {
        let row: Option<(String, Option<Vec<u8>>)> = match sqlx::query_as(
            "SELECT typeof(item_directory_path), CAST(item_directory_path AS BLOB) FROM preferences LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await
        {
            Ok(row) => row,
            Err(e) => {
                warn!(error = %e, "Could not read library root from catalogue preferences");
                return Ok(None);
            }
        };

        let root = match row {
            Some((kind, Some(raw))) if kind == "blob" => Some(decode_blob_path(&raw)),
            Some((_, Some(raw))) => Some(String::from_utf8_lossy(&raw).into_owned()),
            _ => None,
        }
        .filter(|root| !root.is_empty());

        match &root {
            Some(root) => debug!(root = %root, "Library root read from catalogue"),
            None => warn!("Catalogue has no item_directory_path"),
        }
        Ok(root)
    }

    async fn load_rows(&self) -> Result<Vec<CatalogRow>> {
        let rows: Vec<ProductTuple> = sqlx::query_as(
            r#"
            SELECT
                CAST(i.id AS TEXT),
                COALESCE(i.name, ''),
                s.name,
                i.shop_subdomain,
                i.thumbnail_url
            FROM booth_items i
            LEFT JOIN shops s ON i.shop_subdomain = s.subdomain
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows
            .into_iter()
            .map(|(id, name, shop_name, shop_subdomain, thumbnail_url)| CatalogRow {
                id,
                name,
                shop_name,
                shop_subdomain,
                thumbnail_url,
            })
            .collect())
    }
}

/// Decode a blob path: UTF-16LE first, UTF-8 when that yields almost nothing
pub fn decode_blob_path(raw: &[u8]) -> String {
    let units = raw
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]));
    let utf16: String = char::decode_utf16(units)
        .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect();
    let utf16 = utf16.trim_end_matches('\0');

    if utf16.chars().count() < MIN_UTF16_PATH_CHARS {
        return String::from_utf8_lossy(raw).trim_end_matches('\0').to_string();
    }
    utf16.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::fixture_pool;
    use tempfile::TempDir;

    const SCHEMA: &[&str] = &[
        "CREATE TABLE preferences (id INTEGER PRIMARY KEY, item_directory_path)",
        "CREATE TABLE shops (subdomain TEXT PRIMARY KEY, name TEXT)",
        "CREATE TABLE booth_items (id INTEGER PRIMARY KEY, name TEXT, shop_subdomain TEXT, thumbnail_url TEXT)",
    ];

    async fn catalog_with(tmp: &TempDir, root: Option<Vec<u8>>, as_text: bool) -> SqliteProductCatalog {
        let path = tmp.path().join("data.db");
        let pool = fixture_pool(&path).await;
        for stmt in SCHEMA {
            sqlx::query(stmt).execute(&pool).await.unwrap();
        }

        if let Some(raw) = root {
            let query = sqlx::query("INSERT INTO preferences (id, item_directory_path) VALUES (1, ?)");
            let query = if as_text {
                query.bind(String::from_utf8(raw).unwrap())
            } else {
                query.bind(raw)
            };
            query.execute(&pool).await.unwrap();
        }

        sqlx::query("INSERT INTO shops VALUES ('cute', 'Cute Shop')")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query(
            "INSERT INTO booth_items VALUES (101, 'Avatar', 'cute', 'https://img/101.png'), (202, 'Hair', 'gone', NULL)",
        )
        .execute(&pool)
        .await
        .unwrap();
        pool.close().await;

        SqliteProductCatalog::open(&path).await.unwrap()
    }

    fn utf16le(s: &str) -> Vec<u8> {
        s.encode_utf16().flat_map(|u| u.to_le_bytes()).collect()
    }

    #[test]
    fn test_decode_blob_path() {
        assert_eq!(decode_blob_path(&utf16le("D:\\BOOTH")), "D:\\BOOTH");
        // Two ASCII bytes read as UTF-16 give one char; fall back to UTF-8
        assert_eq!(decode_blob_path(b"/x"), "/x");
        assert_eq!(decode_blob_path(&utf16le("/lib\0")), "/lib");
    }

    #[tokio::test]
    async fn test_library_root_blob() {
        let tmp = TempDir::new().unwrap();
        let catalog = catalog_with(&tmp, Some(utf16le("/home/me/BOOTH")), false).await;
        assert_eq!(catalog.library_root().await.unwrap().as_deref(), Some("/home/me/BOOTH"));
    }

    #[tokio::test]
    async fn test_library_root_text() {
        let tmp = TempDir::new().unwrap();
        let catalog = catalog_with(&tmp, Some(b"/srv/booth".to_vec()), true).await;
        assert_eq!(catalog.library_root().await.unwrap().as_deref(), Some("/srv/booth"));
    }

    #[tokio::test]
    async fn test_library_root_missing() {
        let tmp = TempDir::new().unwrap();
        let catalog = catalog_with(&tmp, None, true).await;
        assert_eq!(catalog.library_root().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_load_rows_joins_shops() {
        let tmp = TempDir::new().unwrap();
        let catalog = catalog_with(&tmp, None, true).await;

        let mut rows = catalog.load_rows().await.unwrap();
        rows.sort_by(|a, b| a.id.cmp(&b.id));

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].id, "101");
        assert_eq!(rows[0].shop_name.as_deref(), Some("Cute Shop"));
        assert_eq!(rows[0].thumbnail_url.as_deref(), Some("https://img/101.png"));
        assert_eq!(rows[1].id, "202");
        assert_eq!(rows[1].shop_name, None);
        assert_eq!(rows[1].shop_subdomain.as_deref(), Some("gone"));
    }
}
