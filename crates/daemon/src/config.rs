//! Daemon configuration, read from `PORTER_*` environment variables

use anyhow::{Context, Result};
use porter_core::application::{CanonicalConvention, ResolverConfig};
use porter_api_rpc::server::DEFAULT_RPC_PORT;
use std::path::{Path, PathBuf};

const DEFAULT_DB_PATH: &str = "~/.porter/state.db";
const DEFAULT_CATALOG_DB: &str = "~/.local/share/pm.booth.library-manager/data.db";
const DEFAULT_IMPORT_ROOT: &str = "./Assets/BundleImports";
const THUMBNAIL_CACHE_DIR: &str = "cache/thumbnails";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub format: LogFormat,
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub db_path: PathBuf,
    pub catalog_db: PathBuf,
    pub thumbnail_cache: PathBuf,
    pub import_root: PathBuf,
    /// External import command; the copy executor is used when unset
    pub import_command: Option<String>,
    pub rpc_port: u16,
    pub canonical_order: Vec<CanonicalConvention>,
    pub log: LogConfig,
}

impl DaemonConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any variable source; empty values count as unset
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let path = |key: &str, default: &str| expand(&var(key).unwrap_or_else(|| default.to_string()));

        let catalog_db = path("PORTER_CATALOG_DB", DEFAULT_CATALOG_DB);
        let thumbnail_cache = match var("PORTER_THUMBNAIL_CACHE") {
            Some(dir) => expand(&dir),
            None => default_thumbnail_cache(&catalog_db),
        };

        let rpc_port = match var("PORTER_RPC_PORT") {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("PORTER_RPC_PORT is not a port number: {raw}"))?,
            None => DEFAULT_RPC_PORT,
        };

        let canonical_order = match var("PORTER_CANONICAL_ORDER") {
            Some(raw) => ResolverConfig::parse_order(&raw).context("Invalid PORTER_CANONICAL_ORDER")?,
            None => ResolverConfig::default().canonical_order,
        };

        let format = match var("PORTER_LOG_FORMAT").as_deref() {
            Some("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        };

        Ok(Self {
            db_path: path("PORTER_DB_PATH", DEFAULT_DB_PATH),
            catalog_db,
            thumbnail_cache,
            import_root: path("PORTER_IMPORT_ROOT", DEFAULT_IMPORT_ROOT),
            import_command: var("PORTER_IMPORT_COMMAND"),
            rpc_port,
            canonical_order,
            log: LogConfig {
                format,
                dir: var("PORTER_LOG_DIR").map(|d| expand(&d)),
            },
        })
    }

    pub fn resolver_config(&self) -> ResolverConfig {
        ResolverConfig::default().with_order(self.canonical_order.clone())
    }
}

fn expand(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw).into_owned())
}

fn default_thumbnail_cache(catalog_db: &Path) -> PathBuf {
    catalog_db
        .parent()
        .map(|dir| dir.join(THUMBNAIL_CACHE_DIR))
        .unwrap_or_else(|| PathBuf::from(THUMBNAIL_CACHE_DIR))
}
