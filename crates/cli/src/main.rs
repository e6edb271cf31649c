//! Bundle Porter CLI - command-line client for the porter daemon

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::{Path, PathBuf};
use tabled::{Table, Tabled};

const DEFAULT_RPC_URL: &str = "http://127.0.0.1:9531";

#[derive(Parser)]
#[command(name = "porter")]
#[command(about = "Bundle Porter CLI", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// RPC server URL
    #[arg(long, env = "PORTER_RPC_URL", default_value = DEFAULT_RPC_URL)]
    rpc_url: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Queue files for import (does not start processing)
    Enqueue {
        /// Files to import, in order
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Catalogue id the files belong to
        #[arg(short, long, default_value = "")]
        owner: String,

        /// Start processing right away
        #[arg(long)]
        start: bool,
    },

    /// Start processing the queue
    Start,

    /// Drop every pending import
    Clear,

    /// Show queue status
    Status,

    /// Show or set interactive imports
    Interactive {
        /// New value; omit to show the current one
        value: Option<Toggle>,
    },

    /// Find a product's folder in the library
    Resolve {
        /// Product id
        id: String,

        /// Product name, used for the keyword scan
        #[arg(short, long, default_value = "")]
        name: String,

        /// Shop subdomain
        #[arg(short, long)]
        shop: Option<String>,

        /// Library root; defaults to the catalogue setting
        #[arg(short, long)]
        library_root: Option<String>,
    },

    /// List the assets inside a folder
    Assets {
        root: PathBuf,

        /// Only .unitypackage files
        #[arg(long)]
        packages_only: bool,
    },

    /// List catalogue products
    Products {
        /// Only products that have not been imported yet
        #[arg(long)]
        pending: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Toggle {
    On,
    Off,
}

#[derive(Serialize)]
struct JsonRpcRequest {
    jsonrpc: String,
    method: String,
    params: serde_json::Value,
    id: u64,
}

#[derive(Deserialize)]
struct JsonRpcResponse {
    #[allow(dead_code)]
    jsonrpc: String,
    #[allow(dead_code)]
    id: u64,
    result: Option<serde_json::Value>,
    error: Option<JsonRpcError>,
}

#[derive(Deserialize)]
struct JsonRpcError {
    code: i32,
    message: String,
}

#[derive(Deserialize)]
struct QueueStatus {
    remaining: usize,
    processing: bool,
    phase: String,
    paths: Vec<String>,
    current_path: Option<String>,
    current_owner_id: Option<String>,
    interactive: bool,
}

#[derive(Deserialize, Tabled)]
struct AssetRow {
    file_name: String,
    category: String,
    full_path: String,
}

#[derive(Deserialize)]
struct ProductEntry {
    id: String,
    name: String,
    shop_name: String,
    root_folder_path: Option<String>,
    #[serde(default)]
    assets: Vec<AssetRow>,
    installed: bool,
}

#[derive(Tabled)]
struct ProductRow {
    id: String,
    name: String,
    shop: String,
    packages: usize,
    installed: String,
    folder: String,
}

impl From<ProductEntry> for ProductRow {
    fn from(entry: ProductEntry) -> Self {
        Self {
            packages: entry
                .assets
                .iter()
                .filter(|a| a.category == "package")
                .count(),
            installed: if entry.installed { "yes" } else { "" }.to_string(),
            folder: entry.root_folder_path.unwrap_or_else(|| "-".to_string()),
            id: entry.id,
            name: entry.name,
            shop: entry.shop_name,
        }
    }
}

async fn call_rpc(url: &str, method: &str, params: serde_json::Value) -> Result<serde_json::Value> {
    let request = JsonRpcRequest {
        jsonrpc: "2.0".to_string(),
        method: method.to_string(),
        params,
        id: 1,
    };

    let client = reqwest::Client::new();
    let response: JsonRpcResponse = client
        .post(url)
        .json(&request)
        .send()
        .await
        .context("Failed to connect to daemon")?
        .json()
        .await
        .context("Failed to parse response")?;

    if let Some(error) = response.error {
        anyhow::bail!("RPC error ({}): {}", error.code, error.message);
    }

    response
        .result
        .ok_or_else(|| anyhow::anyhow!("No result in response"))
}

/// The daemon runs elsewhere, so relative paths are resolved here
fn absolute(path: &Path) -> Result<String> {
    let path = std::fs::canonicalize(path)
        .with_context(|| format!("Cannot access {}", path.display()))?;
    Ok(path.to_string_lossy().into_owned())
}

fn print_ack(label: &str, result: &serde_json::Value) {
    println!("{}", format!("✓ {}", label).green().bold());
    println!(
        "  {} {}  {} {}",
        "Processing:".bold(),
        result["processing"],
        "Remaining:".bold(),
        result["remaining"]
    );
}

fn print_status(status: QueueStatus) {
    println!("{}", "Import Queue".cyan().bold());
    println!();
    let phase = if status.processing {
        status.phase.green()
    } else {
        status.phase.normal()
    };
    println!("  {} {}", "Phase:".bold(), phase);
    println!("  {} {}", "Remaining:".bold(), status.remaining);
    println!("  {} {}", "Interactive:".bold(), status.interactive);

    if let Some(current) = status.current_path {
        let owner = status.current_owner_id.unwrap_or_default();
        println!("  {} {} {}", "Importing:".bold(), current, format!("({})", owner).dimmed());
    }

    if !status.paths.is_empty() {
        println!();
        for (i, path) in status.paths.iter().enumerate() {
            println!("  {:>3}. {}", i + 1, path);
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Enqueue {
            paths,
            owner,
            start,
        } => {
            let paths = paths.iter().map(|p| absolute(p)).collect::<Result<Vec<_>>>()?;
            let params = json!({ "paths": paths, "owner_id": owner });

            let result = call_rpc(&cli.rpc_url, "queue.enqueue.v1", params).await?;
            println!(
                "{}",
                format!("✓ {} file(s) queued", result["added"]).green().bold()
            );
            println!("  {} {}", "Remaining:".bold(), result["remaining"]);

            if start {
                let result = call_rpc(&cli.rpc_url, "queue.start.v1", json!({})).await?;
                print_ack("Queue started", &result);
            }
        }

        Commands::Start => {
            let result = call_rpc(&cli.rpc_url, "queue.start.v1", json!({})).await?;
            print_ack("Queue started", &result);
        }

        Commands::Clear => {
            let result = call_rpc(&cli.rpc_url, "queue.clear.v1", json!({})).await?;
            print_ack("Queue cleared", &result);
        }

        Commands::Status => match call_rpc(&cli.rpc_url, "queue.status.v1", json!({})).await {
            Ok(result) => print_status(serde_json::from_value(result)?),
            Err(e) => {
                println!("  {} {}", "Status:".bold(), "ERROR".red());
                println!("  {} {}", "Error:".bold(), e);
            }
        },

        Commands::Interactive { value } => {
            let params = match value {
                Some(Toggle::On) => json!({ "interactive": true }),
                Some(Toggle::Off) => json!({ "interactive": false }),
                None => json!({}),
            };
            let result = call_rpc(&cli.rpc_url, "queue.interactive.v1", params).await?;
            let on = result["interactive"].as_bool().unwrap_or(false);
            println!(
                "  {} {}",
                "Interactive:".bold(),
                if on { "on".green() } else { "off".yellow() }
            );
        }

        Commands::Resolve {
            id,
            name,
            shop,
            library_root,
        } => {
            let params = json!({
                "library_root": library_root,
                "id": id,
                "name": name,
                "shop_tag": shop,
            });
            let result = call_rpc(&cli.rpc_url, "catalog.resolve.v1", params).await?;

            match result["path"].as_str() {
                Some(path) => println!("{}", path),
                None => {
                    println!(
                        "{} {}",
                        "No folder found under".yellow(),
                        result["library_root"].as_str().unwrap_or("-")
                    );
                }
            }
        }

        Commands::Assets {
            root,
            packages_only,
        } => {
            let params = json!({ "root": absolute(&root)?, "packages_only": packages_only });
            let result = call_rpc(&cli.rpc_url, "catalog.assets.v1", params).await?;
            let assets: Vec<AssetRow> = serde_json::from_value(result["assets"].clone())?;

            if assets.is_empty() {
                println!("{}", "No assets found".yellow());
            } else {
                println!("{}", Table::new(assets));
            }
        }

        Commands::Products { pending } => {
            let result = call_rpc(&cli.rpc_url, "catalog.products.v1", json!({})).await?;
            let entries: Vec<ProductEntry> = serde_json::from_value(result["products"].clone())?;
            let rows: Vec<ProductRow> = entries
                .into_iter()
                .filter(|e| !pending || !e.installed)
                .map(ProductRow::from)
                .collect();

            println!(
                "{} {}",
                "Library:".bold(),
                result["library_root"].as_str().unwrap_or("-")
            );
            println!();
            if rows.is_empty() {
                println!("{}", "No products".yellow());
            } else {
                println!("{}", Table::new(rows));
            }
        }
    }

    Ok(())
}
