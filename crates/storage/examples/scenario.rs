//! Create a bucket, upload a CSV, check it and share it
//!
//! ```bash
//! RUST_LOG=info cargo run -p agnostic-storages --example scenario -- \
//!     --config path/to/config.toml path/to/file.csv
//! ```

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use agnostic_storages::{ConfigManager, StorageService};

#[derive(Parser, Debug)]
#[command(name = "scenario")]
#[command(about = "Upload a file and print a signed read URL for it")]
struct Args {
    /// Configuration file (defaults to the per-user config path)
    #[arg(short, long, env = "AGNOSTIC_STORAGES_CONFIG")]
    config: Option<PathBuf>,

    /// Bucket to create and upload into
    #[arg(long, default_value = "demo-bucket")]
    bucket: String,

    /// Key the file is stored under
    #[arg(long, default_value = "a/b.csv")]
    key: String,

    /// Local file to upload
    source: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let manager = match args.config {
        Some(path) => ConfigManager::with_path(path),
        None => ConfigManager::new()?,
    };

    let storage = StorageService::from_config_file(&manager)
        .await
        .with_context(|| format!("loading {}", manager.config_path().display()))?;

    let (bucket, key) = (args.bucket.as_str(), args.key.as_str());
    let prefix = listing_prefix(key);

    storage.create_container(bucket).await?;
    storage
        .upload_large_file(&args.source, bucket, key, storage.transfer_config())
        .await?;

    println!("exists: {}", storage.record_exists(bucket, key).await?);
    for record in storage
        .list_records_by_prefix(bucket, &prefix)
        .await?
    {
        println!("{} ({})", record.key, record.size_human);
    }
    println!("url: {}", storage.signed_read_url(bucket, key).await?);

    Ok(())
}

/// Prefix of the "directory" holding `key`, empty for top-level keys
fn listing_prefix(key: &str) -> String {
    key.rsplit_once('/')
        .map_or_else(String::new, |(dir, _)| format!("{dir}/"))
}
