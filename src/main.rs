use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use crate::{
    config::AppConfig,
    models::target::PlannedEntry,
    services::{
        planner::Planner, publisher::Publisher, s3_store::S3Store, storage_service::ObjectStore,
    },
};

mod config;
mod errors;
mod models;
mod services;

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // --- Parse config ---
    let cfg = AppConfig::from_env_and_args()?;
    tracing::debug!("Starting asset-publisher with config: {:?}", cfg);

    if cfg.dry_run {
        return dry_run(&cfg);
    }

    // --- Initialize storage client ---
    let store = S3Store::connect(&cfg.storage)
        .await
        .context("connecting to object storage")?;
    let publisher = Publisher::new(store, cfg.root.clone()).with_concurrency(cfg.concurrency);

    run(&publisher, &cfg).await
}

/// ensure bucket -> entry point -> bulk list -> report -> announce.
async fn run<S: ObjectStore>(publisher: &Publisher<S>, cfg: &AppConfig) -> Result<()> {
    let bucket = publisher
        .ensure_bucket(&cfg.bucket)
        .await
        .with_context(|| format!("preparing bucket {}", cfg.bucket))?;

    let entry = publisher
        .publish_entry_point(&bucket, &cfg.entry_point, &cfg.entry_key, &cfg.rewrite)
        .await
        .with_context(|| format!("publishing entry point {}", cfg.entry_point))?;

    let report = publisher
        .publish_bulk(&bucket, &cfg.bulk_paths)
        .await
        .context("publishing bulk paths")?;

    tracing::info!(
        "Published {} objects to {} ({} paths skipped)",
        report.objects.len() + 1,
        bucket.name,
        report.skipped.len()
    );

    if let Some(path) = &cfg.report {
        let body = serde_json::json!({
            "bucket": bucket,
            "entry_point": entry,
            "objects": report.objects,
            "skipped": report.skipped,
        });
        std::fs::write(path, serde_json::to_vec_pretty(&body)?)
            .with_context(|| format!("writing report {}", path.display()))?;
        tracing::info!("Wrote report to {}", path.display());
    }

    let url = publisher.public_url(&bucket, &entry.key);
    if cfg.open_browser {
        publisher.announce(&url);
    } else {
        tracing::info!("Published entry point at {}", url);
    }

    Ok(())
}

/// Print the upload plan without contacting the store.
fn dry_run(cfg: &AppConfig) -> Result<()> {
    let planner = Planner::new(cfg.root.clone());
    println!("{} -> {} (rewritten, text/html)", cfg.entry_point, cfg.entry_key);
    for entry in planner.plan(&cfg.bulk_paths)? {
        match entry {
            PlannedEntry::File(target) => println!("{}", target.key),
            PlannedEntry::Directory { path, targets } => {
                println!("{}/ ({} files)", path.trim_end_matches('/'), targets.len());
                for target in targets {
                    println!("  {}", target.key);
                }
            }
            PlannedEntry::Skipped(path) => println!("skip {}", path),
        }
    }
    Ok(())
}
