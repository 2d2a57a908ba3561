use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use eyre::{Context, Result};
use futures::future::join;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use enhansome_catalog_db::archive::HttpArchiveClient;
use enhansome_catalog_db::db::DbConnection;
use enhansome_catalog_db::indexer::{CatalogIndexer, IndexerConfig};
use enhansome_catalog_db::router::{initialize_router, AppState};
use enhansome_catalog_db::search::SearchEngine;
use enhansome_catalog_db::types::TriggerSource;

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// What mode to run the program in
    #[arg(value_enum)]
    mode: Mode,

    /// SQLite database path (falls back to DATABASE_PATH, then "catalog.db")
    #[arg(short, long)]
    database: Option<String>,

    /// Archive snapshot URL (falls back to ARCHIVE_URL)
    #[arg(short, long)]
    archive_url: Option<String>,

    /// Seconds between scheduled refreshes while serving; omit to disable
    #[arg(short, long)]
    refresh_interval: Option<u64>,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// Run the HTTP service, optionally with scheduled refreshes
    Serve,
    /// Run one indexing pass and exit
    Index,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    info!("Starting catalog service");

    let cli = Cli::parse();
    let should_terminate = Arc::new(AtomicBool::new(false));

    setup_ctrlc_handler(Arc::clone(&should_terminate))?;

    let database_path = cli
        .database
        .or_else(|| dotenvy::var("DATABASE_PATH").ok())
        .unwrap_or_else(|| "catalog.db".to_string());
    let archive_url = cli
        .archive_url
        .or_else(|| dotenvy::var("ARCHIVE_URL").ok())
        .ok_or_else(|| eyre::eyre!("ARCHIVE_URL must be set (flag or environment)"))?;

    let db = DbConnection::new(&database_path).await?;
    let archive = Arc::new(HttpArchiveClient::with_default_retries(archive_url));
    let indexer = Arc::new(CatalogIndexer::new(
        IndexerConfig::default(),
        Arc::clone(&db),
        archive,
    ));

    match cli.mode {
        Mode::Index => {
            let outcome = indexer.trigger(TriggerSource::Manual, None, None).await?;
            info!(
                "Indexing pass finished: {} succeeded, {} failed",
                outcome.success, outcome.failed
            );
            for error in &outcome.errors {
                warn!("Registry error: {}", error);
            }
        }
        Mode::Serve => {
            let state = AppState {
                db: Arc::clone(&db),
                indexer: Arc::clone(&indexer),
                search: Arc::new(SearchEngine::new(Arc::clone(&db))),
            };

            let router = async {
                let res = initialize_router(state, Arc::clone(&should_terminate)).await;
                match res {
                    Ok(()) => info!("Router task completed"),
                    Err(e) => warn!("Router task failed: {:?}", e),
                };
            };

            let scheduler = async {
                let res =
                    run_scheduler(&indexer, cli.refresh_interval, Arc::clone(&should_terminate))
                        .await;
                match res {
                    Ok(()) => info!("Scheduler task completed"),
                    Err(e) => warn!("Scheduler task failed: {:?}", e),
                };
            };

            let _ = join(router, scheduler).await;
        }
    }

    Ok(())
}

/// Fires scheduled refreshes at a fixed interval until termination. A tick
/// that lands while a run is still active is simply rejected by the gate.
async fn run_scheduler(
    indexer: &Arc<CatalogIndexer<HttpArchiveClient>>,
    refresh_interval: Option<u64>,
    should_terminate: Arc<AtomicBool>,
) -> Result<()> {
    let Some(seconds) = refresh_interval else {
        return Ok(());
    };
    if seconds == 0 {
        eyre::bail!("refresh interval must be greater than zero");
    }

    let mut interval = tokio::time::interval(Duration::from_secs(seconds));
    interval.tick().await;
    while !should_terminate.load(Ordering::SeqCst) {
        interval.tick().await;
        if should_terminate.load(Ordering::SeqCst) {
            break;
        }
        match indexer
            .trigger_detached(TriggerSource::Scheduled, None, None)
            .await
        {
            Ok(Some(run_id)) => info!("Scheduled refresh started as run {}", run_id),
            Ok(None) => info!("Scheduled refresh skipped: a run is already active"),
            Err(e) => warn!("Scheduled refresh failed to start: {:?}", e),
        }
    }
    Ok(())
}

fn setup_ctrlc_handler(should_terminate: Arc<AtomicBool>) -> Result<()> {
    ctrlc::set_handler(move || {
        info!("Received Ctrl+C");
        info!("Waiting for current processes to finish...");
        should_terminate.store(true, Ordering::SeqCst);
    })
    .context("Failed to set Ctrl+C handler")
}
