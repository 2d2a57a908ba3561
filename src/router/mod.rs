//! # HTTP Router
//!
//! Exposes the catalog over HTTP: trigger/stop/status/history for the
//! indexing pipeline, plus search and the aggregate views.
//!
//! ## Endpoints
//!
//! - `GET /` - Health check, verifies database connectivity
//! - `POST /indexing/trigger` - Start a refresh run (409 when one is active)
//! - `POST /indexing/stop` - Request cooperative stop of the active run
//! - `GET /indexing/status` - Whether a run is active, plus its progress
//! - `GET /indexing/history` - Past runs, most recent first
//! - `GET /search` - Filtered, sorted, paginated catalog search
//! - `GET /languages` - Distinct languages, optionally per registry
//! - `GET /categories` - Distinct `registry::category` keys
//! - `GET /registries` - Per-registry metadata
//!
//! ## Configuration
//!
//! - `ROUTER_ENDPOINT` - Host and port to bind to (default: "0.0.0.0:3000")

use std::sync::atomic::{AtomicBool, Ordering};
use std::{sync::Arc, time::Duration};

use axum::routing::{get, post};
use axum::Router;
use eyre::Result;
use tokio::{net::TcpListener, time::sleep};
use tracing::info;

use crate::archive::HttpArchiveClient;
use crate::db::DbConnection;
use crate::indexer::CatalogIndexer;
use crate::search::SearchEngine;

mod handlers;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DbConnection>,
    pub indexer: Arc<CatalogIndexer<HttpArchiveClient>>,
    pub search: Arc<SearchEngine>,
}

/// Builds the route table. Split from [`initialize_router`] so tests can
/// drive the router without binding a socket.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::health))
        .route("/indexing/trigger", post(handlers::trigger_indexing))
        .route("/indexing/stop", post(handlers::stop_indexing))
        .route("/indexing/status", get(handlers::indexing_status))
        .route("/indexing/history", get(handlers::indexing_history))
        .route("/search", get(handlers::search))
        .route("/languages", get(handlers::languages))
        .route("/categories", get(handlers::categories))
        .route("/registries", get(handlers::registries))
        .with_state(state)
}

pub async fn initialize_router(state: AppState, should_terminate: Arc<AtomicBool>) -> Result<()> {
    let app = build_router(state);

    let endpoint = dotenvy::var("ROUTER_ENDPOINT").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let listener: TcpListener = TcpListener::bind(&endpoint).await?;

    info!(
        "->> LISTENING on {}\n",
        listener
            .local_addr()
            .map_err(|e| eyre::eyre!("Failed to get local address: {}", e))?
    );
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal(should_terminate.clone()))
        .await?;

    Ok(())
}

async fn shutdown_signal(should_terminate: Arc<AtomicBool>) {
    while !should_terminate.load(Ordering::SeqCst) {
        sleep(Duration::from_secs(10)).await;
    }
    info!("Shutdown signal received, shutting down router");
}
