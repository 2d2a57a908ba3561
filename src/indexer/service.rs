use std::sync::Arc;

use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::archive::{ArchiveProvider, ArchiveSnapshot};
use crate::catalog::{self, CatalogEntry};
use crate::db::DbConnection;
use crate::errors::{CatalogError, Result};
use crate::repositories::indexing_run::{
    finish_run, get_current_run, get_indexing_state, get_run_history, set_run_totals, stop_run,
    try_begin_run, update_run_progress, IndexingRunDto, StopOutcome,
};
use crate::repositories::membership::{replace_registry_memberships_query, NewMembership};
use crate::repositories::registry_metadata::recompute_registry_metadata_query;
use crate::repositories::repository::upsert_repository_query;
use crate::types::{RegistryName, RunStatus, TriggerSource};

pub const DEFAULT_HISTORY_LIMIT: i64 = 50;

#[derive(Debug, Clone)]
pub struct IndexerConfig {
    /// Seconds before an archive fetch attempt times out.
    pub fetch_timeout: u64,
}

impl IndexerConfig {
    #[must_use]
    pub const fn builder() -> IndexerConfigBuilder {
        IndexerConfigBuilder::new()
    }
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self { fetch_timeout: 120 }
    }
}

pub struct IndexerConfigBuilder {
    fetch_timeout: u64,
}

impl IndexerConfigBuilder {
    #[must_use]
    pub const fn new() -> Self {
        Self { fetch_timeout: 120 }
    }

    #[must_use]
    pub const fn testing() -> Self {
        Self::new().fetch_timeout(5)
    }

    #[must_use]
    pub const fn fetch_timeout(mut self, fetch_timeout: u64) -> Self {
        self.fetch_timeout = fetch_timeout;
        self
    }

    pub fn build(self) -> Result<IndexerConfig> {
        if self.fetch_timeout == 0 {
            return Err(CatalogError::configuration(
                "fetch_timeout",
                "Fetch timeout must be greater than 0",
            ));
        }

        Ok(IndexerConfig {
            fetch_timeout: self.fetch_timeout,
        })
    }
}

impl Default for IndexerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of one trigger request, also the synchronous rejection shape when
/// a run is already active.
#[derive(Debug, Clone, Serialize)]
pub struct TriggerOutcome {
    pub success: i64,
    pub failed: i64,
    pub errors: Vec<String>,
}

impl TriggerOutcome {
    #[must_use]
    pub fn already_in_progress() -> Self {
        Self {
            success: 0,
            failed: 0,
            errors: vec![CatalogError::IndexingInProgress.to_string()],
        }
    }
}

/// Result of a stop request.
#[derive(Debug, Clone, Serialize)]
pub struct StopReport {
    pub status: StopOutcome,
    pub message: String,
}

/// Live indexing status for poll-style callers.
#[derive(Debug, Clone, Serialize)]
pub struct IndexStatusView {
    pub is_running: bool,
    pub current: Option<IndexingRunDto>,
}

/// The indexing job controller.
///
/// Generic over the archive provider so tests can substitute a mock for the
/// HTTP client.
pub struct CatalogIndexer<A> {
    config: IndexerConfig,
    db: Arc<DbConnection>,
    archive: Arc<A>,
}

impl<A> CatalogIndexer<A>
where
    A: ArchiveProvider + Send + Sync + 'static,
{
    pub const fn new(config: IndexerConfig, db: Arc<DbConnection>, archive: Arc<A>) -> Self {
        Self {
            config,
            db,
            archive,
        }
    }

    /// Triggers a full refresh and awaits its completion.
    ///
    /// If a run is already active the request is rejected synchronously
    /// with a structured outcome; no history row is created and the active
    /// run is untouched.
    pub async fn trigger(
        &self,
        source: TriggerSource,
        created_by: Option<String>,
        archive_url_override: Option<String>,
    ) -> Result<TriggerOutcome> {
        let Some(run_id) = try_begin_run(&self.db, source, created_by.as_deref()).await? else {
            info!("[indexer] Trigger rejected: a run is already in progress");
            return Ok(TriggerOutcome::already_in_progress());
        };

        info!("[indexer] Starting indexing run {}", run_id);
        self.run_pipeline(run_id, archive_url_override.as_deref())
            .await
    }

    /// Fire-and-forget job submission: runs the refresh on the runtime and
    /// returns the completion handle. Callers may await it or poll
    /// [`status`](Self::status) instead.
    pub fn spawn_trigger(
        self: &Arc<Self>,
        source: TriggerSource,
        created_by: Option<String>,
        archive_url_override: Option<String>,
    ) -> JoinHandle<Result<TriggerOutcome>> {
        let indexer = Arc::clone(self);
        tokio::spawn(async move {
            indexer
                .trigger(source, created_by, archive_url_override)
                .await
        })
    }

    /// Claims the run gate synchronously, then runs the refresh in the
    /// background. `None` means a run is already active and nothing was
    /// started. Built for HTTP callers that must answer before the run
    /// finishes.
    pub async fn trigger_detached(
        self: &Arc<Self>,
        source: TriggerSource,
        created_by: Option<String>,
        archive_url_override: Option<String>,
    ) -> Result<Option<i64>> {
        let Some(run_id) = try_begin_run(&self.db, source, created_by.as_deref()).await? else {
            info!("[indexer] Trigger rejected: a run is already in progress");
            return Ok(None);
        };

        info!("[indexer] Starting detached indexing run {}", run_id);
        let indexer = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = indexer
                .run_pipeline(run_id, archive_url_override.as_deref())
                .await
            {
                error!("[indexer] Run {} aborted: {}", run_id, e);
            }
        });
        Ok(Some(run_id))
    }

    async fn run_pipeline(
        &self,
        run_id: i64,
        archive_url_override: Option<&str>,
    ) -> Result<TriggerOutcome> {
        let snapshot = match self
            .archive
            .fetch_snapshot(archive_url_override, Some(self.config.fetch_timeout))
            .await
        {
            Ok(snapshot) => snapshot,
            Err(e) => {
                // Terminal for the run, but captured as data. No membership
                // or metadata writes have happened.
                error!("[indexer] Archive fetch failed: {}", e);
                let errors = vec![e.to_string()];
                finish_run(&self.db, run_id, RunStatus::Failed, 0, 0, &errors).await?;
                return Ok(TriggerOutcome {
                    success: 0,
                    failed: 0,
                    errors,
                });
            }
        };

        let total = i64::try_from(snapshot.len()).unwrap_or(i64::MAX);
        set_run_totals(&self.db, run_id, total).await?;
        info!("[indexer] Snapshot fetched: {} registries", total);

        let outcome = self.process_snapshot(run_id, &snapshot).await?;

        let finished = finish_run(
            &self.db,
            run_id,
            RunStatus::Completed,
            outcome.success,
            outcome.failed,
            &outcome.errors,
        )
        .await?;
        if finished {
            info!(
                "[indexer] Run {} completed: {} succeeded, {} failed",
                run_id, outcome.success, outcome.failed
            );
        }

        Ok(outcome)
    }

    async fn process_snapshot(
        &self,
        run_id: i64,
        snapshot: &ArchiveSnapshot,
    ) -> Result<TriggerOutcome> {
        let mut succeeded: i64 = 0;
        let mut failed: i64 = 0;
        let mut errors: Vec<String> = Vec::new();
        let mut processed: i64 = 0;

        for (raw_name, raw_document) in &snapshot.registries {
            // Cooperative cancellation: a stop() flips the durable state;
            // observe it between registries and abandon the loop.
            if !get_indexing_state(&self.db).await?.run_status()?.is_running() {
                warn!("[indexer] Run {} abandoned after stop request", run_id);
                return Ok(TriggerOutcome {
                    success: succeeded,
                    failed,
                    errors,
                });
            }

            update_run_progress(
                &self.db,
                run_id,
                Some(raw_name),
                processed,
                succeeded,
                failed,
            )
            .await?;

            match self.process_registry(raw_name, raw_document.clone()).await {
                Ok(registry) => {
                    succeeded += 1;
                    info!("[indexer] Indexed registry '{}'", registry);
                }
                Err(e) => {
                    failed += 1;
                    warn!("[indexer] Registry '{}' failed: {}", raw_name, e);
                    errors.push(format!("{raw_name}: {e}"));
                }
            }
            processed += 1;
        }

        update_run_progress(&self.db, run_id, None, processed, succeeded, failed).await?;

        Ok(TriggerOutcome {
            success: succeeded,
            failed,
            errors,
        })
    }

    /// Parses and persists one registry document inside one transaction:
    /// repository upserts, the membership swap, and the metadata recompute
    /// land together or not at all.
    async fn process_registry(
        &self,
        raw_name: &str,
        raw_document: serde_json::Value,
    ) -> Result<RegistryName> {
        let registry = RegistryName::from_raw(raw_name);
        let document = catalog::parse_document(raw_name, raw_document)?;
        let flattened = catalog::flatten(&document);

        let mut tx = self.db.pool.begin().await?;

        let mut memberships = Vec::with_capacity(flattened.entries.len());
        for (position, entry) in flattened.entries.iter().enumerate() {
            let CatalogEntry { category, item } = entry;

            let repository_id = match &item.repo_info {
                Some(repo) => Some(upsert_repository_query(&mut tx, repo).await?),
                None => None,
            };

            memberships.push(NewMembership {
                category: category.clone(),
                position: i64::try_from(position).unwrap_or(i64::MAX),
                title: item.title.clone(),
                description: item.description.clone(),
                repository_id,
            });
        }

        replace_registry_memberships_query(&mut tx, &registry, &memberships).await?;

        let title = document
            .metadata
            .title
            .clone()
            .unwrap_or_else(|| registry.as_str().to_string());
        recompute_registry_metadata_query(
            &mut tx,
            &registry,
            &title,
            document.metadata.description.as_deref(),
            document.metadata.source.as_deref(),
        )
        .await?;

        tx.commit().await.map_err(|e| {
            CatalogError::database_transaction(format!("index registry '{registry}': {e}"))
        })?;

        Ok(registry)
    }

    /// Stops the active run, if any. Mark-abandoned semantics: in-flight
    /// work is not forcibly aborted.
    pub async fn stop(&self) -> Result<StopReport> {
        let status = stop_run(&self.db).await?;
        let message = match status {
            StopOutcome::Stopped => "Indexing run stopped".to_string(),
            StopOutcome::NotRunning => "No indexing run in progress".to_string(),
        };
        Ok(StopReport { status, message })
    }

    /// Live status: whether a run is active plus the current/latest run.
    pub async fn status(&self) -> Result<IndexStatusView> {
        let state = get_indexing_state(&self.db).await?;
        let current = get_current_run(&self.db).await?;
        Ok(IndexStatusView {
            is_running: state.run_status()?.is_running(),
            current,
        })
    }

    /// Run history, most recent first.
    pub async fn history(&self, limit: Option<i64>) -> Result<Vec<IndexingRunDto>> {
        get_run_history(&self.db, limit.unwrap_or(DEFAULT_HISTORY_LIMIT)).await
    }
}
