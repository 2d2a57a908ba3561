use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::db::DbConnection;
use crate::errors::{CatalogError, Result};
use crate::types::{RunStatus, TriggerSource};

/// Fixed message recorded when a run is stopped externally.
pub const STOP_SENTINEL: &str = "Indexing stopped by user";

/// One row of the indexing run history.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct IndexingRunDto {
    pub id: i64,
    pub trigger_source: String,
    pub status: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub total_registries: i64,
    pub processed_registries: i64,
    pub succeeded_registries: i64,
    pub failed_registries: i64,
    pub current_registry: Option<String>,
    /// JSON array of error strings, in the order they occurred.
    pub errors: String,
    pub created_by: Option<String>,
}

impl IndexingRunDto {
    pub fn errors_vec(&self) -> Result<Vec<String>> {
        Ok(serde_json::from_str(&self.errors)?)
    }

    pub fn run_status(&self) -> Result<RunStatus> {
        self.status.parse()
    }
}

/// The singleton concurrency gate row.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct IndexingStateDto {
    pub id: i64,
    pub status: String,
    pub run_id: Option<i64>,
    pub updated_at: DateTime<Utc>,
}

impl IndexingStateDto {
    pub fn run_status(&self) -> Result<RunStatus> {
        self.status.parse()
    }
}

/// Outcome of a stop request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopOutcome {
    Stopped,
    NotRunning,
}

/// Atomically transitions the indexing state to `running` and creates the
/// history row for the new run.
///
/// The conditional UPDATE on the singleton row is the sole concurrency
/// guarantee of the pipeline: of any number of simultaneous triggers,
/// exactly one observes a non-running state and wins. Losers get `Ok(None)`
/// and must not create history rows.
pub async fn try_begin_run(
    db: &DbConnection,
    trigger_source: TriggerSource,
    created_by: Option<&str>,
) -> Result<Option<i64>> {
    let mut tx = db.pool.begin().await?;

    let claimed = sqlx::query(
        r#"
        UPDATE indexing_state
        SET status = 'running', updated_at = $1
        WHERE id = 1 AND status <> 'running'
        "#,
    )
    .bind(Utc::now())
    .execute(&mut *tx)
    .await?;

    if claimed.rows_affected() == 0 {
        tx.rollback().await?;
        return Ok(None);
    }

    let run_id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO indexing_history (trigger_source, status, started_at, errors, created_by)
        VALUES ($1, 'running', $2, '[]', $3)
        RETURNING id
        "#,
    )
    .bind(trigger_source.as_str())
    .bind(Utc::now())
    .bind(created_by)
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query("UPDATE indexing_state SET run_id = $1 WHERE id = 1")
        .bind(run_id)
        .execute(&mut *tx)
        .await?;

    tx.commit()
        .await
        .map_err(|e| CatalogError::database_transaction(format!("begin run: {e}")))?;

    Ok(Some(run_id))
}

/// Records how many registries the fetched snapshot contains.
pub async fn set_run_totals(db: &DbConnection, run_id: i64, total_registries: i64) -> Result<()> {
    sqlx::query(
        "UPDATE indexing_history SET total_registries = $1 WHERE id = $2 AND status = 'running'",
    )
    .bind(total_registries)
    .bind(run_id)
    .execute(&db.pool)
    .await?;

    Ok(())
}

/// Updates the live progress counters of a running run.
pub async fn update_run_progress(
    db: &DbConnection,
    run_id: i64,
    current_registry: Option<&str>,
    processed: i64,
    succeeded: i64,
    failed: i64,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE indexing_history
        SET current_registry = $1,
            processed_registries = $2,
            succeeded_registries = $3,
            failed_registries = $4
        WHERE id = $5 AND status = 'running'
        "#,
    )
    .bind(current_registry)
    .bind(processed)
    .bind(succeeded)
    .bind(failed)
    .bind(run_id)
    .execute(&db.pool)
    .await?;

    Ok(())
}

/// Marks a running run terminal and resets the state row to match.
///
/// Guarded by `status = 'running'` so a run that was stopped externally in
/// the meantime keeps its stop record; returns whether this call performed
/// the transition.
pub async fn finish_run(
    db: &DbConnection,
    run_id: i64,
    status: RunStatus,
    succeeded: i64,
    failed: i64,
    errors: &[String],
) -> Result<bool> {
    let mut tx = db.pool.begin().await?;

    let updated = sqlx::query(
        r#"
        UPDATE indexing_history
        SET status = $1,
            completed_at = $2,
            succeeded_registries = $3,
            failed_registries = $4,
            errors = $5,
            current_registry = NULL
        WHERE id = $6 AND status = 'running'
        "#,
    )
    .bind(status.as_str())
    .bind(Utc::now())
    .bind(succeeded)
    .bind(failed)
    .bind(serde_json::to_string(errors)?)
    .bind(run_id)
    .execute(&mut *tx)
    .await?;

    if updated.rows_affected() == 0 {
        tx.rollback().await?;
        return Ok(false);
    }

    sqlx::query(
        r#"
        UPDATE indexing_state
        SET status = $1, updated_at = $2
        WHERE id = 1 AND run_id = $3 AND status = 'running'
        "#,
    )
    .bind(status.as_str())
    .bind(Utc::now())
    .bind(run_id)
    .execute(&mut *tx)
    .await?;

    tx.commit()
        .await
        .map_err(|e| CatalogError::database_transaction(format!("finish run: {e}")))?;

    Ok(true)
}

/// Force-fails the current run with the fixed stop sentinel.
///
/// Marks state, it does not abort in-flight work: a worker observes the
/// transition between registries and abandons the loop.
pub async fn stop_run(db: &DbConnection) -> Result<StopOutcome> {
    let mut tx = db.pool.begin().await?;

    let state = sqlx::query_as::<_, IndexingStateDto>(
        "SELECT id, status, run_id, updated_at FROM indexing_state WHERE id = 1",
    )
    .fetch_one(&mut *tx)
    .await?;

    if !state.run_status()?.is_running() {
        tx.rollback().await?;
        return Ok(StopOutcome::NotRunning);
    }

    if let Some(run_id) = state.run_id {
        let errors: String =
            sqlx::query_scalar("SELECT errors FROM indexing_history WHERE id = $1")
                .bind(run_id)
                .fetch_one(&mut *tx)
                .await?;
        let mut errors: Vec<String> = serde_json::from_str(&errors)?;
        errors.push(STOP_SENTINEL.to_string());

        sqlx::query(
            r#"
            UPDATE indexing_history
            SET status = 'failed',
                completed_at = $1,
                current_registry = NULL,
                errors = $2
            WHERE id = $3
            "#,
        )
        .bind(Utc::now())
        .bind(serde_json::to_string(&errors)?)
        .bind(run_id)
        .execute(&mut *tx)
        .await?;
    }

    sqlx::query("UPDATE indexing_state SET status = 'failed', updated_at = $1 WHERE id = 1")
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

    tx.commit()
        .await
        .map_err(|e| CatalogError::database_transaction(format!("stop run: {e}")))?;

    Ok(StopOutcome::Stopped)
}

/// Reads the singleton state row.
pub async fn get_indexing_state(db: &DbConnection) -> Result<IndexingStateDto> {
    let state = sqlx::query_as::<_, IndexingStateDto>(
        "SELECT id, status, run_id, updated_at FROM indexing_state WHERE id = 1",
    )
    .fetch_one(&db.pool)
    .await?;

    Ok(state)
}

/// Fetches one run by id. Unknown ids are `Ok(None)`.
pub async fn get_run(db: &DbConnection, run_id: i64) -> Result<Option<IndexingRunDto>> {
    let run = sqlx::query_as::<_, IndexingRunDto>("SELECT * FROM indexing_history WHERE id = $1")
        .bind(run_id)
        .fetch_optional(&db.pool)
        .await?;

    Ok(run)
}

/// Fetches the run the state row points at, if any.
pub async fn get_current_run(db: &DbConnection) -> Result<Option<IndexingRunDto>> {
    let state = get_indexing_state(db).await?;
    match state.run_id {
        Some(run_id) => get_run(db, run_id).await,
        None => Ok(None),
    }
}

/// Run history, most recent first.
pub async fn get_run_history(db: &DbConnection, limit: i64) -> Result<Vec<IndexingRunDto>> {
    let rows = sqlx::query_as::<_, IndexingRunDto>(
        "SELECT * FROM indexing_history ORDER BY started_at DESC, id DESC LIMIT $1",
    )
    .bind(limit)
    .fetch_all(&db.pool)
    .await?;

    Ok(rows)
}
