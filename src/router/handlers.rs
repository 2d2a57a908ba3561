use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::db::check_db_connection;
use crate::errors::CatalogError;
use crate::indexer::IndexStatusView;
use crate::repositories::indexing_run::IndexingRunDto;
use crate::search::{SearchPage, SearchParams};
use crate::types::{CategoryKey, TriggerSource};

use super::AppState;

/// Maps domain errors onto HTTP status codes with a JSON error body.
pub struct ApiError(CatalogError);

impl From<CatalogError> for ApiError {
    fn from(err: CatalogError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            CatalogError::IndexingInProgress => StatusCode::CONFLICT,
            CatalogError::QueryTooComplex { .. }
            | CatalogError::InvalidCursor { .. }
            | CatalogError::ConfigurationError { .. } => StatusCode::BAD_REQUEST,
            CatalogError::ArchiveUnreachable { .. } | CatalogError::ArchiveMalformed { .. } => {
                StatusCode::BAD_GATEWAY
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    if check_db_connection(&state.db).await.is_err() {
        return (StatusCode::INTERNAL_SERVER_ERROR, "Db connection failed");
    }
    (StatusCode::OK, "Healthy")
}

#[derive(Debug, Default, Deserialize)]
pub struct TriggerRequest {
    pub created_by: Option<String>,
    pub archive_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TriggerResponse {
    pub run_id: i64,
    pub status: &'static str,
}

/// Starts a refresh run and answers immediately; the run continues in the
/// background. An already-active run yields 409 without touching it.
pub async fn trigger_indexing(
    State(state): State<AppState>,
    body: Option<Json<TriggerRequest>>,
) -> Result<Response, ApiError> {
    let Json(request) = body.unwrap_or_default();

    let run_id = state
        .indexer
        .trigger_detached(TriggerSource::Manual, request.created_by, request.archive_url)
        .await?;

    match run_id {
        Some(run_id) => Ok((
            StatusCode::ACCEPTED,
            Json(TriggerResponse {
                run_id,
                status: "running",
            }),
        )
            .into_response()),
        None => Err(CatalogError::IndexingInProgress.into()),
    }
}

pub async fn stop_indexing(State(state): State<AppState>) -> Result<Response, ApiError> {
    let report = state.indexer.stop().await?;
    Ok(Json(report).into_response())
}

pub async fn indexing_status(
    State(state): State<AppState>,
) -> Result<Json<IndexStatusView>, ApiError> {
    Ok(Json(state.indexer.status().await?))
}

#[derive(Debug, Default, Deserialize)]
pub struct HistoryParams {
    pub limit: Option<i64>,
}

pub async fn indexing_history(
    State(state): State<AppState>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<Vec<IndexingRunDto>>, ApiError> {
    Ok(Json(state.indexer.history(params.limit).await?))
}

pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchPage>, ApiError> {
    Ok(Json(state.search.search(&params).await?))
}

#[derive(Debug, Default, Deserialize)]
pub struct ScopeParams {
    pub registry: Option<String>,
}

pub async fn languages(
    State(state): State<AppState>,
    Query(params): Query<ScopeParams>,
) -> Result<Json<Vec<String>>, ApiError> {
    Ok(Json(
        state.search.list_languages(params.registry.as_deref()).await?,
    ))
}

pub async fn categories(
    State(state): State<AppState>,
    Query(params): Query<ScopeParams>,
) -> Result<Json<Vec<CategoryKey>>, ApiError> {
    Ok(Json(
        state.search.list_categories(params.registry.as_deref()).await?,
    ))
}

/// Per-registry metadata with the languages column decoded for clients.
#[derive(Debug, Serialize)]
pub struct RegistryView {
    pub registry_name: String,
    pub title: String,
    pub description: Option<String>,
    pub source: Option<String>,
    pub last_refreshed_at: Option<chrono::DateTime<chrono::Utc>>,
    pub total_items: i64,
    pub total_stars: i64,
    pub languages: Vec<String>,
    pub latest_commit: Option<chrono::DateTime<chrono::Utc>>,
}

pub async fn registries(
    State(state): State<AppState>,
) -> Result<Json<Vec<RegistryView>>, ApiError> {
    let rows = state.search.get_metadata().await?;
    let mut views = Vec::with_capacity(rows.len());
    for row in rows {
        let languages = row.languages_vec()?;
        views.push(RegistryView {
            registry_name: row.registry_name,
            title: row.title,
            description: row.description,
            source: row.source,
            last_refreshed_at: row.last_refreshed_at,
            total_items: row.total_items,
            total_stars: row.total_stars,
            languages,
            latest_commit: row.latest_commit,
        });
    }
    Ok(Json(views))
}
