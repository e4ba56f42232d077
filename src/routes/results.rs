// Read-only access to the Result Store

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};

use crate::db::DatabaseOperations;
use crate::models::{AnalysisResult, AppState, ListResultsParams, ListResultsResponse};
use crate::types::{AppError, AppResult};

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 500;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/results", get(list_results))
        .route("/results/{id}", get(get_result))
        .with_state(state)
}

async fn list_results(
    State(state): State<AppState>,
    Query(params): Query<ListResultsParams>,
) -> AppResult<Json<ListResultsResponse>> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let offset = params.offset.unwrap_or(0).max(0);

    let results = DatabaseOperations::list_analysis_results(&state.pool, limit, offset).await?;
    let total = DatabaseOperations::count_analysis_results(&state.pool).await?;

    Ok(Json(ListResultsResponse {
        results,
        total,
        limit,
        offset,
    }))
}

async fn get_result(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<AnalysisResult>> {
    DatabaseOperations::get_analysis_result(&state.pool, id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Analysis result {}", id)))
}
