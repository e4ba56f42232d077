use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use tracing::debug;

use crate::models::{AppState, TaskStatusResponse};
use crate::queue::{TaskRecord, TaskState};
use crate::types::AppResult;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/task/{task_id}", get(get_task_status))
        .with_state(state)
}

async fn get_task_status(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> AppResult<Json<TaskStatusResponse>> {
    let record = state.queue.get_status(&task_id).await?;
    debug!(task_id = %task_id, state = %record.state, "Task status requested");

    Ok(Json(status_response(record)))
}

/// Maps a backend record onto the public status taxonomy.
pub fn status_response(record: TaskRecord) -> TaskStatusResponse {
    match record.state {
        TaskState::Success => TaskStatusResponse {
            status: "success".to_string(),
            result: Some(record.result.unwrap_or(serde_json::Value::Null)),
            message: None,
        },
        TaskState::Failure => TaskStatusResponse {
            status: "error".to_string(),
            result: None,
            message: Some(record.error.unwrap_or_else(|| "Task failed".to_string())),
        },
        state => TaskStatusResponse {
            status: state.to_string(),
            result: None,
            message: Some("Task is still processing".to_string()),
        },
    }
}
