use axum::{
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use bytes::Bytes;
use tracing::info;

use crate::models::{AnalyzeResponse, AppState, DEFAULT_QUERY};
use crate::queue::{AnalyzeReportArgs, TaskMessage, ANALYZE_BLOOD_REPORT};
use crate::storage::StagedFile;
use crate::types::{AppError, AppResult};

const DEFAULT_FILE_NAME: &str = "blood_test_report.pdf";

pub fn router(state: AppState) -> Router {
    let max_upload_bytes = state.config.server.max_upload_bytes;
    Router::new()
        .route("/analyze", post(analyze_blood_report))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(state)
}

struct ReportUpload {
    file_name: String,
    data: Bytes,
    query: Option<String>,
}

/// Accepts a report and queues it for analysis.
///
/// The staged copy lives only for the duration of this call: it is removed
/// when `staged` drops, whether the task was queued or not.
async fn analyze_blood_report(
    State(state): State<AppState>,
    multipart: Multipart,
) -> AppResult<Json<AnalyzeResponse>> {
    let upload = read_upload(multipart).await?;
    let query = normalize_query(upload.query.as_deref());

    info!(
        file_name = %upload.file_name,
        bytes = upload.data.len(),
        "Analysis request received"
    );

    let staged = StagedFile::write(
        &state.config.storage.upload_dir,
        &upload.file_name,
        &upload.data,
    )
    .await
    .map_err(AppError::submission)?;

    let args = AnalyzeReportArgs {
        query,
        file_path: staged.path().display().to_string(),
        file_name: upload.file_name,
        document: Some(BASE64.encode(&upload.data)),
    };
    let payload = serde_json::to_value(&args).map_err(AppError::submission)?;

    let task_id = state
        .queue
        .enqueue(TaskMessage::new(ANALYZE_BLOOD_REPORT, payload))
        .await
        .map_err(AppError::submission)?;

    info!(task_id = %task_id, "Analysis task queued");

    Ok(Json(AnalyzeResponse::processing(task_id)))
}

async fn read_upload(mut multipart: Multipart) -> AppResult<ReportUpload> {
    let mut file: Option<(String, Bytes)> = None;
    let mut query: Option<String> = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or("").to_string();

        match name.as_str() {
            "file" => {
                let file_name = field
                    .file_name()
                    .filter(|n| !n.is_empty())
                    .unwrap_or(DEFAULT_FILE_NAME)
                    .to_string();
                let data = field.bytes().await.map_err(multipart_error)?;
                file = Some((file_name, data));
            }
            "query" => {
                query = Some(field.text().await.map_err(multipart_error)?);
            }
            _ => {}
        }
    }

    let (file_name, data) =
        file.ok_or_else(|| AppError::Unprocessable("Field 'file' is required".to_string()))?;

    Ok(ReportUpload {
        file_name,
        data,
        query,
    })
}

fn multipart_error(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(err.body_text())
    } else {
        AppError::InvalidRequest(err.body_text())
    }
}

/// Trims the query and substitutes the default when nothing is left.
pub fn normalize_query(query: Option<&str>) -> String {
    match query.map(str::trim) {
        Some(q) if !q.is_empty() => q.to_string(),
        _ => DEFAULT_QUERY.to_string(),
    }
}
