use std::sync::Arc;

use sqlx::SqlitePool;
use crate::config::Config;
use crate::queue::TaskQueue;

/// Handles shared by every request, built once at startup.
#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub config: Arc<Config>,
    pub queue: Arc<dyn TaskQueue>,
}

/// Default query used when the client sends none (or only whitespace).
pub const DEFAULT_QUERY: &str = "Summarise my Blood Test Report";

// Result Store row
// Note: FromRow is needed for runtime query_as (without DATABASE_URL at compile time)

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize, sqlx::FromRow)]
pub struct AnalysisResult {
    pub id: i64,
    pub query: String,
    pub analysis: String,
    pub file_name: String,
}

/// Payload returned by the analysis task, tagged by `status`.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum AnalysisOutcome {
    Success {
        query: String,
        analysis: String,
        file_processed: String,
    },
    Error {
        message: String,
    },
}

// API Request/Response types

#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct RootResponse {
    pub message: String,
}

#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct AnalyzeResponse {
    pub status: String,
    pub task_id: String,
    pub message: String,
}

impl AnalyzeResponse {
    pub fn processing(task_id: String) -> Self {
        Self {
            status: "processing".to_string(),
            task_id,
            message: "Your request is being processed. Use the task ID to check the status."
                .to_string(),
        }
    }
}

/// Status endpoint body: `result` on success, `message` otherwise.
#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct TaskStatusResponse {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, serde::Deserialize)]
pub struct ListResultsParams {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct ListResultsResponse {
    pub results: Vec<AnalysisResult>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub database: String,
    pub queue: String,
}
