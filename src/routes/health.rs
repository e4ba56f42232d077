use axum::{extract::State, routing::get, Json, Router};
use tracing::warn;

use crate::db;
use crate::models::{AppState, HealthResponse, RootResponse};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .with_state(state)
}

async fn root() -> Json<RootResponse> {
    Json(RootResponse {
        message: "Blood Test Report Analyser API is running".to_string(),
    })
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let database_ok = match db::health_check(&state.pool).await {
        Ok(_) => true,
        Err(e) => {
            warn!(error = %e, "Database health check failed");
            false
        }
    };

    let queue_ok = match state.queue.ping().await {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, "Queue health check failed");
            false
        }
    };

    let response = HealthResponse {
        status: if database_ok && queue_ok { "ok" } else { "degraded" }.to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        database: connection_label(database_ok).to_string(),
        queue: format!("{}: {}", state.queue.name(), connection_label(queue_ok)),
    };

    Json(response)
}

fn connection_label(ok: bool) -> &'static str {
    if ok {
        "connected"
    } else {
        "unavailable"
    }
}
