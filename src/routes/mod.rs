//! API Routes
//!
//! This module organizes all HTTP endpoints for the application:
//! - `/` - Liveness probe
//! - `/health` - Database and queue checks
//! - `/analyze` - Report submission
//! - `/task/{task_id}` - Task status polling
//! - `/results` - Stored analyses (read-only)

pub mod analyze;
pub mod health;
pub mod results;
pub mod tasks;

#[cfg(test)]
pub(crate) mod test_support;

use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::middleware::apply_cors;
use crate::models::AppState;

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    info!("Creating application router");

    let allowed_origins = state.config.server.cors_allowed_origins.clone();

    let router = Router::new()
        .merge(health::router(state.clone()))
        .merge(analyze::router(state.clone()))
        .merge(tasks::router(state.clone()))
        .merge(results::router(state))
        .layer(TraceLayer::new_for_http());

    apply_cors(router, &allowed_origins)
}
