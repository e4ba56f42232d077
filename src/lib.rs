// Blood Test Analyser - queues uploaded reports for asynchronous agent analysis

pub mod config;
pub mod db;
pub mod models;
pub mod types;
pub mod agents;
pub mod llm;
pub mod storage;
pub mod routes;
pub mod middleware;
pub mod queue;
pub mod utils;
pub mod analysis;

// Re-exports for convenience
pub use config::Config;
pub use models::AppState;
