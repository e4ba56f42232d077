// Shared fixtures for route tests

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use tempfile::TempDir;
use tower::ServiceExt;

use crate::agents::AgentCollaborator;
use crate::config::Config;
use crate::db::connect_in_memory;
use crate::models::AppState;
use crate::queue::{
    MemoryQueue, QueueError, QueueResult, TaskContext, TaskMessage, TaskOutcome, TaskQueue,
    TaskRecord,
};
use crate::routes::create_router;

const BOUNDARY: &str = "----blood-test-analyser-boundary";

/// Backend that fails every call, as if the broker were down.
pub struct UnreachableQueue;

#[async_trait]
impl TaskQueue for UnreachableQueue {
    fn name(&self) -> &'static str {
        "unreachable"
    }

    async fn enqueue(&self, _message: TaskMessage) -> QueueResult<String> {
        Err(refused())
    }

    async fn get_status(&self, _task_id: &str) -> QueueResult<TaskRecord> {
        Err(refused())
    }

    async fn dequeue(&self, _timeout: Duration) -> QueueResult<Option<TaskMessage>> {
        Err(refused())
    }

    async fn mark_running(&self, _message: &TaskMessage) -> QueueResult<()> {
        Err(refused())
    }

    async fn complete(&self, _message: &TaskMessage, _outcome: TaskOutcome) -> QueueResult<()> {
        Err(refused())
    }

    async fn ping(&self) -> QueueResult<()> {
        Err(refused())
    }
}

fn refused() -> QueueError {
    QueueError::Unavailable("connection refused".to_string())
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub queue: Arc<dyn TaskQueue>,
    memory: Option<Arc<MemoryQueue>>,
    pub upload_dir: TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        let memory = Arc::new(MemoryQueue::default());
        Self::build(memory.clone(), Some(memory)).await
    }

    pub async fn with_unreachable_queue() -> Self {
        Self::build(Arc::new(UnreachableQueue), None).await
    }

    async fn build(queue: Arc<dyn TaskQueue>, memory: Option<Arc<MemoryQueue>>) -> Self {
        let upload_dir = TempDir::new().unwrap();
        let mut config = Config::from_vars(|_| None).unwrap();
        config.storage.upload_dir = upload_dir.path().join("uploads");
        config.queue.poll_timeout_secs = 1;

        let state = AppState {
            pool: connect_in_memory().await.unwrap(),
            config: Arc::new(config),
            queue: queue.clone(),
        };

        Self {
            router: create_router(state.clone()),
            state,
            queue,
            memory,
            upload_dir,
        }
    }

    /// Same app, staging uploads somewhere else.
    pub fn with_upload_dir(mut self, dir: PathBuf) -> Self {
        let mut config = (*self.state.config).clone();
        config.storage.upload_dir = dir;
        self.state.config = Arc::new(config);
        self.router = create_router(self.state.clone());
        self
    }

    pub fn memory_queue(&self) -> &MemoryQueue {
        self.memory.as_deref().expect("app was built without a memory queue")
    }

    /// Files currently sitting in the upload directory.
    pub fn staged_files(&self) -> Vec<PathBuf> {
        match std::fs::read_dir(&self.state.config.storage.upload_dir) {
            Ok(entries) => entries.map(|e| e.unwrap().path()).collect(),
            Err(_) => Vec::new(),
        }
    }

    pub fn task_context(&self, agent: Arc<dyn AgentCollaborator>) -> TaskContext {
        TaskContext {
            pool: self.state.pool.clone(),
            agent,
            staging_dir: self.upload_dir.path().join("worker"),
        }
    }
}

/// Builds a `POST /analyze` multipart request. `file_name: None` omits the file part.
pub fn multipart_request(file_name: Option<&str>, data: &[u8], query: Option<&str>) -> Request<Body> {
    let mut body: Vec<u8> = Vec::new();

    if let Some(name) = file_name {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\n",
                name
            )
            .as_bytes(),
        );
        body.extend_from_slice(b"Content-Type: application/pdf\r\n\r\n");
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }

    if let Some(query) = query {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        body.extend_from_slice(b"Content-Disposition: form-data; name=\"query\"\r\n\r\n");
        body.extend_from_slice(query.as_bytes());
        body.extend_from_slice(b"\r\n");
    }

    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

    Request::builder()
        .method("POST")
        .uri("/analyze")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

pub async fn send_json(router: &Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, value)
}

pub async fn get_json(router: &Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    send_json(router, request).await
}
