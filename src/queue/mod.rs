//! Task Queue Backend
//!
//! A broker + result store pair behind the [`TaskQueue`] trait:
//!
//! - [`RedisQueue`] keeps messages in a Redis list and task records under
//!   expiring keys, so the HTTP server and the workers can run as separate
//!   processes.
//! - [`MemoryQueue`] keeps everything in-process, for single-process
//!   deployments and tests.
//!
//! The submission side only calls [`TaskQueue::enqueue`] and
//! [`TaskQueue::get_status`]; the remaining methods belong to the workers.

pub mod jobs;
pub mod memory;
pub mod redis_queue;
pub mod workers;

pub use jobs::*;
pub use memory::MemoryQueue;
pub use redis_queue::{QueueKeys, RedisQueue};
pub use workers::{TaskContext, Worker};

use async_trait::async_trait;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Queue backend unavailable: {0}")]
    Unavailable(String),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Malformed queue payload: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type QueueResult<T> = std::result::Result<T, QueueError>;

#[async_trait]
pub trait TaskQueue: Send + Sync {
    /// Short backend name for logs and health output.
    fn name(&self) -> &'static str;

    /// Queue a message and return its task id. The task reads as pending
    /// until a worker picks it up.
    async fn enqueue(&self, message: TaskMessage) -> QueueResult<String>;

    async fn get_status(&self, task_id: &str) -> QueueResult<TaskRecord>;

    /// Wait up to `timeout` for the next message. A returned message stays
    /// in flight until [`TaskQueue::complete`] acknowledges it.
    async fn dequeue(&self, timeout: Duration) -> QueueResult<Option<TaskMessage>>;

    async fn mark_running(&self, message: &TaskMessage) -> QueueResult<()>;

    /// Store the terminal record and acknowledge the message.
    async fn complete(&self, message: &TaskMessage, outcome: TaskOutcome) -> QueueResult<()>;

    async fn ping(&self) -> QueueResult<()>;
}
