use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::{ConnectionManager, MultiplexedConnection};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::{QueueError, QueueResult, TaskMessage, TaskOutcome, TaskQueue, TaskRecord};
use crate::config::QueueConfig;

/// Key layout for one named queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueKeys {
    name: String,
}

impl QueueKeys {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// List workers pop from.
    pub fn queue(&self) -> String {
        format!("{}:queue", self.name)
    }

    /// List holding messages taken by a worker but not yet completed.
    pub fn processing(&self) -> String {
        format!("{}:processing", self.name)
    }

    pub fn record(&self, task_id: &str) -> String {
        format!("{}:task-meta:{}", self.name, task_id)
    }
}

/// Redis-backed broker and result store.
///
/// Messages are pushed onto `<name>:queue` and atomically moved to
/// `<name>:processing` when a worker takes them; the completion call removes
/// them from there. Task records live under `<name>:task-meta:<id>` and expire
/// after the configured TTL.
pub struct RedisQueue {
    client: redis::Client,
    conn: ConnectionManager,
    /// Blocking pops get their own connection so they don't stall other commands.
    blocking: Mutex<Option<MultiplexedConnection>>,
    /// Raw payloads of messages taken by this process, keyed by task id.
    inflight: Mutex<HashMap<String, String>>,
    keys: QueueKeys,
    result_ttl_secs: u64,
}

impl RedisQueue {
    pub async fn connect(url: &str, config: &QueueConfig) -> QueueResult<Self> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client.clone()).await?;
        info!(queue = %config.name, "Connected to Redis task queue");

        Ok(Self {
            client,
            conn,
            blocking: Mutex::new(None),
            inflight: Mutex::new(HashMap::new()),
            keys: QueueKeys::new(config.name.clone()),
            result_ttl_secs: config.result_ttl_secs.max(1),
        })
    }

    pub fn keys(&self) -> &QueueKeys {
        &self.keys
    }

    async fn store_record(&self, record: &TaskRecord) -> QueueResult<()> {
        let payload = serde_json::to_string(record)?;
        let mut conn = self.conn.clone();
        let _: () = redis::cmd("SET")
            .arg(self.keys.record(&record.task_id))
            .arg(payload)
            .arg("EX")
            .arg(self.result_ttl_secs)
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn blocking_connection(&self) -> QueueResult<MultiplexedConnection> {
        let mut slot = self.blocking.lock().await;
        if let Some(conn) = slot.as_ref() {
            return Ok(conn.clone());
        }
        let conn = self.client.get_multiplexed_async_connection().await?;
        *slot = Some(conn.clone());
        Ok(conn)
    }
}

#[async_trait]
impl TaskQueue for RedisQueue {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn enqueue(&self, message: TaskMessage) -> QueueResult<String> {
        let record = serde_json::to_string(&TaskRecord::queued(&message))?;
        let payload = serde_json::to_string(&message)?;

        let mut conn = self.conn.clone();
        let _: () = redis::pipe()
            .atomic()
            .cmd("SET")
            .arg(self.keys.record(&message.id))
            .arg(record)
            .arg("EX")
            .arg(self.result_ttl_secs)
            .ignore()
            .cmd("LPUSH")
            .arg(self.keys.queue())
            .arg(payload)
            .ignore()
            .query_async(&mut conn)
            .await?;

        debug!(task_id = %message.id, task = %message.task, "Task pushed to Redis");
        Ok(message.id)
    }

    async fn get_status(&self, task_id: &str) -> QueueResult<TaskRecord> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = redis::cmd("GET")
            .arg(self.keys.record(task_id))
            .query_async(&mut conn)
            .await?;

        match raw {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(TaskRecord::pending(task_id)),
        }
    }

    async fn dequeue(&self, timeout: Duration) -> QueueResult<Option<TaskMessage>> {
        let mut conn = self.blocking_connection().await?;
        let popped: redis::RedisResult<Option<String>> = redis::cmd("BRPOPLPUSH")
            .arg(self.keys.queue())
            .arg(self.keys.processing())
            .arg(timeout.as_secs().max(1))
            .query_async(&mut conn)
            .await;

        let raw = match popped {
            Ok(Some(raw)) => raw,
            Ok(None) => return Ok(None),
            Err(e) => {
                // Drop the cached connection; the next poll reconnects.
                self.blocking.lock().await.take();
                return Err(e.into());
            }
        };

        match serde_json::from_str::<TaskMessage>(&raw) {
            Ok(message) => {
                self.inflight
                    .lock()
                    .await
                    .insert(message.id.clone(), raw);
                Ok(Some(message))
            }
            Err(e) => {
                warn!(error = %e, "Discarding malformed task message");
                let mut conn = self.conn.clone();
                let _: i64 = redis::cmd("LREM")
                    .arg(self.keys.processing())
                    .arg(1)
                    .arg(&raw)
                    .query_async(&mut conn)
                    .await?;
                Err(QueueError::Serialization(e))
            }
        }
    }

    async fn mark_running(&self, message: &TaskMessage) -> QueueResult<()> {
        self.store_record(&TaskRecord::running(message)).await
    }

    async fn complete(&self, message: &TaskMessage, outcome: TaskOutcome) -> QueueResult<()> {
        let record = serde_json::to_string(&TaskRecord::finished(message, &outcome))?;
        let raw = match self.inflight.lock().await.remove(&message.id) {
            Some(raw) => raw,
            None => serde_json::to_string(message)?,
        };

        let mut conn = self.conn.clone();
        let _: () = redis::pipe()
            .atomic()
            .cmd("SET")
            .arg(self.keys.record(&message.id))
            .arg(record)
            .arg("EX")
            .arg(self.result_ttl_secs)
            .ignore()
            .cmd("LREM")
            .arg(self.keys.processing())
            .arg(1)
            .arg(raw)
            .ignore()
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn ping(&self) -> QueueResult<()> {
        let mut conn = self.conn.clone();
        let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        if pong != "PONG" {
            return Err(QueueError::Unavailable(format!(
                "unexpected PING reply: {}",
                pong
            )));
        }
        Ok(())
    }
}
