use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;
use tracing::debug;

use super::{QueueResult, TaskMessage, TaskOutcome, TaskQueue, TaskRecord};
use crate::config::QueueConfig;

const DEFAULT_RESULT_TTL: Duration = Duration::from_secs(86_400);

struct StoredRecord {
    record: TaskRecord,
    expires_at: Instant,
}

/// In-process broker and result store.
///
/// Every record write restarts its TTL; expired records read as pending and
/// are pruned on the next enqueue or completion.
pub struct MemoryQueue {
    pending: Mutex<VecDeque<TaskMessage>>,
    records: Mutex<HashMap<String, StoredRecord>>,
    notify: Notify,
    result_ttl: Duration,
}

impl Default for MemoryQueue {
    fn default() -> Self {
        Self::new(DEFAULT_RESULT_TTL)
    }
}

impl MemoryQueue {
    pub fn new(result_ttl: Duration) -> Self {
        Self {
            pending: Mutex::new(VecDeque::new()),
            records: Mutex::new(HashMap::new()),
            notify: Notify::new(),
            result_ttl: result_ttl.max(Duration::from_millis(1)),
        }
    }

    pub fn from_config(config: &QueueConfig) -> Self {
        Self::new(Duration::from_secs(config.result_ttl_secs))
    }

    /// Number of task records currently held, expired ones included until pruned.
    pub async fn record_count(&self) -> usize {
        self.records.lock().await.len()
    }

    /// Stores `record` with a fresh TTL, pruning expired entries when `prune` is set.
    async fn store(&self, record: TaskRecord, prune: bool) {
        let now = Instant::now();
        let mut records = self.records.lock().await;
        if prune {
            let before = records.len();
            records.retain(|_, stored| stored.expires_at > now);
            let removed = before - records.len();
            if removed > 0 {
                debug!(removed, "Pruned expired task records");
            }
        }
        records.insert(
            record.task_id.clone(),
            StoredRecord {
                record,
                expires_at: now + self.result_ttl,
            },
        );
    }

    /// Number of messages waiting for a worker.
    pub async fn len(&self) -> usize {
        self.pending.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Messages currently waiting, oldest first.
    pub async fn pending_messages(&self) -> Vec<TaskMessage> {
        self.pending.lock().await.iter().cloned().collect()
    }
}

#[async_trait]
impl TaskQueue for MemoryQueue {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn enqueue(&self, message: TaskMessage) -> QueueResult<String> {
        let task_id = message.id.clone();
        self.store(TaskRecord::queued(&message), true).await;
        self.pending.lock().await.push_back(message);
        self.notify.notify_one();

        debug!(task_id = %task_id, "Task queued in memory");
        Ok(task_id)
    }

    async fn get_status(&self, task_id: &str) -> QueueResult<TaskRecord> {
        let now = Instant::now();
        let record = self
            .records
            .lock()
            .await
            .get(task_id)
            .filter(|stored| stored.expires_at > now)
            .map(|stored| stored.record.clone())
            .unwrap_or_else(|| TaskRecord::pending(task_id));
        Ok(record)
    }

    async fn dequeue(&self, timeout: Duration) -> QueueResult<Option<TaskMessage>> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            // Register interest before checking so a concurrent enqueue is not missed.
            let notified = self.notify.notified();
            if let Some(message) = self.pending.lock().await.pop_front() {
                return Ok(Some(message));
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Ok(None);
            }
        }
    }

    async fn mark_running(&self, message: &TaskMessage) -> QueueResult<()> {
        self.store(TaskRecord::running(message), false).await;
        Ok(())
    }

    async fn complete(&self, message: &TaskMessage, outcome: TaskOutcome) -> QueueResult<()> {
        self.store(TaskRecord::finished(message, &outcome), true).await;
        Ok(())
    }

    async fn ping(&self) -> QueueResult<()> {
        Ok(())
    }
}
