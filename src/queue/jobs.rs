// Task definitions shared by the submission side and the workers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Name under which the report analysis task is registered.
pub const ANALYZE_BLOOD_REPORT: &str = "analyze_blood_report";

/// One queued unit of work as it travels through the broker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskMessage {
    pub id: String,
    pub task: String,
    pub args: serde_json::Value,
    pub enqueued_at: DateTime<Utc>,
}

impl TaskMessage {
    pub fn new(task: impl Into<String>, args: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            task: task.into(),
            args,
            enqueued_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskState {
    Pending,
    Running,
    Success,
    Failure,
}

impl TaskState {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskState::Success | TaskState::Failure)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskState::Pending => "PENDING",
            TaskState::Running => "RUNNING",
            TaskState::Success => "SUCCESS",
            TaskState::Failure => "FAILURE",
        }
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the result backend knows about a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub task_id: String,
    pub state: TaskState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl TaskRecord {
    /// Record for an id the backend has no entry for; unknown ids read as pending.
    pub fn pending(task_id: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            state: TaskState::Pending,
            task: None,
            result: None,
            error: None,
            updated_at: Utc::now(),
        }
    }

    pub fn queued(message: &TaskMessage) -> Self {
        Self {
            task: Some(message.task.clone()),
            updated_at: message.enqueued_at,
            ..Self::pending(message.id.clone())
        }
    }

    pub fn running(message: &TaskMessage) -> Self {
        Self {
            state: TaskState::Running,
            updated_at: Utc::now(),
            ..Self::queued(message)
        }
    }

    pub fn finished(message: &TaskMessage, outcome: &TaskOutcome) -> Self {
        let (state, result, error) = match outcome {
            TaskOutcome::Success(value) => (TaskState::Success, Some(value.clone()), None),
            TaskOutcome::Failure(err) => (TaskState::Failure, None, Some(err.clone())),
        };
        Self {
            state,
            result,
            error,
            updated_at: Utc::now(),
            ..Self::queued(message)
        }
    }
}

/// Terminal result of executing a task handler.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutcome {
    Success(serde_json::Value),
    Failure(String),
}

/// Arguments of [`ANALYZE_BLOOD_REPORT`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzeReportArgs {
    pub query: String,
    pub file_path: String,
    pub file_name: String,
    /// Base64 copy of the upload. The submitter deletes its staged file as soon
    /// as the task is queued, so the worker re-stages the document from here.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document: Option<String>,
}
