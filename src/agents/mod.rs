//! Agent Collaborator
//!
//! The component that actually reads a report and answers the query. The rest
//! of the service only sees [`AgentCollaborator::run`]; what happens inside is
//! the agent's business.
//!
//! ```text
//! Analysis Task
//!      │  run(query, file_path)
//!      ▼
//! ┌─────────────┐
//! │   Doctor    │  → extracts report text, one chat completion
//! │   Agent     │
//! └─────────────┘
//!      │
//!      ▼
//!  AgentOutput (serialized to text for the Result Store)
//! ```

pub mod doctor;
pub mod document;

pub use doctor::DoctorAgent;

use std::path::Path;

use async_trait::async_trait;

use crate::types::{AppResult, TokenUsage};

#[async_trait]
pub trait AgentCollaborator: Send + Sync {
    /// Analyse the document at `file_path` in light of `query`. May take arbitrarily long.
    async fn run(&self, query: &str, file_path: &Path) -> AppResult<AgentOutput>;
}

/// Whatever the agent produced. Its `Display` form is what gets persisted.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AgentOutput {
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
}

impl AgentOutput {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            usage: None,
        }
    }
}

impl std::fmt::Display for AgentOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.content)
    }
}
