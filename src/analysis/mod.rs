//! Analysis Task
//!
//! Runs one report through the agent collaborator and records the answer.
//! Every failure on the way (staging, the agent, the insert) comes back as an
//! [`AnalysisOutcome::Error`] payload rather than a task failure, so the queue
//! sees these tasks succeed either way.

use std::path::PathBuf;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use tracing::{info, warn};

use crate::db::DatabaseOperations;
use crate::models::AnalysisOutcome;
use crate::queue::{AnalyzeReportArgs, TaskContext};
use crate::storage::StagedFile;
use crate::types::{AppError, AppResult};

pub async fn run_analysis_task(ctx: &TaskContext, args: AnalyzeReportArgs) -> AnalysisOutcome {
    let file_name = args.file_name.clone();
    match analyze(ctx, args).await {
        Ok(outcome) => outcome,
        Err(e) => {
            warn!(file_name = %file_name, error = %e, "Report analysis failed");
            AnalysisOutcome::Error {
                message: e.to_string(),
            }
        }
    }
}

async fn analyze(ctx: &TaskContext, args: AnalyzeReportArgs) -> AppResult<AnalysisOutcome> {
    let staged = match &args.document {
        Some(encoded) => {
            let bytes = BASE64
                .decode(encoded)
                .map_err(|e| AppError::Document(format!("Invalid document payload: {}", e)))?;
            Some(StagedFile::write(&ctx.staging_dir, &args.file_name, &bytes).await?)
        }
        None => None,
    };
    let path = staged
        .as_ref()
        .map(|s| s.path().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(&args.file_path));

    // Run the agent on its own task so a panic inside it is contained here.
    let agent = ctx.agent.clone();
    let query = args.query.clone();
    let output = tokio::spawn(async move { agent.run(&query, &path).await })
        .await
        .map_err(|e| AppError::Agent(format!("Agent aborted: {}", e)))??;
    drop(staged);

    let analysis = output.to_string();
    let row = DatabaseOperations::insert_analysis_result(
        &ctx.pool,
        &args.query,
        &analysis,
        &args.file_name,
    )
    .await?;

    info!(result_id = row.id, file_name = %args.file_name, "Analysis stored");

    Ok(AnalysisOutcome::Success {
        query: args.query,
        analysis,
        file_processed: args.file_name,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::{AgentCollaborator, AgentOutput};
    use crate::db::connect_in_memory;
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    /// Echoes the document it was given and remembers the path it read.
    struct EchoAgent {
        seen_paths: Mutex<Vec<PathBuf>>,
    }

    #[async_trait]
    impl AgentCollaborator for EchoAgent {
        async fn run(&self, query: &str, file_path: &Path) -> AppResult<AgentOutput> {
            self.seen_paths.lock().unwrap().push(file_path.to_path_buf());
            let body = tokio::fs::read_to_string(file_path).await?;
            Ok(AgentOutput::text(format!("{} => {}", query, body)))
        }
    }

    struct FailingAgent;

    #[async_trait]
    impl AgentCollaborator for FailingAgent {
        async fn run(&self, _query: &str, _file_path: &Path) -> AppResult<AgentOutput> {
            Err(AppError::Agent("model overloaded".to_string()))
        }
    }

    struct PanickingAgent;

    #[async_trait]
    impl AgentCollaborator for PanickingAgent {
        async fn run(&self, _query: &str, _file_path: &Path) -> AppResult<AgentOutput> {
            panic!("agent blew up");
        }
    }

    async fn context(agent: Arc<dyn AgentCollaborator>, dir: &TempDir) -> TaskContext {
        TaskContext {
            pool: connect_in_memory().await.unwrap(),
            agent,
            staging_dir: dir.path().to_path_buf(),
        }
    }

    fn args(document: Option<&[u8]>) -> AnalyzeReportArgs {
        AnalyzeReportArgs {
            query: "Summarise my Blood Test Report".to_string(),
            file_path: "data/blood_test_report_gone.pdf".to_string(),
            file_name: "report.txt".to_string(),
            document: document.map(|d| BASE64.encode(d)),
        }
    }

    #[tokio::test]
    async fn test_success_persists_one_row() {
        let dir = TempDir::new().unwrap();
        let agent = Arc::new(EchoAgent { seen_paths: Mutex::new(Vec::new()) });
        let ctx = context(agent.clone(), &dir).await;

        let outcome = run_analysis_task(&ctx, args(Some(b"HGB 14.1"))).await;
        assert_eq!(
            outcome,
            AnalysisOutcome::Success {
                query: "Summarise my Blood Test Report".to_string(),
                analysis: "Summarise my Blood Test Report => HGB 14.1".to_string(),
                file_processed: "report.txt".to_string(),
            }
        );

        let rows = DatabaseOperations::list_analysis_results(&ctx.pool, 10, 0).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].analysis, "Summarise my Blood Test Report => HGB 14.1");
        assert_eq!(rows[0].file_name, "report.txt");
    }

    #[tokio::test]
    async fn test_restaged_document_is_removed_afterwards() {
        let dir = TempDir::new().unwrap();
        let agent = Arc::new(EchoAgent { seen_paths: Mutex::new(Vec::new()) });
        let ctx = context(agent.clone(), &dir).await;

        run_analysis_task(&ctx, args(Some(b"PLT 250"))).await;

        let seen = agent.seen_paths.lock().unwrap().clone();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].starts_with(dir.path()));
        assert!(!seen[0].exists());
    }

    #[tokio::test]
    async fn test_falls_back_to_file_path_without_document() {
        let dir = TempDir::new().unwrap();
        let existing = dir.path().join("on_disk.txt");
        std::fs::write(&existing, "RBC 4.8").unwrap();

        let agent = Arc::new(EchoAgent { seen_paths: Mutex::new(Vec::new()) });
        let ctx = context(agent.clone(), &dir).await;
        let mut task_args = args(None);
        task_args.file_path = existing.display().to_string();

        let outcome = run_analysis_task(&ctx, task_args).await;
        assert!(matches!(outcome, AnalysisOutcome::Success { .. }));
        assert_eq!(agent.seen_paths.lock().unwrap()[0], existing);
    }

    #[tokio::test]
    async fn test_agent_error_becomes_error_payload() {
        let dir = TempDir::new().unwrap();
        let ctx = context(Arc::new(FailingAgent), &dir).await;

        let outcome = run_analysis_task(&ctx, args(Some(b"x"))).await;
        match outcome {
            AnalysisOutcome::Error { message } => assert!(message.contains("model overloaded")),
            other => panic!("expected error payload, got {:?}", other),
        }
        assert_eq!(DatabaseOperations::count_analysis_results(&ctx.pool).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_agent_panic_becomes_error_payload() {
        let dir = TempDir::new().unwrap();
        let ctx = context(Arc::new(PanickingAgent), &dir).await;

        let outcome = run_analysis_task(&ctx, args(Some(b"x"))).await;
        assert!(matches!(outcome, AnalysisOutcome::Error { .. }));
    }

    #[tokio::test]
    async fn test_missing_file_becomes_error_payload() {
        let dir = TempDir::new().unwrap();
        let agent = Arc::new(EchoAgent { seen_paths: Mutex::new(Vec::new()) });
        let ctx = context(agent, &dir).await;

        let outcome = run_analysis_task(&ctx, args(None)).await;
        assert!(matches!(outcome, AnalysisOutcome::Error { .. }));
    }

    #[tokio::test]
    async fn test_bad_base64_becomes_error_payload() {
        let dir = TempDir::new().unwrap();
        let agent = Arc::new(EchoAgent { seen_paths: Mutex::new(Vec::new()) });
        let ctx = context(agent, &dir).await;
        let mut task_args = args(None);
        task_args.document = Some("***not base64***".to_string());

        match run_analysis_task(&ctx, task_args).await {
            AnalysisOutcome::Error { message } => assert!(message.contains("Invalid document payload")),
            other => panic!("expected error payload, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_store_failure_becomes_error_payload() {
        let dir = TempDir::new().unwrap();
        let agent = Arc::new(EchoAgent { seen_paths: Mutex::new(Vec::new()) });
        let ctx = context(agent, &dir).await;
        ctx.pool.close().await;

        let outcome = run_analysis_task(&ctx, args(Some(b"x"))).await;
        assert!(matches!(outcome, AnalysisOutcome::Error { .. }));
    }
}
