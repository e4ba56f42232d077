use std::path::Path;

use async_trait::async_trait;
use tracing::{info, warn};

use super::document::{load_report_text, truncate_chars};
use super::{AgentCollaborator, AgentOutput};
use crate::config::LLMConfig;
use crate::llm::{LLMProviderConfig, LLM};
use crate::types::{AppError, AppResult, LLMMessage, LLMRequest};

const SYSTEM_PROMPT: &str = "You are an experienced physician reviewing a patient's blood test report. \
Answer the patient's query using only the values present in the report. \
Explain abnormal results in plain language, note the reference ranges you rely on, \
and suggest sensible next steps. Do not invent values that are not in the report, \
and remind the patient that this is not a substitute for a consultation.";

/// Default collaborator: reads the report and asks one chat completion about it.
pub struct DoctorAgent {
    llm: LLM,
    model: String,
    max_tokens: u32,
    temperature: f32,
    report_max_chars: usize,
}

impl DoctorAgent {
    pub fn from_config(config: &LLMConfig) -> AppResult<Self> {
        let llm = LLM::new(LLMProviderConfig::from(config))?;
        Ok(Self::new(llm, config))
    }

    pub fn new(llm: LLM, config: &LLMConfig) -> Self {
        Self {
            llm,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            report_max_chars: config.report_max_chars,
        }
    }

    fn build_request(&self, query: &str, report: &str) -> LLMRequest {
        let (report, truncated) = truncate_chars(report, self.report_max_chars);
        if truncated {
            warn!(max_chars = self.report_max_chars, "Report text truncated for prompt");
        }

        let user = format!(
            "Patient query: {}\n\nBlood test report:\n\"\"\"\n{}\n\"\"\"",
            query, report
        );

        LLMRequest {
            model: self.model.clone(),
            messages: vec![LLMMessage::system(SYSTEM_PROMPT), LLMMessage::user(user)],
            max_tokens: Some(self.max_tokens),
            temperature: Some(self.temperature),
        }
    }
}

#[async_trait]
impl AgentCollaborator for DoctorAgent {
    async fn run(&self, query: &str, file_path: &Path) -> AppResult<AgentOutput> {
        let report = load_report_text(file_path).await?;
        if report.trim().is_empty() {
            return Err(AppError::Agent(
                "The uploaded report contains no readable text".to_string(),
            ));
        }

        let request = self.build_request(query, &report);
        let response = self.llm.create_chat_completion(&request).await?;

        info!(
            provider = self.llm.provider_name(),
            model = %self.model,
            total_tokens = response.usage.total_tokens,
            "Doctor agent finished"
        );

        Ok(AgentOutput {
            content: response.content,
            usage: Some(response.usage),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LLMAdapter;
    use crate::types::{LLMResponse, TokenUsage};
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    struct RecordingAdapter {
        seen: Arc<Mutex<Vec<LLMRequest>>>,
    }

    #[async_trait]
    impl LLMAdapter for RecordingAdapter {
        async fn create_chat_completion(&self, request: &LLMRequest) -> AppResult<LLMResponse> {
            self.seen.lock().unwrap().push(request.clone());
            Ok(LLMResponse {
                content: "Your iron is low.".to_string(),
                finish_reason: "stop".to_string(),
                usage: TokenUsage {
                    prompt_tokens: 10,
                    completion_tokens: 5,
                    total_tokens: 15,
                },
            })
        }
    }

    fn llm_config(report_max_chars: usize) -> LLMConfig {
        LLMConfig {
            provider: "openai".to_string(),
            base_url: "http://localhost:1".to_string(),
            api_key: String::new(),
            model: "test-model".to_string(),
            max_tokens: 256,
            temperature: 0.1,
            report_max_chars,
        }
    }

    fn agent(seen: Arc<Mutex<Vec<LLMRequest>>>, report_max_chars: usize) -> DoctorAgent {
        let llm = LLM::with_adapter("recording", Box::new(RecordingAdapter { seen }));
        DoctorAgent::new(llm, &llm_config(report_max_chars))
    }

    #[tokio::test]
    async fn test_run_sends_query_and_report() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("labs.txt");
        std::fs::write(&path, "Ferritin: 8 ng/mL (low)").unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let output = agent(seen.clone(), 10_000)
            .run("Why am I tired?", &path)
            .await
            .unwrap();

        assert_eq!(output.to_string(), "Your iron is low.");
        assert_eq!(output.usage.unwrap().total_tokens, 15);

        let requests = seen.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].model, "test-model");
        assert_eq!(requests[0].messages[0].role, "system");
        assert!(requests[0].messages[1].content.contains("Why am I tired?"));
        assert!(requests[0].messages[1].content.contains("Ferritin: 8 ng/mL"));
    }

    #[tokio::test]
    async fn test_empty_report_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.txt");
        std::fs::write(&path, "   \n").unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let err = agent(seen.clone(), 10_000).run("q", &path).await.unwrap_err();
        assert!(matches!(err, AppError::Agent(_)));
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_long_report_is_truncated() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let request = agent(seen, 5).build_request("q", "0123456789");
        assert!(request.messages[1].content.contains("01234\n"));
        assert!(!request.messages[1].content.contains("56789"));
    }
}
