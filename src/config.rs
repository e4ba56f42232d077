use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub queue: QueueConfig,
    pub llm: LLMConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    pub cors_allowed_origins: Vec<String>,
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    pub url: String,
    /// `false` keeps the queue in-process.
    pub enabled: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueueConfig {
    pub name: String,
    pub result_ttl_secs: u64,
    pub worker_concurrency: usize,
    pub poll_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LLMConfig {
    /// One of `openai`, `openrouter`, `groq` or `ollama`.
    pub provider: String,
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub report_max_chars: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub upload_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub log_dir: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_vars<F>(var: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str, default: &str| var(key).unwrap_or_else(|| default.to_string());

        Ok(Self {
            server: ServerConfig {
                port: parse(&var, "PORT", "8000")?,
                host: get("HOST", "0.0.0.0"),
                cors_allowed_origins: get("ALLOWED_ORIGINS", "*")
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
                max_upload_bytes: parse(&var, "MAX_UPLOAD_BYTES", "20971520")?,
            },
            database: DatabaseConfig {
                url: get("DATABASE_URL", "sqlite://blood_test_analyser.db?mode=rwc"),
                max_connections: parse(&var, "DB_MAX_CONNECTIONS", "5")?,
                min_connections: parse(&var, "DB_MIN_CONNECTIONS", "1")?,
            },
            redis: RedisConfig {
                url: get("REDIS_URL", "redis://localhost:6379/0"),
                enabled: parse(&var, "USE_JOB_QUEUE", "true")?,
            },
            queue: QueueConfig {
                name: get("QUEUE_NAME", "blood_test_analyser"),
                result_ttl_secs: parse(&var, "RESULT_TTL_SECS", "86400")?,
                worker_concurrency: parse::<usize, _>(&var, "WORKER_CONCURRENCY", "2")?.max(1),
                poll_timeout_secs: parse::<u64, _>(&var, "WORKER_POLL_SECS", "5")?.max(1),
            },
            llm: LLMConfig {
                provider: get("LLM_PROVIDER", "openai").trim().to_lowercase(),
                base_url: get("LLM_BASE_URL", "https://api.openai.com/v1"),
                api_key: var("LLM_API_KEY")
                    .or_else(|| var("OPENAI_API_KEY"))
                    .unwrap_or_default(),
                model: get("LLM_MODEL", "gpt-4o-mini"),
                max_tokens: parse(&var, "LLM_MAX_TOKENS", "2048")?,
                temperature: parse(&var, "LLM_TEMPERATURE", "0.2")?,
                report_max_chars: parse(&var, "REPORT_MAX_CHARS", "60000")?,
            },
            storage: StorageConfig {
                upload_dir: PathBuf::from(get("UPLOAD_DIR", "data")),
            },
            logging: LoggingConfig {
                log_dir: var("LOG_DIR").filter(|s| !s.is_empty()).map(PathBuf::from),
            },
        })
    }
}

fn parse<T, F>(var: &F, key: &str, default: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    let raw = var(key).unwrap_or_else(|| default.to_string());
    raw.trim()
        .parse()
        .with_context(|| format!("Invalid value for {}: {:?}", key, raw))
}
