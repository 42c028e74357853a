pub mod models;
pub mod prompt;
pub mod providers;

use crate::config::LlmConfig;
use crate::db::SqlDialect;
use async_trait::async_trait;
use models::CompletionRequest;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("LLM connection error: {0}")]
    ConnectionError(String),
    #[error("LLM response error: {0}")]
    ResponseError(String),
    #[error("LLM configuration error: {0}")]
    ConfigError(String),
    #[error("LLM backend not configured (set GROQ_API_KEY)")]
    NotConfigured,
}

/// A hosted or local chat model that turns a system instruction plus one user
/// message into a single completion.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError>;
}

/// Sampling knobs sent with every completion request
#[derive(Debug, Clone, Copy)]
pub struct GenerationSettings {
    pub max_tokens: u32,
    pub temperature: f32,
}

impl From<&LlmConfig> for GenerationSettings {
    fn from(config: &LlmConfig) -> Self {
        Self {
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        }
    }
}

pub struct LlmManager {
    provider: Option<Box<dyn CompletionProvider>>,
    settings: GenerationSettings,
}

impl LlmManager {
    /// Builds the configured backend. A hosted backend without an API key
    /// leaves the manager unconfigured instead of failing startup.
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let settings = GenerationSettings::from(config);
        let provider: Box<dyn CompletionProvider> = match config.backend.as_str() {
            "groq" | "remote" if config.api_key.is_none() => {
                warn!("No API key for LLM backend '{}', SQL generation is disabled", config.backend);
                return Ok(Self::unconfigured(settings));
            }
            "groq" => Box::new(providers::openai::OpenAiCompatibleProvider::groq(config)?),
            "remote" => Box::new(providers::openai::OpenAiCompatibleProvider::new(config)?),
            "ollama" => Box::new(providers::ollama::OllamaProvider::new(config)?),
            _ => {
                return Err(LlmError::ConfigError(format!(
                    "Unsupported LLM backend: {}",
                    config.backend
                )))
            }
        };

        Ok(Self::with_provider(provider, settings))
    }

    pub fn with_provider(provider: Box<dyn CompletionProvider>, settings: GenerationSettings) -> Self {
        Self {
            provider: Some(provider),
            settings,
        }
    }

    pub fn unconfigured(settings: GenerationSettings) -> Self {
        Self {
            provider: None,
            settings,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.provider.is_some()
    }

    /// Asks the model for a `dialect` query answering `question` against
    /// `schema` and returns it with any Markdown fence removed. The text is
    /// not validated.
    pub async fn generate_sql(
        &self,
        question: &str,
        schema: &str,
        dialect: SqlDialect,
    ) -> Result<String, LlmError> {
        let provider = self.provider.as_ref().ok_or(LlmError::NotConfigured)?;

        let request = CompletionRequest {
            system: prompt::build_system_prompt(schema, dialect),
            user: question.to_string(),
            max_tokens: self.settings.max_tokens,
            temperature: self.settings.temperature,
        };

        info!("Requesting SQL from {} backend", provider.name());
        let raw = provider.complete(&request).await?;
        debug!("Raw completion: {}", raw);

        Ok(prompt::strip_code_fence(&raw))
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{settings, ScriptedProvider};
    use super::*;
    use std::sync::Arc;

    fn config(backend: &str, api_key: Option<&str>) -> LlmConfig {
        LlmConfig {
            backend: backend.to_string(),
            model: "llama-3.1-70b-versatile".to_string(),
            api_key: api_key.map(str::to_string),
            api_url: None,
            max_tokens: 500,
            temperature: 0.1,
            timeout_secs: 5,
        }
    }

    #[test]
    fn missing_key_leaves_groq_unconfigured() {
        let manager = LlmManager::new(&config("groq", None)).unwrap();
        assert!(!manager.is_configured());

        let manager = LlmManager::new(&config("groq", Some("gsk-test"))).unwrap();
        assert!(manager.is_configured());
    }

    #[test]
    fn remote_backend_needs_an_url() {
        let err = LlmManager::new(&config("remote", Some("key"))).err().unwrap();
        assert!(matches!(err, LlmError::ConfigError(_)));
    }

    #[test]
    fn unknown_backend_is_rejected() {
        let err = LlmManager::new(&config("llamafile", Some("key"))).err().unwrap();
        assert_eq!(
            err.to_string(),
            "LLM configuration error: Unsupported LLM backend: llamafile"
        );
    }

    #[tokio::test]
    async fn generate_sql_sends_schema_and_question() {
        let provider = Arc::new(ScriptedProvider::replying("```sql\nSELECT 1\n```"));
        let manager = LlmManager::with_provider(Box::new(Arc::clone(&provider)), settings());

        let sql = manager
            .generate_sql("how many vendors", "SCHEMA-TEXT", SqlDialect::Postgres)
            .await
            .unwrap();
        assert_eq!(sql, "SELECT 1");

        let requests = provider.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].user, "how many vendors");
        assert!(requests[0].system.contains("SCHEMA-TEXT"));
        assert_eq!(requests[0].max_tokens, 500);
        assert!((requests[0].temperature - 0.1).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn empty_completion_is_passed_through() {
        let manager = LlmManager::with_provider(Box::new(ScriptedProvider::replying("  ``` ```  ")), settings());
        assert_eq!(manager.generate_sql("q", "s", SqlDialect::DuckDb).await.unwrap(), "");
    }

    #[tokio::test]
    async fn unconfigured_manager_refuses_to_generate() {
        let manager = LlmManager::unconfigured(settings());
        let err = manager.generate_sql("q", "s", SqlDialect::DuckDb).await.unwrap_err();
        assert!(matches!(err, LlmError::NotConfigured));
    }
}
