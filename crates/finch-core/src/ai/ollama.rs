//! Ollama backend implementation
//!
//! Talks to the Ollama `/api/generate` endpoint and renders prompts from the
//! prompt library.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::prompts::PromptLibrary;

use super::parsing::parse_notification_content;
use super::types::{GeneratedContent, GenerationOptions};
use super::{http_client, render_notification_prompt, AIBackend, DEFAULT_TIMEOUT};

/// Ollama backend
#[derive(Clone)]
pub struct OllamaBackend {
    http_client: Client,
    base_url: String,
    model: String,
    prompts: Arc<RwLock<PromptLibrary>>,
}

impl OllamaBackend {
    pub fn new(base_url: &str, model: &str) -> Self {
        Self {
            http_client: http_client(DEFAULT_TIMEOUT),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            prompts: Arc::new(RwLock::new(PromptLibrary::new())),
        }
    }

    /// Same server, different model
    pub fn with_model(&self, model: &str) -> Self {
        Self {
            model: model.to_string(),
            ..self.clone()
        }
    }

    pub fn with_timeout(&self, timeout: Duration) -> Self {
        Self {
            http_client: http_client(timeout),
            ..self.clone()
        }
    }

    /// Use a specific prompt library (tests use `embedded_only`)
    pub fn with_prompts(mut self, prompts: PromptLibrary) -> Self {
        self.prompts = Arc::new(RwLock::new(prompts));
        self
    }

    /// Create from environment variables
    pub fn from_env() -> Option<Self> {
        let host = std::env::var("OLLAMA_HOST").ok()?;
        let model = std::env::var("OLLAMA_MODEL").unwrap_or_else(|_| "llama3.2".to_string());
        Some(Self::new(&host, &model))
    }
}

/// Request to Ollama API
#[derive(Debug, Serialize)]
struct OllamaRequest {
    model: String,
    prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
}

/// Response from Ollama API
#[derive(Debug, Deserialize)]
struct OllamaResponse {
    response: String,
}

#[async_trait]
impl AIBackend for OllamaBackend {
    async fn generate(
        &self,
        system: Option<&str>,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<String> {
        let request = OllamaRequest {
            model: self.model.clone(),
            prompt: prompt.to_string(),
            system: system.map(str::to_string),
            stream: false,
            options: OllamaOptions {
                temperature: options.temperature,
                num_predict: options.max_tokens,
            },
        };

        let response = self
            .http_client
            .post(format!("{}/api/generate", self.base_url))
            .json(&request)
            .send()
            .await?
            .error_for_status()?;

        let ollama_response: OllamaResponse = response.json().await?;
        debug!("Ollama response: {}", ollama_response.response);

        Ok(ollama_response.response)
    }

    async fn write_notification(
        &self,
        vars: &HashMap<&str, &str>,
        options: &GenerationOptions,
    ) -> Result<GeneratedContent> {
        let (system, user) = render_notification_prompt(&self.prompts, vars)?;
        let raw = self.generate(system.as_deref(), &user, options).await?;
        parse_notification_content(&raw)
    }

    async fn health_check(&self) -> bool {
        match self
            .http_client
            .get(format!("{}/api/tags", self.base_url))
            .send()
            .await
        {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn host(&self) -> &str {
        &self.base_url
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MockOllamaServer;

    #[tokio::test]
    async fn test_generate_against_mock_server() {
        let server = MockOllamaServer::start().await;
        let backend = OllamaBackend::new(&server.url(), "llama3.2")
            .with_prompts(PromptLibrary::embedded_only());

        assert!(backend.health_check().await);

        let raw = backend
            .generate(None, "hello", &GenerationOptions::default())
            .await
            .unwrap();
        assert!(!raw.is_empty());
    }

    #[tokio::test]
    async fn test_write_notification_parses_title_and_body() {
        let server = MockOllamaServer::start().await;
        let backend = OllamaBackend::new(&server.url(), "llama3.2")
            .with_prompts(PromptLibrary::embedded_only());

        let mut vars = HashMap::new();
        vars.insert("category", "budget_alert");
        vars.insert("details", "- Budget threshold reached: 90%");
        vars.insert("currency", "₹");

        let content = backend
            .write_notification(&vars, &GenerationOptions::default())
            .await
            .unwrap();
        assert_eq!(content.title, "📊 Budget check-in");
        assert!(content.body.contains("budget_alert"));
    }

    #[tokio::test]
    async fn test_unreachable_server() {
        let backend = OllamaBackend::new("http://127.0.0.1:1", "llama3.2")
            .with_timeout(Duration::from_secs(2));
        assert!(!backend.health_check().await);
        assert!(backend
            .generate(None, "hello", &GenerationOptions::default())
            .await
            .is_err());
    }
}
