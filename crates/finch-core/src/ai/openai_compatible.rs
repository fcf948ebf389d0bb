//! OpenAI-compatible backend implementation
//!
//! Works with any server that implements the OpenAI chat completions API:
//! - vLLM (http://localhost:8000)
//! - LocalAI (http://localhost:8080)
//! - llama-server / llama.cpp (http://localhost:8080)
//! - text-generation-inference
//!
//! # Configuration
//!
//! Environment variables:
//! - `OPENAI_COMPATIBLE_HOST`: Server URL (required)
//! - `OPENAI_COMPATIBLE_MODEL`: Model name (default: gpt-3.5-turbo)
//! - `OPENAI_COMPATIBLE_API_KEY`: API key if required (optional)

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::prompts::PromptLibrary;

use super::parsing::parse_notification_content;
use super::types::{GeneratedContent, GenerationOptions};
use super::{http_client, render_notification_prompt, AIBackend, DEFAULT_TIMEOUT};

/// OpenAI-compatible backend
#[derive(Clone)]
pub struct OpenAICompatibleBackend {
    http_client: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    prompts: Arc<RwLock<PromptLibrary>>,
}

impl OpenAICompatibleBackend {
    pub fn new(base_url: &str, model: &str) -> Self {
        Self {
            http_client: http_client(DEFAULT_TIMEOUT),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: None,
            prompts: Arc::new(RwLock::new(PromptLibrary::new())),
        }
    }

    /// Create with an API key sent as a bearer token
    pub fn with_api_key(base_url: &str, model: &str, api_key: &str) -> Self {
        Self {
            api_key: Some(api_key.to_string()),
            ..Self::new(base_url, model)
        }
    }

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

    pub fn with_prompts(mut self, prompts: PromptLibrary) -> Self {
        self.prompts = Arc::new(RwLock::new(prompts));
        self
    }

    /// Create from environment variables
    ///
    /// Required: `OPENAI_COMPATIBLE_HOST`
    pub fn from_env() -> Option<Self> {
        let host = std::env::var("OPENAI_COMPATIBLE_HOST").ok()?;
        let model = std::env::var("OPENAI_COMPATIBLE_MODEL")
            .unwrap_or_else(|_| "gpt-3.5-turbo".to_string());

        let mut backend = Self::new(&host, &model);
        backend.api_key = std::env::var("OPENAI_COMPATIBLE_API_KEY").ok();
        Some(backend)
    }
}

/// OpenAI chat completion request
#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[async_trait]
impl AIBackend for OpenAICompatibleBackend {
    async fn generate(
        &self,
        system: Option<&str>,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<String> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = system {
            messages.push(ChatMessage {
                role: "system".to_string(),
                content: system.to_string(),
            });
        }
        messages.push(ChatMessage {
            role: "user".to_string(),
            content: prompt.to_string(),
        });

        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages,
            temperature: options.temperature,
            max_tokens: options.max_tokens,
            stream: false,
        };

        let mut req_builder = self
            .http_client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .json(&request);

        if let Some(ref api_key) = self.api_key {
            req_builder = req_builder.bearer_auth(api_key);
        }

        let response = req_builder.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::InvalidData(format!(
                "OpenAI API error {}: {}",
                status, body
            )));
        }

        let chat_response: ChatCompletionResponse = response.json().await?;

        let content = chat_response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| Error::InvalidData("No response from OpenAI API".into()))?;
        debug!("OpenAI-compatible response: {}", content);

        Ok(content)
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
        // Servers differ in which endpoint answers; any success counts
        for path in ["/v1/models", "/health", ""] {
            if let Ok(resp) = self
                .http_client
                .get(format!("{}{}", self.base_url, path))
                .send()
                .await
            {
                if resp.status().is_success() {
                    return true;
                }
            }
        }
        false
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

    #[test]
    fn test_constructors() {
        let backend = OpenAICompatibleBackend::with_api_key("http://localhost:8000/", "m", "k");
        assert_eq!(backend.host(), "http://localhost:8000");
        assert_eq!(backend.api_key.as_deref(), Some("k"));
        assert_eq!(backend.with_model("other").model(), "other");
    }

    #[tokio::test]
    async fn test_chat_completion_against_mock_server() {
        let server = MockOllamaServer::start().await;
        let backend = OpenAICompatibleBackend::new(&server.url(), "local")
            .with_prompts(PromptLibrary::embedded_only());

        assert!(backend.health_check().await);

        let mut vars = HashMap::new();
        vars.insert("category", "bill_reminder");
        vars.insert("details", "- Bill: Power");
        vars.insert("currency", "₹");

        let content = backend
            .write_notification(&vars, &GenerationOptions::default())
            .await
            .unwrap();
        assert_eq!(content.title, "📊 Budget check-in");
        assert!(content.body.contains("bill_reminder"));
    }
}
