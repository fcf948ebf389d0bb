//! Pluggable LLM backend abstraction
//!
//! Notification copy can be written by a locally hosted model. Every backend
//! is optional: the engine falls back to templates when none is configured or
//! a call fails.
//!
//! # Architecture
//!
//! - `AIBackend` trait: the operations the engine needs
//! - `AIClient` enum: concrete wrapper providing Clone + compile-time dispatch
//! - Backend implementations: `OllamaBackend`, `OpenAICompatibleBackend`, `MockBackend`
//!
//! # Configuration
//!
//! Environment variables:
//! - `AI_BACKEND`: ollama (default), openai_compatible, mock, or none
//! - `OLLAMA_HOST`: Ollama server URL (required for ollama backend)
//! - `OLLAMA_MODEL`: Default model name (default: llama3.2)
//! - `OPENAI_COMPATIBLE_HOST`: Server URL (required for openai_compatible backend)
//! - `OPENAI_COMPATIBLE_MODEL`: Model name (default: gpt-3.5-turbo)
//! - `OPENAI_COMPATIBLE_API_KEY`: API key if required (optional)

mod mock;
mod ollama;
mod openai_compatible;
pub mod parsing;
pub mod types;

pub use mock::MockBackend;
pub use ollama::OllamaBackend;
pub use openai_compatible::OpenAICompatibleBackend;
pub use types::*;

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::prompts::{PromptId, PromptLibrary};

/// Default request timeout for model calls
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Trait defining the interface for all AI backends
#[async_trait]
pub trait AIBackend: Send + Sync {
    /// Raw completion for a system + user prompt pair
    async fn generate(
        &self,
        system: Option<&str>,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<String>;

    /// Write a notification title and body from prompt variables
    async fn write_notification(
        &self,
        vars: &HashMap<&str, &str>,
        options: &GenerationOptions,
    ) -> Result<GeneratedContent>;

    /// Check if the backend is reachable
    async fn health_check(&self) -> bool;

    fn model(&self) -> &str;

    fn host(&self) -> &str;
}

/// Build an HTTP client with the given request timeout
pub(crate) fn http_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_default()
}

/// Render the notification prompt into (system, user) text
pub(crate) fn render_notification_prompt(
    prompts: &RwLock<PromptLibrary>,
    vars: &HashMap<&str, &str>,
) -> Result<(Option<String>, String)> {
    let mut prompts = prompts
        .write()
        .map_err(|_| Error::Prompt("Failed to acquire prompt library lock".into()))?;
    let template = prompts.get(PromptId::NotificationContent)?;
    Ok((template.render_system(vars), template.render_user(vars)))
}

/// Concrete AI client enum
///
/// Provides Clone and compile-time dispatch without Box<dyn> overhead.
#[derive(Clone)]
pub enum AIClient {
    /// Ollama backend (HTTP API)
    Ollama(OllamaBackend),
    /// OpenAI-compatible backend (vLLM, LocalAI, llama-server, etc.)
    OpenAICompatible(OpenAICompatibleBackend),
    /// Mock backend for testing
    Mock(MockBackend),
}

impl AIClient {
    /// Create an AI client from environment variables
    ///
    /// Returns None when `AI_BACKEND=none` or the selected backend's host
    /// variable is not set.
    pub fn from_env() -> Option<Self> {
        let backend = std::env::var("AI_BACKEND").unwrap_or_else(|_| "ollama".to_string());

        match backend.to_lowercase().as_str() {
            "ollama" => OllamaBackend::from_env().map(AIClient::Ollama),
            "openai_compatible" | "openai" | "vllm" | "localai" | "llamacpp" => {
                OpenAICompatibleBackend::from_env().map(AIClient::OpenAICompatible)
            }
            "mock" => Some(AIClient::Mock(MockBackend::new())),
            "none" | "off" | "disabled" => None,
            _ => {
                tracing::warn!(backend = %backend, "Unknown AI_BACKEND, falling back to ollama");
                OllamaBackend::from_env().map(AIClient::Ollama)
            }
        }
    }

    /// Create an Ollama backend directly
    pub fn ollama(host: &str, model: &str) -> Self {
        AIClient::Ollama(OllamaBackend::new(host, model))
    }

    /// Create a mock backend for testing
    pub fn mock() -> Self {
        AIClient::Mock(MockBackend::new())
    }

    /// Short backend name for status output
    pub fn backend_name(&self) -> &'static str {
        match self {
            AIClient::Ollama(_) => "ollama",
            AIClient::OpenAICompatible(_) => "openai_compatible",
            AIClient::Mock(_) => "mock",
        }
    }

    /// Same backend with a different request timeout
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        match self {
            AIClient::Ollama(b) => AIClient::Ollama(b.with_timeout(timeout)),
            AIClient::OpenAICompatible(b) => AIClient::OpenAICompatible(b.with_timeout(timeout)),
            AIClient::Mock(b) => AIClient::Mock(b.clone()),
        }
    }

    /// Same backend with a different model
    pub fn with_model(&self, model: &str) -> Self {
        match self {
            AIClient::Ollama(b) => AIClient::Ollama(b.with_model(model)),
            AIClient::OpenAICompatible(b) => AIClient::OpenAICompatible(b.with_model(model)),
            AIClient::Mock(b) => AIClient::Mock(b.with_model(model)),
        }
    }

    /// Probe the backend and summarize it
    pub async fn status(&self) -> AIStatus {
        AIStatus {
            backend: self.backend_name().to_string(),
            host: self.host().to_string(),
            model: self.model().to_string(),
            healthy: self.health_check().await,
        }
    }
}

// Implement AIBackend for AIClient by delegating to the inner backend
#[async_trait]
impl AIBackend for AIClient {
    async fn generate(
        &self,
        system: Option<&str>,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<String> {
        match self {
            AIClient::Ollama(b) => b.generate(system, prompt, options).await,
            AIClient::OpenAICompatible(b) => b.generate(system, prompt, options).await,
            AIClient::Mock(b) => b.generate(system, prompt, options).await,
        }
    }

    async fn write_notification(
        &self,
        vars: &HashMap<&str, &str>,
        options: &GenerationOptions,
    ) -> Result<GeneratedContent> {
        match self {
            AIClient::Ollama(b) => b.write_notification(vars, options).await,
            AIClient::OpenAICompatible(b) => b.write_notification(vars, options).await,
            AIClient::Mock(b) => b.write_notification(vars, options).await,
        }
    }

    async fn health_check(&self) -> bool {
        match self {
            AIClient::Ollama(b) => b.health_check().await,
            AIClient::OpenAICompatible(b) => b.health_check().await,
            AIClient::Mock(b) => b.health_check().await,
        }
    }

    fn model(&self) -> &str {
        match self {
            AIClient::Ollama(b) => b.model(),
            AIClient::OpenAICompatible(b) => b.model(),
            AIClient::Mock(b) => b.model(),
        }
    }

    fn host(&self) -> &str {
        match self {
            AIClient::Ollama(b) => b.host(),
            AIClient::OpenAICompatible(b) => b.host(),
            AIClient::Mock(b) => b.host(),
        }
    }
}
