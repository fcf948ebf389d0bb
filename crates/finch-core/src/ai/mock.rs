//! Mock backend for testing
//!
//! Returns predictable text without a running model server.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::{Error, Result};

use super::types::{GeneratedContent, GenerationOptions};
use super::AIBackend;

/// Mock AI backend
///
/// An unhealthy mock fails every generation call, which exercises the
/// template fallback.
#[derive(Clone, Default)]
pub struct MockBackend {
    /// Whether health_check should return true
    pub healthy: bool,
}

impl MockBackend {
    /// Create a new mock backend (healthy by default)
    pub fn new() -> Self {
        Self { healthy: true }
    }

    /// Create an unhealthy mock backend
    pub fn unhealthy() -> Self {
        Self { healthy: false }
    }

    /// No-op for mock
    pub fn with_model(&self, _model: &str) -> Self {
        self.clone()
    }

    fn ensure_healthy(&self) -> Result<()> {
        if self.healthy {
            Ok(())
        } else {
            Err(Error::InvalidData("Mock backend is unavailable".into()))
        }
    }
}

#[async_trait]
impl AIBackend for MockBackend {
    async fn generate(
        &self,
        _system: Option<&str>,
        prompt: &str,
        _options: &GenerationOptions,
    ) -> Result<String> {
        self.ensure_healthy()?;
        let first = prompt.lines().next().unwrap_or_default();
        Ok(format!("🤖 Mock notification\n{}", first))
    }

    async fn write_notification(
        &self,
        vars: &HashMap<&str, &str>,
        _options: &GenerationOptions,
    ) -> Result<GeneratedContent> {
        self.ensure_healthy()?;
        let category = vars.get("category").copied().unwrap_or("update");
        let details = vars
            .get("details")
            .map(|d| d.trim_start_matches("- ").to_string())
            .unwrap_or_else(|| "Nothing to report".to_string());

        Ok(GeneratedContent {
            title: format!("🤖 {}", category.replace('_', " ")),
            body: details,
        })
    }

    async fn health_check(&self) -> bool {
        self.healthy
    }

    fn model(&self) -> &str {
        "mock"
    }

    fn host(&self) -> &str {
        "mock://localhost"
    }
}
