//! Types shared by AI backends

use serde::{Deserialize, Serialize};

/// Sampling settings for one generation call
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationOptions {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 300,
        }
    }
}

/// Notification text written by a model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedContent {
    pub title: String,
    pub body: String,
}

/// Backend status reported by the health endpoint
#[derive(Debug, Clone, Serialize)]
pub struct AIStatus {
    pub backend: String,
    pub host: String,
    pub model: String,
    pub healthy: bool,
}
