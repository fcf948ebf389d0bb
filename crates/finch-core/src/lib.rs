//! Finch Core Library
//!
//! Shared functionality for the Finch notification engine:
//! - Database access and migrations (encrypted SQLite)
//! - Finance records the engine reads context from
//! - Pluggable AI backends (Ollama, OpenAI-compatible) for notification copy
//! - Prompt library for customizable AI prompts
//! - Engine tuning configuration
//! - The notification decision pipeline
//! - Push delivery
//! - CSV import of transaction history

pub mod ai;
pub mod config;
pub mod db;
pub mod delivery;
pub mod error;
pub mod import;
pub mod models;
pub mod notify;
pub mod prompts;

/// Test utilities including mock Ollama server
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use ai::{AIBackend, AIClient, MockBackend, OllamaBackend, OpenAICompatibleBackend};
pub use config::EngineConfig;
pub use db::{AuditEntry, Database};
pub use delivery::{DeliveryReport, PushDispatcher, PushTransport};
pub use error::{Error, Result};
pub use import::{import_history, parse_history, ImportStats};
pub use notify::{FilterReason, NotificationEngine, Outcome, Trigger, TriggerKind};
pub use prompts::{Prompt, PromptId, PromptLibrary};
