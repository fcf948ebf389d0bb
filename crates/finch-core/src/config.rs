//! Engine tuning loaded from TOML
//!
//! Config is loaded with a two-layer resolution:
//! 1. Check for an override in the data dir (~/.local/share/finch/config/engine.toml)
//! 2. Fall back to the embedded default (compiled into the binary)
//!
//! Keys missing from an override keep their default values.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::error::{Error, Result};

/// Embedded default config (compiled into binary)
const DEFAULT_CONFIG: &str = include_str!("../../../config/engine.toml");

/// Score floor below which a trigger is dropped
#[derive(Debug, Clone, PartialEq)]
pub struct ScoringConfig {
    pub min_importance: f64,
    pub min_relevance: f64,
}

/// Priority bands on the averaged score
#[derive(Debug, Clone, PartialEq)]
pub struct PriorityBands {
    pub high: f64,
    pub medium: f64,
    pub low: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContextConfig {
    pub history_limit: i64,
    pub pattern_window_days: i64,
    pub similar_limit: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PersonalizationConfig {
    pub interaction_window: i64,
    pub optimal_time_horizon_hours: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContentConfig {
    pub currency: String,
    pub use_llm: bool,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

/// Complete engine configuration
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub scoring: ScoringConfig,
    pub priority: PriorityBands,
    pub context: ContextConfig,
    pub personalization: PersonalizationConfig,
    pub content: ContentConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            scoring: ScoringConfig {
                min_importance: 30.0,
                min_relevance: 40.0,
            },
            priority: PriorityBands {
                high: 85.0,
                medium: 65.0,
                low: 40.0,
            },
            context: ContextConfig {
                history_limit: 50,
                pattern_window_days: 90,
                similar_limit: 10,
            },
            personalization: PersonalizationConfig {
                interaction_window: 20,
                optimal_time_horizon_hours: 8,
            },
            content: ContentConfig {
                currency: "₹".to_string(),
                use_llm: true,
                temperature: 0.7,
                max_tokens: 300,
                timeout_secs: 60,
            },
        }
    }
}

impl EngineConfig {
    /// Load from the default override path, else the embedded config
    pub fn load() -> Result<Self> {
        load_config(None)
    }

    /// Load from an explicit file (missing file means embedded defaults)
    pub fn load_from(path: &Path) -> Result<Self> {
        load_config(Some(path))
    }
}

/// Default config override path
pub fn default_config_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("finch").join("config").join("engine.toml"))
}

fn load_config(override_path: Option<&Path>) -> Result<EngineConfig> {
    let path = match override_path {
        Some(p) => Some(p.to_path_buf()),
        None => default_config_path(),
    };

    let content = match path {
        Some(ref p) if p.exists() => {
            debug!(path = %p.display(), "Loading engine config override");
            fs::read_to_string(p)
                .map_err(|e| Error::Config(format!("Failed to read config: {}", e)))?
        }
        _ => DEFAULT_CONFIG.to_string(),
    };

    parse_config(&content)
}

/// Raw config structure for TOML parsing
#[derive(Debug, Deserialize)]
struct RawConfig {
    scoring: Option<RawScoring>,
    priority: Option<RawPriority>,
    context: Option<RawContext>,
    personalization: Option<RawPersonalization>,
    content: Option<RawContent>,
}

#[derive(Debug, Deserialize)]
struct RawScoring {
    min_importance: Option<f64>,
    min_relevance: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RawPriority {
    high: Option<f64>,
    medium: Option<f64>,
    low: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RawContext {
    history_limit: Option<i64>,
    pattern_window_days: Option<i64>,
    similar_limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct RawPersonalization {
    interaction_window: Option<i64>,
    optimal_time_horizon_hours: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct RawContent {
    currency: Option<String>,
    use_llm: Option<bool>,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    timeout_secs: Option<u64>,
}

fn parse_config(content: &str) -> Result<EngineConfig> {
    let raw: RawConfig = toml::from_str(content)
        .map_err(|e| Error::Config(format!("Invalid config TOML: {}", e)))?;

    let mut config = EngineConfig::default();

    if let Some(s) = raw.scoring {
        if let Some(v) = s.min_importance {
            config.scoring.min_importance = v;
        }
        if let Some(v) = s.min_relevance {
            config.scoring.min_relevance = v;
        }
    }

    if let Some(p) = raw.priority {
        if let Some(v) = p.high {
            config.priority.high = v;
        }
        if let Some(v) = p.medium {
            config.priority.medium = v;
        }
        if let Some(v) = p.low {
            config.priority.low = v;
        }
    }

    if let Some(c) = raw.context {
        if let Some(v) = c.history_limit {
            config.context.history_limit = v;
        }
        if let Some(v) = c.pattern_window_days {
            config.context.pattern_window_days = v;
        }
        if let Some(v) = c.similar_limit {
            config.context.similar_limit = v;
        }
    }

    if let Some(p) = raw.personalization {
        if let Some(v) = p.interaction_window {
            config.personalization.interaction_window = v;
        }
        if let Some(v) = p.optimal_time_horizon_hours {
            config.personalization.optimal_time_horizon_hours = v;
        }
    }

    if let Some(c) = raw.content {
        if let Some(v) = c.currency {
            config.content.currency = v;
        }
        if let Some(v) = c.use_llm {
            config.content.use_llm = v;
        }
        if let Some(v) = c.temperature {
            config.content.temperature = v;
        }
        if let Some(v) = c.max_tokens {
            config.content.max_tokens = v;
        }
        if let Some(v) = c.timeout_secs {
            config.content.timeout_secs = v;
        }
    }

    let bands = &config.priority;
    if !(bands.high >= bands.medium && bands.medium >= bands.low) {
        return Err(Error::Config(
            "Priority bands must satisfy high >= medium >= low".into(),
        ));
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_config_matches_defaults() {
        let config = parse_config(DEFAULT_CONFIG).unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_partial_override_keeps_defaults() {
        let config = parse_config(
            r#"
            [scoring]
            min_importance = 10.0

            [content]
            use_llm = false
            "#,
        )
        .unwrap();
        assert_eq!(config.scoring.min_importance, 10.0);
        assert_eq!(config.scoring.min_relevance, 40.0);
        assert!(!config.content.use_llm);
        assert_eq!(config.content.currency, "₹");
        assert_eq!(config.priority.high, 85.0);
    }

    #[test]
    fn test_empty_config_is_default() {
        assert_eq!(parse_config("").unwrap(), EngineConfig::default());
    }

    #[test]
    fn test_invalid_config() {
        assert!(parse_config("[scoring\nmin_importance = ").is_err());
        assert!(parse_config("[priority]\nhigh = 10.0").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.toml");

        // Missing file falls back to the embedded config
        assert_eq!(EngineConfig::load_from(&path).unwrap(), EngineConfig::default());

        std::fs::write(&path, "[context]\nhistory_limit = 5\n").unwrap();
        let config = EngineConfig::load_from(&path).unwrap();
        assert_eq!(config.context.history_limit, 5);
    }
}
