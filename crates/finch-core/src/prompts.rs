//! Prompt library for LLM-written notifications
//!
//! Prompts are loaded with a two-layer resolution:
//! 1. Check for an override in the data dir (~/.local/share/finch/prompts/)
//! 2. Fall back to the embedded default (compiled into the binary)
//!
//! Overrides let operators reword notifications without rebuilding.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use serde::Deserialize;

use crate::error::{Error, Result};

/// Embedded default prompts (compiled into binary)
mod defaults {
    pub const NOTIFICATION_CONTENT: &str =
        include_str!("../../../prompts/notification_content.md");
}

/// Known prompt IDs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptId {
    /// Title and body for a notification about to be persisted
    NotificationContent,
}

impl PromptId {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotificationContent => "notification_content",
        }
    }

    pub fn all() -> &'static [PromptId] {
        &[Self::NotificationContent]
    }

    fn default_content(&self) -> &'static str {
        match self {
            Self::NotificationContent => defaults::NOTIFICATION_CONTENT,
        }
    }
}

/// Prompt frontmatter metadata
#[derive(Debug, Clone, Deserialize)]
pub struct PromptMetadata {
    pub id: String,
    /// Bumped whenever the wording changes
    pub version: u32,
    pub task_type: String,
}

/// A loaded prompt with metadata and content
#[derive(Debug, Clone)]
pub struct Prompt {
    pub metadata: PromptMetadata,
    /// Body after the frontmatter (system + user sections)
    pub content: String,
    pub is_override: bool,
    pub override_path: Option<PathBuf>,
}

impl Prompt {
    pub fn system_section(&self) -> Option<&str> {
        extract_section(&self.content, "# System")
    }

    pub fn user_section(&self) -> Option<&str> {
        extract_section(&self.content, "# User")
    }

    /// Render the whole body with `{{var}}` and `{{#if var}}` handled
    pub fn render(&self, vars: &HashMap<&str, &str>) -> String {
        render_template(&self.content, vars)
    }

    /// Render the system section, if the prompt has one
    pub fn render_system(&self, vars: &HashMap<&str, &str>) -> Option<String> {
        self.system_section().map(|s| render_template(s, vars))
    }

    /// Render the user section, falling back to the whole body
    pub fn render_user(&self, vars: &HashMap<&str, &str>) -> String {
        match self.user_section() {
            Some(user) => render_template(user, vars),
            None => self.render(vars),
        }
    }
}

/// Prompt library with a lazily filled cache
pub struct PromptLibrary {
    override_dir: Option<PathBuf>,
    cache: HashMap<PromptId, Prompt>,
}

impl PromptLibrary {
    pub fn new() -> Self {
        Self {
            override_dir: default_prompts_dir(),
            cache: HashMap::new(),
        }
    }

    pub fn with_override_dir(path: PathBuf) -> Self {
        Self {
            override_dir: Some(path),
            cache: HashMap::new(),
        }
    }

    /// No override directory (tests, reproducible output)
    pub fn embedded_only() -> Self {
        Self {
            override_dir: None,
            cache: HashMap::new(),
        }
    }

    /// Get a prompt by ID, loading from override or default
    pub fn get(&mut self, id: PromptId) -> Result<&Prompt> {
        if !self.cache.contains_key(&id) {
            let prompt = self.load(id)?;
            self.cache.insert(id, prompt);
        }
        self.cache
            .get(&id)
            .ok_or_else(|| Error::Prompt(format!("Prompt {} not loaded", id.as_str())))
    }

    fn load(&self, id: PromptId) -> Result<Prompt> {
        if let Some(ref override_dir) = self.override_dir {
            let override_path = override_dir.join(format!("{}.md", id.as_str()));
            if override_path.exists() {
                let content = fs::read_to_string(&override_path).map_err(|e| {
                    Error::Prompt(format!("Failed to read prompt override: {}", e))
                })?;
                let (metadata, body) = parse_prompt(&content)?;
                return Ok(Prompt {
                    metadata,
                    content: body,
                    is_override: true,
                    override_path: Some(override_path),
                });
            }
        }

        let (metadata, body) = parse_prompt(id.default_content())?;
        Ok(Prompt {
            metadata,
            content: body,
            is_override: false,
            override_path: None,
        })
    }

    pub fn has_override(&self, id: PromptId) -> bool {
        self.override_dir
            .as_ref()
            .map(|dir| dir.join(format!("{}.md", id.as_str())).exists())
            .unwrap_or(false)
    }

    pub fn override_dir(&self) -> Option<&PathBuf> {
        self.override_dir.as_ref()
    }
}

impl Default for PromptLibrary {
    fn default() -> Self {
        Self::new()
    }
}

/// Default prompts override directory
pub fn default_prompts_dir() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("finch").join("prompts"))
}

/// Split a prompt file into frontmatter metadata and body
fn parse_prompt(content: &str) -> Result<(PromptMetadata, String)> {
    let content = content.trim();

    let rest = content
        .strip_prefix("---")
        .ok_or_else(|| Error::Prompt("Prompt must start with YAML frontmatter (---)".into()))?;

    let end = rest.find("---").ok_or_else(|| {
        Error::Prompt("Prompt frontmatter not closed (missing second ---)".into())
    })?;

    let frontmatter = rest[..end].trim();
    let body = rest[end + 3..].trim();

    let metadata: PromptMetadata = serde_yaml::from_str(frontmatter)
        .map_err(|e| Error::Prompt(format!("Invalid prompt frontmatter: {}", e)))?;

    Ok((metadata, body.to_string()))
}

/// Text between `header` and the next top-level header
fn extract_section<'a>(content: &'a str, header: &str) -> Option<&'a str> {
    let start = content.find(header)?;
    let after_header = &content[start + header.len()..];
    let end = after_header.find("\n# ").unwrap_or(after_header.len());
    Some(after_header[..end].trim())
}

fn render_template(template: &str, vars: &HashMap<&str, &str>) -> String {
    let resolved = resolve_conditionals(template, vars);
    let mut result = resolved;
    for (key, value) in vars {
        result = result.replace(&format!("{{{{{}}}}}", key), value);
    }
    collapse_blank_lines(&result)
}

/// Keep `{{#if var}}...{{/if}}` blocks whose variable is set and non-empty
fn resolve_conditionals(content: &str, vars: &HashMap<&str, &str>) -> String {
    let mut result = content.to_string();

    while let Some(if_start) = result.find("{{#if ") {
        let var_start = if_start + 6;
        let Some(var_len) = result[var_start..].find("}}") else {
            break;
        };
        let var_name = result[var_start..var_start + var_len].trim().to_string();
        let block_start = var_start + var_len + 2;
        let Some(endif) = result[block_start..].find("{{/if}}") else {
            break;
        };
        let block = result[block_start..block_start + endif].to_string();
        let full_end = block_start + endif + 7;

        let keep = vars.get(var_name.as_str()).is_some_and(|v| !v.is_empty());
        result = if keep {
            format!("{}{}{}", &result[..if_start], block, &result[full_end..])
        } else {
            format!("{}{}", &result[..if_start], &result[full_end..])
        };
    }

    result
}

/// Conditionals leave empty lines behind; squash runs of them
fn collapse_blank_lines(text: &str) -> String {
    let mut out = Vec::new();
    let mut blank_run = 0;
    for line in text.lines() {
        if line.trim().is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        out.push(line);
    }
    out.join("\n").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_prompt() {
        let content = r#"---
id: test_prompt
version: 2
task_type: narrative
---

# System
Test system prompt.

# User
Test user prompt with {{variable}}.
"#;

        let (metadata, body) = parse_prompt(content).unwrap();
        assert_eq!(metadata.id, "test_prompt");
        assert_eq!(metadata.version, 2);
        assert_eq!(metadata.task_type, "narrative");
        assert!(body.contains("# System"));
        assert!(body.contains("# User"));
    }

    #[test]
    fn test_parse_prompt_requires_frontmatter() {
        assert!(parse_prompt("# User\nhello").is_err());
        assert!(parse_prompt("---\nid: x\n# User").is_err());
    }

    #[test]
    fn test_extract_section() {
        let content = "# System\nSystem content here.\n\n# User\nUser content here.";
        assert_eq!(
            extract_section(content, "# System"),
            Some("System content here.")
        );
        assert_eq!(extract_section(content, "# User"), Some("User content here."));
        assert_eq!(extract_section(content, "# Missing"), None);
    }

    #[test]
    fn test_conditional_blocks() {
        let content = "Start{{#if category}}\nCategory: {{category}}{{/if}}\nEnd";

        let mut vars = HashMap::new();
        vars.insert("category", "Groceries");
        let result = render_template(content, &vars);
        assert!(result.contains("Category: Groceries"));

        vars.insert("category", "");
        let result = render_template(content, &vars);
        assert!(!result.contains("Category:"));
        assert!(result.contains("Start"));
        assert!(result.contains("End"));
    }

    #[test]
    fn test_embedded_prompt_renders() {
        let mut lib = PromptLibrary::embedded_only();
        let prompt = lib.get(PromptId::NotificationContent).unwrap();
        assert!(!prompt.is_override);
        assert_eq!(prompt.metadata.id, "notification_content");

        let mut vars = HashMap::new();
        vars.insert("category", "budget_alert");
        vars.insert("details", "- Budget threshold reached: 90%");
        vars.insert("currency", "₹");
        vars.insert("analysis", "");

        let user = prompt.render_user(&vars);
        assert!(user.contains("\"budget_alert\""));
        assert!(user.contains("90%"));
        assert!(!user.contains("Analysis:"));
        assert!(!user.contains("{{"));

        let system = prompt.render_system(&vars).unwrap();
        assert!(system.contains("₹"));
    }

    #[test]
    fn test_override_dir_takes_precedence() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("notification_content.md"),
            "---\nid: notification_content\nversion: 9\ntask_type: narrative\n---\n# User\nCustom {{category}}",
        )
        .unwrap();

        let mut lib = PromptLibrary::with_override_dir(dir.path().to_path_buf());
        assert!(lib.has_override(PromptId::NotificationContent));
        let prompt = lib.get(PromptId::NotificationContent).unwrap();
        assert!(prompt.is_override);
        assert_eq!(prompt.metadata.version, 9);

        let mut vars = HashMap::new();
        vars.insert("category", "goal_progress");
        assert_eq!(prompt.render_user(&vars), "Custom goal_progress");
    }

    #[test]
    fn test_default_prompts_parse() {
        for id in PromptId::all() {
            let (metadata, _) = parse_prompt(id.default_content()).unwrap();
            assert_eq!(metadata.id, id.as_str());
        }
    }
}
