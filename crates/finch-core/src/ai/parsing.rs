//! Parsing helpers for LLM responses
//!
//! Models wrap their answer in reasoning blocks, markdown, and labels.
//! These helpers reduce a response to a notification title and body.

use regex::Regex;

use crate::error::{Error, Result};

use super::types::GeneratedContent;

/// Remove `<think>...</think>` reasoning blocks
pub fn strip_think_blocks(response: &str) -> Result<String> {
    let think = Regex::new(r"(?s)<think>.*?</think>")?;
    Ok(think.replace_all(response, "").into_owned())
}

/// Strip markdown emphasis, heading marks, and a leading label
fn clean_line(line: &str, label: &Regex) -> String {
    let line = line.replace("**", "").replace("__", "");
    let line = line.trim().trim_start_matches('#').trim();
    label.replace(line, "").trim().to_string()
}

/// Split a model response into title (first non-empty line) and body
pub fn parse_notification_content(response: &str) -> Result<GeneratedContent> {
    let cleaned = strip_think_blocks(response)?;
    let label = Regex::new(r"(?i)^(title|body)\s*:\s*")?;

    let mut lines = cleaned.lines().map(str::trim).skip_while(|l| l.is_empty());

    let title = match lines.next() {
        Some(first) => clean_line(first, &label),
        None => {
            return Err(Error::InvalidData("Empty response from AI".into()));
        }
    };
    if title.is_empty() {
        return Err(Error::InvalidData("AI response has no title".into()));
    }

    let body = lines
        .map(|l| clean_line(l, &label))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string();

    Ok(GeneratedContent {
        body: if body.is_empty() { title.clone() } else { body },
        title,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_response() {
        let content =
            parse_notification_content("💳 Big purchase\nYou spent ₹5,000 at Croma.\nThat's 3x usual.")
                .unwrap();
        assert_eq!(content.title, "💳 Big purchase");
        assert_eq!(content.body, "You spent ₹5,000 at Croma.\nThat's 3x usual.");
    }

    #[test]
    fn test_parse_strips_markdown_and_labels() {
        let raw = "\n\n**Title: 📊 Budget check**\n\n## Body: You're at 90% of Food.";
        let content = parse_notification_content(raw).unwrap();
        assert_eq!(content.title, "📊 Budget check");
        assert_eq!(content.body, "You're at 90% of Food.");
    }

    #[test]
    fn test_parse_strips_think_blocks() {
        let raw = "<think>\nThe user overspent.\nLet me write.\n</think>\n🎯 Halfway there\nKeep going!";
        let content = parse_notification_content(raw).unwrap();
        assert_eq!(content.title, "🎯 Halfway there");
        assert_eq!(content.body, "Keep going!");
    }

    #[test]
    fn test_title_only_response_reuses_title() {
        let content = parse_notification_content("🔮 Cashflow looks fine").unwrap();
        assert_eq!(content.body, "🔮 Cashflow looks fine");
    }

    #[test]
    fn test_empty_response_is_error() {
        assert!(parse_notification_content("").is_err());
        assert!(parse_notification_content("  \n <think>only thoughts</think> \n").is_err());
        assert!(parse_notification_content("**\nbody").is_err());
    }
}
