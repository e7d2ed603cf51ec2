//! Structured message envelopes
//!
//! Bot replies are sometimes plain text and sometimes a JSON envelope:
//!
//! ```json
//! {"text": "Pick one", "type": "category_suggestions",
//!  "categories": [{"id": "1", "title": "Admissions", "description": "..."}]}
//! ```
//!
//! Parsing never fails: anything that is not a well-formed envelope is
//! displayed verbatim.

use crate::types::CategorySuggestion;
use serde_json::Value;

/// Envelope `type` that carries category suggestions
pub const CATEGORY_SUGGESTIONS: &str = "category_suggestions";

/// Descriptions must be strictly longer than this to be shown
pub const MIN_DESCRIPTION_LEN: usize = 10;

/// Placeholder title the backend emits for unfinished categories
const PLACEHOLDER_TITLE: &str = "HI HI";

/// Resolved content of a message payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageContent {
    /// Raw text, shown as-is
    Plain(String),
    /// Envelope with an inner display string
    Structured {
        text: String,
        kind: Option<String>,
        categories: Vec<CategorySuggestion>,
    },
}

impl MessageContent {
    /// Text to display for this message
    pub fn display_text(&self) -> &str {
        match self {
            MessageContent::Plain(text) => text,
            MessageContent::Structured { text, .. } => text,
        }
    }

    /// Unfiltered suggestions carried by the envelope
    pub fn categories(&self) -> &[CategorySuggestion] {
        match self {
            MessageContent::Plain(_) => &[],
            MessageContent::Structured { categories, .. } => categories,
        }
    }
}

/// Resolve a raw payload into display content
pub fn parse(raw: &str) -> MessageContent {
    let value = match serde_json::from_str::<Value>(raw) {
        Ok(value) => value,
        Err(_) => return MessageContent::Plain(raw.to_string()),
    };

    let text = match value.get("text").and_then(Value::as_str) {
        Some(text) if !text.is_empty() => text.to_string(),
        _ => return MessageContent::Plain(raw.to_string()),
    };

    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .map(str::to_string);

    let categories = if kind.as_deref() == Some(CATEGORY_SUGGESTIONS) {
        value
            .get("categories")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(suggestion_from_value).collect())
            .unwrap_or_default()
    } else {
        Vec::new()
    };

    MessageContent::Structured {
        text,
        kind,
        categories,
    }
}

/// Whether a suggestion is fit to be shown as a button
pub fn is_displayable(suggestion: &CategorySuggestion) -> bool {
    let title = suggestion.title.as_str();
    !title.is_empty()
        && title != PLACEHOLDER_TITLE
        && !is_all_caps_placeholder(title)
        && suggestion.description.chars().count() > MIN_DESCRIPTION_LEN
}

/// Keep only the suggestions that pass `is_displayable`, in order
pub fn visible_suggestions(categories: &[CategorySuggestion]) -> Vec<CategorySuggestion> {
    categories
        .iter()
        .filter(|c| is_displayable(c))
        .cloned()
        .collect()
}

// Matches /^[A-Z\s]+$/
fn is_all_caps_placeholder(title: &str) -> bool {
    title
        .chars()
        .all(|c| c.is_ascii_uppercase() || c.is_whitespace())
}

fn suggestion_from_value(value: &Value) -> Option<CategorySuggestion> {
    let obj = value.as_object()?;
    let id = match obj.get("id")? {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    let field = |name: &str| {
        obj.get(name)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };
    Some(CategorySuggestion {
        id,
        title: field("title"),
        description: field("description"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn suggestion(title: &str, description: &str) -> CategorySuggestion {
        CategorySuggestion {
            id: "1".to_string(),
            title: title.to_string(),
            description: description.to_string(),
        }
    }

    #[test]
    fn test_plain_text_passthrough() {
        let content = parse("Hi there");
        assert_eq!(content, MessageContent::Plain("Hi there".to_string()));
        assert_eq!(content.display_text(), "Hi there");
        assert!(content.categories().is_empty());
    }

    #[test]
    fn test_malformed_json_falls_back() {
        let raw = r#"{"text": "unterminated"#;
        assert_eq!(parse(raw).display_text(), raw);
    }

    #[test]
    fn test_json_without_text_falls_back() {
        let raw = r#"{"answer": 42}"#;
        assert_eq!(parse(raw), MessageContent::Plain(raw.to_string()));

        let raw = r#"{"text": 42}"#;
        assert_eq!(parse(raw), MessageContent::Plain(raw.to_string()));

        let raw = r#"["text"]"#;
        assert_eq!(parse(raw), MessageContent::Plain(raw.to_string()));
    }

    #[test]
    fn test_category_envelope() {
        let raw = r#"{"text":"Pick one","type":"category_suggestions","categories":[{"id":"1","title":"Admissions","description":"Help with admissions process"}]}"#;
        let content = parse(raw);
        assert_eq!(content.display_text(), "Pick one");
        assert_eq!(content.categories().len(), 1);
        assert_eq!(content.categories()[0].title, "Admissions");

        let visible = visible_suggestions(content.categories());
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].id, "1");
    }

    #[test]
    fn test_categories_ignored_for_other_types() {
        let raw = r#"{"text":"Info","type":"answer","categories":[{"id":"1","title":"Admissions","description":"Help with admissions process"}]}"#;
        let content = parse(raw);
        assert_eq!(content.display_text(), "Info");
        assert!(content.categories().is_empty());
    }

    #[test]
    fn test_numeric_ids_and_broken_entries() {
        let raw = r#"{"text":"Pick","type":"category_suggestions","categories":[{"id":7,"title":"Housing","description":"Dormitories and rooms"},"junk",{"title":"No id"}]}"#;
        let content = parse(raw);
        assert_eq!(content.categories().len(), 1);
        assert_eq!(content.categories()[0].id, "7");
    }

    #[test]
    fn test_filter_rules() {
        assert!(!is_displayable(&suggestion("HI HI", "Long enough description")));
        assert!(!is_displayable(&suggestion("", "Long enough description")));
        assert!(!is_displayable(&suggestion("ADMISSIONS", "Long enough description")));
        assert!(!is_displayable(&suggestion("Admissions", "0123456789")));
        assert!(is_displayable(&suggestion("Admissions", "01234567890")));
        assert!(is_displayable(&suggestion("IT Support", "Accounts and passwords")));
    }

    #[test]
    fn test_description_length_counts_chars() {
        // 10 multi-byte characters is still too short
        assert!(!is_displayable(&suggestion("Legitymacja", "źźźźźźźźźź")));
        assert!(is_displayable(&suggestion("Legitymacja", "źźźźźźźźźźź")));
    }
}
