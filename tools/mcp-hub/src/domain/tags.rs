//! Tag fields arrive either as a JSON array string or as a comma-separated
//! list. Both are parsed here, in that order.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedTags {
    JsonArray(Vec<String>),
    CommaList(Vec<String>),
    Empty,
}

impl ParsedTags {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            ParsedTags::JsonArray(tags) | ParsedTags::CommaList(tags) => tags,
            ParsedTags::Empty => Vec::new(),
        }
    }
}

pub fn parse_tags(input: &str) -> ParsedTags {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return ParsedTags::Empty;
    }
    if trimmed.starts_with('[') {
        if let Ok(items) = serde_json::from_str::<Vec<serde_json::Value>>(trimmed) {
            let tags = clean(items.iter().map(|item| match item {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            }));
            return if tags.is_empty() {
                ParsedTags::Empty
            } else {
                ParsedTags::JsonArray(tags)
            };
        }
    }
    let tags = clean(trimmed.split(',').map(str::to_string));
    if tags.is_empty() {
        ParsedTags::Empty
    } else {
        ParsedTags::CommaList(tags)
    }
}

/// Inverse of [`parse_tags`] for trimmed, non-empty tags.
pub fn format_tags(tags: &[String]) -> String {
    let needs_json = tags
        .iter()
        .any(|tag| tag.contains(',') || tag.starts_with('['));
    if needs_json {
        serde_json::to_string(tags).unwrap_or_default()
    } else {
        tags.join(", ")
    }
}

fn clean(items: impl Iterator<Item = String>) -> Vec<String> {
    items
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}
