//! Text preprocessing for embedding input.
//!
//! Highlights and queries go through the same steps:
//! 1. Trim whitespace
//! 2. Collapse internal line breaks
//! 3. Truncate to max length with ellipsis

/// Maximum embedding input length (characters, not tokens)
const MAX_CONTENT_LENGTH: usize = 1024;

/// Ellipsis suffix when content is truncated
const TRUNCATION_SUFFIX: &str = "...";

pub fn prepare_text(text: &str) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    truncate_content(&collapsed)
}

/// Truncate content to MAX_CONTENT_LENGTH characters, adding ellipsis if truncated.
fn truncate_content(content: &str) -> String {
    if content.chars().count() <= MAX_CONTENT_LENGTH {
        return content.to_string();
    }

    let max_chars = MAX_CONTENT_LENGTH - TRUNCATION_SUFFIX.len();
    let truncated: String = content.chars().take(max_chars).collect();

    format!("{}{}", truncated, TRUNCATION_SUFFIX)
}
