//! Recognition rules for the clippings export format.
//!
//! Defaults match the Kindle `My Clippings.txt` layout. Everything here is
//! loaded from `config.yaml`, so exports with other punctuation or localized
//! keywords can be read without code changes.

use serde::{Deserialize, Serialize};

use crate::clippings::HighlightKind;

/// Default record delimiter characters
const DEFAULT_DELIMITER_CHARS: &str = "=";
/// Shortest run of delimiter characters accepted as a separator line
const DEFAULT_DELIMITER_MIN_LEN: usize = 5;
/// Marker preceding the human-readable timestamp in the metadata line
const DEFAULT_TIMESTAMP_MARKER: &str = "Added on";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClippingsFormat {
    /// Characters a separator line may consist of (one character per line, repeated)
    #[serde(default = "default_delimiter_chars")]
    pub delimiter_chars: String,

    /// Minimum number of repeated characters for a separator line
    #[serde(default = "default_delimiter_min_len")]
    pub delimiter_min_len: usize,

    /// Case-insensitive keywords classifying a metadata line as a highlight
    #[serde(default = "default_highlight_keywords")]
    pub highlight_keywords: Vec<String>,

    /// Case-insensitive keywords classifying a metadata line as a note
    #[serde(default = "default_note_keywords")]
    pub note_keywords: Vec<String>,

    /// Case-insensitive keywords classifying a metadata line as a bookmark
    #[serde(default = "default_bookmark_keywords")]
    pub bookmark_keywords: Vec<String>,

    /// Markers after which the timestamp text begins; the first match wins
    #[serde(default = "default_timestamp_markers")]
    pub timestamp_markers: Vec<String>,

    /// chrono format strings tried in order against the timestamp text
    #[serde(default = "default_date_formats")]
    pub date_formats: Vec<String>,
}

impl Default for ClippingsFormat {
    fn default() -> Self {
        Self {
            delimiter_chars: default_delimiter_chars(),
            delimiter_min_len: default_delimiter_min_len(),
            highlight_keywords: default_highlight_keywords(),
            note_keywords: default_note_keywords(),
            bookmark_keywords: default_bookmark_keywords(),
            timestamp_markers: default_timestamp_markers(),
            date_formats: default_date_formats(),
        }
    }
}

fn default_delimiter_chars() -> String {
    DEFAULT_DELIMITER_CHARS.to_string()
}

fn default_delimiter_min_len() -> usize {
    DEFAULT_DELIMITER_MIN_LEN
}

fn default_highlight_keywords() -> Vec<String> {
    vec!["highlight".to_string()]
}

fn default_note_keywords() -> Vec<String> {
    vec!["note".to_string()]
}

fn default_bookmark_keywords() -> Vec<String> {
    vec!["bookmark".to_string()]
}

fn default_timestamp_markers() -> Vec<String> {
    vec![DEFAULT_TIMESTAMP_MARKER.to_string()]
}

fn default_date_formats() -> Vec<String> {
    [
        // Monday, March 6, 2023 10:15:30 PM
        "%A, %B %d, %Y %I:%M:%S %p",
        // Monday, March 6, 2023 22:15:30
        "%A, %B %d, %Y %H:%M:%S",
        // Monday, 6 March 2023 22:15:30
        "%A, %d %B %Y %H:%M:%S",
        // March 6, 2023 10:15:30 PM
        "%B %d, %Y %I:%M:%S %p",
        "%Y-%m-%d %H:%M:%S",
    ]
    .iter()
    .map(|f| f.to_string())
    .collect()
}

impl ClippingsFormat {
    /// Whether `line` is a record separator.
    pub fn is_delimiter(&self, line: &str) -> bool {
        let line = line.trim();
        let mut chars = line.chars();
        let Some(first) = chars.next() else {
            return false;
        };

        self.delimiter_chars.contains(first)
            && chars.all(|c| c == first)
            && line.chars().count() >= self.delimiter_min_len
    }

    /// Classify a metadata line by keyword. Highlight keywords are checked
    /// first, then notes, then bookmarks.
    pub fn classify(&self, metadata: &str) -> Option<HighlightKind> {
        let metadata = metadata.to_lowercase();
        let matches = |keywords: &[String]| {
            keywords
                .iter()
                .any(|k| !k.is_empty() && metadata.contains(&k.to_lowercase()))
        };

        if matches(&self.highlight_keywords) {
            Some(HighlightKind::Highlight)
        } else if matches(&self.note_keywords) {
            Some(HighlightKind::Note)
        } else if matches(&self.bookmark_keywords) {
            Some(HighlightKind::Bookmark)
        } else {
            None
        }
    }
}
