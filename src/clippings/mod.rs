//! Clippings export parsing.
//!
//! Turns the raw e-reader export into a deduplicated, ordered list of
//! [`Highlight`] records.
//!
//! # Architecture
//!
//! - `format`: configurable recognition rules (delimiters, keywords, date formats)
//! - `metadata`: kind / location / timestamp extraction from the metadata line
//! - `parser`: record splitting, title normalization and deduplication

mod format;
mod metadata;
mod parser;

use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

pub use format::ClippingsFormat;
pub use metadata::{parse_metadata, TimestampMarkers};
pub use parser::ClippingsParser;

/// Classification parsed from the metadata line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HighlightKind {
    Highlight,
    Note,
    Bookmark,
}

impl HighlightKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            HighlightKind::Highlight => "highlight",
            HighlightKind::Note => "note",
            HighlightKind::Bookmark => "bookmark",
        }
    }
}

impl std::fmt::Display for HighlightKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single highlighted passage or note.
///
/// Two highlights with the same `(book_title, content)` are the same
/// highlight, whatever their timestamps or the case of the title; see
/// [`Highlight::dedup_key`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Highlight {
    pub book_title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    pub content: String,
    pub timestamp: Option<NaiveDateTime>,
    pub kind: HighlightKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<String>,
}

impl Highlight {
    pub fn dedup_key(&self) -> (String, &str) {
        (self.book_title.to_lowercase(), &self.content)
    }
}

/// Counters collected while parsing. Skipped records never raise errors,
/// they only show up here.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ParseStats {
    /// Non-blank fragments between delimiters
    pub records: usize,
    /// Retained highlights
    pub highlights: usize,
    /// Retained notes
    pub notes: usize,
    /// Bookmarks dropped from the analyzable set
    pub bookmarks: usize,
    /// Highlights or notes dropped because their content was blank
    pub empty: usize,
    /// Later copies of an already seen (book, content) pair
    pub duplicates: usize,
    /// Fragments without a title and metadata line
    pub malformed: usize,
    /// Retained records without a parsable timestamp
    pub undated: usize,
}

impl ParseStats {
    pub fn retained(&self) -> usize {
        self.highlights + self.notes
    }
}

/// Result of a parse: the analyzable highlights in first-seen order.
#[derive(Debug, Clone, Default)]
pub struct ParsedClippings {
    pub highlights: Vec<Highlight>,
    pub stats: ParseStats,
}

impl ParsedClippings {
    /// Distinct book titles in first-seen order, compared case-insensitively.
    pub fn book_titles(&self) -> Vec<&str> {
        let mut seen = std::collections::HashSet::new();
        self.highlights
            .iter()
            .map(|h| h.book_title.as_str())
            .filter(|title| seen.insert(title.to_lowercase()))
            .collect()
    }
}

/// Errors that can occur while loading a clippings file.
#[derive(Debug, thiserror::Error)]
pub enum ClippingsError {
    #[error("clippings file not found: {0}")]
    NotFound(PathBuf),

    #[error("clippings file {path} is not valid UTF-8 text: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: std::string::FromUtf8Error,
    },

    #[error("failed to read clippings file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Read and parse a clippings file.
pub fn load_file(path: &Path, parser: &ClippingsParser) -> Result<ParsedClippings, ClippingsError> {
    let raw = read_text(path)?;
    let parsed = parser.parse(&raw);

    log::info!(
        "Parsed {} records from {}: {} highlights, {} notes, {} bookmarks, {} empty, {} duplicates, {} malformed",
        parsed.stats.records,
        path.display(),
        parsed.stats.highlights,
        parsed.stats.notes,
        parsed.stats.bookmarks,
        parsed.stats.empty,
        parsed.stats.duplicates,
        parsed.stats.malformed,
    );

    Ok(parsed)
}

fn read_text(path: &Path) -> Result<String, ClippingsError> {
    let bytes = std::fs::read(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => ClippingsError::NotFound(path.to_path_buf()),
        _ => ClippingsError::Io {
            path: path.to_path_buf(),
            source: e,
        },
    })?;

    String::from_utf8(bytes).map_err(|source| ClippingsError::Decode {
        path: path.to_path_buf(),
        source,
    })
}
