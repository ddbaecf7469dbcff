use std::collections::HashSet;

use crate::clippings::{
    parse_metadata, ClippingsFormat, Highlight, HighlightKind, ParseStats, ParsedClippings,
    TimestampMarkers,
};

const BYTE_ORDER_MARK: char = '\u{feff}';

/// Why a record was left out of the analyzable set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Skip {
    Malformed,
    Bookmark,
    Empty,
}

/// Splits a clippings export into records and turns them into highlights.
#[derive(Debug, Clone)]
pub struct ClippingsParser {
    format: ClippingsFormat,
    markers: TimestampMarkers,
}

impl Default for ClippingsParser {
    fn default() -> Self {
        Self::new(ClippingsFormat::default())
    }
}

impl ClippingsParser {
    pub fn new(format: ClippingsFormat) -> Self {
        let markers = TimestampMarkers::new(&format.timestamp_markers);
        Self { format, markers }
    }

    /// Parse raw export text. Never fails: malformed records are skipped and
    /// counted in [`ParseStats`].
    pub fn parse(&self, raw: &str) -> ParsedClippings {
        let mut stats = ParseStats::default();
        let mut seen: HashSet<(String, String)> = HashSet::new();
        let mut highlights = Vec::new();
        let mut record: Vec<&str> = Vec::new();

        let mut flush = |record: &mut Vec<&str>| {
            if record.iter().any(|l| !is_blank(l)) {
                stats.records += 1;
                match self.parse_record(record) {
                    Ok(highlight) => {
                        let (title, content) = highlight.dedup_key();
                        if seen.insert((title, content.to_string())) {
                            match highlight.kind {
                                HighlightKind::Note => stats.notes += 1,
                                _ => stats.highlights += 1,
                            }
                            if highlight.timestamp.is_none() {
                                stats.undated += 1;
                            }
                            highlights.push(highlight);
                        } else {
                            stats.duplicates += 1;
                        }
                    }
                    Err(Skip::Malformed) => {
                        log::debug!("Skipping malformed clipping record: {:?}", record.first());
                        stats.malformed += 1;
                    }
                    Err(Skip::Bookmark) => stats.bookmarks += 1,
                    Err(Skip::Empty) => stats.empty += 1,
                }
            }
            record.clear();
        };

        for line in raw.lines() {
            if self.format.is_delimiter(line) {
                flush(&mut record);
            } else {
                record.push(line);
            }
        }
        // An unterminated trailing record is parsed like the others
        flush(&mut record);

        ParsedClippings { highlights, stats }
    }

    fn parse_record(&self, lines: &[&str]) -> Result<Highlight, Skip> {
        let mut lines = lines
            .iter()
            .map(|l| l.trim_start_matches(BYTE_ORDER_MARK).trim())
            .skip_while(|l| l.is_empty());

        let title_line = lines.next().ok_or(Skip::Malformed)?;
        let metadata_line = lines.next().filter(|l| !l.is_empty()).ok_or(Skip::Malformed)?;

        let (book_title, author) = split_title(title_line);
        if book_title.is_empty() {
            return Err(Skip::Malformed);
        }

        let metadata = parse_metadata(metadata_line, &self.format, &self.markers);
        let kind = metadata.kind.unwrap_or_else(|| {
            log::debug!("Unclassified metadata line, treating as highlight: {metadata_line}");
            HighlightKind::Highlight
        });
        if kind == HighlightKind::Bookmark {
            return Err(Skip::Bookmark);
        }

        let content = lines.filter(|l| !l.is_empty()).collect::<Vec<_>>().join("\n");
        if content.is_empty() {
            return Err(Skip::Empty);
        }

        Ok(Highlight {
            book_title,
            author,
            content,
            timestamp: metadata.timestamp,
            kind,
            location: metadata.location,
            page: metadata.page,
        })
    }
}

fn is_blank(line: &str) -> bool {
    line.trim_start_matches(BYTE_ORDER_MARK).trim().is_empty()
}

/// Split `Title (Author)` into a normalized title and optional author.
///
/// Only the final parenthesised group is treated as the author, so
/// `Dune (Dune Chronicles, Book 1) (Frank Herbert)` keeps its series note.
pub fn split_title(line: &str) -> (String, Option<String>) {
    let line = line.trim_start_matches(BYTE_ORDER_MARK).trim();

    if let Some(open) = line.strip_suffix(')').and_then(last_group_start) {
        let title = collapse_whitespace(&line[..open]);
        let author = collapse_whitespace(&line[open + 1..line.len() - 1]);
        if !title.is_empty() {
            return (title, (!author.is_empty()).then_some(author));
        }
    }

    (collapse_whitespace(line), None)
}

/// Byte offset of the `(` opening the group that ends at the end of `s`
/// (the closing `)` already stripped).
fn last_group_start(s: &str) -> Option<usize> {
    let mut depth = 0usize;
    for (idx, c) in s.char_indices().rev() {
        match c {
            ')' => depth += 1,
            '(' if depth == 0 => return Some(idx),
            '(' => depth -= 1,
            _ => {}
        }
    }
    None
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const HIGHLIGHT_META: &str =
        "- Your Highlight on page 12 | Location 170-172 | Added on Monday, March 6, 2023 10:15:30 PM";

    fn record(title: &str, meta: &str, content: &str) -> String {
        format!("{title}\n{meta}\n\n{content}\n==========\n")
    }

    #[test]
    fn test_split_title_with_author() {
        assert_eq!(
            split_title("Meditations (Marcus Aurelius)"),
            ("Meditations".to_string(), Some("Marcus Aurelius".to_string()))
        );
    }

    #[test]
    fn test_split_title_keeps_inner_groups() {
        assert_eq!(
            split_title("Dune (Dune Chronicles, Book 1) (Frank Herbert)"),
            (
                "Dune (Dune Chronicles, Book 1)".to_string(),
                Some("Frank Herbert".to_string())
            )
        );
    }

    #[test]
    fn test_split_title_nested_author_group() {
        assert_eq!(
            split_title("Essays (Montaigne, Michel (de))"),
            ("Essays".to_string(), Some("Montaigne, Michel (de)".to_string()))
        );
    }

    #[test]
    fn test_split_title_without_author() {
        assert_eq!(split_title("  Untitled   Notes "), ("Untitled Notes".to_string(), None));
        assert_eq!(split_title("(Only Parens)"), ("(Only Parens)".to_string(), None));
        assert_eq!(split_title("\u{feff}Walden"), ("Walden".to_string(), None));
    }

    #[test]
    fn test_multiline_content_is_joined() {
        let raw = record("Walden (Thoreau)", HIGHLIGHT_META, "First line.\n\n  Second line.  ");
        let parsed = ClippingsParser::default().parse(&raw);

        assert_eq!(parsed.highlights.len(), 1);
        assert_eq!(parsed.highlights[0].content, "First line.\nSecond line.");
        assert_eq!(parsed.highlights[0].location.as_deref(), Some("170-172"));
        assert_eq!(parsed.highlights[0].page.as_deref(), Some("12"));
    }

    #[test]
    fn test_bookmarks_and_empty_records_are_counted() {
        let mut raw = record(
            "Walden (Thoreau)",
            "- Your Bookmark on Location 50 | Added on Monday, March 6, 2023 10:15:30 PM",
            "",
        );
        raw.push_str(&record("Walden (Thoreau)", HIGHLIGHT_META, "   "));
        raw.push_str(&record("Walden (Thoreau)", HIGHLIGHT_META, "Kept."));

        let parsed = ClippingsParser::default().parse(&raw);
        assert_eq!(parsed.highlights.len(), 1);
        assert_eq!(parsed.stats.records, 3);
        assert_eq!(parsed.stats.bookmarks, 1);
        assert_eq!(parsed.stats.empty, 1);
        assert_eq!(parsed.stats.highlights, 1);
    }

    #[test]
    fn test_duplicates_ignore_title_case() {
        let mut raw = record("Walden (Thoreau)", HIGHLIGHT_META, "Simplify, simplify.");
        raw.push_str(&record("WALDEN (Thoreau)", HIGHLIGHT_META, "Simplify, simplify."));
        raw.push_str(&record("WALDEN (Thoreau)", HIGHLIGHT_META, "Live deliberately."));

        let parsed = ClippingsParser::default().parse(&raw);
        assert_eq!(parsed.highlights.len(), 2);
        assert_eq!(parsed.stats.duplicates, 1);
        assert_eq!(parsed.highlights[0].book_title, "Walden");
        assert_eq!(parsed.book_titles(), vec!["Walden"]);
    }

    #[test]
    fn test_title_only_fragment_is_malformed() {
        let raw = format!(
            "Lonely Title\n==========\n{}",
            record("Walden (Thoreau)", HIGHLIGHT_META, "Kept.")
        );
        let parsed = ClippingsParser::default().parse(&raw);

        assert_eq!(parsed.highlights.len(), 1);
        assert_eq!(parsed.stats.malformed, 1);
    }

    #[test]
    fn test_unterminated_trailing_record() {
        let raw = format!(
            "{}Walden (Thoreau)\n{HIGHLIGHT_META}\n\nNo delimiter after me.",
            record("Walden (Thoreau)", HIGHLIGHT_META, "First.")
        );
        let parsed = ClippingsParser::default().parse(&raw);

        assert_eq!(parsed.highlights.len(), 2);
        assert_eq!(parsed.highlights[1].content, "No delimiter after me.");
    }

    #[test]
    fn test_crlf_line_endings() {
        let raw = record("Walden (Thoreau)", HIGHLIGHT_META, "Windows text.").replace('\n', "\r\n");
        let parsed = ClippingsParser::default().parse(&raw);

        assert_eq!(parsed.highlights.len(), 1);
        assert_eq!(parsed.highlights[0].content, "Windows text.");
        assert!(parsed.highlights[0].timestamp.is_some());
    }

    #[test]
    fn test_bom_on_every_record() {
        let raw = format!(
            "\u{feff}{}\u{feff}{}",
            record("Walden (Thoreau)", HIGHLIGHT_META, "One."),
            record("Walden (Thoreau)", HIGHLIGHT_META, "Two.")
        );
        let parsed = ClippingsParser::default().parse(&raw);

        assert_eq!(parsed.book_titles(), vec!["Walden"]);
        assert_eq!(parsed.highlights.len(), 2);
    }

    #[test]
    fn test_blank_input() {
        let parsed = ClippingsParser::default().parse("\n\n==========\n\n");
        assert!(parsed.highlights.is_empty());
        assert_eq!(parsed.stats, ParseStats::default());
    }
}
