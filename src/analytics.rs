//! Reading statistics over a parsed highlight collection.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::clippings::{Highlight, HighlightKind, ParseStats};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookCount {
    pub title: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthActivity {
    /// `YYYY-MM`
    pub month: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LibraryStats {
    pub total_highlights: usize,
    pub total_notes: usize,
    pub total_books: usize,
    /// Highest count first, ties by title
    pub books: Vec<BookCount>,
    pub average_length: f64,
    pub first_highlight: Option<NaiveDateTime>,
    pub last_highlight: Option<NaiveDateTime>,
    pub most_active_month: Option<MonthActivity>,
    pub parse: ParseStats,
}

impl LibraryStats {
    pub fn compute(highlights: &[Highlight], parse: ParseStats) -> Self {
        let mut per_book: HashMap<&str, usize> = HashMap::new();
        let mut per_month: BTreeMap<String, usize> = BTreeMap::new();
        let mut total_chars = 0usize;

        for h in highlights {
            *per_book.entry(h.book_title.as_str()).or_default() += 1;
            total_chars += h.content.chars().count();
            if let Some(ts) = h.timestamp {
                *per_month.entry(ts.format("%Y-%m").to_string()).or_default() += 1;
            }
        }

        let mut books: Vec<BookCount> = per_book
            .into_iter()
            .map(|(title, count)| BookCount {
                title: title.to_string(),
                count,
            })
            .collect();
        books.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.title.cmp(&b.title)));

        // Months iterate in order; keeping the current best on ties favours the earliest
        let most_active_month = per_month
            .into_iter()
            .fold(None::<MonthActivity>, |best, (month, count)| match best {
                Some(b) if b.count >= count => Some(b),
                _ => Some(MonthActivity { month, count }),
            });

        let average_length = if highlights.is_empty() {
            0.0
        } else {
            total_chars as f64 / highlights.len() as f64
        };

        Self {
            total_highlights: highlights
                .iter()
                .filter(|h| h.kind == HighlightKind::Highlight)
                .count(),
            total_notes: highlights
                .iter()
                .filter(|h| h.kind == HighlightKind::Note)
                .count(),
            total_books: books.len(),
            books,
            average_length,
            first_highlight: highlights.iter().filter_map(|h| h.timestamp).min(),
            last_highlight: highlights.iter().filter_map(|h| h.timestamp).max(),
            most_active_month,
            parse,
        }
    }
}
