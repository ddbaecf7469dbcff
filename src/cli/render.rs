use std::fmt::Write as _;

use tabled::{builder::Builder, settings::Style};

use crate::{
    analytics::LibraryStats,
    semantic::{BookInsights, Connection, ScoredHighlight},
};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Content shown per row of a search table
pub const SEARCH_CONTENT_WIDTH: usize = 100;

/// Content shown per side of a connections table
pub const CONNECTION_CONTENT_WIDTH: usize = 50;

/// Single line of at most `max` characters, with "..." when cut.
pub fn truncate(text: &str, max: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max {
        return flat;
    }
    let mut out: String = flat.chars().take(max).collect();
    out.push_str("...");
    out
}

/// Titled table with a header row, rounded borders.
fn titled_table<I>(title: &str, headers: &[&str], rows: I) -> String
where
    I: IntoIterator<Item = Vec<String>>,
{
    let mut builder = Builder::default();
    builder.push_record(headers.iter().map(|h| h.to_string()));
    for row in rows {
        builder.push_record(row);
    }

    let mut table = builder.build();
    table.with(Style::rounded());
    format!("{title}\n{table}\n")
}

pub fn similar_table(results: &[ScoredHighlight<'_>]) -> String {
    titled_table(
        "Similar Highlights",
        &["Similarity", "Book", "Highlight"],
        results.iter().map(|r| {
            vec![
                format!("{:.3}", r.similarity),
                r.highlight.book_title.clone(),
                truncate(&r.highlight.content, SEARCH_CONTENT_WIDTH),
            ]
        }),
    )
}

pub fn connections_table(connections: &[Connection<'_>]) -> String {
    titled_table(
        "Connections Between Books",
        &["Similarity", "Book 1", "Highlight 1", "Book 2", "Highlight 2"],
        connections.iter().map(|c| {
            vec![
                format!("{:.3}", c.similarity),
                c.first.book_title.clone(),
                truncate(&c.first.content, CONNECTION_CONTENT_WIDTH),
                c.second.book_title.clone(),
                truncate(&c.second.content, CONNECTION_CONTENT_WIDTH),
            ]
        }),
    )
}

pub fn insights_text(insights: &BookInsights<'_>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Book: {}", insights.book_title);
    let _ = writeln!(out, "Total highlights: {}", insights.total_highlights);
    match &insights.temporal_distribution {
        Some(t) => {
            let _ = writeln!(
                out,
                "Reading period: {} to {} ({} days)",
                t.first_highlight.format(DATE_FORMAT),
                t.last_highlight.format(DATE_FORMAT),
                t.total_days
            );
        }
        None => {
            let _ = writeln!(out, "Reading period: unknown");
        }
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "Representative highlights:");
    for (i, r) in insights.representative_highlights.iter().enumerate() {
        let _ = writeln!(
            out,
            "{}. [{:.3}] {}",
            i + 1,
            r.similarity,
            truncate(&r.highlight.content, SEARCH_CONTENT_WIDTH)
        );
    }
    out
}

pub fn analytics_text(stats: &LibraryStats) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Highlights: {}", stats.total_highlights);
    let _ = writeln!(out, "Notes: {}", stats.total_notes);
    let _ = writeln!(out, "Books: {}", stats.total_books);
    let _ = writeln!(out, "Average length: {:.1} characters", stats.average_length);
    if let (Some(first), Some(last)) = (stats.first_highlight, stats.last_highlight) {
        let _ = writeln!(
            out,
            "Reading period: {} to {}",
            first.format(DATE_FORMAT),
            last.format(DATE_FORMAT)
        );
    }
    if let Some(month) = &stats.most_active_month {
        let _ = writeln!(out, "Most active month: {} ({} highlights)", month.month, month.count);
    }

    let p = &stats.parse;
    let _ = writeln!(
        out,
        "Parsed {} records: {} kept, {} duplicates, {} bookmarks, {} empty, {} malformed, {} undated",
        p.records,
        p.retained(),
        p.duplicates,
        p.bookmarks,
        p.empty,
        p.malformed,
        p.undated
    );

    let _ = writeln!(out);
    out.push_str(&titled_table(
        "Highlights per Book",
        &["Count", "Book"],
        stats
            .books
            .iter()
            .map(|book| vec![book.count.to_string(), book.title.clone()]),
    ));
    out
}
