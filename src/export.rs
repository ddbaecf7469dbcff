//! Export of parsed highlights to Markdown, CSV or JSON.

use std::io::Write;

use serde::{Deserialize, Serialize};

use crate::clippings::Highlight;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Markdown,
    Csv,
    Json,
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Flat row written by the CSV exporter.
#[derive(Debug, Serialize)]
struct CsvRow<'a> {
    book_title: &'a str,
    author: &'a str,
    kind: &'static str,
    location: &'a str,
    page: &'a str,
    timestamp: String,
    content: &'a str,
}

impl<'a> From<&'a Highlight> for CsvRow<'a> {
    fn from(h: &'a Highlight) -> Self {
        Self {
            book_title: &h.book_title,
            author: h.author.as_deref().unwrap_or_default(),
            kind: h.kind.as_str(),
            location: h.location.as_deref().unwrap_or_default(),
            page: h.page.as_deref().unwrap_or_default(),
            timestamp: h
                .timestamp
                .map(|ts| ts.format(TIMESTAMP_FORMAT).to_string())
                .unwrap_or_default(),
            content: &h.content,
        }
    }
}

pub fn export_highlights<W: Write>(
    highlights: &[Highlight],
    format: ExportFormat,
    writer: W,
) -> Result<(), ExportError> {
    match format {
        ExportFormat::Markdown => write_markdown(highlights, writer),
        ExportFormat::Csv => write_csv(highlights, writer),
        ExportFormat::Json => write_json(highlights, writer),
    }
}

fn write_markdown<W: Write>(highlights: &[Highlight], mut writer: W) -> Result<(), ExportError> {
    writeln!(writer, "# Highlights")?;

    // Books in first-seen order
    let mut books: Vec<(&str, Vec<&Highlight>)> = Vec::new();
    for h in highlights {
        match books.iter().position(|(title, _)| *title == h.book_title) {
            Some(i) => books[i].1.push(h),
            None => books.push((h.book_title.as_str(), vec![h])),
        }
    }

    for (title, entries) in books {
        writeln!(writer)?;
        writeln!(writer, "## {title}")?;
        if let Some(author) = entries.iter().find_map(|h| h.author.as_deref()) {
            writeln!(writer)?;
            writeln!(writer, "*{author}*")?;
        }

        for h in entries {
            writeln!(writer)?;
            for line in h.content.lines() {
                writeln!(writer, "> {line}")?;
            }
            writeln!(writer)?;
            writeln!(writer, "{}", markdown_details(h))?;
        }
    }

    writer.flush()?;
    Ok(())
}

fn markdown_details(h: &Highlight) -> String {
    let mut details = vec![h.kind.as_str().to_string()];
    if let Some(page) = &h.page {
        details.push(format!("page {page}"));
    }
    if let Some(location) = &h.location {
        details.push(format!("location {location}"));
    }
    if let Some(ts) = h.timestamp {
        details.push(ts.format(TIMESTAMP_FORMAT).to_string());
    }
    format!("<sub>{}</sub>", details.join(" · "))
}

fn write_csv<W: Write>(highlights: &[Highlight], writer: W) -> Result<(), ExportError> {
    let mut wtr = csv::Writer::from_writer(writer);
    for h in highlights {
        wtr.serialize(CsvRow::from(h))?;
    }
    wtr.flush()?;
    Ok(())
}

fn write_json<W: Write>(highlights: &[Highlight], mut writer: W) -> Result<(), ExportError> {
    serde_json::to_writer_pretty(&mut writer, highlights)?;
    writeln!(writer)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clippings::HighlightKind;
    use chrono::NaiveDate;

    fn sample() -> Vec<Highlight> {
        vec![
            Highlight {
                book_title: "Walden".to_string(),
                author: Some("Henry David Thoreau".to_string()),
                content: "Simplify, simplify.".to_string(),
                timestamp: NaiveDate::from_ymd_opt(2023, 3, 6).and_then(|d| d.and_hms_opt(22, 15, 30)),
                kind: HighlightKind::Highlight,
                location: Some("40-42".to_string()),
                page: Some("3".to_string()),
            },
            Highlight {
                book_title: "Meditations".to_string(),
                author: None,
                content: "Line one\nLine, \"two\"".to_string(),
                timestamp: None,
                kind: HighlightKind::Note,
                location: None,
                page: None,
            },
            Highlight {
                book_title: "Walden".to_string(),
                author: Some("Henry David Thoreau".to_string()),
                content: "Heaven is under our feet.".to_string(),
                timestamp: None,
                kind: HighlightKind::Highlight,
                location: Some("99".to_string()),
                page: None,
            },
        ]
    }

    fn export_to_string(format: ExportFormat) -> String {
        let mut out = Vec::new();
        export_highlights(&sample(), format, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_markdown_groups_by_book() {
        let md = export_to_string(ExportFormat::Markdown);

        assert!(md.starts_with("# Highlights\n"));
        assert_eq!(md.matches("## Walden").count(), 1);
        assert!(md.find("## Walden").unwrap() < md.find("## Meditations").unwrap());
        assert!(md.find("Heaven is under our feet.").unwrap() < md.find("## Meditations").unwrap());
        assert!(md.contains("*Henry David Thoreau*"));
        assert!(md.contains("> Line one\n> Line, \"two\""));
        assert!(md.contains("highlight · page 3 · location 40-42 · 2023-03-06 22:15:30"));
    }

    #[test]
    fn test_csv_rows() {
        let csv_text = export_to_string(ExportFormat::Csv);

        let mut reader = csv::Reader::from_reader(csv_text.as_bytes());
        let headers = reader.headers().unwrap().clone();
        assert_eq!(
            headers.iter().collect::<Vec<_>>(),
            vec!["book_title", "author", "kind", "location", "page", "timestamp", "content"]
        );

        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 3);
        assert_eq!(&rows[0][5], "2023-03-06 22:15:30");
        assert_eq!(&rows[1][2], "note");
        assert_eq!(&rows[1][6], "Line one\nLine, \"two\"");
    }

    #[test]
    fn test_json_array() {
        let json = export_to_string(ExportFormat::Json);
        let parsed: Vec<Highlight> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, sample());
    }
}
