//! Parsing of the clipping metadata line.
//!
//! `- Your Highlight on page 3 | Location 40-42 | Added on Monday, March 6, 2023 10:15:30 PM`

use chrono::{NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};

use crate::clippings::{ClippingsFormat, HighlightKind};

static LOCATION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\blocation\s+(\d+(?:-\d+)?)").expect("valid location regex"));

static PAGE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bpage\s+([0-9ivxlcdm]+(?:-[0-9ivxlcdm]+)?)").expect("valid page regex")
});

/// Fields extracted from a metadata line. Every field is best-effort.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metadata {
    pub kind: Option<HighlightKind>,
    pub location: Option<String>,
    pub page: Option<String>,
    pub timestamp: Option<NaiveDateTime>,
}

/// Case-insensitive matchers for the configured timestamp markers, in order.
#[derive(Debug, Clone)]
pub struct TimestampMarkers(Vec<Regex>);

impl TimestampMarkers {
    pub fn new(markers: &[String]) -> Self {
        let patterns = markers
            .iter()
            .filter(|marker| !marker.trim().is_empty())
            .filter_map(|marker| {
                RegexBuilder::new(&regex::escape(marker))
                    .case_insensitive(true)
                    .build()
                    .map_err(|err| log::warn!("Ignoring timestamp marker {marker:?}: {err}"))
                    .ok()
            })
            .collect();
        Self(patterns)
    }

    /// Text following the first marker found in `line`.
    fn text_after<'a>(&self, line: &'a str) -> Option<&'a str> {
        self.0.iter().find_map(|re| {
            let text = line[re.find(line)?.end()..].trim();
            (!text.is_empty()).then_some(text)
        })
    }
}

pub fn parse_metadata(
    line: &str,
    format: &ClippingsFormat,
    markers: &TimestampMarkers,
) -> Metadata {
    let line = line.trim();

    Metadata {
        kind: format.classify(line),
        location: capture(&LOCATION_RE, line),
        page: capture(&PAGE_RE, line),
        timestamp: markers
            .text_after(line)
            .and_then(|text| parse_timestamp(text, format)),
    }
}

fn capture(re: &Regex, line: &str) -> Option<String> {
    re.captures(line)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Try every configured format in order. Date-only formats resolve to midnight.
pub fn parse_timestamp(text: &str, format: &ClippingsFormat) -> Option<NaiveDateTime> {
    let text = text.trim();
    format.date_formats.iter().find_map(|fmt| {
        NaiveDateTime::parse_from_str(text, fmt).ok().or_else(|| {
            NaiveDate::parse_from_str(text, fmt)
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    fn parse(line: &str, format: &ClippingsFormat) -> Metadata {
        parse_metadata(line, format, &TimestampMarkers::new(&format.timestamp_markers))
    }

    #[test]
    fn test_full_kindle_line() {
        let format = ClippingsFormat::default();
        let meta = parse(
            "- Your Highlight on page 3 | Location 40-42 | Added on Monday, March 6, 2023 10:15:30 PM",
            &format,
        );

        assert_eq!(meta.kind, Some(HighlightKind::Highlight));
        assert_eq!(meta.location.as_deref(), Some("40-42"));
        assert_eq!(meta.page.as_deref(), Some("3"));

        let ts = meta.timestamp.unwrap();
        assert_eq!((ts.year(), ts.month(), ts.day()), (2023, 3, 6));
        assert_eq!((ts.hour(), ts.minute(), ts.second()), (22, 15, 30));
    }

    #[test]
    fn test_location_only_note() {
        let format = ClippingsFormat::default();
        let meta = parse(
            "- Your Note on Location 120 | Added on Tuesday, January 2, 2024 9:05:00 AM",
            &format,
        );

        assert_eq!(meta.kind, Some(HighlightKind::Note));
        assert_eq!(meta.location.as_deref(), Some("120"));
        assert_eq!(meta.page, None);
        assert_eq!(meta.timestamp.unwrap().hour(), 9);
    }

    #[test]
    fn test_unparsable_date_leaves_timestamp_unset() {
        let format = ClippingsFormat::default();
        let meta = parse(
            "- Your Highlight on Location 5 | Added on sometime last spring",
            &format,
        );

        assert_eq!(meta.kind, Some(HighlightKind::Highlight));
        assert_eq!(meta.timestamp, None);
    }

    #[test]
    fn test_missing_marker() {
        let format = ClippingsFormat::default();
        let meta = parse("- Your Highlight on Location 5", &format);
        assert_eq!(meta.timestamp, None);
    }

    #[test]
    fn test_garbage_line() {
        let format = ClippingsFormat::default();
        let meta = parse("%%%%", &format);
        assert_eq!(meta, Metadata::default());
    }

    #[test]
    fn test_marker_case_and_non_ascii_text() {
        let format = ClippingsFormat::default();
        let meta = parse(
            "- Your Highlight on Location 7 | STRAẞE İstanbul | ADDED ON Monday, March 6, 2023 10:15:30 PM",
            &format,
        );

        let ts = meta.timestamp.unwrap();
        assert_eq!((ts.year(), ts.month(), ts.day()), (2023, 3, 6));
        assert_eq!(meta.location.as_deref(), Some("7"));
    }

    #[test]
    fn test_marker_is_matched_literally() {
        let format = ClippingsFormat {
            timestamp_markers: vec!["".to_string(), "(added)".to_string()],
            ..Default::default()
        };
        let meta = parse("- Your Highlight (added) Monday, March 6, 2023 10:15:30 PM", &format);
        assert!(meta.timestamp.is_some());

        let meta = parse("- Your Highlight added Monday, March 6, 2023 10:15:30 PM", &format);
        assert_eq!(meta.timestamp, None);
    }

    #[test]
    fn test_twenty_four_hour_format() {
        let format = ClippingsFormat::default();
        let ts = parse_timestamp("Monday, 6 March 2023 22:15:30", &format).unwrap();
        assert_eq!(ts.hour(), 22);
    }

    #[test]
    fn test_date_only_custom_format() {
        let format = ClippingsFormat {
            date_formats: vec!["%d.%m.%Y".to_string()],
            ..Default::default()
        };
        let ts = parse_timestamp("06.03.2023", &format).unwrap();
        assert_eq!((ts.year(), ts.month(), ts.day()), (2023, 3, 6));
        assert_eq!(ts.hour(), 0);
    }

    #[test]
    fn test_custom_marker() {
        let format = ClippingsFormat {
            timestamp_markers: vec!["Hinzugefügt am".to_string()],
            date_formats: vec!["%Y-%m-%d %H:%M:%S".to_string()],
            ..Default::default()
        };
        let meta = parse(
            "- Ihre Markierung | Hinzugefügt am 2023-03-06 22:15:30",
            &format,
        );
        assert!(meta.timestamp.is_some());
    }
}
