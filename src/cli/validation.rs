use std::path::Path;

use crate::cli::errors::{CliError, CliResult};

/// Validates a free-text search query
pub fn validate_query(query: &str) -> CliResult<()> {
    if query.trim().is_empty() {
        return Err(CliError::validation("query", "Query cannot be empty"));
    }
    Ok(())
}

/// Validates a book title filter
pub fn validate_book_title(title: &str) -> CliResult<()> {
    if title.trim().is_empty() {
        return Err(CliError::validation("book", "Book title cannot be empty"));
    }
    Ok(())
}

/// Validates a result count
pub fn validate_count(field: &str, count: usize) -> CliResult<()> {
    if count == 0 {
        return Err(CliError::validation(field, "Must be at least 1"));
    }
    Ok(())
}

/// Validates a cosine similarity threshold
pub fn validate_threshold(threshold: f32) -> CliResult<()> {
    if !(-1.0..=1.0).contains(&threshold) {
        return Err(CliError::validation(
            "threshold",
            format!("Must be between -1.0 and 1.0, got {threshold}"),
        ));
    }
    Ok(())
}

/// Validates the export destination
pub fn validate_output(output: &Path) -> CliResult<()> {
    if output.is_dir() {
        return Err(CliError::invalid_input(format!(
            "Export output {} is a directory",
            output.display()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_query() {
        assert!(validate_query("stoicism").is_ok());
        assert!(matches!(validate_query("   "), Err(CliError::Validation { .. })));
    }

    #[test]
    fn test_validate_book_title() {
        assert!(validate_book_title("Walden").is_ok());
        assert!(validate_book_title("").is_err());
    }

    #[test]
    fn test_validate_count() {
        assert!(validate_count("top_k", 1).is_ok());
        assert!(validate_count("top_k", 0).is_err());
    }

    #[test]
    fn test_validate_threshold() {
        assert!(validate_threshold(0.7).is_ok());
        assert!(validate_threshold(-1.0).is_ok());
        assert!(validate_threshold(1.0).is_ok());
        assert!(validate_threshold(1.01).is_err());
        assert!(validate_threshold(f32::NAN).is_err());
    }

    #[test]
    fn test_validate_output_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            validate_output(dir.path()),
            Err(CliError::InvalidInput { .. })
        ));
        assert!(validate_output(&dir.path().join("out.md")).is_ok());
    }
}
