use std::path::PathBuf;

use clap::Parser;

use crate::export::ExportFormat;

mod commands;
mod errors;
mod handlers;
mod render;
mod validation;

pub use handlers::*;

#[derive(Parser, Debug)]
#[command(version, about = "Analyze e-reader highlights and notes", long_about = None)]
pub struct Args {
    /// Path to your My Clippings.txt file
    #[clap(required_unless_present = "config")]
    pub file: Option<PathBuf>,

    /// Search query to find similar highlights
    #[clap(short, long)]
    pub query: Option<String>,

    /// Number of similar highlights to show
    #[clap(short = 'k', long)]
    pub top_k: Option<usize>,

    /// Book title to analyze
    #[clap(short, long)]
    pub book: Option<String>,

    /// Find connections between books
    #[clap(short, long, default_value = "false")]
    pub connections: bool,

    /// Minimum similarity for a connection between books
    #[clap(short, long, allow_negative_numbers = true)]
    pub threshold: Option<f32>,

    /// Number of connections to show
    #[clap(short = 'n', long)]
    pub limit: Option<usize>,

    /// Export highlights to specified format
    #[clap(short, long, value_enum)]
    pub export: Option<ExportFormat>,

    /// Write the export to this file instead of stdout
    #[clap(short, long, requires = "export")]
    pub output: Option<PathBuf>,

    /// Perform analytics on highlights
    #[clap(short, long, default_value = "false")]
    pub analytics: bool,

    /// Show configuration settings
    #[clap(short = 'g', long, default_value = "false")]
    pub config: bool,

    /// More log output (-v info, -vv debug)
    #[clap(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_args_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_full_request() {
        let args = Args::try_parse_from([
            "marginalia",
            "clippings.txt",
            "-q",
            "resilience",
            "-k",
            "3",
            "--connections",
            "--threshold",
            "-0.5",
            "-e",
            "csv",
        ])
        .unwrap();

        assert_eq!(args.file, Some(PathBuf::from("clippings.txt")));
        assert_eq!(args.query.as_deref(), Some("resilience"));
        assert_eq!(args.top_k, Some(3));
        assert_eq!(args.threshold, Some(-0.5));
        assert_eq!(args.export, Some(ExportFormat::Csv));
        assert!(args.connections);
    }

    #[test]
    fn test_file_optional_with_config_flag() {
        let args = Args::try_parse_from(["marginalia", "--config"]).unwrap();
        assert!(args.file.is_none());
        assert!(args.query.is_none() && args.book.is_none() && !args.connections);

        assert!(Args::try_parse_from(["marginalia"]).is_err());
    }

    #[test]
    fn test_output_requires_export() {
        assert!(Args::try_parse_from(["marginalia", "c.txt", "-o", "out.md"]).is_err());
    }
}
