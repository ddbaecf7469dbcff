use std::{
    fs::File,
    io::{self, BufWriter},
    path::PathBuf,
};

use anyhow::{Context, Result};

use crate::{
    cli::{errors::CliResult, render, validation::*},
    clippings::Highlight,
    export::{export_highlights, ExportFormat},
    semantic::{EngineError, QueryEngine},
};

/// Free-text similarity search
#[derive(Debug, Clone)]
pub struct SearchCommand {
    pub query: String,
    pub top_k: usize,
}

impl SearchCommand {
    pub fn new(query: String, top_k: usize) -> CliResult<Self> {
        validate_query(&query)?;
        validate_count("top_k", top_k)?;
        Ok(Self { query, top_k })
    }

    pub fn execute(&self, engine: &QueryEngine) -> Result<()> {
        let results = match engine.find_similar(&self.query, self.top_k) {
            Ok(results) => results,
            Err(EngineError::EmptyIndex) => {
                println!("No highlights loaded, nothing to search");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        println!("\nFinding highlights similar to: '{}'\n", self.query);
        print!("{}", render::similar_table(&results));
        Ok(())
    }
}

/// Insights for one book
#[derive(Debug, Clone)]
pub struct BookCommand {
    pub title: String,
}

impl BookCommand {
    pub fn new(title: String) -> CliResult<Self> {
        validate_book_title(&title)?;
        Ok(Self { title })
    }

    pub fn execute(&self, engine: &QueryEngine) -> Result<()> {
        match engine.book_insights(&self.title)? {
            Some(insights) => {
                println!("\nAnalyzing book: {}\n", insights.book_title);
                print!("{}", render::insights_text(&insights));
            }
            None => println!("No insights found for this book"),
        }
        Ok(())
    }
}

/// Cross-book connections above a similarity threshold
#[derive(Debug, Clone)]
pub struct ConnectionsCommand {
    pub threshold: f32,
    pub limit: usize,
}

impl ConnectionsCommand {
    pub fn new(threshold: f32, limit: usize) -> CliResult<Self> {
        validate_threshold(threshold)?;
        validate_count("limit", limit)?;
        Ok(Self { threshold, limit })
    }

    pub fn execute(&self, engine: &QueryEngine) -> Result<()> {
        let mut connections = engine.find_connections(self.threshold)?;
        let total = connections.len();
        connections.truncate(self.limit);

        println!("\nFinding connections between books...\n");
        if connections.is_empty() {
            println!("No connections found at similarity {:.2}", self.threshold);
            return Ok(());
        }
        print!("{}", render::connections_table(&connections));
        if total > connections.len() {
            println!("({} of {} connections shown)", connections.len(), total);
        }
        Ok(())
    }
}

/// Export of every highlight in one format
#[derive(Debug, Clone)]
pub struct ExportCommand {
    pub format: ExportFormat,
    pub output: Option<PathBuf>,
}

impl ExportCommand {
    /// `output` is written as given, whatever its extension.
    pub fn new(format: ExportFormat, output: Option<PathBuf>) -> CliResult<Self> {
        if let Some(path) = &output {
            validate_output(path)?;
        }
        Ok(Self { format, output })
    }

    pub fn execute(&self, highlights: &[Highlight]) -> Result<()> {
        match &self.output {
            Some(path) => {
                let file = File::create(path)
                    .with_context(|| format!("failed to create {}", path.display()))?;
                export_highlights(highlights, self.format, BufWriter::new(file))?;
                eprintln!("Exported {} highlights to {}", highlights.len(), path.display());
            }
            None => {
                let stdout = io::stdout();
                export_highlights(highlights, self.format, stdout.lock())?;
            }
        }
        Ok(())
    }
}
