use std::{path::Path, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};

use crate::{
    analytics::LibraryStats,
    cli::{
        commands::{BookCommand, ConnectionsCommand, ExportCommand, SearchCommand},
        render, Args,
    },
    clippings::{self, ClippingsParser},
    config::{Config, SemanticConfig},
    semantic::{Embedder, EmbeddingModel, HashEmbedder, QueryEngine, QuerySettings, HASH_MODEL},
};

/// Requests parsed from the command line, validated before any work starts.
struct Requests {
    search: Option<SearchCommand>,
    book: Option<BookCommand>,
    connections: Option<ConnectionsCommand>,
    export: Option<ExportCommand>,
}

impl Requests {
    fn from_args(args: &Args, config: &SemanticConfig) -> Result<Self> {
        let search = args
            .query
            .clone()
            .map(|query| SearchCommand::new(query, args.top_k.unwrap_or(config.default_top_k)))
            .transpose()?;

        let book = args.book.clone().map(BookCommand::new).transpose()?;

        let connections = if args.connections {
            Some(ConnectionsCommand::new(
                args.threshold.unwrap_or(config.connection_threshold),
                args.limit.unwrap_or(config.connection_display_count),
            )?)
        } else {
            None
        };

        let export = args
            .export
            .map(|format| ExportCommand::new(format, args.output.clone()))
            .transpose()?;

        Ok(Self {
            search,
            book,
            connections,
            export,
        })
    }

    fn is_semantic(&self) -> bool {
        self.search.is_some() || self.book.is_some() || self.connections.is_some()
    }
}

pub fn run(args: Args, config: &Config) -> Result<()> {
    let requests = Requests::from_args(&args, &config.semantic)?;

    if args.config {
        print!("{}", serde_yml::to_string(config)?);
        println!("# {}", config.path().display());
    }

    let Some(file) = &args.file else {
        return Ok(());
    };

    let parser = ClippingsParser::new(config.clippings.clone());
    let parsed = clippings::load_file(file, &parser)?;
    eprintln!(
        "Loaded {} highlights from {} books",
        parsed.highlights.len(),
        parsed.book_titles().len()
    );

    if let Some(export) = &requests.export {
        export.execute(&parsed.highlights)?;
    }

    if args.analytics {
        let stats = LibraryStats::compute(&parsed.highlights, parsed.stats);
        println!("\nReading Analytics\n");
        print!("{}", render::analytics_text(&stats));
    }

    if !requests.is_semantic() {
        return Ok(());
    }

    let embedder = build_embedder(&config.semantic, config.base_path())?;
    let mut engine = QueryEngine::new(parsed.highlights, embedder).with_settings(QuerySettings {
        representative_count: config.semantic.representative_count,
        pairwise_window: config.semantic.pairwise_window,
    });
    compute_embeddings(&mut engine, &config.semantic)?;

    if let Some(search) = &requests.search {
        search.execute(&engine)?;
    }
    if let Some(book) = &requests.book {
        book.execute(&engine)?;
    }
    if let Some(connections) = &requests.connections {
        connections.execute(&engine)?;
    }

    Ok(())
}

fn build_embedder(config: &SemanticConfig, base_path: &Path) -> Result<Arc<dyn Embedder>> {
    if config.model.eq_ignore_ascii_case(HASH_MODEL) {
        return Ok(Arc::new(HashEmbedder::default()));
    }

    let model = EmbeddingModel::new(&config.model, base_path.to_path_buf(), config.batch_size)
        .with_context(|| format!("failed to load embedding model '{}'", config.model))?;
    Ok(Arc::new(model))
}

fn compute_embeddings(engine: &mut QueryEngine, config: &SemanticConfig) -> Result<()> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::with_template("{spinner} {msg} [{elapsed}]")?);
    spinner.set_message(format!(
        "Computing embeddings for {} highlights",
        engine.highlights().len()
    ));
    spinner.enable_steady_tick(Duration::from_millis(120));

    let result = engine.compute_embeddings_within(Duration::from_secs(config.embedding_timeout_secs));
    spinner.finish_and_clear();

    result.context("failed to compute embeddings")
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn hash_config() -> Config {
        let mut config = Config::default();
        config.semantic.model = HASH_MODEL.to_string();
        config
    }

    #[test]
    fn test_requests_use_config_defaults() {
        let mut config = hash_config();
        config.semantic.default_top_k = 7;
        config.semantic.connection_threshold = 0.4;
        config.semantic.connection_display_count = 2;

        let args = Args::try_parse_from(["marginalia", "c.txt", "-q", "focus", "-c"]).unwrap();
        let requests = Requests::from_args(&args, &config.semantic).unwrap();

        assert_eq!(requests.search.as_ref().map(|s| s.top_k), Some(7));
        let connections = requests.connections.unwrap();
        assert_eq!(connections.threshold, 0.4);
        assert_eq!(connections.limit, 2);
        assert!(requests.book.is_none());
        assert!(requests.export.is_none());
    }

    #[test]
    fn test_invalid_threshold_rejected_before_loading() {
        let args = Args::try_parse_from([
            "marginalia",
            "/does/not/exist.txt",
            "-c",
            "--threshold",
            "2.0",
        ])
        .unwrap();

        let err = run(args, &hash_config()).unwrap_err();
        assert!(err.to_string().contains("threshold"));
    }

    #[test]
    fn test_run_end_to_end_with_hash_model() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("My Clippings.txt");
        std::fs::write(
            &path,
            "Walden (Henry David Thoreau)\n\
             - Your Highlight on Location 40-42 | Added on Monday, March 6, 2023 10:15:30 PM\n\
             \n\
             Simplify, simplify.\n\
             ==========\n\
             Meditations (Marcus Aurelius)\n\
             - Your Highlight on page 3 | Added on Tuesday, March 7, 2023 08:00:00 AM\n\
             \n\
             You have power over your mind.\n\
             ==========\n",
        )
        .unwrap();
        let export = dir.path().join("out");

        let args = Args::try_parse_from([
            "marginalia",
            path.to_str().unwrap(),
            "-q",
            "mind",
            "-b",
            "walden",
            "-c",
            "-a",
            "-e",
            "csv",
            "-o",
            export.to_str().unwrap(),
        ])
        .unwrap();

        run(args, &hash_config()).unwrap();

        let csv_text = std::fs::read_to_string(&export).unwrap();
        assert!(csv_text.contains("Simplify, simplify."));
        assert!(csv_text.contains("You have power over your mind."));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let args = Args::try_parse_from(["marginalia", "/does/not/exist.txt", "-a"]).unwrap();
        let err = run(args, &hash_config()).unwrap_err();
        assert!(err.downcast_ref::<clippings::ClippingsError>().is_some());
    }
}
