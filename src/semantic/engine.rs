//! Query engine over parsed highlights.
//!
//! The engine starts `Unindexed`, holding only the parsed highlights. A
//! single call to [`QueryEngine::compute_embeddings`] embeds every highlight
//! in one batched call and builds the [`SimilarityIndex`]; from then on the
//! engine is `Ready` and read-only. Queries issued before that fail with
//! [`EngineError::IndexNotReady`].

use std::sync::{mpsc, Arc};
use std::time::{Duration, Instant};

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::clippings::Highlight;
use crate::semantic::embeddings::{Embedder, EmbeddingError};
use crate::semantic::index::{
    check_vectors, IndexError, SimilarityIndex, DEFAULT_PAIRWISE_WINDOW,
};
use crate::semantic::preprocess::prepare_text;

/// Default number of representative highlights per book
pub const DEFAULT_REPRESENTATIVE_COUNT: usize = 3;

/// Errors that can occur during query engine operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Embeddings have not been computed yet")]
    IndexNotReady,

    #[error("No highlights are loaded")]
    EmptyIndex,

    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Embedding did not finish within {} seconds", .0.as_secs())]
    EmbeddingTimeout(Duration),

    #[error("Embedder returned {got} vectors for {expected} texts")]
    VectorCountMismatch { expected: usize, got: usize },

    #[error("Index error: {0}")]
    Index(#[from] IndexError),
}

/// Tuning knobs for queries.
#[derive(Debug, Clone, Copy)]
pub struct QuerySettings {
    pub representative_count: usize,
    pub pairwise_window: usize,
}

impl Default for QuerySettings {
    fn default() -> Self {
        Self {
            representative_count: DEFAULT_REPRESENTATIVE_COUNT,
            pairwise_window: DEFAULT_PAIRWISE_WINDOW,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct ScoredHighlight<'a> {
    pub similarity: f32,
    pub highlight: &'a Highlight,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct Connection<'a> {
    pub similarity: f32,
    pub first: &'a Highlight,
    pub second: &'a Highlight,
}

/// Reading period of a book, from its earliest to latest dated highlight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TemporalDistribution {
    pub first_highlight: NaiveDateTime,
    pub last_highlight: NaiveDateTime,
    /// Calendar days covered, inclusive (a single day counts as 1)
    pub total_days: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct BookInsights<'a> {
    pub book_title: &'a str,
    pub total_highlights: usize,
    pub representative_highlights: Vec<ScoredHighlight<'a>>,
    pub temporal_distribution: Option<TemporalDistribution>,
}

enum State {
    Unindexed(Vec<Highlight>),
    Ready(SimilarityIndex),
}

pub struct QueryEngine {
    state: State,
    embedder: Arc<dyn Embedder>,
    settings: QuerySettings,
}

impl QueryEngine {
    pub fn new(highlights: Vec<Highlight>, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            state: State::Unindexed(highlights),
            embedder,
            settings: QuerySettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: QuerySettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn highlights(&self) -> &[Highlight] {
        match &self.state {
            State::Unindexed(highlights) => highlights,
            State::Ready(index) => index.highlights(),
        }
    }

    /// The similarity index, once embeddings exist.
    pub fn index(&self) -> Result<&SimilarityIndex, EngineError> {
        match &self.state {
            State::Ready(index) => Ok(index),
            State::Unindexed(_) => Err(EngineError::IndexNotReady),
        }
    }

    /// Embed every highlight and move to the ready state.
    ///
    /// Calling this on a ready engine does nothing.
    pub fn compute_embeddings(&mut self) -> Result<(), EngineError> {
        let Some(texts) = self.pending_texts() else {
            return Ok(());
        };

        let started = Instant::now();
        let vectors = embed_all(self.embedder.as_ref(), &texts)?;
        self.install(vectors, started)
    }

    /// Same as [`compute_embeddings`](Self::compute_embeddings), but gives up
    /// after `timeout`. The embedding call itself cannot be interrupted; on
    /// timeout its worker thread is abandoned and the engine stays unindexed.
    pub fn compute_embeddings_within(&mut self, timeout: Duration) -> Result<(), EngineError> {
        let Some(texts) = self.pending_texts() else {
            return Ok(());
        };

        let started = Instant::now();
        let embedder = Arc::clone(&self.embedder);
        let (tx, rx) = mpsc::channel();
        std::thread::spawn(move || {
            let _ = tx.send(embed_all(embedder.as_ref(), &texts));
        });

        let vectors = match rx.recv_timeout(timeout) {
            Ok(result) => result?,
            Err(mpsc::RecvTimeoutError::Timeout) => {
                log::error!("Embedding timed out after {:?}", timeout);
                return Err(EngineError::EmbeddingTimeout(timeout));
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                return Err(EmbeddingError::EmbeddingFailed(
                    "embedding worker exited without a result".to_string(),
                )
                .into());
            }
        };

        self.install(vectors, started)
    }

    /// Highlights most similar to `query`, highest first.
    pub fn find_similar(&self, query: &str, k: usize) -> Result<Vec<ScoredHighlight<'_>>, EngineError> {
        let index = self.index()?;
        if index.is_empty() {
            return Err(EngineError::EmptyIndex);
        }

        let query_vector = embed_all(self.embedder.as_ref(), &[prepare_text(query)])?
            .pop()
            .ok_or(EngineError::VectorCountMismatch { expected: 1, got: 0 })?;

        let neighbors = index.nearest(&query_vector, k)?;
        Ok(neighbors
            .into_iter()
            .map(|n| ScoredHighlight {
                similarity: n.similarity,
                highlight: &index.highlights()[n.index],
            })
            .collect())
    }

    /// Summary of one book, matched case-insensitively. `None` when the
    /// title is unknown.
    pub fn book_insights(&self, book_title: &str) -> Result<Option<BookInsights<'_>>, EngineError> {
        let index = self.index()?;
        let Some(book) = index.book(book_title) else {
            return Ok(None);
        };

        let centroid = index.centroid(&book.indices);
        let representative_highlights = index
            .nearest_among(&centroid, Some(&book.indices), self.settings.representative_count)?
            .into_iter()
            .map(|n| ScoredHighlight {
                similarity: n.similarity,
                highlight: &index.highlights()[n.index],
            })
            .collect();

        let temporal_distribution =
            temporal_distribution(book.indices.iter().map(|&i| &index.highlights()[i]));

        Ok(Some(BookInsights {
            book_title: &book.title,
            total_highlights: book.indices.len(),
            representative_highlights,
            temporal_distribution,
        }))
    }

    /// Cross-book pairs with similarity `>= min_similarity`, highest first.
    /// Callers decide how many to show.
    pub fn find_connections(&self, min_similarity: f32) -> Result<Vec<Connection<'_>>, EngineError> {
        let index = self.index()?;
        let highlights = index.highlights();

        Ok(index
            .pairwise_above(min_similarity, true)
            .into_iter()
            .map(|p| Connection {
                similarity: p.similarity,
                first: &highlights[p.first],
                second: &highlights[p.second],
            })
            .collect())
    }

    /// Embedding inputs while unindexed, `None` once ready.
    fn pending_texts(&self) -> Option<Vec<String>> {
        match &self.state {
            State::Unindexed(highlights) => {
                Some(highlights.iter().map(|h| prepare_text(&h.content)).collect())
            }
            State::Ready(_) => None,
        }
    }

    fn install(&mut self, vectors: Vec<Vec<f32>>, started: Instant) -> Result<(), EngineError> {
        let State::Unindexed(highlights) = &mut self.state else {
            return Ok(());
        };

        // Rejected vectors must leave the highlights in place
        check_vectors(highlights.len(), &vectors)?;
        let index = SimilarityIndex::from_parts(std::mem::take(highlights), vectors)?
            .with_window(self.settings.pairwise_window);

        log::info!(
            "Embedded {} highlights with '{}' ({} dimensions) in {:.2?}",
            index.len(),
            self.embedder.name(),
            self.embedder.dimensions(),
            started.elapsed()
        );

        self.state = State::Ready(index);
        Ok(())
    }
}

/// One batched embedder call, checked for a vector per input.
fn embed_all(embedder: &dyn Embedder, texts: &[String]) -> Result<Vec<Vec<f32>>, EngineError> {
    if texts.is_empty() {
        return Ok(Vec::new());
    }

    log::info!("Computing embeddings for {} texts with '{}'", texts.len(), embedder.name());
    let vectors = embedder.embed(texts)?;
    if vectors.len() != texts.len() {
        return Err(EngineError::VectorCountMismatch {
            expected: texts.len(),
            got: vectors.len(),
        });
    }

    Ok(vectors)
}

/// Earliest and latest timestamps among `highlights`; `None` if none are dated.
pub fn temporal_distribution<'a>(
    highlights: impl IntoIterator<Item = &'a Highlight>,
) -> Option<TemporalDistribution> {
    let mut stamps = highlights.into_iter().filter_map(|h| h.timestamp);
    let first = stamps.next()?;
    let (first_highlight, last_highlight) =
        stamps.fold((first, first), |(lo, hi), ts| (lo.min(ts), hi.max(ts)));

    Some(TemporalDistribution {
        first_highlight,
        last_highlight,
        total_days: (last_highlight.date() - first_highlight.date()).num_days() + 1,
    })
}
