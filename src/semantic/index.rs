//! In-memory similarity index over highlight vectors.
//!
//! Stores every highlight next to its embedding and provides exact cosine
//! similarity search:
//! - nearest neighbours to an arbitrary query vector
//! - all-pairs sweeps above a threshold, optionally across books only
//!
//! The index is built once and never mutated; per-book groupings and vector
//! norms are derived at construction.

use std::cmp::Ordering;
use std::collections::HashMap;

use rayon::prelude::*;

use crate::clippings::Highlight;

/// Default number of neighbours returned by [`SimilarityIndex::nearest`]
pub const DEFAULT_TOP_K: usize = 5;

/// Default number of rows per pairwise work unit
pub const DEFAULT_PAIRWISE_WINDOW: usize = 128;

/// Highlights of one book, in parse order.
#[derive(Debug, Clone)]
pub struct BookGroup {
    /// Title as it appeared on the book's first highlight
    pub title: String,
    /// Positions in the index
    pub indices: Vec<usize>,
}

/// One ranked entry from a nearest-neighbour query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub index: usize,
    pub similarity: f32,
}

/// One unordered pair from a pairwise sweep, `first < second`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pair {
    pub first: usize,
    pub second: usize,
    pub similarity: f32,
}

pub struct SimilarityIndex {
    highlights: Vec<Highlight>,
    vectors: Vec<Vec<f32>>,
    norms: Vec<f32>,
    dimensions: usize,
    books: Vec<BookGroup>,
    /// Lowercased title -> position in `books`
    book_lookup: HashMap<String, usize>,
    /// Highlight position -> position in `books`
    book_of: Vec<usize>,
    window: usize,
}

impl SimilarityIndex {
    pub fn from_parts(
        highlights: Vec<Highlight>,
        vectors: Vec<Vec<f32>>,
    ) -> Result<Self, IndexError> {
        let dimensions = check_vectors(highlights.len(), &vectors)?;
        let norms = vectors.iter().map(|v| l2_norm(v)).collect();

        let mut books: Vec<BookGroup> = Vec::new();
        let mut book_lookup = HashMap::new();
        let mut book_of = Vec::with_capacity(highlights.len());
        for (idx, highlight) in highlights.iter().enumerate() {
            let key = highlight.book_title.to_lowercase();
            let group = *book_lookup.entry(key).or_insert_with(|| {
                books.push(BookGroup {
                    title: highlight.book_title.clone(),
                    indices: Vec::new(),
                });
                books.len() - 1
            });
            books[group].indices.push(idx);
            book_of.push(group);
        }

        log::debug!(
            "Built similarity index: {} highlights, {} books, {} dimensions",
            highlights.len(),
            books.len(),
            dimensions
        );

        Ok(Self {
            highlights,
            vectors,
            norms,
            dimensions,
            books,
            book_lookup,
            book_of,
            window: DEFAULT_PAIRWISE_WINDOW,
        })
    }

    /// Set the number of rows processed per pairwise work unit.
    pub fn with_window(mut self, window: usize) -> Self {
        self.window = window.max(1);
        self
    }

    pub fn len(&self) -> usize {
        self.highlights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.highlights.is_empty()
    }

    pub fn highlights(&self) -> &[Highlight] {
        &self.highlights
    }

    /// Case-insensitive exact title lookup.
    pub fn book(&self, title: &str) -> Option<&BookGroup> {
        self.book_lookup
            .get(&title.trim().to_lowercase())
            .map(|&group| &self.books[group])
    }

    /// Cosine similarity between two indexed highlights.
    pub fn similarity(&self, a: usize, b: usize) -> f32 {
        cosine_with_norms(&self.vectors[a], self.norms[a], &self.vectors[b], self.norms[b])
    }

    /// The `k` highlights most similar to `query`, highest first.
    /// Ties keep parse order.
    pub fn nearest(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>, IndexError> {
        self.nearest_among(query, None, k)
    }

    /// Like [`nearest`](Self::nearest), restricted to `candidates` when given.
    pub fn nearest_among(
        &self,
        query: &[f32],
        candidates: Option<&[usize]>,
        k: usize,
    ) -> Result<Vec<Neighbor>, IndexError> {
        self.check_dimensions(query)?;

        let query_norm = l2_norm(query);
        let score = |index: usize| Neighbor {
            index,
            similarity: cosine_with_norms(query, query_norm, &self.vectors[index], self.norms[index]),
        };

        let mut results: Vec<Neighbor> = match candidates {
            Some(ids) => ids
                .iter()
                .copied()
                .filter(|&i| i < self.len())
                .map(score)
                .collect(),
            None => (0..self.len()).map(score).collect(),
        };

        results.sort_by(|a, b| by_similarity_desc(a.similarity, b.similarity).then(a.index.cmp(&b.index)));
        results.truncate(k);

        Ok(results)
    }

    /// Every unordered pair with similarity `>= min_similarity`, highest first.
    ///
    /// With `exclude_same_book`, pairs whose highlights belong to the same
    /// book are dropped.
    pub fn pairwise_above(&self, min_similarity: f32, exclude_same_book: bool) -> Vec<Pair> {
        self.pairwise_above_windowed(min_similarity, exclude_same_book, self.window)
    }

    /// Pairwise sweep processed in row windows of `window` rows each.
    ///
    /// Windows run on the rayon pool; the output does not depend on `window`.
    pub fn pairwise_above_windowed(
        &self,
        min_similarity: f32,
        exclude_same_book: bool,
        window: usize,
    ) -> Vec<Pair> {
        let n = self.len();
        let window = window.max(1);
        let starts: Vec<usize> = (0..n).step_by(window).collect();

        let mut pairs: Vec<Pair> = starts
            .par_iter()
            .flat_map_iter(|&start| {
                let end = (start + window).min(n);
                let mut found = Vec::new();
                for i in start..end {
                    for j in (i + 1)..n {
                        if exclude_same_book && self.book_of[i] == self.book_of[j] {
                            continue;
                        }
                        let similarity = self.similarity(i, j);
                        if similarity >= min_similarity {
                            found.push(Pair {
                                first: i,
                                second: j,
                                similarity,
                            });
                        }
                    }
                }
                found
            })
            .collect();

        pairs.sort_by(|a, b| {
            by_similarity_desc(a.similarity, b.similarity)
                .then(a.first.cmp(&b.first))
                .then(a.second.cmp(&b.second))
        });

        log::debug!(
            "Pairwise sweep over {} highlights found {} pairs >= {:.3}",
            n,
            pairs.len(),
            min_similarity
        );

        pairs
    }

    /// Mean of the vectors at `indices`. Empty input yields a zero vector.
    pub fn centroid(&self, indices: &[usize]) -> Vec<f32> {
        let mut centroid = vec![0.0f32; self.dimensions];
        if indices.is_empty() {
            return centroid;
        }

        for &i in indices {
            for (c, v) in centroid.iter_mut().zip(&self.vectors[i]) {
                *c += v;
            }
        }

        let count = indices.len() as f32;
        for c in &mut centroid {
            *c /= count;
        }

        centroid
    }

    fn check_dimensions(&self, query: &[f32]) -> Result<(), IndexError> {
        if !self.is_empty() && query.len() != self.dimensions {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimensions,
                got: query.len(),
            });
        }
        Ok(())
    }
}

/// Checks one vector per highlight and a shared dimensionality, which is returned.
pub fn check_vectors(highlights: usize, vectors: &[Vec<f32>]) -> Result<usize, IndexError> {
    if highlights != vectors.len() {
        return Err(IndexError::LengthMismatch {
            highlights,
            vectors: vectors.len(),
        });
    }

    let dimensions = vectors.first().map(|v| v.len()).unwrap_or(0);
    if let Some(bad) = vectors.iter().find(|v| v.len() != dimensions) {
        return Err(IndexError::DimensionMismatch {
            expected: dimensions,
            got: bad.len(),
        });
    }

    Ok(dimensions)
}

/// Cosine similarity from precomputed norms. Zero vectors score 0 against everything.
fn cosine_with_norms(a: &[f32], norm_a: f32, b: &[f32], norm_b: f32) -> f32 {
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    (dot_product / (norm_a * norm_b)).clamp(-1.0, 1.0)
}

/// Compute L2 norm of a vector.
fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

fn by_similarity_desc(a: f32, b: f32) -> Ordering {
    b.partial_cmp(&a).unwrap_or(Ordering::Equal)
}

/// Errors that can occur during index operations.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("Got {vectors} vectors for {highlights} highlights")]
    LengthMismatch { highlights: usize, vectors: usize },
}
