//! In-memory vector index over document chunks.
//!
//! Exactly one index is active at a time. It is built from a freshly ingested
//! document, persisted to SQLite, and reloaded from there on startup.

pub mod storage;

use chrono::{DateTime, Utc};

use crate::error::{AskragError, Result};

pub use storage::{load_active_index, save_index};

/// One chunk and its embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    pub content: String,
    pub embedding: Vec<f32>,
}

/// A search hit.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredEntry<'a> {
    pub score: f32,
    pub entry: &'a IndexEntry,
}

#[derive(Debug, Clone)]
pub struct VectorIndex {
    id: String,
    filename: String,
    source_hash: String,
    created_at: DateTime<Utc>,
    dimension: usize,
    entries: Vec<IndexEntry>,
}

impl VectorIndex {
    /// Build an index from chunk texts and their embeddings (same order).
    pub fn build(
        filename: impl Into<String>,
        source_hash: impl Into<String>,
        chunks: Vec<String>,
        embeddings: Vec<Vec<f32>>,
    ) -> Result<Self> {
        if chunks.len() != embeddings.len() {
            return Err(AskragError::Retrieval(format!(
                "{} chunks but {} embeddings",
                chunks.len(),
                embeddings.len()
            )));
        }
        let entries = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(content, embedding)| IndexEntry { content, embedding })
            .collect();

        Self::from_parts(
            uuid::Uuid::new_v4().to_string(),
            filename.into(),
            source_hash.into(),
            Utc::now(),
            entries,
        )
    }

    pub(crate) fn from_parts(
        id: String,
        filename: String,
        source_hash: String,
        created_at: DateTime<Utc>,
        entries: Vec<IndexEntry>,
    ) -> Result<Self> {
        let dimension = entries.first().map_or(0, |e| e.embedding.len());
        if dimension == 0 && !entries.is_empty() {
            return Err(AskragError::Retrieval("empty embedding vector".to_string()));
        }
        if let Some(bad) = entries.iter().find(|e| e.embedding.len() != dimension) {
            return Err(AskragError::Retrieval(format!(
                "inconsistent embedding dimensions: expected {}, got {}",
                dimension,
                bad.embedding.len()
            )));
        }

        Ok(Self {
            id,
            filename,
            source_hash,
            created_at,
            dimension,
            entries,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn source_hash(&self) -> &str {
        &self.source_hash
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The `k` entries most similar to `query`, best first.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredEntry<'_>>> {
        if self.entries.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        if query.len() != self.dimension {
            return Err(AskragError::Retrieval(format!(
                "query embedding has {} dimensions, index has {}",
                query.len(),
                self.dimension
            )));
        }

        let mut scored: Vec<ScoredEntry<'_>> = self
            .entries
            .iter()
            .map(|entry| ScoredEntry {
                score: cosine_similarity(query, &entry.embedding),
                entry,
            })
            .collect();
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(k);
        Ok(scored)
    }
}

/// Cosine similarity, or 0.0 if either vector has zero magnitude. Callers
/// guarantee equal lengths.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let mag_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }
    dot / (mag_a * mag_b)
}
