//! The knowledge base behind `/ask`: the currently active document index.
//!
//! Starts empty (or with the index persisted by a previous run). Each
//! successful ingestion builds a new index and swaps it in; requests already
//! holding the previous retriever finish against it.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::config::{Config, PerformanceConfig};
use crate::db::Db;
use crate::embeddings::Embedder;
use crate::error::{AskragError, Result};
use crate::index::{load_active_index, save_index, VectorIndex};
use crate::ingest::{file_extension, load_and_chunk, ParserRegistry};
use crate::sources::VectorRetriever;

/// Outcome of ingesting one file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestReport {
    pub filename: String,
    pub chunks: usize,
}

pub struct KnowledgeBase {
    db: Db,
    embedder: Arc<dyn Embedder>,
    registry: ParserRegistry,
    performance: PerformanceConfig,
    data_dir: PathBuf,
    active: RwLock<Option<Arc<VectorRetriever>>>,
}

impl KnowledgeBase {
    /// An empty knowledge base. Call [`KnowledgeBase::restore`] to pick up a
    /// persisted index.
    pub fn new(
        db: Db,
        embedder: Arc<dyn Embedder>,
        performance: PerformanceConfig,
        data_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            db,
            embedder,
            registry: ParserRegistry::new(),
            performance,
            data_dir: data_dir.into(),
            active: RwLock::new(None),
        }
    }

    /// Open the database from config and restore any persisted index.
    pub async fn open(config: &Config, embedder: Arc<dyn Embedder>) -> Result<Self> {
        let db = Db::new(config.db_path());
        db.init_schema().await?;

        let kb = Self::new(db, embedder, config.performance.clone(), config.data_dir());
        kb.restore().await?;
        Ok(kb)
    }

    /// Load the persisted index, if any. Returns whether one was found.
    pub async fn restore(&self) -> Result<bool> {
        match load_active_index(&self.db).await? {
            Some(index) => {
                log::info!(
                    "Restored index for {} ({} chunks)",
                    index.filename(),
                    index.len()
                );
                self.activate(index).await;
                Ok(true)
            }
            None => {
                log::info!("No persisted index; answering without documents until one is ingested");
                Ok(false)
            }
        }
    }

    /// The retriever for the active index, or `None` before any ingestion.
    pub async fn retriever(&self) -> Option<Arc<VectorRetriever>> {
        self.active.read().await.clone()
    }

    /// Filename of the active document, if any.
    pub async fn active_document(&self) -> Option<String> {
        self.active
            .read()
            .await
            .as_ref()
            .map(|r| r.index().filename().to_string())
    }

    async fn activate(&self, index: VectorIndex) {
        let retriever = VectorRetriever::new(Arc::new(index), self.embedder.clone());
        *self.active.write().await = Some(Arc::new(retriever));
    }

    /// Ingest a file already on disk and make it the active index.
    pub async fn ingest_path(&self, path: &Path) -> Result<IngestReport> {
        let start = std::time::Instant::now();
        let (document, chunks) = load_and_chunk(path, &self.registry, &self.performance)?;

        let texts: Vec<String> = chunks.into_iter().map(|c| c.text).collect();
        let embeddings = self.embedder.embed_batch(texts.clone()).await?;
        let index = VectorIndex::build(
            document.filename.clone(),
            document.source_hash,
            texts,
            embeddings,
        )?;

        save_index(&self.db, &index).await?;

        let report = IngestReport {
            filename: document.filename,
            chunks: index.len(),
        };
        self.activate(index).await;

        log::info!(
            "Ingested {} into {} chunks in {:?}",
            report.filename,
            report.chunks,
            start.elapsed()
        );
        Ok(report)
    }

    /// Save uploaded bytes under the data directory, then ingest them.
    ///
    /// Unsupported types are rejected before anything is written.
    pub async fn ingest_upload(&self, filename: &str, bytes: &[u8]) -> Result<IngestReport> {
        let name = Path::new(filename)
            .file_name()
            .and_then(|n| n.to_str())
            .filter(|n| !n.trim().is_empty())
            .ok_or_else(|| {
                AskragError::InvalidInput(format!("Invalid upload filename: {:?}", filename))
            })?;

        let saved = self.data_dir.join(name);
        self.registry.check_supported(name, &file_extension(&saved))?;

        tokio::fs::create_dir_all(&self.data_dir).await?;
        tokio::fs::write(&saved, bytes).await?;
        log::debug!("Saved upload to {}", saved.display());

        self.ingest_path(&saved).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::retrieval::tests::KeywordEmbedder;
    use crate::sources::{Passage, Retriever};
    use tempfile::TempDir;

    fn performance() -> PerformanceConfig {
        PerformanceConfig {
            chunk_size_tokens: 250,
            chunk_overlap_tokens: 25,
        }
    }

    async fn knowledge_base(temp_dir: &TempDir) -> KnowledgeBase {
        let db = Db::new(temp_dir.path().join("askrag.db"));
        db.init_schema().await.unwrap();
        KnowledgeBase::new(
            db,
            Arc::new(KeywordEmbedder),
            performance(),
            temp_dir.path().join("uploads"),
        )
    }

    #[tokio::test]
    async fn test_starts_empty() {
        let temp_dir = TempDir::new().unwrap();
        let kb = knowledge_base(&temp_dir).await;

        assert!(!kb.restore().await.unwrap());
        assert!(kb.retriever().await.is_none());
        assert!(kb.active_document().await.is_none());
    }

    #[tokio::test]
    async fn test_upload_activates_index() {
        let temp_dir = TempDir::new().unwrap();
        let kb = knowledge_base(&temp_dir).await;

        let csv = b"city,fact\nParis,capital of France\nBerlin,capital of Germany\n";
        let report = kb.ingest_upload("cities.csv", csv).await.unwrap();

        assert_eq!(report, IngestReport { filename: "cities.csv".to_string(), chunks: 2 });
        assert!(temp_dir.path().join("uploads").join("cities.csv").exists());

        let retriever = kb.retriever().await.unwrap();
        let passages = retriever.similarity_search("paris", 1).await.unwrap();
        assert_eq!(passages, vec![Passage::new("city: Paris\nfact: capital of France")]);
    }

    #[tokio::test]
    async fn test_ingest_replaces_active_index() {
        let temp_dir = TempDir::new().unwrap();
        let kb = knowledge_base(&temp_dir).await;

        kb.ingest_upload("a.txt", b"Paris is lovely.").await.unwrap();
        let first = kb.retriever().await.unwrap();
        kb.ingest_upload("b.txt", b"Berlin is lively.").await.unwrap();

        assert_eq!(kb.active_document().await.as_deref(), Some("b.txt"));
        // A request that grabbed the old retriever keeps working against it.
        assert_eq!(first.index().filename(), "a.txt");
    }

    #[tokio::test]
    async fn test_restore_after_restart() {
        let temp_dir = TempDir::new().unwrap();
        {
            let kb = knowledge_base(&temp_dir).await;
            kb.ingest_upload("notes.md", b"# Paris\n\nCapital of France.\n").await.unwrap();
        }

        let kb = knowledge_base(&temp_dir).await;
        assert!(kb.restore().await.unwrap());
        assert_eq!(kb.active_document().await.as_deref(), Some("notes.md"));
    }

    #[tokio::test]
    async fn test_unsupported_upload_not_saved() {
        let temp_dir = TempDir::new().unwrap();
        let kb = knowledge_base(&temp_dir).await;

        let err = kb.ingest_upload("scan.pdf", b"%PDF-1.7").await.unwrap_err();

        assert!(matches!(err, AskragError::UnsupportedDocumentType(_)));
        assert!(!temp_dir.path().join("uploads").join("scan.pdf").exists());
        assert!(kb.retriever().await.is_none());
    }

    #[tokio::test]
    async fn test_upload_filename_cannot_escape_data_dir() {
        let temp_dir = TempDir::new().unwrap();
        let kb = knowledge_base(&temp_dir).await;

        let report = kb.ingest_upload("../../evil.txt", b"Bread is baked.").await.unwrap();

        assert_eq!(report.filename, "evil.txt");
        assert!(temp_dir.path().join("uploads").join("evil.txt").exists());
        assert!(kb.ingest_upload("..", b"x").await.is_err());
    }
}
