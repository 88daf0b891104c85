//! External answer sources the router talks to.
//!
//! The router only depends on these traits; the concrete HTTP and vector-index
//! implementations live in the submodules.

pub mod generation;
pub mod retrieval;
pub mod wikipedia;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub use generation::ChatCompletionsClient;
pub use retrieval::VectorRetriever;
pub use wikipedia::WikipediaClient;

/// One retrieved text passage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    pub content: String,
}

impl Passage {
    pub fn new(content: impl Into<String>) -> Self {
        Self { content: content.into() }
    }
}

/// Similarity search over the user's documents.
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Return up to `k` passages, most similar first. An empty result is valid.
    async fn similarity_search(&self, query: &str, k: usize) -> Result<Vec<Passage>>;
}

/// Text generation by a language model.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Complete a single-turn prompt.
    async fn complete(&self, prompt: &str) -> Result<String>;

    /// Provider label reported in traces (e.g. "huggingface").
    fn provider(&self) -> &str;

    /// Model name reported in traces.
    fn model(&self) -> &str;
}

/// Short factual summaries by topic.
#[async_trait]
pub trait Encyclopedia: Send + Sync {
    /// Summarize `topic` in at most `sentences` sentences, or `None` if no page matches.
    async fn summarize(&self, topic: &str, sentences: usize) -> Result<Option<String>>;
}
