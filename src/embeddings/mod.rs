pub mod openai;

use async_trait::async_trait;

use crate::error::Result;

pub use openai::OpenAIEmbedder;

/// Text embedding model.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a search query. Implementations may cache.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed many texts, returning one vector per input in order.
    async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>>;
}
