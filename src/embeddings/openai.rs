use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use super::Embedder;
use crate::cache::EmbeddingCache;
use crate::config::{is_local_endpoint, EmbeddingsConfig};
use crate::error::{AskragError, Result};

/// Most inputs the embeddings API accepts in one request.
const MAX_BATCH_SIZE: usize = 2048;
const MAX_RETRIES: usize = 3;

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

/// Client for an OpenAI-compatible `/embeddings` endpoint.
///
/// Batches large inputs, retries rate limits and server errors with
/// exponential backoff, and optionally caches query embeddings.
pub struct OpenAIEmbedder {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    batch_size: usize,
    cache: Option<Arc<EmbeddingCache>>,
}

impl OpenAIEmbedder {
    pub fn new(
        config: &EmbeddingsConfig,
        api_key: Option<String>,
        cache: Option<Arc<EmbeddingCache>>,
    ) -> Result<Self> {
        if api_key.is_none() && !is_local_endpoint(&config.base_url) {
            return Err(AskragError::Config(format!(
                "Environment variable {} not set. Set it in your .env file or as an environment variable.",
                config.api_key_env
            )));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| AskragError::Embedding(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
            batch_size: config.batch_size.clamp(1, MAX_BATCH_SIZE),
            cache,
        })
    }

    /// Build from config: token from the configured env var, LRU cache when
    /// `cache_capacity > 0`.
    pub fn from_config(config: &EmbeddingsConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env).ok().filter(|k| !k.is_empty());
        let cache = (config.cache_capacity > 0)
            .then(|| Arc::new(EmbeddingCache::new(config.cache_capacity)));
        Self::new(config, api_key, cache)
    }

    async fn request(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut builder = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .json(&EmbeddingRequest {
                model: &self.model,
                input: texts,
            });
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| AskragError::Embedding(format!("Network error: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            return Err(AskragError::Embedding(format!("API error {}: {}", status, body)));
        }

        let result: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| AskragError::Embedding(format!("Failed to parse response: {}", e)))?;

        if result.data.len() != texts.len() {
            return Err(AskragError::Embedding(format!(
                "Expected {} embeddings, got {}",
                texts.len(),
                result.data.len()
            )));
        }
        Ok(result.data.into_iter().map(|d| d.embedding).collect())
    }

    async fn request_with_retry(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut attempt = 0;
        let mut delay = Duration::from_secs(1);

        loop {
            match self.request(texts).await {
                Ok(embeddings) => return Ok(embeddings),
                Err(e) if attempt < MAX_RETRIES && is_retryable(&e) => {
                    log::warn!("Retry {}/{} after error: {}", attempt + 1, MAX_RETRIES, e);
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Rate limits and server-side failures are worth retrying.
fn is_retryable(err: &AskragError) -> bool {
    let msg = err.to_string();
    ["429", "500", "502", "503", "504"].iter().any(|code| msg.contains(code))
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        if let Some(cache) = &self.cache {
            if let Some(cached) = cache.get(text) {
                log::debug!("Embedding cache hit for query: {}", text);
                return Ok(cached);
            }
        }

        let start = std::time::Instant::now();
        let embedding = self
            .request_with_retry(&[text.to_string()])
            .await?
            .pop()
            .ok_or_else(|| {
                AskragError::Embedding("Empty response from embeddings API".to_string())
            })?;
        log::debug!("Query embedding took {:?}", start.elapsed());

        if let Some(cache) = &self.cache {
            cache.put(text.to_string(), embedding.clone());
        }
        Ok(embedding)
    }

    async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let mut all = Vec::with_capacity(texts.len());

        for batch in texts.chunks(self.batch_size) {
            all.extend(self.request_with_retry(batch).await?);

            // Small pause between full batches to stay under rate limits.
            if batch.len() == self.batch_size && all.len() < texts.len() {
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        }

        Ok(all)
    }
}
