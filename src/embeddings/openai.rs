use crate::cache::EmbeddingCache;
use crate::config::EmbeddingsConfig;
use crate::embeddings::Embedder;
use crate::error::{GraphragError, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Request structure for the embeddings API
#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

/// Response structure from the embeddings API
#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

/// Individual embedding data in API response
#[derive(Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

/// Outcome of a single failed request
enum RequestError {
    /// 429 or 5xx: worth another attempt
    Retryable(GraphragError),
    Fatal(GraphragError),
}

impl RequestError {
    fn into_inner(self) -> GraphragError {
        match self {
            RequestError::Retryable(e) | RequestError::Fatal(e) => e,
        }
    }
}

/// Client for OpenAI-compatible `/embeddings` endpoints
///
/// Splits large inputs into batches, retries rate-limit and server errors with
/// exponential backoff, and optionally caches query embeddings.
pub struct OpenAIEmbedder {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    batch_size: usize,
    dimensions: usize,
    max_retries: usize,
    cache: Option<Arc<EmbeddingCache>>,
}

impl OpenAIEmbedder {
    /// Create a new embedder against the default OpenAI endpoint
    ///
    /// `batch_size` is capped at 2048 (the API's per-request input limit).
    pub fn new(api_key: String, model: String, batch_size: usize, dimensions: usize) -> Result<Self> {
        let client = build_client(Duration::from_secs(30))?;

        Ok(Self {
            client,
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            model,
            batch_size: batch_size.clamp(1, 2048),
            dimensions,
            max_retries: 3,
            cache: None,
        })
    }

    /// Build an embedder from the `[embeddings]` config section
    ///
    /// A `cache_capacity` of 0 disables the query cache.
    pub fn from_config(config: &EmbeddingsConfig, api_key: String) -> Result<Self> {
        let cache = if config.cache_capacity > 0 {
            Some(Arc::new(EmbeddingCache::new(config.cache_capacity)))
        } else {
            None
        };

        let mut embedder = Self::new(
            api_key,
            config.model.clone(),
            config.batch_size,
            config.dimensions,
        )?
        .with_base_url(&config.base_url)
        .with_max_retries(config.max_retries);
        embedder.cache = cache;
        embedder.client = build_client(config.timeout())?;

        Ok(embedder)
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_cache(mut self, cache: Arc<EmbeddingCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn cache(&self) -> Option<&Arc<EmbeddingCache>> {
        self.cache.as_ref()
    }

    /// Embed a query text, consulting the cache first
    pub async fn embed_with_cache(&self, text: &str) -> Result<Vec<f32>> {
        if let Some(cache) = &self.cache {
            if let Some(cached) = cache.get(text) {
                log::debug!("Embedding cache hit for: {}", text);
                return Ok(cached);
            }
        }

        let mut embeddings = self.embed_with_retry(&[text.to_string()]).await?;
        let embedding = embeddings
            .pop()
            .ok_or_else(|| GraphragError::Embedding("Empty response from embedding API".to_string()))?;

        if let Some(cache) = &self.cache {
            cache.put(text.to_string(), embedding.clone());
        }

        Ok(embedding)
    }

    /// One logical request, retried on 429/5xx with exponential backoff
    async fn embed_with_retry(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let start = std::time::Instant::now();
        let mut attempt = 0;
        let mut delay = Duration::from_secs(1);

        loop {
            match self.request(texts).await {
                Ok(embeddings) => {
                    log::debug!(
                        "Embedding API call for {} text(s) took {:?} (attempt {})",
                        texts.len(),
                        start.elapsed(),
                        attempt + 1
                    );
                    return Ok(embeddings);
                }
                Err(RequestError::Retryable(e)) if attempt < self.max_retries => {
                    log::warn!("Retry {}/{} after error: {}", attempt + 1, self.max_retries, e);
                    tokio::time::sleep(delay).await;
                    delay = (delay * 2).min(MAX_BACKOFF);
                    attempt += 1;
                }
                Err(e) => return Err(e.into_inner()),
            }
        }
    }

    async fn request(&self, texts: &[String]) -> std::result::Result<Vec<Vec<f32>>, RequestError> {
        let request = EmbeddingRequest {
            model: &self.model,
            input: texts,
        };

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                let err = GraphragError::Embedding(format!("Network error: {}", e));
                if e.is_timeout() {
                    RequestError::Retryable(err)
                } else {
                    RequestError::Fatal(err)
                }
            })?;

        let status = response.status();

        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            let err = GraphragError::Embedding(format!("API error {}: {}", status, body));
            return Err(if is_retryable(status) {
                RequestError::Retryable(err)
            } else {
                RequestError::Fatal(err)
            });
        }

        let mut result: EmbeddingResponse = response.json().await.map_err(|e| {
            RequestError::Fatal(GraphragError::Embedding(format!("Failed to parse response: {}", e)))
        })?;

        if result.data.len() != texts.len() {
            return Err(RequestError::Fatal(GraphragError::Embedding(format!(
                "Expected {} embeddings, got {}",
                texts.len(),
                result.data.len()
            ))));
        }

        result.data.sort_by_key(|d| d.index);

        let mut embeddings = Vec::with_capacity(result.data.len());
        for data in result.data {
            if data.embedding.len() != self.dimensions {
                return Err(RequestError::Fatal(GraphragError::Embedding(format!(
                    "Unexpected embedding dimension: expected {}, got {}",
                    self.dimensions,
                    data.embedding.len()
                ))));
            }
            embeddings.push(data.embedding);
        }

        Ok(embeddings)
    }
}

fn build_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| GraphragError::Http(format!("Failed to build HTTP client: {}", e)))
}

fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_with_retry(&[text.to_string()])
            .await?
            .pop()
            .ok_or_else(|| GraphragError::Embedding("Empty response from embedding API".to_string()))
    }

    async fn embed_query(&self, query: &str) -> Result<Vec<f32>> {
        self.embed_with_cache(query).await
    }

    async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut all_embeddings = Vec::with_capacity(texts.len());

        for chunk in texts.chunks(self.batch_size) {
            let embeddings = self.embed_with_retry(chunk).await?;
            all_embeddings.extend(embeddings);

            // Rate limiting between full batches
            if chunk.len() == self.batch_size {
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        }

        Ok(all_embeddings)
    }
}
