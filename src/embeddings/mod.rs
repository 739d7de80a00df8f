pub mod openai;
pub mod similarity;

pub use openai::OpenAIEmbedder;
pub use similarity::cosine_similarity;

use crate::error::Result;
use async_trait::async_trait;

/// Turns text into fixed-length vectors.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Length of every vector this embedder returns
    fn dimensions(&self) -> usize;

    /// Embed a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed a search query. Implementations may cache these.
    async fn embed_query(&self, query: &str) -> Result<Vec<f32>> {
        self.embed(query).await
    }

    /// Embed several texts, preserving input order
    async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in &texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }
}
