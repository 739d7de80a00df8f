use crate::config::WebConfig;
use crate::embeddings::{cosine_similarity, Embedder};
use crate::error::{GraphragError, Result};
use crate::web::graph::{WebGraph, WebNode};
use crate::web::scraper::WebScraper;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// One ranked page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub url: String,
    /// Leading characters of the page text followed by `...`
    pub content: String,
    pub similarity: f32,
    pub neighbors: Vec<String>,
}

/// Similarity search over a small graph of scraped pages.
pub struct WebGraphRag {
    scraper: WebScraper,
    embedder: Box<dyn Embedder>,
    graph: WebGraph,
    content_cache: HashMap<String, String>,
    embedding_cache: HashMap<String, Vec<f32>>,
    preview_chars: usize,
}

impl WebGraphRag {
    pub fn new(scraper: WebScraper, embedder: Box<dyn Embedder>) -> Self {
        Self {
            scraper,
            embedder,
            graph: WebGraph::new(),
            content_cache: HashMap::new(),
            embedding_cache: HashMap::new(),
            preview_chars: 500,
        }
    }

    pub fn from_config(config: &WebConfig, embedder: Box<dyn Embedder>) -> Result<Self> {
        let scraper = WebScraper::new(config.fetch_timeout())?;
        Ok(Self::new(scraper, embedder).with_preview_chars(config.preview_chars))
    }

    pub fn with_preview_chars(mut self, preview_chars: usize) -> Self {
        self.preview_chars = preview_chars;
        self
    }

    pub fn graph(&self) -> &WebGraph {
        &self.graph
    }

    pub fn content(&self, url: &str) -> Option<&str> {
        self.content_cache.get(url).map(String::as_str)
    }

    pub fn embedding(&self, url: &str) -> Option<&[f32]> {
        self.embedding_cache.get(url).map(Vec::as_slice)
    }

    /// Scrape, embed and insert `url`. No-op if it is already a node.
    pub async fn add_node(&mut self, url: &str) -> Result<()> {
        if self.graph.contains(url) {
            return Ok(());
        }

        let content = self.scraper.scrape(url).await;
        let embedding = if content.is_empty() {
            self.empty_embedding(url)
        } else {
            self.embedder.embed(&content).await?
        };

        self.insert(url, content, embedding);
        Ok(())
    }

    /// Like [`add_node`](Self::add_node) for several URLs, with one batched
    /// embedding call for all non-empty pages. Nothing is inserted unless the
    /// batch returns one embedding per page.
    pub async fn add_nodes<S: AsRef<str>>(&mut self, urls: &[S]) -> Result<()> {
        let mut seen = HashSet::new();
        let mut pages = Vec::new();
        for url in urls {
            let url = url.as_ref();
            if self.graph.contains(url) || !seen.insert(url) {
                continue;
            }
            let content = self.scraper.scrape(url).await;
            pages.push((url, content));
        }

        let texts: Vec<String> = pages
            .iter()
            .filter(|(_, content)| !content.is_empty())
            .map(|(_, content)| content.clone())
            .collect();
        let expected = texts.len();
        let embeddings = self.embedder.embed_batch(texts).await?;
        if embeddings.len() != expected {
            return Err(GraphragError::Embedding(format!(
                "Batch returned {} embeddings for {} pages",
                embeddings.len(),
                expected
            )));
        }

        let mut embeddings = embeddings.into_iter();
        for (url, content) in pages {
            let embedding = if content.is_empty() {
                self.empty_embedding(url)
            } else {
                embeddings.next().unwrap_or_else(|| self.empty_embedding(url))
            };
            self.insert(url, content, embedding);
        }

        Ok(())
    }

    fn empty_embedding(&self, url: &str) -> Vec<f32> {
        log::warn!("{} has no content; using a zero embedding", url);
        vec![0.0; self.embedder.dimensions()]
    }

    fn insert(&mut self, url: &str, content: String, embedding: Vec<f32>) {
        log::info!("Added {} ({} chars)", url, content.chars().count());
        self.content_cache.insert(url.to_string(), content.clone());
        self.embedding_cache.insert(url.to_string(), embedding.clone());
        self.graph.add_node(WebNode {
            url: url.to_string(),
            content,
            embedding,
        });
    }

    /// Connect two nodes. Without an explicit weight the edge is weighted by
    /// the cosine similarity of the two page embeddings, when both are known.
    pub fn add_edge(&mut self, url1: &str, url2: &str, weight: Option<f32>) -> Result<()> {
        let weight = weight.or_else(|| {
            match (self.embedding_cache.get(url1), self.embedding_cache.get(url2)) {
                (Some(a), Some(b)) => Some(cosine_similarity(a, b)),
                _ => None,
            }
        });
        self.graph.add_edge(url1, url2, weight)
    }

    /// Add a similarity-weighted edge between every pair of nodes.
    pub fn connect_all(&mut self) -> Result<()> {
        let urls: Vec<String> = self.graph.urls().into_iter().map(String::from).collect();
        for (i, a) in urls.iter().enumerate() {
            for b in &urls[i + 1..] {
                self.add_edge(a, b, None)?;
            }
        }
        Ok(())
    }

    /// Rank every node against `query` and return the `top_k` most similar.
    ///
    /// Equal scores keep node insertion order.
    pub async fn query(&self, query: &str, top_k: usize) -> Result<Vec<QueryResult>> {
        let query_embedding = self.embedder.embed_query(query).await?;

        let mut similarities: Vec<(&str, f32)> = self
            .graph
            .urls()
            .into_iter()
            .map(|url| {
                let embedding = self
                    .embedding_cache
                    .get(url)
                    .map(Vec::as_slice)
                    .or_else(|| self.graph.node(url).map(|n| n.embedding.as_slice()))
                    .unwrap_or(&[]);
                (url, cosine_similarity(&query_embedding, embedding))
            })
            .collect();

        similarities.sort_by(|a, b| b.1.total_cmp(&a.1));

        let results = similarities
            .into_iter()
            .take(top_k)
            .map(|(url, similarity)| QueryResult {
                url: url.to_string(),
                content: self.preview(url),
                similarity,
                neighbors: self.graph.neighbors(url),
            })
            .collect();

        Ok(results)
    }

    fn preview(&self, url: &str) -> String {
        let content = self.content(url).unwrap_or_default();
        let head: String = content.chars().take(self.preview_chars).collect();
        format!("{}...", head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use httpmock::prelude::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    const VOCAB: [&str; 4] = ["python", "rust", "cat", "programming"];

    /// Bag-of-words over a tiny vocabulary; counts how often it is called.
    struct KeywordEmbedder {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Embedder for KeywordEmbedder {
        fn dimensions(&self) -> usize {
            VOCAB.len()
        }

        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let lowered = text.to_lowercase();
            Ok(VOCAB
                .iter()
                .map(|word| lowered.matches(word).count() as f32)
                .collect())
        }
    }

    /// Drops the last vector of every batch.
    struct ShortBatchEmbedder;

    #[async_trait]
    impl Embedder for ShortBatchEmbedder {
        fn dimensions(&self) -> usize {
            2
        }

        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(vec![1.0, 0.0])
        }

        async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
            Ok(vec![vec![1.0, 0.0]; texts.len().saturating_sub(1)])
        }
    }

    fn rag() -> (WebGraphRag, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let embedder = KeywordEmbedder { calls: calls.clone() };
        let scraper = WebScraper::new(Duration::from_secs(2)).unwrap();
        (WebGraphRag::new(scraper, Box::new(embedder)), calls)
    }

    fn serve(server: &MockServer, path: &str, body: &str) {
        let body = body.to_string();
        server.mock(|when, then| {
            when.method(GET).path(path);
            then.status(200).body(body);
        });
    }

    fn pages(server: &MockServer) -> Vec<String> {
        serve(server, "/python", "<h1>Python</h1><p>Python programming for everyone</p>");
        serve(server, "/rust", "<h1>Rust</h1><p>Rust programming language</p>");
        serve(server, "/cats", "<p>Cat pictures. Every cat.</p>");
        vec![server.url("/python"), server.url("/rust"), server.url("/cats")]
    }

    #[tokio::test]
    async fn test_add_node_scrapes_and_embeds_once() {
        let server = MockServer::start_async().await;
        let page = server.mock(|when, then| {
            when.method(GET).path("/python");
            then.status(200).body("<p>Python</p>");
        });
        let (mut rag, calls) = rag();
        let url = server.url("/python");

        rag.add_node(&url).await.unwrap();
        rag.add_node(&url).await.unwrap();

        page.assert_calls(1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(rag.graph().node_count(), 1);
        assert_eq!(rag.content(&url), Some("Python"));
        assert_eq!(rag.embedding(&url), Some(&[1.0, 0.0, 0.0, 0.0][..]));
    }

    #[tokio::test]
    async fn test_unreachable_page_gets_zero_embedding() {
        let (mut rag, calls) = rag();
        rag.add_node("http://127.0.0.1:1/").await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(rag.content("http://127.0.0.1:1/"), Some(""));
        assert_eq!(rag.embedding("http://127.0.0.1:1/"), Some(&[0.0; 4][..]));
    }

    #[tokio::test]
    async fn test_add_edge_weights_by_similarity() {
        let server = MockServer::start_async().await;
        let urls = pages(&server);
        let (mut rag, _) = rag();
        rag.add_nodes(&urls).await.unwrap();

        rag.add_edge(&urls[0], &urls[1], None).unwrap();
        rag.add_edge(&urls[0], &urls[2], Some(0.25)).unwrap();

        let expected = cosine_similarity(
            rag.embedding(&urls[0]).unwrap(),
            rag.embedding(&urls[1]).unwrap(),
        );
        assert_eq!(rag.graph().edge_weight(&urls[0], &urls[1]), Some(Some(expected)));
        assert_eq!(rag.graph().edge_weight(&urls[0], &urls[2]), Some(Some(0.25)));

        let err = rag.add_edge(&urls[0], "http://nowhere.invalid/", None).unwrap_err();
        assert!(matches!(err, GraphragError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_identical_pages_have_unit_weight() {
        let server = MockServer::start_async().await;
        serve(&server, "/a", "<p>rust rust</p>");
        serve(&server, "/b", "<p>Rust, rust!</p>");
        let (mut rag, _) = rag();
        let (a, b) = (server.url("/a"), server.url("/b"));
        rag.add_nodes(&[a.clone(), b.clone()]).await.unwrap();
        rag.add_edge(&a, &b, None).unwrap();

        let weight = rag.graph().edge_weight(&a, &b).flatten().unwrap();
        assert!((weight - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_query_ranks_and_truncates() {
        let server = MockServer::start_async().await;
        let urls = pages(&server);
        let (mut rag, _) = rag();
        rag.add_nodes(&urls).await.unwrap();
        rag.connect_all().unwrap();
        assert_eq!(rag.graph().edge_count(), 3);

        let results = rag.query("What is Python programming?", 2).await.unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].url, urls[0]);
        assert_eq!(results[1].url, urls[1]);
        assert!(results[0].similarity >= results[1].similarity);
        assert_eq!(results[0].neighbors, vec![urls[1].clone(), urls[2].clone()]);
        assert_eq!(results[0].content, "Python Python programming for everyone...");
    }

    #[tokio::test]
    async fn test_query_top_k_larger_than_graph() {
        let server = MockServer::start_async().await;
        let urls = pages(&server);
        let (mut rag, _) = rag();
        rag.add_nodes(&urls).await.unwrap();

        let results = rag.query("cat", 10).await.unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].url, urls[2]);
        assert!(results
            .windows(2)
            .all(|pair| pair[0].similarity >= pair[1].similarity));
        // Ties (both 0.0) keep insertion order
        assert_eq!(results[1].url, urls[0]);
        assert_eq!(results[2].url, urls[1]);
        assert!(results[1].neighbors.is_empty());
    }

    #[tokio::test]
    async fn test_query_empty_graph() {
        let (rag, _) = rag();
        assert!(rag.query("anything", 3).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_preview_truncates_by_chars() {
        let server = MockServer::start_async().await;
        serve(&server, "/long", "<p>ééééé rust</p>");
        let (rag, _) = rag();
        let mut rag = rag.with_preview_chars(3);
        let url = server.url("/long");
        rag.add_node(&url).await.unwrap();

        let results = rag.query("rust", 1).await.unwrap();
        assert_eq!(results[0].content, "ééé...");
    }

    #[tokio::test]
    async fn test_add_nodes_batches_non_empty_pages() {
        let server = MockServer::start_async().await;
        let urls = pages(&server);
        let (mut rag, calls) = rag();

        let mut input = urls.clone();
        input.push(urls[0].clone());
        input.push("http://127.0.0.1:1/".to_string());
        rag.add_nodes(&input).await.unwrap();

        assert_eq!(rag.graph().node_count(), 4);
        // Default embed_batch loops over embed: one call per non-empty page
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(rag.graph().urls()[3], "http://127.0.0.1:1/");
    }

    #[tokio::test]
    async fn test_add_nodes_short_batch_inserts_nothing() {
        let server = MockServer::start_async().await;
        let urls = pages(&server);
        let scraper = WebScraper::new(Duration::from_secs(2)).unwrap();
        let mut rag = WebGraphRag::new(scraper, Box::new(ShortBatchEmbedder));

        let err = rag.add_nodes(&urls).await.unwrap_err();

        assert!(matches!(err, GraphragError::Embedding(_)));
        assert!(err.to_string().contains("2 embeddings for 3 pages"));
        assert_eq!(rag.graph().node_count(), 0);
        assert!(rag.content(&urls[0]).is_none());
    }

    #[tokio::test]
    async fn test_from_config_uses_preview_chars() {
        let server = MockServer::start_async().await;
        serve(&server, "/python", "<p>Python programming</p>");
        let config = WebConfig {
            preview_chars: 6,
            ..WebConfig::default()
        };
        let embedder = KeywordEmbedder {
            calls: Arc::new(AtomicUsize::new(0)),
        };
        let mut rag = WebGraphRag::from_config(&config, Box::new(embedder)).unwrap();
        let url = server.url("/python");
        rag.add_node(&url).await.unwrap();

        let results = rag.query("python", 1).await.unwrap();
        assert_eq!(results[0].content, "Python...");
    }
}
