//! Scraped-page graph with embedding similarity search.

pub mod graph;
pub mod rag;
pub mod scraper;

pub use graph::{WebGraph, WebNode};
pub use rag::{QueryResult, WebGraphRag};
pub use scraper::{html_to_text, WebScraper};
