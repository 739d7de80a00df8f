pub mod cache;
pub mod config;
pub mod embeddings;
pub mod error;
pub mod llm;
pub mod medical;
pub mod web;

pub use config::Config;
pub use error::{GraphragError, Result};
pub use medical::{KnowledgeGraph, MedicalEntity, MedicalRag};
pub use web::{QueryResult, WebGraphRag};
