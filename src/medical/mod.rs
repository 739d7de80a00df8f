//! DBpedia medical knowledge graph: SPARQL lookup, directed entity graph and
//! LLM question answering over the graph's text rendering.

pub mod graph;
pub mod rag;
pub mod sparql;

pub use graph::{GraphSnapshot, GraphStats, KnowledgeGraph, NodeData};
pub use rag::{build_prompt, MedicalRag};
pub use sparql::{build_entity_query, entity_from_bindings, escape_literal, SparqlClient};

use serde::{Deserialize, Serialize};

/// A medical entity returned by a DBpedia lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedicalEntity {
    pub uri: String,
    pub label: String,
    pub description: Option<String>,
    /// Local name of the DBpedia class, e.g. `Disease`.
    pub entity_type: String,
    pub related_entities: Vec<RelatedEntity>,
    pub source_links: Vec<String>,
}

/// An entity linked from a [`MedicalEntity`] by a drug/disease/protein/anatomy relation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelatedEntity {
    pub uri: String,
    pub label: String,
}
