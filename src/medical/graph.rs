//! Directed knowledge graph of medical entities keyed by URI.

use crate::medical::MedicalEntity;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const CONTEXT_HEADER: &str = "Medical Knowledge Context:\n\n";
const NO_DESCRIPTION: &str = "No description available";

/// Attributes stored on a graph node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeData {
    pub uri: String,
    pub label: String,
    /// Only known for entities that were looked up directly.
    pub entity_type: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphStats {
    pub node_count: usize,
    pub edge_count: usize,
}

/// Serializable dump of the whole graph, nodes and edges in insertion order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub nodes: Vec<NodeData>,
    pub edges: Vec<(String, String)>,
}

/// Entity graph. Nodes are upserted by URI; at most one edge exists per
/// ordered (source, target) pair.
#[derive(Debug, Default)]
pub struct KnowledgeGraph {
    graph: DiGraph<NodeData, ()>,
    index: HashMap<String, NodeIndex>,
}

impl KnowledgeGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge an entity and its relations into the graph.
    ///
    /// The entity node gets its label, type and description overwritten.
    /// Related nodes only get their label set, so a type or description
    /// learned from an earlier direct lookup survives. Returns the number of
    /// edges that did not exist before.
    pub fn update(&mut self, entity: &MedicalEntity) -> usize {
        let source = self.upsert(&entity.uri, &entity.label);
        {
            let node = &mut self.graph[source];
            node.entity_type = Some(entity.entity_type.clone());
            node.description = entity.description.clone();
        }

        let mut added = 0;
        for related in &entity.related_entities {
            let target = self.upsert(&related.uri, &related.label);
            if self.graph.find_edge(source, target).is_none() {
                self.graph.add_edge(source, target, ());
                added += 1;
            }
        }

        log::debug!(
            "Merged {} ({} relations, {} new edges)",
            entity.uri,
            entity.related_entities.len(),
            added
        );

        added
    }

    fn upsert(&mut self, uri: &str, label: &str) -> NodeIndex {
        match self.index.get(uri) {
            Some(&idx) => {
                self.graph[idx].label = label.to_string();
                idx
            }
            None => {
                let idx = self.graph.add_node(NodeData {
                    uri: uri.to_string(),
                    label: label.to_string(),
                    entity_type: None,
                    description: None,
                });
                self.index.insert(uri.to_string(), idx);
                idx
            }
        }
    }

    pub fn node(&self, uri: &str) -> Option<&NodeData> {
        self.index.get(uri).map(|&idx| &self.graph[idx])
    }

    /// All nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &NodeData> {
        self.graph.node_indices().map(move |idx| &self.graph[idx])
    }

    /// Successors of `uri` in the order their edges were added.
    pub fn neighbors(&self, uri: &str) -> Vec<&NodeData> {
        match self.index.get(uri) {
            Some(&idx) => self.successors(idx),
            None => Vec::new(),
        }
    }

    fn successors(&self, idx: NodeIndex) -> Vec<&NodeData> {
        let mut edges: Vec<_> = self.graph.edges_directed(idx, Direction::Outgoing).collect();
        edges.sort_by_key(|e| e.id());
        edges.into_iter().map(|e| &self.graph[e.target()]).collect()
    }

    pub fn contains_edge(&self, source: &str, target: &str) -> bool {
        match (self.index.get(source), self.index.get(target)) {
            (Some(&a), Some(&b)) => self.graph.contains_edge(a, b),
            _ => false,
        }
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn stats(&self) -> GraphStats {
        GraphStats {
            node_count: self.node_count(),
            edge_count: self.edge_count(),
        }
    }

    pub fn snapshot(&self) -> GraphSnapshot {
        GraphSnapshot {
            nodes: self.nodes().cloned().collect(),
            edges: self
                .graph
                .edge_references()
                .map(|e| {
                    (
                        self.graph[e.source()].uri.clone(),
                        self.graph[e.target()].uri.clone(),
                    )
                })
                .collect(),
        }
    }

    /// Render every node whose label contains any whitespace-separated query
    /// token (case-insensitive) as a bullet list, with each node's successors.
    pub fn generate_context(&self, query: &str) -> String {
        let lowered = query.to_lowercase();
        let terms: Vec<&str> = lowered.split_whitespace().collect();

        let mut context = String::from(CONTEXT_HEADER);
        let mut matched = 0;

        for idx in self.graph.node_indices() {
            let node = &self.graph[idx];
            let label = node.label.to_lowercase();
            if !terms.iter().any(|term| label.contains(term)) {
                continue;
            }
            matched += 1;

            context.push_str(&format!(
                "- {}: {}\n",
                node.label,
                node.description.as_deref().unwrap_or(NO_DESCRIPTION)
            ));

            let related: Vec<&str> = self
                .successors(idx)
                .into_iter()
                .map(|n| n.label.as_str())
                .collect();
            if !related.is_empty() {
                context.push_str(&format!("  Related: {}\n", related.join(", ")));
            }
        }

        log::debug!("Context for {:?} matched {} node(s)", query, matched);
        context
    }
}
