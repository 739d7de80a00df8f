//! Undirected page graph keyed by URL.

use crate::error::{GraphragError, Result};
use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;
use std::collections::HashMap;

/// A scraped page and its embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct WebNode {
    pub url: String,
    pub content: String,
    pub embedding: Vec<f32>,
}

/// Pages linked by optionally weighted, undirected edges. At most one edge
/// exists per unordered URL pair.
#[derive(Debug, Default)]
pub struct WebGraph {
    graph: UnGraph<WebNode, Option<f32>>,
    index: HashMap<String, NodeIndex>,
}

impl WebGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node. Returns false (and leaves the graph untouched) if the
    /// URL is already present.
    pub fn add_node(&mut self, node: WebNode) -> bool {
        if self.index.contains_key(&node.url) {
            return false;
        }
        let url = node.url.clone();
        let idx = self.graph.add_node(node);
        self.index.insert(url, idx);
        true
    }

    /// Insert an edge or overwrite the weight of the existing one.
    pub fn add_edge(&mut self, a: &str, b: &str, weight: Option<f32>) -> Result<()> {
        let ia = self.lookup(a)?;
        let ib = self.lookup(b)?;
        self.graph.update_edge(ia, ib, weight);
        Ok(())
    }

    fn lookup(&self, url: &str) -> Result<NodeIndex> {
        self.index
            .get(url)
            .copied()
            .ok_or_else(|| GraphragError::InvalidInput(format!("{} is not a node in the graph", url)))
    }

    pub fn contains(&self, url: &str) -> bool {
        self.index.contains_key(url)
    }

    pub fn node(&self, url: &str) -> Option<&WebNode> {
        self.index.get(url).map(|&idx| &self.graph[idx])
    }

    /// URLs in insertion order.
    pub fn urls(&self) -> Vec<&str> {
        self.graph
            .node_indices()
            .map(|idx| self.graph[idx].url.as_str())
            .collect()
    }

    /// `Some(weight)` if the edge exists; the weight itself may be unset.
    pub fn edge_weight(&self, a: &str, b: &str) -> Option<Option<f32>> {
        let ia = *self.index.get(a)?;
        let ib = *self.index.get(b)?;
        self.graph
            .find_edge(ia, ib)
            .and_then(|e| self.graph.edge_weight(e).copied())
    }

    /// Adjacent URLs in the order their edges were created.
    pub fn neighbors(&self, url: &str) -> Vec<String> {
        let Some(&idx) = self.index.get(url) else {
            return Vec::new();
        };

        let mut edges: Vec<_> = self.graph.edges(idx).collect();
        edges.sort_by_key(|e| e.id());
        edges
            .into_iter()
            .map(|e| {
                let other = if e.source() == idx { e.target() } else { e.source() };
                self.graph[other].url.clone()
            })
            .collect()
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(url: &str) -> WebNode {
        WebNode {
            url: url.to_string(),
            content: format!("content of {}", url),
            embedding: vec![1.0, 0.0],
        }
    }

    #[test]
    fn test_add_node_once() {
        let mut graph = WebGraph::new();
        assert!(graph.add_node(node("a")));
        assert!(!graph.add_node(WebNode {
            content: "replacement".to_string(),
            ..node("a")
        }));
        assert_eq!(graph.node_count(), 1);
        assert_eq!(graph.node("a").unwrap().content, "content of a");
    }

    #[test]
    fn test_edge_is_undirected_and_unique() {
        let mut graph = WebGraph::new();
        graph.add_node(node("a"));
        graph.add_node(node("b"));

        graph.add_edge("a", "b", Some(0.5)).unwrap();
        graph.add_edge("b", "a", Some(0.9)).unwrap();

        assert_eq!(graph.edge_count(), 1);
        assert_eq!(graph.edge_weight("a", "b"), Some(Some(0.9)));
        assert_eq!(graph.edge_weight("b", "a"), Some(Some(0.9)));
    }

    #[test]
    fn test_edge_requires_nodes() {
        let mut graph = WebGraph::new();
        graph.add_node(node("a"));
        let err = graph.add_edge("a", "ghost", None).unwrap_err();
        assert!(matches!(err, GraphragError::InvalidInput(_)));
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn test_neighbors_order_and_direction() {
        let mut graph = WebGraph::new();
        for url in ["a", "b", "c", "d"] {
            graph.add_node(node(url));
        }
        graph.add_edge("a", "c", None).unwrap();
        graph.add_edge("b", "a", None).unwrap();
        graph.add_edge("a", "d", None).unwrap();

        assert_eq!(graph.neighbors("a"), vec!["c", "b", "d"]);
        assert_eq!(graph.neighbors("b"), vec!["a"]);
        assert!(graph.neighbors("missing").is_empty());
        assert_eq!(graph.edge_weight("c", "d"), None);
        assert_eq!(graph.edge_weight("a", "c"), Some(None));
    }

    #[test]
    fn test_urls_in_insertion_order() {
        let mut graph = WebGraph::new();
        for url in ["z", "y", "x"] {
            graph.add_node(node(url));
        }
        assert_eq!(graph.urls(), vec!["z", "y", "x"]);
    }
}
