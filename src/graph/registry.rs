//! Deduplicating node/edge store for one graph-build session.
//!
//! Append-only: entries are never removed or updated. Nodes are keyed by
//! [`node_id`] over their label, edges by `(source, relation, target)`.

use std::collections::HashMap;

use super::model::{EdgeKey, EdgeType, GraphEdge, GraphNode, GraphSummary, NodeGroup};
use super::normalize::node_id;

/// Node count at which a one-time warning is emitted.
pub const SOFT_NODE_CAP: usize = 300;
/// Node count at which extraction stops.
pub const HARD_NODE_CAP: usize = 500;

/// Outcome of a registration: the stored item and whether it was new.
#[derive(Debug, Clone, PartialEq)]
pub struct Registration<T> {
    pub item: T,
    pub is_new: bool,
}

/// Node/edge registry with soft and hard node caps.
#[derive(Debug)]
pub struct GraphRegistry {
    nodes: HashMap<String, GraphNode>,
    edges: HashMap<EdgeKey, GraphEdge>,
    total_nodes_emitted: usize,
    soft_cap_warned: bool,
    soft_cap: usize,
    hard_cap: usize,
}

impl Default for GraphRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphRegistry {
    /// Registry with the default caps.
    pub fn new() -> Self {
        Self::with_caps(SOFT_NODE_CAP, HARD_NODE_CAP)
    }

    pub fn with_caps(soft_cap: usize, hard_cap: usize) -> Self {
        Self {
            nodes: HashMap::new(),
            edges: HashMap::new(),
            total_nodes_emitted: 0,
            soft_cap_warned: false,
            soft_cap,
            hard_cap,
        }
    }

    /// Register an entity label, creating a weight-1 node the first time its
    /// id is seen.
    pub fn register_node(&mut self, label: &str) -> Registration<GraphNode> {
        let id = node_id(label);
        if let Some(existing) = self.nodes.get(&id) {
            return Registration {
                item: existing.clone(),
                is_new: false,
            };
        }

        let node = GraphNode {
            id: id.clone(),
            label: label.trim().to_string(),
            group: NodeGroup::Extracted,
            weight: 1,
        };
        self.nodes.insert(id, node.clone());
        self.total_nodes_emitted += 1;

        Registration {
            item: node,
            is_new: true,
        }
    }

    /// Register an extracted edge. A repeated key is a no-op and the first
    /// occurrence is returned unchanged.
    pub fn register_edge(
        &mut self,
        source_id: &str,
        predicate: &str,
        object_id: &str,
        confidence: Option<f32>,
    ) -> Registration<GraphEdge> {
        let key = EdgeKey {
            source: source_id.to_string(),
            relation: predicate.to_string(),
            target: object_id.to_string(),
        };
        if let Some(existing) = self.edges.get(&key) {
            return Registration {
                item: existing.clone(),
                is_new: false,
            };
        }

        let edge = GraphEdge {
            source: key.source.clone(),
            target: key.target.clone(),
            relation: key.relation.clone(),
            edge_type: EdgeType::Extracted,
            confidence,
        };
        self.edges.insert(key, edge.clone());

        Registration {
            item: edge,
            is_new: true,
        }
    }

    pub fn total_nodes_emitted(&self) -> usize {
        self.total_nodes_emitted
    }

    pub fn node_count_at_or_above_soft(&self) -> bool {
        self.total_nodes_emitted >= self.soft_cap
    }

    pub fn node_count_at_or_above_hard(&self) -> bool {
        self.total_nodes_emitted >= self.hard_cap
    }

    /// Returns `true` exactly once: the first time it is called while the
    /// node count is at or above the soft cap.
    pub fn take_soft_cap_warning(&mut self) -> bool {
        if self.soft_cap_warned || !self.node_count_at_or_above_soft() {
            return false;
        }
        self.soft_cap_warned = true;
        true
    }

    pub fn soft_cap(&self) -> usize {
        self.soft_cap
    }

    pub fn hard_cap(&self) -> usize {
        self.hard_cap
    }

    pub fn summary(&self) -> GraphSummary {
        GraphSummary {
            nodes: self.nodes.len(),
            edges: self.edges.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_node_dedups_by_id() {
        let mut reg = GraphRegistry::new();
        let first = reg.register_node("Plato");
        assert!(first.is_new);
        assert_eq!(first.item.id, "plato");
        assert_eq!(first.item.weight, 1);

        let again = reg.register_node("  PLATO ");
        assert!(!again.is_new);
        assert_eq!(again.item.label, "Plato");
        assert_eq!(reg.total_nodes_emitted(), 1);
    }

    #[test]
    fn test_register_edge_first_wins() {
        let mut reg = GraphRegistry::new();
        let first = reg.register_edge("plato", "taught", "aristotle", Some(0.9));
        assert!(first.is_new);

        let dup = reg.register_edge("plato", "taught", "aristotle", Some(0.1));
        assert!(!dup.is_new);
        assert_eq!(dup.item.confidence, Some(0.9));

        let reverse = reg.register_edge("aristotle", "taught", "plato", None);
        assert!(reverse.is_new);
        assert_eq!(reg.summary(), GraphSummary { nodes: 0, edges: 2 });
    }

    #[test]
    fn test_caps() {
        let mut reg = GraphRegistry::with_caps(2, 3);
        reg.register_node("a");
        assert!(!reg.node_count_at_or_above_soft());
        assert!(!reg.take_soft_cap_warning());

        reg.register_node("b");
        assert!(reg.node_count_at_or_above_soft());
        assert!(!reg.node_count_at_or_above_hard());
        assert!(reg.take_soft_cap_warning());
        assert!(!reg.take_soft_cap_warning());

        reg.register_node("c");
        assert!(reg.node_count_at_or_above_hard());
        assert!(!reg.take_soft_cap_warning());
    }

    #[test]
    fn test_default_caps() {
        let reg = GraphRegistry::default();
        assert_eq!(reg.soft_cap(), 300);
        assert_eq!(reg.hard_cap(), 500);
    }
}
