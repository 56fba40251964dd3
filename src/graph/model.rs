//! Graph domain types.
//!
//! Triples are ephemeral: they are produced by the parser, folded into
//! [`GraphNode`]s and [`GraphEdge`]s by the registry, and then dropped.

use serde::{Deserialize, Serialize};

use super::normalize::limit_words;

// =============================================================================
// Triple
// =============================================================================

/// A `(subject, predicate, object)` fact extracted from text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Triple {
    pub subject: String,
    pub predicate: String,
    pub object: String,
}

impl Triple {
    /// Build a triple from borrowed parts without validating them.
    pub fn new(
        subject: impl Into<String>,
        predicate: impl Into<String>,
        object: impl Into<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            predicate: predicate.into(),
            object: object.into(),
        }
    }

    /// Trim every field and bound the predicate to `max_predicate_words`.
    #[must_use]
    pub fn normalized(&self, max_predicate_words: usize) -> Self {
        Self {
            subject: self.subject.trim().to_string(),
            predicate: limit_words(self.predicate.trim(), max_predicate_words),
            object: self.object.trim().to_string(),
        }
    }
}

// =============================================================================
// Nodes
// =============================================================================

/// Provenance group of a node. Every node built by this pipeline is extracted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeGroup {
    #[default]
    Extracted,
}

/// A graph vertex representing one distinct entity label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    /// Deterministic id derived from the normalized label.
    pub id: String,
    /// Label as first seen in the model output.
    pub label: String,
    pub group: NodeGroup,
    pub weight: u32,
}

// =============================================================================
// Edges
// =============================================================================

/// How an edge came to exist.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeType {
    /// Stated directly in the source text.
    #[default]
    Extracted,
    /// Derived by the model rather than read off the text.
    Inferred,
}

/// A directed, labeled relation between two nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub source: String,
    pub target: String,
    pub relation: String,
    #[serde(rename = "type")]
    pub edge_type: EdgeType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
}

/// Identity of an edge: `(source, relation, target)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EdgeKey {
    pub source: String,
    pub relation: String,
    pub target: String,
}

// =============================================================================
// Summary
// =============================================================================

/// Final counts reported by the `complete` event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphSummary {
    pub nodes: usize,
    pub edges: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalized_trims_and_limits() {
        let t = Triple::new("  Plato ", " was deeply and profoundly influenced by ", "Socrates\n");
        let n = t.normalized(3);
        assert_eq!(n.subject, "Plato");
        assert_eq!(n.predicate, "was deeply and");
        assert_eq!(n.object, "Socrates");
    }

    #[test]
    fn test_edge_serializes_type_field() {
        let edge = GraphEdge {
            source: "plato".to_string(),
            target: "aristotle".to_string(),
            relation: "taught".to_string(),
            edge_type: EdgeType::Extracted,
            confidence: Some(0.9),
        };
        let json = serde_json::to_value(&edge).unwrap();
        assert_eq!(json["type"], "extracted");
        assert_eq!(json["relation"], "taught");
    }

    #[test]
    fn test_edge_omits_missing_confidence() {
        let edge = GraphEdge {
            source: "a".to_string(),
            target: "b".to_string(),
            relation: "r".to_string(),
            edge_type: EdgeType::Inferred,
            confidence: None,
        };
        let json = serde_json::to_string(&edge).unwrap();
        assert!(!json.contains("confidence"));
        assert!(json.contains("inferred"));
    }

    #[test]
    fn test_node_group_serialization() {
        let node = GraphNode {
            id: "plato".to_string(),
            label: "Plato".to_string(),
            group: NodeGroup::Extracted,
            weight: 1,
        };
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json["group"], "extracted");
        assert_eq!(json["weight"], 1);
    }
}
