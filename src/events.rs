//! Graph-build event model.
//!
//! A session emits zero or more `status`, `node` and `edge` events and then
//! exactly one terminal event: `complete` or `error`.
//!
//! # Example
//!
//! ```rust
//! use cognify::events::{GraphEvent, event_json, event_name};
//!
//! let event = GraphEvent::Status {
//!     message: "Starting graph generation...".to_string(),
//! };
//! assert_eq!(event_name(&event), "status");
//! assert!(event_json(&event).contains(r#""message":"Starting graph generation...""#));
//! ```

use serde::{Deserialize, Serialize};

use crate::graph::model::{GraphEdge, GraphNode, GraphSummary};

/// Events emitted by a graph-build session, in emission order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum GraphEvent {
    /// Informational progress message.
    Status { message: String },

    /// A node seen for the first time in this session.
    Node { node: GraphNode },

    /// An edge seen for the first time in this session. Both endpoints have
    /// already been announced.
    Edge { edge: GraphEdge },

    /// Terminal: the session finished normally.
    Complete { summary: GraphSummary },

    /// Terminal: the session failed.
    Error { message: String },
}

impl GraphEvent {
    pub fn status(message: impl Into<String>) -> Self {
        Self::Status {
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Whether this event ends the session.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete { .. } | Self::Error { .. })
    }
}

/// Get the SSE event name for a [`GraphEvent`].
pub fn event_name(evt: &GraphEvent) -> &'static str {
    match evt {
        GraphEvent::Status { .. } => "status",
        GraphEvent::Node { .. } => "node",
        GraphEvent::Edge { .. } => "edge",
        GraphEvent::Complete { .. } => "complete",
        GraphEvent::Error { .. } => "error",
    }
}

/// JSON payload for the `data:` line of an event.
pub fn event_json(evt: &GraphEvent) -> String {
    serde_json::to_string(evt).unwrap_or_else(|e| {
        serde_json::json!({ "type": "error", "message": e.to_string() }).to_string()
    })
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::model::{EdgeType, NodeGroup};

    #[test]
    fn test_node_event_payload() {
        let event = GraphEvent::Node {
            node: GraphNode {
                id: "plato".to_string(),
                label: "Plato".to_string(),
                group: NodeGroup::Extracted,
                weight: 1,
            },
        };
        let v: serde_json::Value = serde_json::from_str(&event_json(&event)).unwrap();
        assert_eq!(v["type"], "node");
        assert_eq!(v["node"]["id"], "plato");
        assert_eq!(v["node"]["group"], "extracted");
    }

    #[test]
    fn test_edge_event_payload() {
        let event = GraphEvent::Edge {
            edge: GraphEdge {
                source: "plato".to_string(),
                target: "aristotle".to_string(),
                relation: "taught".to_string(),
                edge_type: EdgeType::Extracted,
                confidence: Some(0.9),
            },
        };
        assert_eq!(event_name(&event), "edge");
        let v: serde_json::Value = serde_json::from_str(&event_json(&event)).unwrap();
        assert_eq!(v["edge"]["relation"], "taught");
        assert_eq!(v["edge"]["type"], "extracted");
    }

    #[test]
    fn test_complete_event_round_trip() {
        let event = GraphEvent::Complete {
            summary: GraphSummary { nodes: 2, edges: 1 },
        };
        let json = event_json(&event);
        assert!(json.contains(r#""summary":{"nodes":2,"edges":1}"#));
        let back: GraphEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
        assert!(back.is_terminal());
    }

    #[test]
    fn test_terminal_kinds() {
        assert!(GraphEvent::error("boom").is_terminal());
        assert!(!GraphEvent::status("working").is_terminal());
        assert_eq!(event_name(&GraphEvent::error("boom")), "error");
    }
}
