//! Incremental extraction-and-dedup pipeline.
//!
//! Model output flows through the [`parser`], every candidate is checked by
//! [`validate`] and bounded by [`normalize`], and surviving triples are folded
//! into the per-session [`registry`]. The [`orchestrator`] drives the model
//! call and turns registrations into [`GraphEvent`](crate::events::GraphEvent)s.

pub mod model;
pub mod normalize;
pub mod orchestrator;
pub mod parser;
pub mod prompts;
pub mod registry;
pub mod validate;

pub use model::{EdgeType, GraphEdge, GraphNode, GraphSummary, NodeGroup, Triple};
pub use orchestrator::{GraphOrchestrator, GraphSession, SessionPhase};
pub use parser::{ExtractionError, IncrementalTripleParser, extract_triples, parse_document};
pub use registry::{GraphRegistry, HARD_NODE_CAP, SOFT_NODE_CAP};

/// What a graph is built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphInput {
    /// Raw text to extract relationships from.
    Text(String),
    /// A topic for the model to describe from its own knowledge.
    Topic(String),
}

/// Rejected graph input.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum InputError {
    #[error("Input is empty")]
    Empty,

    #[error("Input is {len} characters; the limit is {max}")]
    TooLong { len: usize, max: usize },
}

impl GraphInput {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Text(s) | Self::Topic(s) => s,
        }
    }

    /// Reject blank input and input longer than `max_chars` characters.
    pub fn validate(&self, max_chars: usize) -> Result<(), InputError> {
        let s = self.as_str();
        if s.trim().is_empty() {
            return Err(InputError::Empty);
        }
        let len = s.chars().count();
        if len > max_chars {
            return Err(InputError::TooLong {
                len,
                max: max_chars,
            });
        }
        Ok(())
    }
}
