//! Graph-build orchestration.
//!
//! One session per input:
//! 1. Announce the session
//! 2. Call the model through a [`ModelOutputSource`]
//! 3. Parse triples out of the output (incrementally when streamed)
//! 4. Register subject node, object node, then edge for each new triple
//! 5. Stop at the hard node cap, finish with `complete` or `error`
//!
//! # Example
//!
//! ```rust,ignore
//! use cognify::graph::{GraphInput, GraphOrchestrator};
//!
//! let orchestrator = GraphOrchestrator::new(source, config.extraction.clone());
//! let events = orchestrator.build(GraphInput::Text(text));
//! ```

use std::collections::HashSet;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::{FutureExt, Stream, StreamExt};
use uuid::Uuid;

use crate::config::ExtractionConfig;
use crate::events::GraphEvent;
use crate::llm::error::GENERIC_FAILURE_MESSAGE;
use crate::llm::{ModelOutput, ModelOutputSource};

use super::GraphInput;
use super::model::Triple;
use super::parser::{IncrementalTripleParser, parse_document};
use super::registry::GraphRegistry;
use super::validate::is_valid_triple;

/// Phase of a graph-build session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Starting,
    Extracting,
    Building,
    Capped,
    Completing,
    Done,
    Failed,
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Starting => "starting",
            Self::Extracting => "extracting",
            Self::Building => "building",
            Self::Capped => "capped",
            Self::Completing => "completing",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Whether triple consumption may continue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Capped,
}

// =============================================================================
// Session
// =============================================================================

/// State of one graph-build session: registry, surfaced-triple set and phase.
///
/// This is the synchronous core of the orchestrator; it never suspends.
#[derive(Debug)]
pub struct GraphSession {
    id: String,
    registry: GraphRegistry,
    surfaced: HashSet<Triple>,
    phase: SessionPhase,
    max_predicate_words: usize,
    edge_confidence: f32,
}

impl GraphSession {
    pub fn new(id: impl Into<String>, config: &ExtractionConfig) -> Self {
        Self {
            id: id.into(),
            registry: GraphRegistry::with_caps(config.soft_node_cap, config.hard_node_cap),
            surfaced: HashSet::new(),
            phase: SessionPhase::Starting,
            max_predicate_words: config.max_predicate_words,
            edge_confidence: config.edge_confidence,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn registry(&self) -> &GraphRegistry {
        &self.registry
    }

    fn transition(&mut self, next: SessionPhase) {
        if self.phase != next {
            tracing::debug!(
                session_id = %self.id,
                from = %self.phase,
                to = %next,
                "Session phase transition"
            );
            self.phase = next;
        }
    }

    /// Mark the model call as started.
    pub fn begin_extraction(&mut self) {
        self.transition(SessionPhase::Extracting);
    }

    /// Fold one parsed triple into the graph, appending resulting events to
    /// `out` in subject-node, object-node, edge order.
    pub fn ingest(&mut self, triple: &Triple, out: &mut Vec<GraphEvent>) -> Flow {
        if self.phase == SessionPhase::Capped {
            return Flow::Capped;
        }
        if self.phase == SessionPhase::Extracting {
            self.transition(SessionPhase::Building);
        }

        let triple = triple.normalized(self.max_predicate_words);
        if !is_valid_triple(&triple) {
            tracing::debug!(session_id = %self.id, triple = ?triple, "Dropping invalid triple");
            return Flow::Continue;
        }
        if self.surfaced.contains(&triple) {
            return Flow::Continue;
        }

        if self.registry.node_count_at_or_above_hard() {
            return self.cap(out);
        }

        let subject = self.registry.register_node(&triple.subject);
        if subject.is_new {
            out.push(GraphEvent::Node {
                node: subject.item.clone(),
            });
            if let Some(flow) = self.check_caps(out) {
                return flow;
            }
        }

        let object = self.registry.register_node(&triple.object);
        if object.is_new {
            out.push(GraphEvent::Node {
                node: object.item.clone(),
            });
            if let Some(flow) = self.check_caps(out) {
                return flow;
            }
        }

        if subject.item.id == object.item.id {
            tracing::debug!(
                session_id = %self.id,
                node_id = %subject.item.id,
                "Skipping edge between labels with the same identity"
            );
        } else {
            let edge = self.registry.register_edge(
                &subject.item.id,
                &triple.predicate,
                &object.item.id,
                Some(self.edge_confidence),
            );
            if edge.is_new {
                out.push(GraphEvent::Edge { edge: edge.item });
            }
        }

        self.surfaced.insert(triple);
        Flow::Continue
    }

    /// Soft-cap warning (once) and hard-cap stop, after a new node.
    fn check_caps(&mut self, out: &mut Vec<GraphEvent>) -> Option<Flow> {
        if self.registry.take_soft_cap_warning() {
            tracing::warn!(
                session_id = %self.id,
                node_count = self.registry.total_nodes_emitted(),
                soft_cap = self.registry.soft_cap(),
                "Soft node cap reached"
            );
            out.push(GraphEvent::status(format!(
                "Warning: Approaching node limit ({}/{}). Graph may become slow.",
                self.registry.total_nodes_emitted(),
                self.registry.soft_cap()
            )));
        }
        self.registry
            .node_count_at_or_above_hard()
            .then(|| self.cap(out))
    }

    fn cap(&mut self, out: &mut Vec<GraphEvent>) -> Flow {
        tracing::warn!(
            session_id = %self.id,
            hard_cap = self.registry.hard_cap(),
            "Hard node cap reached, stopping extraction"
        );
        out.push(GraphEvent::status(format!(
            "Hard node limit reached ({}). Stopping extraction.",
            self.registry.hard_cap()
        )));
        self.transition(SessionPhase::Capped);
        Flow::Capped
    }

    /// Terminal `complete` event with the registry counts.
    pub fn complete(&mut self) -> GraphEvent {
        self.transition(SessionPhase::Completing);
        let summary = self.registry.summary();
        tracing::info!(
            session_id = %self.id,
            node_count = summary.nodes,
            edge_count = summary.edges,
            "Graph generation complete"
        );
        self.transition(SessionPhase::Done);
        GraphEvent::Complete { summary }
    }

    /// Terminal `error` event.
    pub fn fail(&mut self, message: impl Into<String>) -> GraphEvent {
        self.transition(SessionPhase::Failed);
        GraphEvent::error(message)
    }
}

// =============================================================================
// Orchestrator
// =============================================================================

/// Builds graphs from inputs, one isolated session per call.
#[derive(Clone)]
pub struct GraphOrchestrator {
    source: Arc<dyn ModelOutputSource>,
    config: ExtractionConfig,
}

impl fmt::Debug for GraphOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphOrchestrator")
            .field("config", &self.config)
            .field("source", &"ModelOutputSource")
            .finish()
    }
}

impl GraphOrchestrator {
    pub fn new(source: Arc<dyn ModelOutputSource>, config: ExtractionConfig) -> Self {
        Self { source, config }
    }

    /// Start a graph-build session for `input`.
    ///
    /// The returned stream is lazy: nothing runs until it is polled, and
    /// dropping it abandons the session and the in-flight model call. It
    /// always ends with exactly one `complete` or `error` event.
    pub fn build(&self, input: GraphInput) -> impl Stream<Item = GraphEvent> + Send + 'static {
        let source = Arc::clone(&self.source);
        let config = self.config.clone();
        guarded(run_session(source, config, input))
    }
}

fn run_session(
    source: Arc<dyn ModelOutputSource>,
    config: ExtractionConfig,
    input: GraphInput,
) -> impl Stream<Item = GraphEvent> + Send + 'static {
    async_stream::stream! {
        let mut session = GraphSession::new(Uuid::new_v4().to_string(), &config);
        let text = input.as_str();

        tracing::info!(
            session_id = %session.id(),
            input_chars = text.chars().count(),
            input_words = text.split_whitespace().count(),
            streaming = config.streaming,
            "Starting graph generation"
        );

        yield GraphEvent::status("Starting graph generation...");

        session.begin_extraction();
        yield GraphEvent::status("Analyzing text and extracting relationships...");

        let output = match source.generate(&input).await {
            Ok(output) => output,
            Err(e) => {
                tracing::error!(session_id = %session.id(), error = %e, "Model call failed");
                yield session.fail(e.user_message());
                return;
            }
        };

        let mut pending = Vec::new();

        match output {
            ModelOutput::Document(response) => {
                let triples = parse_document(&response).unwrap_or_else(|e| {
                    tracing::warn!(
                        session_id = %session.id(),
                        error = %e,
                        "Could not extract triples from model response"
                    );
                    Vec::new()
                });

                yield GraphEvent::status(format!(
                    "Building graph from {} relationships...",
                    triples.len()
                ));

                for triple in &triples {
                    let flow = session.ingest(triple, &mut pending);
                    for event in pending.drain(..) {
                        yield event;
                    }
                    if flow == Flow::Capped {
                        break;
                    }
                }
            }
            ModelOutput::Chunks(mut chunks) => {
                let mut parser = IncrementalTripleParser::new();

                'chunks: while let Some(chunk) = chunks.next().await {
                    let chunk = match chunk {
                        Ok(chunk) => chunk,
                        Err(e) => {
                            tracing::error!(
                                session_id = %session.id(),
                                error = %e,
                                "Model stream failed"
                            );
                            yield session.fail(e.user_message());
                            return;
                        }
                    };

                    for triple in parser.feed(&chunk) {
                        let flow = session.ingest(&triple, &mut pending);
                        for event in pending.drain(..) {
                            yield event;
                        }
                        if flow == Flow::Capped {
                            break 'chunks;
                        }
                    }
                }

                if parser.skipped() > 0 || parser.pending_len() > 0 {
                    tracing::warn!(
                        session_id = %session.id(),
                        skipped = parser.skipped(),
                        pending_bytes = parser.pending_len(),
                        "Discarded malformed or incomplete records"
                    );
                }
            }
        }

        yield session.complete();
    }
}

/// Enforce the terminal-event contract on a session stream: stop after the
/// first terminal event, and convert a panic or a premature end into a
/// generic `error` event.
fn guarded<S>(inner: S) -> impl Stream<Item = GraphEvent> + Send + 'static
where
    S: Stream<Item = GraphEvent> + Send + 'static,
{
    async_stream::stream! {
        let mut inner = Box::pin(inner);
        loop {
            match AssertUnwindSafe(inner.next()).catch_unwind().await {
                Ok(Some(event)) => {
                    let terminal = event.is_terminal();
                    yield event;
                    if terminal {
                        return;
                    }
                }
                Ok(None) => {
                    tracing::error!("Graph session ended without a terminal event");
                    yield GraphEvent::error(GENERIC_FAILURE_MESSAGE);
                    return;
                }
                Err(_) => {
                    tracing::error!("Graph session panicked");
                    yield GraphEvent::error(GENERIC_FAILURE_MESSAGE);
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(soft: usize, hard: usize) -> ExtractionConfig {
        ExtractionConfig {
            soft_node_cap: soft,
            hard_node_cap: hard,
            ..ExtractionConfig::default()
        }
    }

    fn ingest_all(session: &mut GraphSession, triples: &[Triple]) -> Vec<GraphEvent> {
        let mut out = Vec::new();
        for t in triples {
            if session.ingest(t, &mut out) == Flow::Capped {
                break;
            }
        }
        out
    }

    fn kinds(events: &[GraphEvent]) -> Vec<&'static str> {
        events.iter().map(crate::events::event_name).collect()
    }

    #[test]
    fn test_ingest_orders_subject_object_edge() {
        let mut session = GraphSession::new("s", &ExtractionConfig::default());
        session.begin_extraction();
        let events = ingest_all(&mut session, &[Triple::new("Plato", "taught", "Aristotle")]);
        assert_eq!(kinds(&events), vec!["node", "node", "edge"]);
        assert_eq!(session.phase(), SessionPhase::Building);

        let GraphEvent::Edge { edge } = &events[2] else {
            panic!("expected edge");
        };
        assert_eq!(edge.source, "plato");
        assert_eq!(edge.target, "aristotle");
        assert_eq!(edge.confidence, Some(0.9));
    }

    #[test]
    fn test_repeated_triple_emits_nothing() {
        let mut session = GraphSession::new("s", &ExtractionConfig::default());
        let t = Triple::new("Plato", "influenced", "Aristotle");
        let first = ingest_all(&mut session, std::slice::from_ref(&t));
        let second = ingest_all(&mut session, &[t, Triple::new(" plato ", "influenced", "ARISTOTLE")]);
        assert_eq!(first.len(), 3);
        assert!(second.is_empty());
    }

    #[test]
    fn test_predicate_is_limited_before_registration() {
        let mut session = GraphSession::new("s", &ExtractionConfig::default());
        let events = ingest_all(
            &mut session,
            &[Triple::new("Plato", "was deeply and profoundly influenced by", "Socrates")],
        );
        let GraphEvent::Edge { edge } = &events[2] else {
            panic!("expected edge");
        };
        assert_eq!(edge.relation, "was deeply and");
    }

    #[test]
    fn test_same_identity_labels_produce_no_edge() {
        let mut session = GraphSession::new("s", &ExtractionConfig::default());
        let events = ingest_all(&mut session, &[Triple::new("New York", "is", "new  york")]);
        assert_eq!(kinds(&events), vec!["node"]);
        assert_eq!(session.registry().summary().edges, 0);
    }

    #[test]
    fn test_soft_cap_warns_once() {
        let mut session = GraphSession::new("s", &config(2, 100));
        let events = ingest_all(
            &mut session,
            &[
                Triple::new("a", "r", "b"),
                Triple::new("c", "r", "d"),
                Triple::new("e", "r", "f"),
            ],
        );
        let warnings = events
            .iter()
            .filter(|e| matches!(e, GraphEvent::Status { message } if message.starts_with("Warning")))
            .count();
        assert_eq!(warnings, 1);
        assert_eq!(kinds(&events)[..4], ["node", "node", "status", "edge"]);
    }

    #[test]
    fn test_hard_cap_stops_mid_triple() {
        let mut session = GraphSession::new("s", &config(100, 3));
        let mut out = Vec::new();
        assert_eq!(session.ingest(&Triple::new("a", "r", "b"), &mut out), Flow::Continue);
        assert_eq!(session.ingest(&Triple::new("c", "r", "d"), &mut out), Flow::Capped);
        assert_eq!(kinds(&out), vec!["node", "node", "edge", "node", "status"]);
        assert_eq!(session.phase(), SessionPhase::Capped);

        // Nothing is consumed once capped.
        let mut more = Vec::new();
        assert_eq!(session.ingest(&Triple::new("x", "r", "y"), &mut more), Flow::Capped);
        assert!(more.is_empty());

        let GraphEvent::Complete { summary } = session.complete() else {
            panic!("expected complete");
        };
        assert_eq!((summary.nodes, summary.edges), (3, 1));
        assert_eq!(session.phase(), SessionPhase::Done);
    }

    #[test]
    fn test_fail_sets_phase() {
        let mut session = GraphSession::new("s", &ExtractionConfig::default());
        assert!(session.fail("boom").is_terminal());
        assert_eq!(session.phase(), SessionPhase::Failed);
    }

    #[tokio::test]
    async fn test_guarded_adds_missing_terminal() {
        let inner = futures::stream::iter(vec![GraphEvent::status("hi")]);
        let events: Vec<_> = guarded(inner).collect().await;
        assert_eq!(events.len(), 2);
        assert_eq!(events[1], GraphEvent::error(GENERIC_FAILURE_MESSAGE));
    }

    #[tokio::test]
    async fn test_guarded_stops_after_terminal() {
        let inner = futures::stream::iter(vec![
            GraphEvent::error("first"),
            GraphEvent::status("late"),
        ]);
        let events: Vec<_> = guarded(inner).collect().await;
        assert_eq!(events, vec![GraphEvent::error("first")]);
    }
}
