//! Triple parsing from model output.
//!
//! Two modes:
//!
//! - [`IncrementalTripleParser`] consumes a growing stream of text and
//!   surfaces each `{...}` record as soon as its closing brace arrives, without
//!   waiting for the enclosing array or object to close. Only the unconsumed
//!   tail is kept, so each byte is scanned once.
//! - [`parse_document`] decodes a complete response in one pass and reports
//!   an [`ExtractionError`] when no usable payload can be found.

use serde_json::Value;

use super::model::Triple;
use super::validate::triple_from_candidate;

/// Failure to locate triples in a whole-document response.
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    /// No JSON payload could be located in the response.
    #[error("Malformed model output: {0}")]
    Malformed(String),

    /// The payload parsed but does not hold a triples array.
    #[error("Model output has no triples array")]
    MissingTriples,
}

// =============================================================================
// Incremental Parser
// =============================================================================

/// Incremental scanner for triple records in streamed model output.
///
/// The scanner keeps a stack of open `{` offsets. Every `}` closes the
/// innermost open object and that span is decoded as a candidate record, so
/// records surface while their wrapper is still open and records with nested
/// objects are still recognized when they close. String literals are honored
/// inside candidates so braces in values do not confuse it. Text outside any
/// candidate (prose, array punctuation) is ignored.
#[derive(Debug, Default)]
pub struct IncrementalTripleParser {
    /// Unconsumed tail of the output.
    buf: String,
    /// Offset in `buf` up to which bytes have been scanned.
    scanned: usize,
    /// Open objects, outermost first.
    open: Vec<OpenObject>,
    in_string: bool,
    escaped: bool,
    /// Complete records that failed to decode or validate.
    skipped: usize,
}

#[derive(Debug, Clone, Copy)]
struct OpenObject {
    /// Offset in `buf` of the opening brace.
    start: usize,
    /// A triple was decoded somewhere inside this object.
    holds_triple: bool,
    /// Failed records inside this object, counted only if it is not a record.
    failed: usize,
}

impl OpenObject {
    fn at(start: usize) -> Self {
        Self {
            start,
            holds_triple: false,
            failed: 0,
        }
    }

    /// Malformed records this object accounts for once it fails to decode:
    /// its failed children if it was a container, otherwise itself.
    fn failed_records(&self) -> usize {
        if self.holds_triple || self.failed > 0 {
            self.failed
        } else {
            1
        }
    }
}

impl IncrementalTripleParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `chunk` and return the triples whose records completed in it.
    pub fn feed(&mut self, chunk: &str) -> Vec<Triple> {
        self.buf.push_str(chunk);

        let mut found = Vec::new();
        let mut open = std::mem::take(&mut self.open);
        let mut in_string = self.in_string;
        let mut escaped = self.escaped;

        for (i, &b) in self.buf.as_bytes().iter().enumerate().skip(self.scanned) {
            if open.is_empty() {
                if b == b'{' {
                    open.push(OpenObject::at(i));
                    in_string = false;
                    escaped = false;
                }
                continue;
            }

            if in_string {
                if escaped {
                    escaped = false;
                } else if b == b'\\' {
                    escaped = true;
                } else if b == b'"' {
                    in_string = false;
                }
                continue;
            }

            match b {
                b'"' => in_string = true,
                b'{' => open.push(OpenObject::at(i)),
                b'}' => {
                    let Some(object) = open.pop() else {
                        continue;
                    };
                    // `{` and `}` are ASCII, so both ends are char boundaries.
                    let record = &self.buf[object.start..=i];
                    if let Some(triple) = decode_record(record) {
                        found.push(triple);
                        if let Some(parent) = open.last_mut() {
                            parent.holds_triple = true;
                        }
                        continue;
                    }

                    match open.last_mut() {
                        Some(parent) => {
                            parent.failed += object.failed_records();
                            parent.holds_triple |= object.holds_triple;
                        }
                        None => {
                            let failed = object.failed_records();
                            if failed > 0 {
                                tracing::debug!(
                                    record = %record,
                                    failed = failed,
                                    "Skipping malformed triple records"
                                );
                            }
                            self.skipped += failed;
                        }
                    }
                }
                _ => {}
            }
        }

        // Drop everything before the outermost open object (or everything, if none).
        let keep_from = open.first().map_or(self.buf.len(), |o| o.start);
        self.buf.drain(..keep_from);
        for object in &mut open {
            object.start -= keep_from;
        }
        self.scanned = self.buf.len();
        self.open = open;
        self.in_string = in_string;
        self.escaped = escaped;

        found
    }

    /// Number of complete records dropped so far.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Bytes held for objects that have not closed yet.
    pub fn pending_len(&self) -> usize {
        if self.open.is_empty() {
            0
        } else {
            self.buf.len()
        }
    }
}

/// Extract every complete triple record present in `buffer`.
///
/// Re-running on a longer buffer that starts with `buffer` returns the same
/// triples followed by any newly completed ones.
pub fn extract_triples(buffer: &str) -> Vec<Triple> {
    IncrementalTripleParser::new().feed(buffer)
}

fn decode_record(record: &str) -> Option<Triple> {
    let value: Value = serde_json::from_str(record).ok()?;
    triple_from_candidate(&value)
}

// =============================================================================
// Whole-document Parser
// =============================================================================

/// Decode a complete model response into validated triples.
///
/// Accepts `{"triples": [...]}` or a bare top-level array. Invalid entries are
/// dropped; an unparseable response is an error.
pub fn parse_document(text: &str) -> Result<Vec<Triple>, ExtractionError> {
    let payload = locate_json(text).ok_or_else(|| {
        let preview: String = text.chars().take(80).collect();
        ExtractionError::Malformed(preview)
    })?;

    let items = match &payload {
        Value::Array(items) => items,
        Value::Object(obj) => match obj.get("triples").and_then(Value::as_array) {
            Some(items) => items,
            // A lone record is a one-triple document.
            None => {
                return triple_from_candidate(&payload)
                    .map(|triple| vec![triple])
                    .ok_or(ExtractionError::MissingTriples);
            }
        },
        _ => return Err(ExtractionError::MissingTriples),
    };

    let triples: Vec<Triple> = items.iter().filter_map(triple_from_candidate).collect();

    let dropped = items.len() - triples.len();
    if dropped > 0 {
        tracing::warn!(
            dropped = dropped,
            valid = triples.len(),
            "Filtered invalid triples from model output"
        );
    }

    Ok(triples)
}

/// Find a JSON payload in `text`: the whole text, a fenced code block, or
/// an outermost `{...}` or `[...]` span embedded in prose.
fn locate_json(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(v) = serde_json::from_str(trimmed) {
        return Some(v);
    }

    if let Some(fenced) = fenced_block(trimmed)
        && let Ok(v) = serde_json::from_str(fenced.trim())
    {
        return Some(v);
    }

    // Each bracket kind spans independently, earliest opener first.
    let mut spans: Vec<(usize, &str)> = [('{', '}'), ('[', ']')]
        .into_iter()
        .filter_map(|(opener, closer)| {
            let open = trimmed.find(opener)?;
            let close = trimmed.rfind(closer)?;
            (close > open).then(|| (open, &trimmed[open..=close]))
        })
        .collect();
    spans.sort_by_key(|&(open, _)| open);
    spans
        .into_iter()
        .find_map(|(_, span)| serde_json::from_str(span).ok())
}

/// Contents of the first Markdown code fence, minus its language tag.
fn fenced_block(text: &str) -> Option<&str> {
    let after_open = &text[text.find("```")? + 3..];
    let body_start = after_open.find('\n').map_or(0, |n| n + 1);
    let body = &after_open[body_start..];
    let end = body.find("```")?;
    Some(&body[..end])
}
