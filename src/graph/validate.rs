//! Triple validation.
//!
//! Candidates arrive as untyped JSON from model output. A candidate is
//! accepted only when it is an object whose `subject`, `predicate` and
//! `object` are non-blank strings, and whose subject and object differ
//! under case-insensitive trimmed comparison.

use serde_json::Value;

use super::model::Triple;

/// Returns `true` if `candidate` is a well-formed, non-trivial triple.
pub fn validate(candidate: &Value) -> bool {
    fields(candidate).is_some_and(|(s, p, o)| is_well_formed(s, p, o))
}

/// Decode a validated candidate into a [`Triple`] with trimmed fields.
pub fn triple_from_candidate(candidate: &Value) -> Option<Triple> {
    let (s, p, o) = fields(candidate)?;
    is_well_formed(s, p, o).then(|| Triple::new(s.trim(), p.trim(), o.trim()))
}

/// Same check as [`validate`], for an already typed triple.
pub fn is_valid_triple(triple: &Triple) -> bool {
    is_well_formed(&triple.subject, &triple.predicate, &triple.object)
}

fn fields(candidate: &Value) -> Option<(&str, &str, &str)> {
    let obj = candidate.as_object()?;
    let s = obj.get("subject")?.as_str()?;
    let p = obj.get("predicate")?.as_str()?;
    let o = obj.get("object")?.as_str()?;
    Some((s, p, o))
}

fn is_well_formed(subject: &str, predicate: &str, object: &str) -> bool {
    let (s, p, o) = (subject.trim(), predicate.trim(), object.trim());
    if s.is_empty() || p.is_empty() || o.is_empty() {
        return false;
    }
    // no self-loops
    s.to_lowercase() != o.to_lowercase()
}
