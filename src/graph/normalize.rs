//! Label normalization: predicate length limiting and node identity.

use sha2::{Digest, Sha256};

/// Number of hex characters of the label digest appended to lossy slugs.
const DIGEST_SUFFIX_LEN: usize = 10;

/// Keep at most `max_words` leading whitespace-separated words, joined by
/// single spaces.
///
/// ```rust
/// use cognify::graph::normalize::limit_words;
///
/// assert_eq!(limit_words("was deeply and profoundly influenced by", 3), "was deeply and");
/// ```
pub fn limit_words(text: &str, max_words: usize) -> String {
    text.split_whitespace()
        .take(max_words)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Lowercase the label and collapse all whitespace runs to single spaces.
pub fn normalize_label(label: &str) -> String {
    label
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Deterministic node id for an entity label.
///
/// The normalized label is slugged to `[a-z0-9-]`. When slugging loses
/// information (punctuation, non-ASCII letters), a digest of the normalized
/// label is appended so that e.g. `C` and `C++` stay distinct.
pub fn node_id(label: &str) -> String {
    let normalized = normalize_label(label);

    let mut slug = String::with_capacity(normalized.len());
    let mut lossy = false;
    for ch in normalized.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch);
        } else if ch == ' ' {
            if !slug.is_empty() && !slug.ends_with('-') {
                slug.push('-');
            }
        } else {
            lossy = true;
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }

    if !lossy && !slug.is_empty() {
        return slug;
    }

    let digest = hex::encode(Sha256::digest(normalized.as_bytes()));
    let suffix = &digest[..DIGEST_SUFFIX_LEN];
    if slug.is_empty() {
        format!("n-{suffix}")
    } else {
        format!("{slug}-{suffix}")
    }
}
