//! Citation token substitution for agent text
//!
//! The agent refers to search results with `{{CITE_<n>}}`, where `n` is the
//! 0-based position of an item in the most recent result set of the request.
//! Substitution swaps each resolvable token for the item's link and leaves
//! every other token untouched.
//!
//! ## Streaming
//!
//! Text arrives in arbitrarily split fragments, so a token can straddle two
//! fragments. [`CitationStream`] holds back a tail that might still become a
//! token and emits everything before it. Concatenating its output equals one
//! call to [`substitute_citations`] on the whole text, except when the text
//! ends inside a token: `flush` then emits the incomplete token literally.

use crate::search_cache::ResultCache;
use regex::{Captures, Regex};
use std::sync::OnceLock;

const TOKEN_PREFIX: &str = "{{CITE_";

fn citation_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\{\{CITE_([0-9]+)\}\}").expect("Failed to compile citation token regex")
    })
}

/// Replace every resolvable citation token in `text`
///
/// All tokens resolve against one snapshot of the cache's latest set.
/// Indices that overflow and cache misses leave the token as written.
pub fn substitute_citations(text: &str, cache: &ResultCache) -> String {
    if !text.contains(TOKEN_PREFIX) {
        return text.to_string();
    }

    let latest = cache.latest();
    citation_pattern()
        .replace_all(text, |caps: &Captures| {
            caps[1]
                .parse::<usize>()
                .ok()
                .and_then(|index| latest.as_deref()?.link(index))
                .unwrap_or(&caps[0])
                .to_string()
        })
        .into_owned()
}

/// Incremental substitution over a fragmented text stream
#[derive(Debug, Default)]
pub struct CitationStream {
    buffer: String,
}

impl CitationStream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one fragment; returns the substituted text that is safe to emit
    ///
    /// May return an empty string while a possible token is pending.
    pub fn push(&mut self, fragment: &str, cache: &ResultCache) -> String {
        self.buffer.push_str(fragment);

        let ready = self.ready_len();
        if ready == 0 {
            return String::new();
        }

        let text: String = self.buffer.drain(..ready).collect();
        substitute_citations(&text, cache)
    }

    /// Emit whatever is still held back, even an incomplete token
    pub fn flush(&mut self, cache: &ResultCache) -> String {
        let rest = std::mem::take(&mut self.buffer);
        if rest.is_empty() {
            return rest;
        }
        substitute_citations(&rest, cache)
    }

    /// Text currently held back
    pub fn pending(&self) -> &str {
        &self.buffer
    }

    /// Length of the buffer prefix that can no longer change meaning
    fn ready_len(&self) -> usize {
        let buffer = self.buffer.as_str();

        if let Some(start) = buffer.rfind("{{") {
            let tail = &buffer[start..];
            if !tail.contains("}}") && is_token_prefix(tail) {
                return start;
            }
        }

        // A lone trailing brace may open a token with the next fragment
        if buffer.ends_with('{') {
            buffer.len() - 1
        } else {
            buffer.len()
        }
    }
}

/// Whether `tail` (starting at `{{`) may still grow into a complete token
///
/// Accepts prefixes of `{{CITE_`, then `{{CITE_` followed by digits, then
/// those digits followed by a single `}`.
fn is_token_prefix(tail: &str) -> bool {
    if tail.len() <= TOKEN_PREFIX.len() {
        return TOKEN_PREFIX.starts_with(tail);
    }

    let Some(rest) = tail.strip_prefix(TOKEN_PREFIX) else {
        return false;
    };
    let digits = rest.strip_suffix('}').unwrap_or(rest);
    let closed = digits.len() < rest.len();

    digits.bytes().all(|b| b.is_ascii_digit()) && (!closed || !digits.is_empty())
}
