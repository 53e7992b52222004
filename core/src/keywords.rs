//! Keyword filter: flags configured trigger words in free text
//!
//! Stateless scan, unrelated to call signaling. A match makes the server
//! broadcast a notice to every other connected endpoint; presence and
//! routing are never touched.

use thiserror::Error;

/// Trigger list used when the deployment configures nothing else.
pub const DEFAULT_KEYWORDS: &[&str] = &["sales", "loan", "sell", "sale", "finance", "buy", "offer"];

/// Outcome of scanning one input string.
#[derive(Debug, Clone, PartialEq)]
pub struct KeywordScan {
    pub input: String,
    /// Matched words in word-list order, not input order
    pub found: Vec<String>,
    pub matched: bool,
}

/// Keyword filter error types
#[derive(Debug, Error)]
pub enum KeywordError {
    #[error("Input must be a non-empty string")]
    EmptyInput,
}

pub struct KeywordFilter {
    words: Vec<String>,
}

impl KeywordFilter {
    /// Build a filter over `words`. Matching is case-insensitive, so the
    /// list is lowercased once here.
    pub fn new<S: AsRef<str>>(words: &[S]) -> Self {
        Self {
            words: words.iter().map(|w| w.as_ref().to_lowercase()).collect(),
        }
    }

    /// Case-insensitive scan of `input` against the configured word list.
    pub fn scan(&self, input: &str) -> Result<KeywordScan, KeywordError> {
        if input.is_empty() {
            return Err(KeywordError::EmptyInput);
        }
        let haystack = input.to_lowercase();
        let found: Vec<String> = self
            .words
            .iter()
            .filter(|word| haystack.contains(word.as_str()))
            .cloned()
            .collect();
        let matched = !found.is_empty();
        Ok(KeywordScan {
            input: input.to_string(),
            found,
            matched,
        })
    }

    /// Notice text broadcast to the other endpoints on a match.
    pub fn notice(scan: &KeywordScan) -> String {
        format!("Keywords detected: {}", scan.found.join(", "))
    }
}

impl Default for KeywordFilter {
    fn default() -> Self {
        Self::new(DEFAULT_KEYWORDS)
    }
}
