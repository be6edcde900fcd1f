//! Search output types

use serde::{Deserialize, Serialize};

use super::MessageId;

/// A message the classifier judged relevant to the query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Gmail message ID
    pub id: MessageId,
    /// Preview string from the service
    pub snippet: String,
    /// Decoded plaintext body
    pub body: String,
}

/// Statistics from one search invocation
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchStats {
    /// Number of listing pages fetched
    pub pages_fetched: usize,
    /// Number of messages resolved to full content
    pub messages_fetched: usize,
    /// Number of detail fetches that failed (messages dropped)
    pub detail_failures: usize,
    /// Number of messages skipped because no plaintext body exists
    pub messages_without_body: usize,
    /// Number of messages sent to the classifier
    pub messages_classified: usize,
    /// Number of classification calls that failed (treated as non-match)
    pub classification_errors: usize,
    /// Number of relevant messages
    pub matches: usize,
    /// Duration of the search
    pub duration_ms: u64,
}

/// Matches plus statistics for one search
#[derive(Debug, Default, Clone)]
pub struct SearchOutcome {
    /// Relevant messages, in the order they were processed
    pub results: Vec<SearchResult>,
    pub stats: SearchStats,
}

impl SearchOutcome {
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}
