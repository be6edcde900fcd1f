//! Error types for the search pipeline
//!
//! Fatal errors (`AuthError`, `SearchError`) abort a search and reach the
//! user. Per-item errors (`DetailFetchError`, `ClassificationError`) are
//! absorbed: the item is dropped or treated as a non-match and the error
//! is only logged and counted.

use crate::models::MessageId;

/// Bearer credential acquisition failed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("Authorization denied: {0}")]
    Denied(String),

    #[error("Interactive authorization required")]
    InteractionRequired,

    #[error("Authorization failed: {0}")]
    Failed(String),

    #[error("Authorization cancelled")]
    Cancelled,
}

impl AuthError {
    /// Build a `Failed` error from an anyhow chain, keeping the context
    pub fn failed(err: anyhow::Error) -> Self {
        AuthError::Failed(format!("{:#}", err))
    }
}

/// A search that could not complete
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error(transparent)]
    Auth(AuthError),

    #[error(
        "Failed to fetch emails (page {page_index}, cursor {}): {reason}",
        .page_token.as_deref().unwrap_or("<start>")
    )]
    Fetch {
        /// Zero-based index of the listing page that failed
        page_index: usize,
        /// Cursor sent with the failed request
        page_token: Option<String>,
        reason: String,
    },

    #[error("Mailbox listing did not end after {max_pages} pages")]
    PageLimitExceeded { max_pages: usize },

    #[error("Search cancelled")]
    Cancelled,
}

impl From<AuthError> for SearchError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Cancelled => SearchError::Cancelled,
            other => SearchError::Auth(other),
        }
    }
}

impl SearchError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, SearchError::Cancelled)
    }
}

/// Full content of one message could not be fetched
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Failed to fetch email details for message ID {id}: {reason}")]
pub struct DetailFetchError {
    pub id: MessageId,
    pub reason: String,
}

/// The language model could not produce a usable judgment
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClassificationError {
    #[error("Model request failed: {0}")]
    Transport(String),

    #[error("Model API error: HTTP {0}")]
    Status(u16),

    #[error("Unexpected model response: {0}")]
    MalformedResponse(String),
}
