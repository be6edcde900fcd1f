//! Search lifecycle and progress reporting

use std::fmt;

/// Where a search currently is
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchState {
    Idle,
    AcquiringToken,
    Fetching,
    Classifying,
    Done,
    /// A fatal error ended the search
    Failed(String),
}

impl SearchState {
    /// Whether no further transitions will follow
    pub fn is_terminal(&self) -> bool {
        matches!(self, SearchState::Done | SearchState::Failed(_))
    }
}

impl fmt::Display for SearchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchState::Idle => f.write_str("idle"),
            SearchState::AcquiringToken => f.write_str("acquiring token"),
            SearchState::Fetching => f.write_str("fetching"),
            SearchState::Classifying => f.write_str("classifying"),
            SearchState::Done => f.write_str("done"),
            SearchState::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

/// Receives state transitions and classification progress
///
/// Called from the thread running the search, and from classification
/// workers when concurrent classification is enabled.
pub trait SearchObserver: Send + Sync {
    fn on_state(&self, _state: &SearchState) {}

    /// Called after each message is processed during `Classifying`
    fn on_progress(&self, _processed: usize, _total: usize) {}
}

/// Observer that ignores everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl SearchObserver for NoopObserver {}
