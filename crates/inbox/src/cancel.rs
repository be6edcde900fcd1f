//! Cancellation and search supersession
//!
//! A [`CancellationToken`] is threaded through every pipeline stage. The
//! [`SearchCoordinator`] hands out one token per search and cancels the
//! previous one when a new search starts, so results from a superseded
//! search can be recognised and discarded.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use log::debug;

/// Shared cancellation flag
///
/// Cloning yields a handle to the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation; idempotent
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Handle for one started search
#[derive(Debug, Clone)]
pub struct SearchTicket {
    /// Monotonically increasing search generation
    pub generation: u64,
    /// Token cancelled when a newer search begins
    pub token: CancellationToken,
}

/// Cancel-and-restart coordination for user-triggered searches
#[derive(Debug, Default)]
pub struct SearchCoordinator {
    generation: AtomicU64,
    current: Mutex<Option<CancellationToken>>,
}

impl SearchCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new search, cancelling any search still in flight
    pub fn begin(&self) -> SearchTicket {
        let token = CancellationToken::new();

        // Bump the generation under the lock so the stored token always belongs to it
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(previous) = current.replace(token.clone()) {
            debug!("Search generation {} supersedes an in-flight search", generation);
            previous.cancel();
        }

        SearchTicket { generation, token }
    }

    /// Whether the ticket belongs to the most recent search
    pub fn is_current(&self, ticket: &SearchTicket) -> bool {
        self.generation.load(Ordering::SeqCst) == ticket.generation
    }

    /// Cancel whatever search is in flight without starting a new one
    pub fn cancel_current(&self) {
        let current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(token) = current.as_ref() {
            token.cancel();
        }
    }

    /// Generation of the most recently started search (0 before any)
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }
}
