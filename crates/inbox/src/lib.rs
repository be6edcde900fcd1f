//! Inbox crate - Relevance-filtered search over a mailbox
//!
//! This crate provides the search pipeline behind Sift:
//! - Credential acquisition (Gmail OAuth or a static token)
//! - Paginated mailbox fetching with bounded concurrent detail lookups
//! - Plaintext body extraction from MIME trees
//! - Per-message relevance judgments by a language model (Gemini)
//! - Aggregation and plain-text presentation of the matches
//!
//! The mail service and the language model sit behind the [`MailSource`]
//! and [`LanguageModel`] traits, so the pipeline runs against in-memory
//! fakes as easily as against the real APIs. HTTP is synchronous.

pub mod body;
pub mod cancel;
pub mod classify;
pub mod config;
pub mod error;
pub mod fetch;
pub mod gemini;
pub mod gmail;
pub mod models;
pub mod pipeline;
pub mod present;
pub mod retry;
pub mod token;

pub use body::{decode_body, extract_plain_text};
pub use cancel::{CancellationToken, SearchCoordinator, SearchTicket};
pub use classify::{LanguageModel, MatchMode, RelevanceClassifier, build_prompt};
pub use config::{GeminiCredentials, GmailCredentials, SearchSettings};
pub use error::{AuthError, ClassificationError, DetailFetchError, SearchError};
pub use fetch::{FetchOptions, FetchReport, MAX_PAGE_SIZE, MailFetcher, MailSource};
pub use gemini::GeminiClient;
pub use gmail::{GmailAuth, GmailClient};
pub use models::{
    Message, MessageId, MessagePage, MessagePart, SearchOutcome, SearchResult, SearchStats,
};
pub use pipeline::{NoopObserver, PipelineOptions, SearchObserver, SearchPipeline, SearchState};
pub use present::{ResultPresenter, TextPresenter};
pub use retry::RetryPolicy;
pub use token::{Credential, StaticTokenProvider, TokenProvider};
