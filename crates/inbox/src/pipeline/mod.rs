//! End-to-end relevance search over a whole mailbox
//!
//! A search acquires one credential, fetches every message, extracts each
//! plaintext body and asks the classifier about it. Matches come back in
//! the order the messages were fetched.
//!
//! Fatal failures (authorization, a listing page, cancellation) abort the
//! search. Per-message failures are logged, counted in [`SearchStats`] and
//! otherwise ignored.

mod state;

pub use state::{NoopObserver, SearchObserver, SearchState};

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use anyhow::{Context, Result};
use log::{debug, info, warn};
use rayon::prelude::*;

use crate::body::extract_plain_text;
use crate::cancel::CancellationToken;
use crate::classify::{LanguageModel, RelevanceClassifier};
use crate::config::SearchSettings;
use crate::error::{ClassificationError, SearchError};
use crate::fetch::{FetchOptions, MailFetcher, MailSource};
use crate::models::{Message, SearchOutcome, SearchResult, SearchStats};
use crate::token::TokenProvider;

/// Tuning for [`SearchPipeline`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineOptions {
    /// Whether token acquisition may prompt the user
    pub interactive: bool,
    /// Concurrent classification calls; 1 classifies sequentially
    pub classify_concurrency: usize,
    pub fetch: FetchOptions,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            interactive: true,
            classify_concurrency: 1,
            fetch: FetchOptions::default(),
        }
    }
}

impl From<&SearchSettings> for PipelineOptions {
    fn from(settings: &SearchSettings) -> Self {
        Self {
            interactive: settings.interactive,
            classify_concurrency: settings.classify_concurrency.max(1),
            fetch: settings.fetch_options(),
        }
    }
}

/// Orchestrates token acquisition, fetching and classification
pub struct SearchPipeline {
    tokens: Arc<dyn TokenProvider>,
    fetcher: MailFetcher,
    classifier: RelevanceClassifier,
    options: PipelineOptions,
    classify_pool: Option<rayon::ThreadPool>,
}

impl SearchPipeline {
    pub fn new(
        tokens: Arc<dyn TokenProvider>,
        source: Arc<dyn MailSource>,
        classifier: RelevanceClassifier,
        options: PipelineOptions,
    ) -> Result<Self> {
        let fetcher = MailFetcher::new(source, options.fetch)?;

        let classify_pool = if options.classify_concurrency > 1 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(options.classify_concurrency)
                .thread_name(|i| format!("sift-classify-{}", i))
                .build()
                .context("Failed to start classification pool")?;
            Some(pool)
        } else {
            None
        };

        Ok(Self {
            tokens,
            fetcher,
            classifier,
            options,
            classify_pool,
        })
    }

    /// Build a pipeline from loaded settings
    pub fn from_settings(
        tokens: Arc<dyn TokenProvider>,
        source: Arc<dyn MailSource>,
        model: Arc<dyn LanguageModel>,
        settings: &SearchSettings,
    ) -> Result<Self> {
        let classifier = RelevanceClassifier::new(model).with_mode(settings.match_mode);
        Self::new(tokens, source, classifier, PipelineOptions::from(settings))
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Run a search without cancellation or progress reporting
    pub fn search(&self, query: &str) -> Result<SearchOutcome, SearchError> {
        self.search_with(query, &CancellationToken::new(), &NoopObserver)
    }

    /// Run a search, reporting transitions to `observer`
    ///
    /// # Errors
    /// * `SearchError::Auth` if no credential could be acquired
    /// * `SearchError::Fetch` / `SearchError::PageLimitExceeded` if listing fails
    /// * `SearchError::Cancelled` if `cancel` fires at any stage
    pub fn search_with(
        &self,
        query: &str,
        cancel: &CancellationToken,
        observer: &dyn SearchObserver,
    ) -> Result<SearchOutcome, SearchError> {
        let start = Instant::now();
        info!("Searching mailbox for {:?}", query);

        match self.run(query, cancel, observer) {
            Ok(mut outcome) => {
                outcome.stats.duration_ms = start.elapsed().as_millis() as u64;
                info!(
                    "Search finished: {} matches out of {} messages in {}ms",
                    outcome.stats.matches, outcome.stats.messages_fetched, outcome.stats.duration_ms
                );
                observer.on_state(&SearchState::Done);
                Ok(outcome)
            }
            Err(e) => {
                if e.is_cancelled() {
                    info!("Search cancelled after {}ms", start.elapsed().as_millis());
                } else {
                    warn!("Search failed: {}", e);
                }
                observer.on_state(&SearchState::Failed(e.to_string()));
                Err(e)
            }
        }
    }

    fn run(
        &self,
        query: &str,
        cancel: &CancellationToken,
        observer: &dyn SearchObserver,
    ) -> Result<SearchOutcome, SearchError> {
        let mut stats = SearchStats::default();

        // 1. One credential for the whole search
        observer.on_state(&SearchState::AcquiringToken);
        if cancel.is_cancelled() {
            return Err(SearchError::Cancelled);
        }
        let credential = self.tokens.acquire(self.options.interactive, cancel)?;

        // 2. Every message in the mailbox
        observer.on_state(&SearchState::Fetching);
        let report = self.fetcher.fetch_all(&credential, cancel)?;
        stats.pages_fetched = report.pages;
        stats.messages_fetched = report.messages.len();
        stats.detail_failures = report.detail_failures.len();

        // 3. Extract and classify
        observer.on_state(&SearchState::Classifying);
        let total = report.messages.len();
        let mut candidates = Vec::with_capacity(total);
        for message in report.messages {
            match extract_plain_text(&message) {
                Some(body) if !body.is_empty() => candidates.push((message, body)),
                _ => {
                    debug!("Message {} has no plaintext body, skipping", message.id);
                    stats.messages_without_body += 1;
                }
            }
        }

        let skipped = stats.messages_without_body;
        if skipped > 0 {
            observer.on_progress(skipped, total);
        }

        let verdicts = match &self.classify_pool {
            Some(pool) => {
                self.classify_concurrent(pool, &candidates, query, cancel, observer, skipped, total)?
            }
            None => self.classify_sequential(&candidates, query, cancel, observer, skipped, total)?,
        };

        // 4. Aggregate in fetched order
        let mut results = Vec::new();
        for ((message, body), verdict) in candidates.into_iter().zip(verdicts) {
            stats.messages_classified += 1;
            match verdict {
                Ok(true) => results.push(into_result(message, body)),
                Ok(false) => {}
                Err(e) => {
                    warn!(
                        "Classification failed for message {}, treating as not relevant: {}",
                        message.id, e
                    );
                    stats.classification_errors += 1;
                }
            }
        }
        stats.matches = results.len();

        Ok(SearchOutcome { results, stats })
    }

    fn classify_sequential(
        &self,
        candidates: &[(Message, String)],
        query: &str,
        cancel: &CancellationToken,
        observer: &dyn SearchObserver,
        skipped: usize,
        total: usize,
    ) -> Result<Vec<Result<bool, ClassificationError>>, SearchError> {
        let mut verdicts = Vec::with_capacity(candidates.len());
        for (i, (_, body)) in candidates.iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(SearchError::Cancelled);
            }
            verdicts.push(self.classifier.try_classify(body, query));
            observer.on_progress(skipped + i + 1, total);
        }
        Ok(verdicts)
    }

    #[allow(clippy::too_many_arguments)]
    fn classify_concurrent(
        &self,
        pool: &rayon::ThreadPool,
        candidates: &[(Message, String)],
        query: &str,
        cancel: &CancellationToken,
        observer: &dyn SearchObserver,
        skipped: usize,
        total: usize,
    ) -> Result<Vec<Result<bool, ClassificationError>>, SearchError> {
        let processed = AtomicUsize::new(skipped);

        let verdicts: Vec<Option<Result<bool, ClassificationError>>> = pool.install(|| {
            candidates
                .par_iter()
                .map(|(_, body)| {
                    if cancel.is_cancelled() {
                        return None;
                    }
                    let verdict = self.classifier.try_classify(body, query);
                    let done = processed.fetch_add(1, Ordering::SeqCst) + 1;
                    observer.on_progress(done, total);
                    Some(verdict)
                })
                .collect()
        });

        if cancel.is_cancelled() {
            return Err(SearchError::Cancelled);
        }

        Ok(verdicts.into_iter().flatten().collect())
    }
}

fn into_result(message: Message, body: String) -> SearchResult {
    SearchResult {
        id: message.id,
        snippet: message.snippet,
        body,
    }
}
