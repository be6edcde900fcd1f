//! Mailbox pagination and message resolution
//!
//! [`MailFetcher`] walks the listing page by page and resolves every
//! reference on a page to full content on a bounded worker pool, joining
//! the page before moving on. A failed listing page aborts the fetch; a
//! failed detail fetch only drops that message.

use std::sync::Arc;

use anyhow::{Context, Result};
use log::{debug, info, warn};
use rayon::prelude::*;

use crate::cancel::CancellationToken;
use crate::error::{DetailFetchError, SearchError};
use crate::models::{Message, MessageId, MessagePage};
use crate::token::Credential;

/// Largest page the listing endpoint accepts
pub const MAX_PAGE_SIZE: usize = 500;

/// Remote mailbox: a paginated listing plus a per-message detail lookup
pub trait MailSource: Send + Sync {
    /// List one page of message references
    ///
    /// # Arguments
    /// * `page_size` - Maximum number of references to return (1-500)
    /// * `page_token` - Cursor from the previous page, `None` for the first
    fn list_messages(
        &self,
        credential: &Credential,
        page_size: usize,
        page_token: Option<&str>,
    ) -> Result<MessagePage>;

    /// Resolve a message reference to its full content
    fn get_message(&self, credential: &Credential, id: &MessageId) -> Result<Message>;
}

/// Tuning for [`MailFetcher`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchOptions {
    /// References requested per listing page (capped at 500)
    pub page_size: usize,
    /// Pagination ceiling; listing more pages than this is an error
    pub max_pages: usize,
    /// Concurrent detail fetches per page
    pub concurrency: usize,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            page_size: MAX_PAGE_SIZE,
            max_pages: 1_000,
            concurrency: 32,
        }
    }
}

/// Everything a full fetch produced
#[derive(Debug, Default)]
pub struct FetchReport {
    /// Successfully resolved messages, page order preserved
    pub messages: Vec<Message>,
    /// Number of listing pages fetched
    pub pages: usize,
    /// Messages dropped because their detail fetch failed
    pub detail_failures: Vec<DetailFetchError>,
}

/// Paginating fetcher over a [`MailSource`]
pub struct MailFetcher {
    source: Arc<dyn MailSource>,
    options: FetchOptions,
    pool: rayon::ThreadPool,
}

impl MailFetcher {
    /// Create a fetcher with its own detail-fetch worker pool
    pub fn new(source: Arc<dyn MailSource>, options: FetchOptions) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(options.concurrency.max(1))
            .thread_name(|i| format!("sift-fetch-{}", i))
            .build()
            .context("Failed to start detail fetch pool")?;

        Ok(Self {
            source,
            options,
            pool,
        })
    }

    pub fn options(&self) -> &FetchOptions {
        &self.options
    }

    /// Fetch every message in the mailbox
    ///
    /// # Errors
    /// * `SearchError::Fetch` if a listing page fails
    /// * `SearchError::PageLimitExceeded` if pagination never ends
    /// * `SearchError::Cancelled` if `cancel` fires
    pub fn fetch_all(
        &self,
        credential: &Credential,
        cancel: &CancellationToken,
    ) -> Result<FetchReport, SearchError> {
        let page_size = self.options.page_size.clamp(1, MAX_PAGE_SIZE);
        let mut report = FetchReport::default();
        let mut page_token: Option<String> = None;

        loop {
            if cancel.is_cancelled() {
                return Err(SearchError::Cancelled);
            }
            if report.pages >= self.options.max_pages {
                warn!(
                    "Listing still returned a page token after {} pages, giving up",
                    report.pages
                );
                return Err(SearchError::PageLimitExceeded {
                    max_pages: self.options.max_pages,
                });
            }

            let page_index = report.pages;
            let page = self
                .source
                .list_messages(credential, page_size, page_token.as_deref())
                .map_err(|e| SearchError::Fetch {
                    page_index,
                    page_token: page_token.clone(),
                    reason: format!("{:#}", e),
                })?;
            report.pages += 1;

            debug!(
                "Listing page {} returned {} references",
                page_index,
                page.refs.len()
            );

            let (messages, failures) = self.fetch_page(credential, &page.refs, cancel)?;
            report.messages.extend(messages);
            report.detail_failures.extend(failures);

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        info!(
            "Fetched {} messages from {} pages ({} detail failures)",
            report.messages.len(),
            report.pages,
            report.detail_failures.len()
        );
        Ok(report)
    }

    /// Resolve one page's references concurrently and join the results
    fn fetch_page(
        &self,
        credential: &Credential,
        refs: &[MessageId],
        cancel: &CancellationToken,
    ) -> Result<(Vec<Message>, Vec<DetailFetchError>), SearchError> {
        let results: Vec<Option<Result<Message, DetailFetchError>>> = self.pool.install(|| {
            refs.par_iter()
                .map(|id| {
                    if cancel.is_cancelled() {
                        return None;
                    }
                    Some(self.source.get_message(credential, id).map_err(|e| {
                        DetailFetchError {
                            id: id.clone(),
                            reason: format!("{:#}", e),
                        }
                    }))
                })
                .collect()
        });

        if cancel.is_cancelled() {
            return Err(SearchError::Cancelled);
        }

        let mut messages = Vec::with_capacity(results.len());
        let mut failures = Vec::new();
        for result in results.into_iter().flatten() {
            match result {
                Ok(message) => messages.push(message),
                Err(e) => {
                    warn!("{}", e);
                    failures.push(e);
                }
            }
        }

        Ok((messages, failures))
    }
}
