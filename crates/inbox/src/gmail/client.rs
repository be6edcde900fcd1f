//! Gmail API HTTP client
//!
//! Provides the listing and message-detail calls used by the fetcher.
//! Uses synchronous HTTP (ureq) to be executor-agnostic.

use anyhow::{Context, Result};
use url::Url;

use super::api::{GmailMessage, ListMessagesResponse};
use super::normalize::{normalize_message, normalize_page};
use crate::fetch::{MAX_PAGE_SIZE, MailSource};
use crate::models::{Message, MessageId, MessagePage};
use crate::retry::{self, RetryPolicy};
use crate::token::Credential;

/// Gmail API client for listing and fetching messages
pub struct GmailClient {
    base_url: String,
    retry: RetryPolicy,
    agent: ureq::Agent,
}

impl Default for GmailClient {
    fn default() -> Self {
        Self::new()
    }
}

impl GmailClient {
    /// Gmail API base URL
    pub const BASE_URL: &'static str = "https://gmail.googleapis.com/gmail/v1";

    /// Create a new Gmail client
    pub fn new() -> Self {
        Self {
            base_url: Self::BASE_URL.to_string(),
            retry: RetryPolicy::default(),
            agent: retry::agent(),
        }
    }

    /// Point the client at another endpoint (e.g., a local mock server)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Build the listing URL for one page
    fn list_url(&self, max_results: usize, page_token: Option<&str>) -> Result<Url> {
        let mut url = Url::parse(&format!("{}/users/me/messages", self.base_url))
            .context("Invalid Gmail base URL")?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("maxResults", &max_results.clamp(1, MAX_PAGE_SIZE).to_string());
            if let Some(token) = page_token {
                query.append_pair("pageToken", token);
            }
        }
        Ok(url)
    }

    /// Build the detail URL for one message
    fn message_url(&self, id: &MessageId) -> String {
        format!(
            "{}/users/me/messages/{}?format=full",
            self.base_url,
            urlencoding::encode(id.as_str())
        )
    }

    /// List one page of message IDs from the user's mailbox
    ///
    /// # Arguments
    /// * `max_results` - Maximum number of messages to return per page (1-500)
    /// * `page_token` - Optional page token for pagination
    pub fn list_messages_raw(
        &self,
        credential: &Credential,
        max_results: usize,
        page_token: Option<&str>,
    ) -> Result<ListMessagesResponse> {
        let url = self.list_url(max_results, page_token)?;
        let bearer = credential.bearer();

        let mut response = self
            .retry
            .run(
                "List messages",
                || {
                    self.agent
                        .get(url.as_str())
                        .header("Authorization", &bearer)
                        .call()
                },
                retry::is_transient,
            )
            .context("Failed to send list messages request")?;

        response
            .body_mut()
            .read_json()
            .context("Failed to parse list messages response")
    }

    /// Get full message details by ID
    pub fn get_message_raw(&self, credential: &Credential, id: &MessageId) -> Result<GmailMessage> {
        let url = self.message_url(id);
        let bearer = credential.bearer();

        let mut response = self
            .retry
            .run(
                "Get message",
                || self.agent.get(&url).header("Authorization", &bearer).call(),
                retry::is_transient,
            )
            .context("Failed to send get message request")?;

        response
            .body_mut()
            .read_json()
            .context("Failed to parse message response")
    }
}

impl MailSource for GmailClient {
    fn list_messages(
        &self,
        credential: &Credential,
        page_size: usize,
        page_token: Option<&str>,
    ) -> Result<MessagePage> {
        self.list_messages_raw(credential, page_size, page_token)
            .map(normalize_page)
    }

    fn get_message(&self, credential: &Credential, id: &MessageId) -> Result<Message> {
        self.get_message_raw(credential, id).map(normalize_message)
    }
}
