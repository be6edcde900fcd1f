//! Gemini API HTTP client
//!
//! Uses synchronous HTTP (ureq) to be executor-agnostic.

use log::debug;

use super::api::{GenerateContentRequest, GenerateContentResponse};
use crate::classify::LanguageModel;
use crate::config::GeminiCredentials;
use crate::error::ClassificationError;
use crate::retry::{self, RetryPolicy};

/// Gemini `generateContent` client
pub struct GeminiClient {
    api_key: String,
    model: String,
    base_url: String,
    retry: RetryPolicy,
    agent: ureq::Agent,
}

impl GeminiClient {
    /// Generative Language API base URL
    pub const BASE_URL: &'static str = "https://generativelanguage.googleapis.com/v1beta";

    /// Create a client for the given key and model
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: Self::BASE_URL.to_string(),
            retry: RetryPolicy::default(),
            agent: retry::agent(),
        }
    }

    /// Create a client from loaded credentials
    pub fn from_credentials(credentials: &GeminiCredentials) -> Self {
        Self::new(credentials.api_key.clone(), credentials.model.clone())
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

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }

    /// Send one `generateContent` request
    fn send(&self, body: &GenerateContentRequest) -> Result<GenerateContentResponse, ureq::Error> {
        let mut response = self
            .agent
            .post(&self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .send_json(body)?;
        response.body_mut().read_json::<GenerateContentResponse>()
    }
}

impl LanguageModel for GeminiClient {
    fn generate(&self, prompt: &str) -> Result<String, ClassificationError> {
        let request = GenerateContentRequest::from_prompt(prompt);

        let response = self
            .retry
            .run("Gemini request", || self.send(&request), retry::is_transient)
            .map_err(|e| match e {
                ureq::Error::StatusCode(status) => ClassificationError::Status(status),
                ureq::Error::Json(e) => ClassificationError::MalformedResponse(e.to_string()),
                other => ClassificationError::Transport(other.to_string()),
            })?;

        match response.first_text() {
            Some(text) => {
                debug!("Gemini answered {:?}", text.trim());
                Ok(text.trim().to_string())
            }
            None => Err(ClassificationError::MalformedResponse(format!(
                "no candidate text ({} candidates)",
                response.candidates.len()
            ))),
        }
    }
}
