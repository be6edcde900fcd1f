//! Configuration loading for the search pipeline
//!
//! Credentials and settings live in the Sift config directory
//! (`~/.config/sift/`), with environment variables as a fallback:
//! - `google-credentials.json` or `GMAIL_CLIENT_ID` / `GMAIL_CLIENT_SECRET`
//! - `gemini.json` or `GEMINI_API_KEY` / `GEMINI_MODEL`
//! - `settings.json` (optional, every field defaulted)
//!
//! No credential is ever compiled into the binary.

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::classify::MatchMode;
use crate::fetch::{FetchOptions, MAX_PAGE_SIZE};
use crate::retry::RetryPolicy;

/// OAuth client credentials filename in the Sift config directory
const CREDENTIALS_FILE: &str = "google-credentials.json";

/// Language model key filename in the Sift config directory
const GEMINI_FILE: &str = "gemini.json";

/// Search settings filename in the Sift config directory
const SETTINGS_FILE: &str = "settings.json";

/// OAuth credentials for Gmail API access
#[derive(Debug, Clone)]
pub struct GmailCredentials {
    pub client_id: String,
    pub client_secret: String,
}

/// Google Cloud Console credential file format (installed app)
#[derive(Deserialize)]
struct GoogleCredentialFile {
    installed: Option<InstalledCredentials>,
    web: Option<InstalledCredentials>,
}

#[derive(Deserialize)]
struct InstalledCredentials {
    client_id: String,
    client_secret: String,
}

impl GmailCredentials {
    /// Load credentials using the following priority:
    /// 1. JSON file (~/.config/sift/google-credentials.json)
    /// 2. Environment variables
    pub fn load() -> Result<Self> {
        if config::config_exists(CREDENTIALS_FILE) {
            let creds: GoogleCredentialFile = config::load_json(CREDENTIALS_FILE)?;
            return Self::from_credential_file(creds);
        }

        Self::from_env()
    }

    /// Parse credentials from a GoogleCredentialFile
    fn from_credential_file(creds: GoogleCredentialFile) -> Result<Self> {
        // Support both "installed" (desktop) and "web" credential types
        let installed = creds
            .installed
            .or(creds.web)
            .context("Credentials file missing 'installed' or 'web' section")?;

        Ok(Self {
            client_id: installed.client_id,
            client_secret: installed.client_secret,
        })
    }

    /// Parse credentials from JSON string (Google Cloud Console format)
    pub fn from_json(json: &str) -> Result<Self> {
        let creds: GoogleCredentialFile =
            serde_json::from_str(json).context("Failed to parse credentials JSON")?;
        Self::from_credential_file(creds)
    }

    /// Load credentials from environment variables
    pub fn from_env() -> Result<Self> {
        let client_id = std::env::var("GMAIL_CLIENT_ID")
            .context("GMAIL_CLIENT_ID environment variable not set")?;
        let client_secret = std::env::var("GMAIL_CLIENT_SECRET")
            .context("GMAIL_CLIENT_SECRET environment variable not set")?;

        Ok(Self {
            client_id,
            client_secret,
        })
    }
}

/// API key and model for the Gemini classifier
#[derive(Clone, Deserialize)]
pub struct GeminiCredentials {
    pub api_key: String,
    #[serde(default = "default_model")]
    pub model: String,
}

fn default_model() -> String {
    GeminiCredentials::DEFAULT_MODEL.to_string()
}

impl std::fmt::Debug for GeminiCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiCredentials")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .finish()
    }
}

impl GeminiCredentials {
    pub const DEFAULT_MODEL: &'static str = "gemini-pro";

    /// Load the key using the following priority:
    /// 1. JSON file (~/.config/sift/gemini.json)
    /// 2. Environment variables
    pub fn load() -> Result<Self> {
        if config::config_exists(GEMINI_FILE) {
            let creds: GeminiCredentials = config::load_json(GEMINI_FILE)?;
            return creds.validated();
        }

        Self::from_env()
    }

    /// Parse credentials from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        let creds: GeminiCredentials =
            serde_json::from_str(json).context("Failed to parse Gemini credentials JSON")?;
        creds.validated()
    }

    /// Load credentials from `GEMINI_API_KEY` and optional `GEMINI_MODEL`
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .context("GEMINI_API_KEY environment variable not set")?;
        let model = std::env::var("GEMINI_MODEL").unwrap_or_else(|_| default_model());

        Self { api_key, model }.validated()
    }

    fn validated(mut self) -> Result<Self> {
        self.api_key = self.api_key.trim().to_string();
        if self.api_key.is_empty() {
            anyhow::bail!("Gemini API key is empty");
        }
        if self.model.trim().is_empty() {
            self.model = default_model();
        }
        Ok(self)
    }
}

/// Tunables for a search, read from `settings.json`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    /// References requested per listing page (max 500)
    pub page_size: usize,
    /// Pagination ceiling
    pub max_pages: usize,
    /// Concurrent detail fetches per page
    pub fetch_concurrency: usize,
    /// Concurrent classification calls (1 = sequential)
    pub classify_concurrency: usize,
    /// How model answers become booleans
    pub match_mode: MatchMode,
    /// Whether token acquisition may prompt the user
    pub interactive: bool,
    /// Backoff for transient network failures
    pub retry: RetryPolicy,
}

impl Default for SearchSettings {
    fn default() -> Self {
        let fetch = FetchOptions::default();
        Self {
            page_size: fetch.page_size,
            max_pages: fetch.max_pages,
            fetch_concurrency: fetch.concurrency,
            classify_concurrency: 1,
            match_mode: MatchMode::default(),
            interactive: true,
            retry: RetryPolicy::default(),
        }
    }
}

impl SearchSettings {
    /// Load `settings.json` from the config directory, defaults if absent
    pub fn load() -> Result<Self> {
        Ok(config::load_json_optional::<Self>(SETTINGS_FILE)?
            .unwrap_or_default()
            .normalized())
    }

    /// Parse settings from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        let settings: Self = serde_json::from_str(json).context("Failed to parse settings JSON")?;
        Ok(settings.normalized())
    }

    /// Clamp values into their valid ranges
    pub fn normalized(mut self) -> Self {
        self.page_size = self.page_size.clamp(1, MAX_PAGE_SIZE);
        self.max_pages = self.max_pages.max(1);
        self.fetch_concurrency = self.fetch_concurrency.max(1);
        self.classify_concurrency = self.classify_concurrency.max(1);
        self
    }

    /// Fetcher options derived from these settings
    pub fn fetch_options(&self) -> FetchOptions {
        FetchOptions {
            page_size: self.page_size,
            max_pages: self.max_pages,
            concurrency: self.fetch_concurrency,
        }
    }
}
