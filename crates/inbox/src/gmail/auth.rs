//! Gmail OAuth2 authentication
//!
//! Implements OAuth2 authorization code flow for Gmail API authentication.
//! Uses a local HTTP server to receive the OAuth callback.
//! Uses synchronous HTTP (ureq) to be executor-agnostic.
//!
//! Token requests are not retried. Waiting for the browser redirect is
//! bounded by a consent timeout and stops as soon as the search is cancelled.

use anyhow::{Context, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::io::{self, BufRead, BufReader, Write};
use std::net::TcpListener;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use crate::cancel::CancellationToken;
use crate::error::AuthError;
use crate::retry;
use crate::token::{Credential, TokenProvider};

/// Cached token filename in the Sift config directory
const TOKEN_FILE: &str = "gmail-tokens.json";

/// OAuth2 configuration and token management for Gmail
pub struct GmailAuth {
    client_id: String,
    client_secret: String,
    token_path: PathBuf,
    token_url: String,
    consent_timeout: Duration,
    agent: ureq::Agent,
}

/// Stored token data
#[derive(Debug, Serialize, Deserialize)]
struct StoredToken {
    access_token: String,
    refresh_token: Option<String>,
    expires_at: Option<i64>,
}

impl StoredToken {
    /// Whether the access token stays valid for at least five more minutes
    fn is_fresh(&self) -> bool {
        self.expires_at
            .is_some_and(|expires_at| expires_at > chrono::Utc::now().timestamp() + 300)
    }
}

/// Token response from Google
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<u64>,
    #[allow(dead_code)]
    token_type: String,
}

/// Outcome of the browser redirect
#[derive(Debug, PartialEq, Eq)]
enum CallbackResult {
    Code(String),
    Error(String),
    Missing,
}

impl GmailAuth {
    /// Gmail API OAuth2 endpoints
    const AUTH_URL: &'static str = "https://accounts.google.com/o/oauth2/v2/auth";
    const TOKEN_URL: &'static str = "https://oauth2.googleapis.com/token";

    /// Read-only scope is enough for searching
    const GMAIL_READONLY_SCOPE: &'static str = "https://www.googleapis.com/auth/gmail.readonly";

    /// Port range to try for local OAuth callback server
    const PORT_RANGE_START: u16 = 8080;
    const PORT_RANGE_END: u16 = 8090;

    /// How long to wait for the user to finish the consent page
    pub const CONSENT_TIMEOUT: Duration = Duration::from_secs(300);

    /// Interval between cancellation checks while waiting for the redirect
    const ACCEPT_POLL: Duration = Duration::from_millis(100);

    /// Create a new GmailAuth instance caching tokens in the config directory
    ///
    /// # Arguments
    /// * `client_id` - OAuth2 client ID from Google Cloud Console
    /// * `client_secret` - OAuth2 client secret from Google Cloud Console
    pub fn new(client_id: String, client_secret: String) -> Result<Self> {
        let token_path =
            config::config_path(TOKEN_FILE).context("Could not determine config directory")?;
        Ok(Self::with_token_path(client_id, client_secret, token_path))
    }

    /// Create a GmailAuth caching tokens at an explicit path
    pub fn with_token_path(client_id: String, client_secret: String, token_path: PathBuf) -> Self {
        Self {
            client_id,
            client_secret,
            token_path,
            token_url: Self::TOKEN_URL.to_string(),
            consent_timeout: Self::CONSENT_TIMEOUT,
            agent: retry::agent(),
        }
    }

    /// Exchange and refresh tokens at another endpoint (e.g., a local mock server)
    pub fn with_token_url(mut self, token_url: impl Into<String>) -> Self {
        self.token_url = token_url.into();
        self
    }

    pub fn with_consent_timeout(mut self, timeout: Duration) -> Self {
        self.consent_timeout = timeout;
        self
    }

    /// Get a valid access token, refreshing or re-authenticating as needed
    fn access_token(
        &self,
        interactive: bool,
        cancel: &CancellationToken,
    ) -> Result<String, AuthError> {
        if cancel.is_cancelled() {
            return Err(AuthError::Cancelled);
        }

        if let Ok(token) = self.load_token() {
            if token.is_fresh() {
                return Ok(token.access_token);
            }

            if let Some(refresh_token) = token.refresh_token {
                match self.refresh_access_token(&refresh_token) {
                    Ok(new_token) => {
                        self.save_token_response(&new_token)
                            .map_err(AuthError::failed)?;
                        return Ok(new_token.access_token);
                    }
                    Err(e) => warn!("Token refresh failed: {:#}", e),
                }
            }
        }

        if !interactive {
            return Err(AuthError::InteractionRequired);
        }
        if cancel.is_cancelled() {
            return Err(AuthError::Cancelled);
        }

        let token = self.authorization_code_auth(cancel)?;
        self.save_token_response(&token).map_err(AuthError::failed)?;
        Ok(token.access_token)
    }

    /// Perform authorization code flow authentication
    fn authorization_code_auth(
        &self,
        cancel: &CancellationToken,
    ) -> Result<TokenResponse, AuthError> {
        // Step 1: Start local server to receive callback
        let (listener, port) = self.start_local_server().map_err(AuthError::failed)?;
        let redirect_uri = format!("http://localhost:{}", port);

        // Step 2: Build authorization URL
        let auth_url = format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&access_type=offline&prompt=consent",
            Self::AUTH_URL,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&redirect_uri),
            urlencoding::encode(Self::GMAIL_READONLY_SCOPE),
        );

        info!("Opening browser for Gmail authorization");
        info!("If the browser doesn't open, visit: {}", auth_url);
        if let Err(e) = open::that(&auth_url) {
            warn!("Failed to open browser: {}. Please open the URL manually.", e);
        }

        // Step 3: Wait for callback with authorization code
        let code = match self.wait_for_callback(&listener, cancel)? {
            CallbackResult::Code(code) => code,
            CallbackResult::Error(error) => return Err(AuthError::Denied(error)),
            CallbackResult::Missing => {
                return Err(AuthError::Failed(
                    "No authorization code received".to_string(),
                ));
            }
        };

        // Step 4: Exchange code for tokens
        let mut response = self
            .agent
            .post(&self.token_url)
            .send_form([
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("code", code.as_str()),
                ("grant_type", "authorization_code"),
                ("redirect_uri", redirect_uri.as_str()),
            ])
            .context("Failed to exchange authorization code")
            .map_err(AuthError::failed)?;

        let token: TokenResponse = response
            .body_mut()
            .read_json()
            .context("Failed to parse token response")
            .map_err(AuthError::failed)?;

        info!("Gmail authorization successful");
        Ok(token)
    }

    /// Start a local TCP server on an available port
    fn start_local_server(&self) -> Result<(TcpListener, u16)> {
        for port in Self::PORT_RANGE_START..=Self::PORT_RANGE_END {
            if let Ok(listener) = TcpListener::bind(format!("127.0.0.1:{}", port)) {
                return Ok((listener, port));
            }
        }
        anyhow::bail!(
            "Could not bind to any port in range {}-{}",
            Self::PORT_RANGE_START,
            Self::PORT_RANGE_END
        )
    }

    /// Wait for OAuth callback and extract the authorization code or error
    ///
    /// Polls the listener so that cancellation and the consent timeout are
    /// noticed while no browser has connected yet.
    fn wait_for_callback(
        &self,
        listener: &TcpListener,
        cancel: &CancellationToken,
    ) -> Result<CallbackResult, AuthError> {
        listener
            .set_nonblocking(true)
            .context("Failed to configure callback listener")
            .map_err(AuthError::failed)?;

        let deadline = Instant::now() + self.consent_timeout;
        let mut stream = loop {
            match listener.accept() {
                Ok((stream, _)) => break stream,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    if cancel.is_cancelled() {
                        info!("Gmail authorization cancelled");
                        return Err(AuthError::Cancelled);
                    }
                    if Instant::now() >= deadline {
                        return Err(AuthError::Failed(format!(
                            "No authorization received within {}s",
                            self.consent_timeout.as_secs()
                        )));
                    }
                    std::thread::sleep(Self::ACCEPT_POLL);
                }
                Err(e) => {
                    return Err(AuthError::failed(
                        anyhow::Error::new(e).context("Failed to accept connection"),
                    ));
                }
            }
        };

        let request_line = read_request_line(&stream).map_err(AuthError::failed)?;

        let result = parse_callback(&request_line);

        let (status, body) = match result {
            CallbackResult::Code(_) => ("200 OK", "Authentication successful! You can close this window."),
            _ => ("400 Bad Request", "Authentication failed. Please try again."),
        };
        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: text/html\r\nConnection: close\r\n\r\n<html><body><h1>{}</h1></body></html>",
            status, body
        );
        stream.write_all(response.as_bytes()).ok();

        Ok(result)
    }

    /// Refresh an access token using a refresh token
    fn refresh_access_token(&self, refresh_token: &str) -> Result<TokenResponse> {
        let response = self
            .agent
            .post(&self.token_url)
            .send_form([
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .context("Failed to refresh access token")?;

        let mut token: TokenResponse = response
            .into_body()
            .read_json()
            .context("Failed to parse refresh token response")?;

        // Preserve the refresh token if not returned
        if token.refresh_token.is_none() {
            token.refresh_token = Some(refresh_token.to_string());
        }

        Ok(token)
    }

    /// Load stored token from disk
    fn load_token(&self) -> Result<StoredToken> {
        config::load_json_file(&self.token_path)
    }

    /// Save token response to disk
    fn save_token_response(&self, token: &TokenResponse) -> Result<()> {
        let stored = StoredToken {
            access_token: token.access_token.clone(),
            refresh_token: token.refresh_token.clone(),
            expires_at: token
                .expires_in
                .map(|d| chrono::Utc::now().timestamp() + d as i64),
        };

        config::save_json_file(&self.token_path, &stored)
    }

    /// Check if a fresh token is cached
    pub fn is_authenticated(&self) -> bool {
        self.load_token().is_ok_and(|token| token.is_fresh())
    }

    /// Remove the token cached in the config directory without needing client credentials
    pub fn clear_cached_token() -> Result<()> {
        config::remove(TOKEN_FILE)
    }
}

impl TokenProvider for GmailAuth {
    fn acquire(
        &self,
        interactive: bool,
        cancel: &CancellationToken,
    ) -> Result<Credential, AuthError> {
        self.access_token(interactive, cancel).map(Credential::new)
    }
}

/// Read the first line of the redirect request from the browser
fn read_request_line(stream: &std::net::TcpStream) -> Result<String> {
    stream
        .set_nonblocking(false)
        .context("Failed to configure callback connection")?;
    stream
        .set_read_timeout(Some(Duration::from_secs(10)))
        .context("Failed to configure callback connection")?;

    let mut request_line = String::new();
    BufReader::new(stream)
        .read_line(&mut request_line)
        .context("Failed to read request")?;
    Ok(request_line)
}

/// Parse the redirect request line, e.g. `GET /?code=AUTH_CODE&scope=... HTTP/1.1`
fn parse_callback(request_line: &str) -> CallbackResult {
    let query = request_line
        .split_whitespace()
        .nth(1)
        .and_then(|path| path.split_once('?'))
        .map(|(_, query)| query)
        .unwrap_or_default();

    let param = |name: &str| {
        query.split('&').find_map(|pair| {
            let (key, value) = pair.split_once('=')?;
            (key == name).then(|| {
                urlencoding::decode(value)
                    .map(|v| v.into_owned())
                    .unwrap_or_else(|_| value.to_string())
            })
        })
    };

    if let Some(error) = param("error") {
        return CallbackResult::Error(error);
    }
    match param("code") {
        Some(code) if !code.is_empty() => CallbackResult::Code(code),
        _ => CallbackResult::Missing,
    }
}
