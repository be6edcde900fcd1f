//! Bearer credential acquisition

use crate::cancel::CancellationToken;
use crate::error::AuthError;

/// Opaque bearer token for the mail service
///
/// Owned by the search invocation that acquired it. `Debug` never prints
/// the token itself.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw token, for the `Authorization` header
    pub fn secret(&self) -> &str {
        &self.0
    }

    /// `Authorization` header value
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// Source of bearer credentials for the mail service
pub trait TokenProvider: Send + Sync {
    /// Obtain a credential; `interactive` allows prompting the user for consent
    ///
    /// Implementations that wait on the user or the network return
    /// `AuthError::Cancelled` once `cancel` fires.
    fn acquire(
        &self,
        interactive: bool,
        cancel: &CancellationToken,
    ) -> Result<Credential, AuthError>;
}

/// Provider for a token obtained elsewhere (environment, host app)
pub struct StaticTokenProvider {
    token: String,
}

impl StaticTokenProvider {
    /// Environment variable read by [`StaticTokenProvider::from_env`]
    pub const ENV_VAR: &'static str = "SIFT_ACCESS_TOKEN";

    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    /// Build from `SIFT_ACCESS_TOKEN`, if set
    pub fn from_env() -> Option<Self> {
        std::env::var(Self::ENV_VAR)
            .ok()
            .filter(|t| !t.trim().is_empty())
            .map(Self::new)
    }
}

impl TokenProvider for StaticTokenProvider {
    fn acquire(
        &self,
        _interactive: bool,
        _cancel: &CancellationToken,
    ) -> Result<Credential, AuthError> {
        let token = self.token.trim();
        if token.is_empty() {
            return Err(AuthError::Failed("Access token is empty".to_string()));
        }
        Ok(Credential::new(token))
    }
}
