//! Access-token sources and the explicit session check.
//!
//! Acquiring or refreshing OAuth credentials is left to an external helper;
//! this module only reads what it produced and refuses tokens known to be
//! expired.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::config::GoogleConfig;
use crate::error::{PipelineError, Result};

pub const TOKEN_ENV_VAR: &str = "FACE_HARVESTER_TOKEN";

/// A validated bearer token, shared by every client for one invocation.
#[derive(Clone)]
pub struct Session {
    access_token: String,
}

impl Session {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
        }
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session").field("access_token", &"<redacted>").finish()
    }
}

/// A source of access tokens.
pub trait CredentialProvider {
    fn access_token(&self) -> Result<String>;

    fn provider_name(&self) -> &'static str;
}

/// A token handed over directly, through config or the environment.
pub struct StaticTokenProvider {
    token: String,
}

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl CredentialProvider for StaticTokenProvider {
    fn access_token(&self) -> Result<String> {
        Ok(self.token.clone())
    }

    fn provider_name(&self) -> &'static str {
        "static"
    }
}

#[derive(Debug, Deserialize)]
struct TokenFile {
    access_token: String,
    #[serde(default)]
    expires_at: Option<DateTime<Utc>>,
}

/// Reads `{"access_token": "...", "expires_at": "<RFC 3339>"}` from disk.
pub struct TokenFileProvider {
    path: PathBuf,
}

impl TokenFileProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialProvider for TokenFileProvider {
    fn access_token(&self) -> Result<String> {
        let content = std::fs::read_to_string(&self.path).map_err(|e| {
            PipelineError::Credentials(format!("cannot read token file {:?}: {}", self.path, e))
        })?;
        let token: TokenFile = serde_json::from_str(&content).map_err(|e| {
            PipelineError::Credentials(format!("cannot parse token file {:?}: {}", self.path, e))
        })?;

        if let Some(expires_at) = token.expires_at {
            if expires_at <= Utc::now() {
                return Err(PipelineError::Credentials(format!(
                    "token in {:?} expired at {}; re-authenticate",
                    self.path, expires_at
                )));
            }
        }

        Ok(token.access_token)
    }

    fn provider_name(&self) -> &'static str {
        "token-file"
    }
}

/// Pick a provider: the environment variable wins, then a literal token in
/// config, then the configured token file.
pub fn provider_from_config(config: &GoogleConfig) -> Result<Box<dyn CredentialProvider>> {
    if let Ok(token) = std::env::var(TOKEN_ENV_VAR) {
        return Ok(Box::new(StaticTokenProvider::new(token)));
    }
    if let Some(ref token) = config.access_token {
        return Ok(Box::new(StaticTokenProvider::new(token.clone())));
    }
    if let Some(ref path) = config.token_file {
        return Ok(Box::new(TokenFileProvider::new(path.clone())));
    }

    Err(PipelineError::Credentials(format!(
        "no access token configured; set {} or google.token_file",
        TOKEN_ENV_VAR
    )))
}

/// Obtain a token once and wrap it for injection into the clients.
pub fn ensure_valid_session(provider: &dyn CredentialProvider) -> Result<Session> {
    let token = provider.access_token()?;
    if token.trim().is_empty() {
        return Err(PipelineError::Credentials(format!(
            "{} provider returned an empty token",
            provider.provider_name()
        )));
    }

    tracing::debug!(provider = provider.provider_name(), "Session validated");
    Ok(Session::new(token.trim()))
}
