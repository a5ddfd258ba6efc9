//! Credentials for remote document sources
//!
//! `evaluate_token` is pure decision logic. Callers obtain and refresh tokens
//! and persist them through a `TokenStore`.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Tokens expiring within this window are treated as expired
pub const EXPIRY_MARGIN_SECS: i64 = 60;

/// A persisted OAuth token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredToken {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
}

impl StoredToken {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now + Duration::seconds(EXPIRY_MARGIN_SECS)
    }
}

/// What the caller should do with its stored credentials
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenDecision {
    /// Use this token as-is
    Valid(StoredToken),
    /// Exchange this refresh token for a new access token
    Refresh(String),
    /// Run the interactive authorization flow
    Reauthenticate,
}

/// Decide how to obtain usable credentials at time `now`
pub fn evaluate_token(token: Option<&StoredToken>, now: DateTime<Utc>) -> TokenDecision {
    let Some(token) = token else {
        return TokenDecision::Reauthenticate;
    };

    if token.access_token.is_empty() {
        return match &token.refresh_token {
            Some(refresh) if !refresh.is_empty() => TokenDecision::Refresh(refresh.clone()),
            _ => TokenDecision::Reauthenticate,
        };
    }

    if !token.is_expired(now) {
        return TokenDecision::Valid(token.clone());
    }

    match &token.refresh_token {
        Some(refresh) if !refresh.is_empty() => TokenDecision::Refresh(refresh.clone()),
        _ => TokenDecision::Reauthenticate,
    }
}

/// Where a source keeps its credentials between runs
pub trait TokenStore: Send + Sync {
    /// The stored token, if any
    fn load(&self) -> Result<Option<StoredToken>>;

    /// Replace the stored token
    fn save(&self, token: &StoredToken) -> Result<()>;
}

/// Token kept as JSON in a local file
#[derive(Debug, Clone)]
pub struct TokenFile {
    path: PathBuf,
}

impl TokenFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TokenStore for TokenFile {
    fn load(&self) -> Result<Option<StoredToken>> {
        let raw = match std::fs::read(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::Io(e)),
        };

        match serde_json::from_slice(&raw) {
            Ok(token) => Ok(Some(token)),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), "Ignoring corrupt token file: {}", e);
                Ok(None)
            }
        }
    }

    fn save(&self, token: &StoredToken) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_vec_pretty(token)?)?;
        Ok(())
    }
}
