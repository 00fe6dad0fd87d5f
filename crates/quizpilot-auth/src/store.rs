//! Persistent credential cache
//!
//! Uses JSON file storage in ~/.config/quizpilot/auth.json. Freshness is
//! enforced through the file's modification time: a credential file older
//! than [`CREDENTIAL_TTL`] is never returned from [`AuthStore::load`].

use crate::credential::AuthCredential;
use std::path::PathBuf;
use std::time::{Duration, SystemTime};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Maximum age of a cached credential before re-authentication is required.
pub const CREDENTIAL_TTL: Duration = Duration::from_secs(7 * 24 * 3600);

/// Storage errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Configuration directory not found")]
    NoConfigDir,
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// File-backed credential cache with age-based expiry.
///
/// Pure data access: no locking is needed because the session runner is the
/// only writer and every reader gets its own snapshot.
#[derive(Debug, Clone)]
pub struct AuthStore {
    /// Path to the credential file
    path: PathBuf,
    /// Freshness window applied on load
    ttl: Duration,
}

impl AuthStore {
    /// Create a store at the default path (~/.config/quizpilot/auth.json).
    pub fn new() -> StoreResult<Self> {
        Ok(Self::with_path(Self::default_path()?))
    }

    /// Create a store at a specific path.
    pub fn with_path(path: PathBuf) -> Self {
        Self {
            path,
            ttl: CREDENTIAL_TTL,
        }
    }

    /// Override the freshness window (used by tests).
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    fn default_path() -> StoreResult<PathBuf> {
        let config_dir = dirs::config_dir().ok_or(StoreError::NoConfigDir)?;
        Ok(config_dir.join("quizpilot").join("auth.json"))
    }

    /// Load the cached credential, if present and fresh.
    ///
    /// A missing, stale, or unparseable file yields `Ok(None)`; only real
    /// I/O failures surface as errors.
    pub fn load(&self) -> StoreResult<Option<AuthCredential>> {
        if !self.path.exists() {
            debug!("No cached credential at {:?}", self.path);
            return Ok(None);
        }

        let modified = std::fs::metadata(&self.path)?.modified()?;
        let age = SystemTime::now()
            .duration_since(modified)
            .unwrap_or(Duration::ZERO);
        if age > self.ttl {
            info!("Cached credential is older than the freshness window, ignoring it");
            return Ok(None);
        }

        let contents = std::fs::read_to_string(&self.path)?;
        match serde_json::from_str::<AuthCredential>(&contents) {
            Ok(cred) => {
                info!("Loaded cached credential for user {}", cred.user_id);
                Ok(Some(cred))
            }
            Err(e) => {
                warn!("Failed to parse cached credential, ignoring it: {}", e);
                Ok(None)
            }
        }
    }

    /// Persist a credential, creating the parent directory if needed.
    pub fn save(&self, credential: &AuthCredential) -> StoreResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(credential)?;
        std::fs::write(&self.path, json)?;
        info!("Saved credential to {:?}", self.path);
        Ok(())
    }

    /// Remove the cached credential. A missing file is not an error.
    pub fn clear(&self) -> StoreResult<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)?;
            info!("Cleared cached credential");
        } else {
            debug!("No cached credential to clear");
        }
        Ok(())
    }
}
