//! Credential and login-ticket data model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The cached credential bundle issued on successful login.
///
/// Persisted immediately after the poller resolves; collaborators receive
/// immutable snapshots (clones), never shared mutable access.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthCredential {
    /// Opaque access token for authenticated calls.
    pub access_token: String,
    /// CSRF-equivalent token extracted from the session cookies.
    pub csrf: String,
    /// Upstream user identifier.
    pub user_id: String,
    /// Full session cookie string.
    pub cookie: String,
    /// When the credential was issued.
    pub issued_at: DateTime<Utc>,
}

impl AuthCredential {
    pub fn new(
        access_token: impl Into<String>,
        csrf: impl Into<String>,
        user_id: impl Into<String>,
        cookie: impl Into<String>,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            csrf: csrf.into(),
            user_id: user_id.into(),
            cookie: cookie.into(),
            issued_at: Utc::now(),
        }
    }
}

/// A short-lived authorization code plus the URL to present as a QR code.
///
/// Consumed entirely within one login attempt; never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginTicket {
    /// Authorization code polled against the status endpoint.
    pub auth_code: String,
    /// User-facing URL to render as a QR code or show as a link.
    pub url: String,
    /// Freshness window reported by the endpoint, in seconds.
    pub expires_in: i64,
}

/// Result of one poll against the login status endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// Not scanned/confirmed yet; keep polling.
    Pending,
    /// Login confirmed; polling stops immediately.
    Authenticated(AuthCredential),
    /// The ticket expired upstream; the attempt has failed.
    Expired,
    /// Network or parse failure on this one attempt; retried.
    TransientError(String),
}
