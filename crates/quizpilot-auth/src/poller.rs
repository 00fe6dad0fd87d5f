//! QR-code login polling
//!
//! Drives the login protocol: obtain a ticket, hand its URL to the caller
//! once, then poll the status endpoint on a fixed interval until the login
//! is confirmed, the ticket expires, the retry budget runs out, or the
//! caller cancels.

use crate::credential::{AuthCredential, LoginTicket, PollOutcome};
use crate::store::StoreError;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Fixed delay between poll attempts (protocol-mandated).
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Hard cap on poll attempts per login attempt (~60 seconds wall-clock).
pub const MAX_POLL_ATTEMPTS: u32 = 60;

/// Authentication errors
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("Malformed upstream response: {0}")]
    Protocol(String),
    #[error("Login ticket expired")]
    TicketExpired,
    #[error("Login polling timed out")]
    Timeout,
    #[error("Login cancelled")]
    Cancelled,
    #[error("Credential store error: {0}")]
    Store(#[from] StoreError),
}

pub type AuthResult<T> = Result<T, AuthError>;

/// Transport to the upstream login endpoints.
///
/// `poll_status` is infallible by signature: every failure mode of one
/// attempt is data ([`PollOutcome`]), so the poller alone decides what is
/// retried and what terminates the attempt.
#[async_trait]
pub trait LoginTransport: Send + Sync {
    /// Request a fresh login ticket.
    async fn get_ticket(&self) -> AuthResult<LoginTicket>;

    /// Poll the login status for an outstanding ticket.
    async fn poll_status(&self, auth_code: &str) -> PollOutcome;
}

/// Polls the QR-code login protocol until it resolves one way or the other.
pub struct LoginPoller {
    transport: Arc<dyn LoginTransport>,
    interval: Duration,
    max_attempts: u32,
}

impl LoginPoller {
    pub fn new(transport: Arc<dyn LoginTransport>) -> Self {
        Self {
            transport,
            interval: POLL_INTERVAL,
            max_attempts: MAX_POLL_ATTEMPTS,
        }
    }

    /// Start a login attempt by acquiring a fresh ticket.
    ///
    /// Ticket acquisition is not retried here; callers may retry the whole
    /// attempt.
    pub async fn begin(&self) -> AuthResult<LoginTicket> {
        let ticket = self.transport.get_ticket().await?;
        debug!("Obtained login ticket, expires in {}s", ticket.expires_in);
        Ok(ticket)
    }

    /// Poll until the ticket resolves.
    ///
    /// `on_ticket_ready` is invoked exactly once with the ticket URL before
    /// the first poll so the caller can render it; it must not block.
    /// Cancellation via `cancel` is observed between attempts and during the
    /// inter-attempt sleep; no attempt starts after it is observed.
    pub async fn poll_until_resolved(
        &self,
        ticket: &LoginTicket,
        on_ticket_ready: impl FnOnce(&str),
        mut cancel: watch::Receiver<bool>,
    ) -> AuthResult<AuthCredential> {
        on_ticket_ready(&ticket.url);
        info!("Waiting for QR-code scan");

        for attempt in 1..=self.max_attempts {
            if *cancel.borrow() {
                info!("Login polling cancelled");
                return Err(AuthError::Cancelled);
            }

            match self.transport.poll_status(&ticket.auth_code).await {
                PollOutcome::Authenticated(credential) => {
                    info!("Login confirmed after {} poll(s)", attempt);
                    return Ok(credential);
                }
                PollOutcome::Pending => {
                    debug!("Login still pending (attempt {}/{})", attempt, self.max_attempts);
                }
                PollOutcome::Expired => {
                    warn!("Login ticket expired upstream");
                    return Err(AuthError::TicketExpired);
                }
                PollOutcome::TransientError(reason) => {
                    warn!("Poll attempt {} failed: {}", attempt, reason);
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                res = cancel.wait_for(|stopped| *stopped) => {
                    // A closed channel means the session side is gone;
                    // treat it the same as an explicit cancel.
                    let _ = res;
                    info!("Login polling cancelled");
                    return Err(AuthError::Cancelled);
                }
            }
        }

        warn!("QR-code login timed out after {} attempts", self.max_attempts);
        Err(AuthError::Timeout)
    }
}
