//! Single-slot verification hand-off gate
//!
//! One execution context posts a typed request and blocks until another
//! context supplies a response, the wait times out, or the session is
//! cancelled. The three outcomes are mutually exclusive: the slot is taken
//! by whichever side fires first, and everything that arrives later is a
//! no-op instead of a silently dropped or double-applied answer.

use quizpilot_core::{VerificationRequest, VerificationResponse};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{oneshot, watch, Mutex};
use tracing::debug;

/// How long the runner waits for a human answer before giving up.
pub const VERIFICATION_TIMEOUT: Duration = Duration::from_secs(30);

/// Gate misuse errors
#[derive(Debug, Error)]
pub enum GateError {
    #[error("A verification request is already pending")]
    AlreadyPending,
}

/// How a gate wait ended. Exactly one of these fires per request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateOutcome {
    Resolved(VerificationResponse),
    TimedOut,
    Cancelled,
}

enum GateReply {
    Resolved(VerificationResponse),
    Cancelled,
}

/// Blocking hand-off point between the session worker and whoever answers
/// verification challenges.
///
/// Owned by one session and never shared across sessions. The slot resets
/// after every firing, so the gate is reusable within its session. The
/// session-wide stop signal doubles as a cancellation source for any wait,
/// including one that starts after the stop was requested.
pub struct InteractionGate {
    /// Reply channel of the one outstanding request, if any.
    slot: Mutex<Option<oneshot::Sender<GateReply>>>,
    stop_rx: watch::Receiver<bool>,
}

impl InteractionGate {
    pub fn new(stop_rx: watch::Receiver<bool>) -> Self {
        Self {
            slot: Mutex::new(None),
            stop_rx,
        }
    }

    /// Block until the request is resolved, times out, or is cancelled.
    ///
    /// At most one request may be outstanding; a second concurrent call
    /// fails fast with [`GateError::AlreadyPending`] and has no side
    /// effects on the pending one.
    pub async fn request(
        &self,
        request: &VerificationRequest,
        timeout: Duration,
    ) -> Result<GateOutcome, GateError> {
        let mut stop_rx = self.stop_rx.clone();
        if *stop_rx.borrow() {
            debug!("Gate request ({}) refused: session is stopping", request.kind());
            return Ok(GateOutcome::Cancelled);
        }

        let (reply_tx, reply_rx) = oneshot::channel();
        {
            let mut slot = self.slot.lock().await;
            if slot.is_some() {
                return Err(GateError::AlreadyPending);
            }
            *slot = Some(reply_tx);
        }
        debug!("Gate waiting on {} request", request.kind());

        let outcome = tokio::select! {
            reply = reply_rx => match reply {
                Ok(GateReply::Resolved(response)) => GateOutcome::Resolved(response),
                // A dropped sender means the slot holder went away; treat
                // it the same as an explicit cancel.
                Ok(GateReply::Cancelled) | Err(_) => GateOutcome::Cancelled,
            },
            res = stop_rx.wait_for(|stopped| *stopped) => {
                let _ = res;
                GateOutcome::Cancelled
            }
            _ = tokio::time::sleep(timeout) => GateOutcome::TimedOut,
        };

        // Reset the slot so late resolve/cancel calls become no-ops and a
        // new request can be posted.
        self.slot.lock().await.take();
        debug!("Gate request ({}) ended: {:?}", request.kind(), outcome);
        Ok(outcome)
    }

    /// Deliver a response to the pending request.
    ///
    /// Returns `true` if a waiter received it. With no pending request this
    /// is a no-op, guarding against duplicate or late external answers.
    pub async fn resolve(&self, response: VerificationResponse) -> bool {
        match self.slot.lock().await.take() {
            Some(reply_tx) => reply_tx.send(GateReply::Resolved(response)).is_ok(),
            None => {
                debug!("Gate resolve with no pending request, ignoring");
                false
            }
        }
    }

    /// Cancel the pending request, if any.
    ///
    /// Returns `true` if a waiter was cancelled. With no pending request
    /// this is a no-op.
    pub async fn cancel(&self) -> bool {
        match self.slot.lock().await.take() {
            Some(reply_tx) => reply_tx.send(GateReply::Cancelled).is_ok(),
            None => {
                debug!("Gate cancel with no pending request, ignoring");
                false
            }
        }
    }
}
