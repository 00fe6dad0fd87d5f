//! Session controller
//!
//! Composition root and lifecycle guard: at most one runner is ever live,
//! stop is idempotent and race-free, and observers get the event stream
//! through broadcast subscriptions.

use crate::gate::InteractionGate;
use crate::runner::SessionRunner;
use crate::transport::{AnswerProvider, QuizTransport};
use quizpilot_auth::{AuthStore, LoginTransport, StoreError};
use quizpilot_core::{ModelChoice, SessionEvent, SessionOutcome, VerificationResponse};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{broadcast, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Controller errors
#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("A session is already running")]
    AlreadyRunning,
    #[error("Credential store error: {0}")]
    Store(#[from] StoreError),
}

/// The one live session, if any.
struct ActiveSession {
    stop_tx: watch::Sender<bool>,
    gate: Arc<InteractionGate>,
    handle: JoinHandle<SessionOutcome>,
    /// Flips to true when the worker task is done; lets `join` wait
    /// without vacating the slot while the session is still live.
    done_rx: watch::Receiver<bool>,
}

/// Owns the collaborators and the lifecycle of the single active session.
///
/// Each session gets a fresh stop channel and a fresh gate; nothing is
/// shared between consecutive sessions except the credential store.
pub struct SessionController {
    quiz: Arc<dyn QuizTransport>,
    provider: Arc<dyn AnswerProvider>,
    login: Arc<dyn LoginTransport>,
    store: AuthStore,
    events: broadcast::Sender<SessionEvent>,
    active: Mutex<Option<ActiveSession>>,
}

impl SessionController {
    pub fn new(
        quiz: Arc<dyn QuizTransport>,
        provider: Arc<dyn AnswerProvider>,
        login: Arc<dyn LoginTransport>,
        store: AuthStore,
    ) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            quiz,
            provider,
            login,
            store,
            events,
            active: Mutex::new(None),
        }
    }

    /// Subscribe to the session event stream.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Start a session with the given model choice.
    ///
    /// Policy: while a session is live this fails with `AlreadyRunning`;
    /// the old session is never stopped implicitly. Call [`stop`] first.
    ///
    /// [`stop`]: SessionController::stop
    pub async fn start(&self, model: ModelChoice) -> Result<(), ControllerError> {
        let mut active = self.active.lock().await;
        if let Some(session) = active.as_ref() {
            if !session.handle.is_finished() {
                return Err(ControllerError::AlreadyRunning);
            }
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        let gate = Arc::new(InteractionGate::new(stop_rx.clone()));
        let runner = SessionRunner::new(
            self.quiz.clone(),
            self.provider.clone(),
            self.login.clone(),
            self.store.clone(),
            model,
            gate.clone(),
            self.events.clone(),
            stop_rx,
        );
        let (done_tx, done_rx) = watch::channel(false);
        let handle = tokio::spawn(async move {
            let outcome = runner.run().await;
            let _ = done_tx.send(true);
            outcome
        });
        *active = Some(ActiveSession {
            stop_tx,
            gate,
            handle,
            done_rx,
        });
        info!("Session started");
        Ok(())
    }

    /// Stop the active session and wait for the worker to finish.
    ///
    /// Idempotent: with no active session this returns `None`. Stopping
    /// flips the cooperative stop signal and cancels any in-flight gate
    /// wait; it never touches the stored credential.
    pub async fn stop(&self) -> Option<SessionOutcome> {
        let session = self.active.lock().await.take()?;
        let _ = session.stop_tx.send(true);
        session.gate.cancel().await;
        match session.handle.await {
            Ok(outcome) => {
                info!("Session stopped: {}", outcome);
                Some(outcome)
            }
            Err(e) => {
                warn!("Session task failed to join: {}", e);
                Some(SessionOutcome::FatalError(e.to_string()))
            }
        }
    }

    /// Route an answer to the session's pending verification request.
    ///
    /// [`VerificationResponse::Cancelled`] cancels the pending wait. With
    /// no active session or no pending request the answer is dropped;
    /// the return value says whether a waiter actually received it.
    ///
    /// The [`SessionEvent::VerificationNeeded`] event is emitted just
    /// before the worker arms its wait, so an answer fired directly from
    /// the event handler can arrive early and be dropped. Callers that
    /// react to the event should retry while this returns `false`.
    pub async fn resolve_verification(&self, response: VerificationResponse) -> bool {
        let active = self.active.lock().await;
        match active.as_ref() {
            Some(session) => match response {
                VerificationResponse::Cancelled => session.gate.cancel().await,
                other => session.gate.resolve(other).await,
            },
            None => {
                debug!("No active session; verification response dropped");
                false
            }
        }
    }

    /// Whether a session is currently live.
    pub async fn is_running(&self) -> bool {
        self.active
            .lock()
            .await
            .as_ref()
            .map(|s| !s.handle.is_finished())
            .unwrap_or(false)
    }

    /// Wait for the active session to end on its own and return its outcome.
    ///
    /// The session stays registered for the whole wait, so `start` keeps
    /// rejecting and `resolve_verification` keeps routing answers while a
    /// caller sits here. Returns `None` if there is no active session or a
    /// concurrent [`stop`] reaped the outcome first.
    ///
    /// [`stop`]: SessionController::stop
    pub async fn join(&self) -> Option<SessionOutcome> {
        let mut done_rx = {
            let active = self.active.lock().await;
            match active.as_ref() {
                Some(session) => session.done_rx.clone(),
                None => return None,
            }
        };
        // Err means the worker is gone without reporting; the handle join
        // below surfaces that as a task failure.
        let _ = done_rx.wait_for(|done| *done).await;

        let session = {
            let mut active = self.active.lock().await;
            // Only reap the session we waited on; the slot may hold a
            // successor if a stop/start pair raced this wait.
            let ours = active
                .as_ref()
                .map(|session| session.done_rx.same_channel(&done_rx))
                .unwrap_or(false);
            if !ours {
                return None;
            }
            active.take()?
        };
        match session.handle.await {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                warn!("Session task failed to join: {}", e);
                Some(SessionOutcome::FatalError(e.to_string()))
            }
        }
    }

    /// Clear the cached credential. Refused while a session is live.
    pub async fn logout(&self) -> Result<(), ControllerError> {
        if self.is_running().await {
            return Err(ControllerError::AlreadyRunning);
        }
        self.store.clear()?;
        info!("Logged out");
        Ok(())
    }
}
