//! Session runner
//!
//! Drives one end-to-end session: ensure authentication, then loop
//! fetch -> (optional verification episode) -> answer -> submit until the
//! upstream completes, a terminal error occurs, or an external stop wins.
//! All suspension points observe the cooperative stop signal.

use crate::gate::{GateError, GateOutcome, InteractionGate, VERIFICATION_TIMEOUT};
use crate::transport::{AnswerProvider, FetchOutcome, Question, QuizTransport, TransportError};
use quizpilot_auth::{AuthCredential, AuthError, AuthStore, LoginPoller, LoginTransport};
use quizpilot_core::{
    ModelChoice, SessionEvent, SessionOutcome, SessionState, VerificationRequest,
    VerificationResponse,
};
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tracing::{info, warn};

/// Consecutive fetch failures tolerated before the session gives up.
const MAX_FETCH_FAILURES: u32 = 3;

/// Verification submit attempts per episode.
const MAX_VERIFY_ATTEMPTS: u32 = 3;

/// Executes one session from authentication to a terminal outcome.
///
/// The runner exclusively owns its gate wait side and is the only writer of
/// the credential store; collaborators only ever see credential snapshots.
pub struct SessionRunner {
    quiz: Arc<dyn QuizTransport>,
    provider: Arc<dyn AnswerProvider>,
    login: Arc<dyn LoginTransport>,
    store: AuthStore,
    model: ModelChoice,
    gate: Arc<InteractionGate>,
    events: broadcast::Sender<SessionEvent>,
    stop_rx: watch::Receiver<bool>,
}

impl SessionRunner {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        quiz: Arc<dyn QuizTransport>,
        provider: Arc<dyn AnswerProvider>,
        login: Arc<dyn LoginTransport>,
        store: AuthStore,
        model: ModelChoice,
        gate: Arc<InteractionGate>,
        events: broadcast::Sender<SessionEvent>,
        stop_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            quiz,
            provider,
            login,
            store,
            model,
            gate,
            events,
            stop_rx,
        }
    }

    fn stopped(&self) -> bool {
        *self.stop_rx.borrow()
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine; events are observational only.
        let _ = self.events.send(event);
    }

    fn log(&self, message: impl Into<String>) {
        let message = message.into();
        info!("{}", message);
        self.emit(SessionEvent::Log(message));
    }

    fn set_state(&self, state: SessionState) {
        self.emit(SessionEvent::StateChanged(state));
    }

    /// Run to a terminal outcome. Blocks (suspends) until the session ends.
    pub async fn run(self) -> SessionOutcome {
        self.log(format!(
            "Starting session with the {} model",
            self.model.display_name()
        ));
        let outcome = self.drive().await;
        self.set_state(SessionState::Stopped);
        // Exactly one human-readable line explains why the session ended.
        self.log(format!("Session ended: {}", outcome));
        self.emit(SessionEvent::Finished(outcome.clone()));
        outcome
    }

    async fn drive(&self) -> SessionOutcome {
        if self.stopped() {
            return SessionOutcome::StoppedByUser;
        }

        self.set_state(SessionState::Authenticating);
        let credential = match self.ensure_auth().await {
            Ok(credential) => credential,
            Err(AuthError::Cancelled) => return SessionOutcome::StoppedByUser,
            Err(e) => {
                warn!("Authentication failed: {}", e);
                return SessionOutcome::AuthenticationFailed;
            }
        };

        self.set_state(SessionState::Running);
        let mut fetch_failures = 0u32;
        loop {
            if self.stopped() {
                return SessionOutcome::StoppedByUser;
            }

            match self.quiz.fetch_next(&credential).await {
                Ok(FetchOutcome::NoMoreQuestions) => {
                    return SessionOutcome::Completed;
                }
                Ok(FetchOutcome::Question(question)) => {
                    fetch_failures = 0;
                    if let Err(outcome) = self.answer_question(&credential, &question).await {
                        return outcome;
                    }
                }
                Ok(FetchOutcome::VerificationRequired) => {
                    fetch_failures = 0;
                    self.set_state(SessionState::AwaitingVerification);
                    match self.verification_episode(&credential).await {
                        Ok(()) => self.set_state(SessionState::Running),
                        Err(outcome) => return outcome,
                    }
                }
                Err(TransportError::Network(reason)) => {
                    fetch_failures += 1;
                    if fetch_failures >= MAX_FETCH_FAILURES {
                        return SessionOutcome::FatalError(format!(
                            "fetching questions kept failing: {}",
                            reason
                        ));
                    }
                    warn!(
                        "Question fetch failed ({}/{}): {}",
                        fetch_failures, MAX_FETCH_FAILURES, reason
                    );
                }
                Err(e @ TransportError::Protocol(_)) => {
                    return SessionOutcome::FatalError(e.to_string());
                }
            }
        }
    }

    /// Return a fresh-enough cached credential or run the QR login flow.
    async fn ensure_auth(&self) -> Result<AuthCredential, AuthError> {
        if let Some(credential) = self.store.load()? {
            self.log("Using cached login");
            return Ok(credential);
        }

        let poller = LoginPoller::new(self.login.clone());
        let ticket = poller.begin().await?;
        let events = self.events.clone();
        let credential = poller
            .poll_until_resolved(
                &ticket,
                |url| {
                    let _ = events.send(SessionEvent::QrReady {
                        url: url.to_string(),
                    });
                },
                self.stop_rx.clone(),
            )
            .await?;

        // Persisted immediately so the next run can reuse it.
        self.store.save(&credential)?;
        self.log("Login successful");
        Ok(credential)
    }

    async fn answer_question(
        &self,
        credential: &AuthCredential,
        question: &Question,
    ) -> Result<(), SessionOutcome> {
        self.log(format!("Question: {}", question.text));

        let answer = match self.ask_provider(&question.text).await {
            Some(answer) => answer,
            None => {
                // Fatal for this question only; the session moves on.
                self.log(format!(
                    "Answer provider gave up on question {}, skipping it",
                    question.id
                ));
                return Ok(());
            }
        };
        self.log(format!("Answer: {}", answer));

        match self.quiz.submit_answer(credential, question, &answer).await {
            Ok(()) => Ok(()),
            Err(TransportError::Network(reason)) => {
                warn!("Answer submit failed ({}), retrying once", reason);
                self.quiz
                    .submit_answer(credential, question, &answer)
                    .await
                    .map_err(|e| {
                        SessionOutcome::FatalError(format!("answer submit failed: {}", e))
                    })
            }
            Err(e) => Err(SessionOutcome::FatalError(format!(
                "answer submit failed: {}",
                e
            ))),
        }
    }

    /// Ask the provider, retrying once; `None` means both attempts failed.
    async fn ask_provider(&self, question: &str) -> Option<String> {
        match self.provider.ask(question).await {
            Ok(answer) => Some(answer),
            Err(first) => {
                warn!("Answer provider failed ({}), retrying once", first);
                match self.provider.ask(question).await {
                    Ok(answer) => Some(answer),
                    Err(second) => {
                        warn!("Answer provider failed again: {}", second);
                        None
                    }
                }
            }
        }
    }

    /// One verification episode: category selection first, then the
    /// captcha, both submitted together. Retries the whole exchange up to
    /// [`MAX_VERIFY_ATTEMPTS`] times when the upstream rejects it.
    async fn verification_episode(
        &self,
        credential: &AuthCredential,
    ) -> Result<(), SessionOutcome> {
        for attempt in 1..=MAX_VERIFY_ATTEMPTS {
            if self.stopped() {
                return Err(SessionOutcome::StoppedByUser);
            }

            let candidates = match self.quiz.get_categories(credential).await {
                Ok(candidates) => candidates,
                Err(TransportError::Network(reason)) => {
                    warn!("Fetching categories failed, retrying episode: {}", reason);
                    continue;
                }
                Err(e @ TransportError::Protocol(_)) => {
                    return Err(SessionOutcome::FatalError(e.to_string()));
                }
            };
            let ids = match self
                .gate_exchange(VerificationRequest::CategorySelection { candidates })
                .await?
            {
                VerificationResponse::Categories(ids) => ids,
                other => {
                    warn!("Expected a category selection, got {:?}; treating as empty", other);
                    Vec::new()
                }
            };

            if self.stopped() {
                return Err(SessionOutcome::StoppedByUser);
            }

            let captcha = match self.quiz.get_captcha(credential).await {
                Ok(captcha) => captcha,
                Err(TransportError::Network(reason)) => {
                    warn!("Fetching captcha failed, retrying episode: {}", reason);
                    continue;
                }
                Err(e @ TransportError::Protocol(_)) => {
                    return Err(SessionOutcome::FatalError(e.to_string()));
                }
            };
            let code = match self
                .gate_exchange(VerificationRequest::CaptchaChallenge {
                    image_url: captcha.image_url.clone(),
                })
                .await?
            {
                VerificationResponse::Captcha(code) => code,
                other => {
                    warn!("Expected a captcha answer, got {:?}; treating as empty", other);
                    String::new()
                }
            };

            match self
                .quiz
                .submit_verification(credential, &code, &captcha.token, &ids)
                .await
            {
                Ok(true) => {
                    self.log("Verification passed");
                    return Ok(());
                }
                Ok(false) => {
                    self.log(format!(
                        "Verification rejected (attempt {}/{})",
                        attempt, MAX_VERIFY_ATTEMPTS
                    ));
                }
                Err(e) => {
                    warn!(
                        "Verification submit failed (attempt {}/{}): {}",
                        attempt, MAX_VERIFY_ATTEMPTS, e
                    );
                }
            }
        }

        self.log("Verification attempts exhausted");
        Err(SessionOutcome::VerificationAbandoned)
    }

    /// Publish a verification request and wait on the gate for its answer.
    async fn gate_exchange(
        &self,
        request: VerificationRequest,
    ) -> Result<VerificationResponse, SessionOutcome> {
        self.emit(SessionEvent::VerificationNeeded(request.clone()));
        match self.gate.request(&request, VERIFICATION_TIMEOUT).await {
            Ok(GateOutcome::Resolved(VerificationResponse::Cancelled)) => {
                self.log("Verification dismissed by the answerer");
                Err(SessionOutcome::VerificationAbandoned)
            }
            Ok(GateOutcome::Resolved(response)) => Ok(response),
            Ok(GateOutcome::TimedOut) => {
                self.log("Verification timed out waiting for an answer");
                Err(SessionOutcome::VerificationAbandoned)
            }
            Ok(GateOutcome::Cancelled) => {
                if self.stopped() {
                    Err(SessionOutcome::StoppedByUser)
                } else {
                    self.log("Verification cancelled");
                    Err(SessionOutcome::VerificationAbandoned)
                }
            }
            // Unreachable while verification episodes are strictly
            // sequential; surfaced as fatal rather than hidden.
            Err(GateError::AlreadyPending) => Err(SessionOutcome::FatalError(
                "verification request already pending".to_string(),
            )),
        }
    }
}
