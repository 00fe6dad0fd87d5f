//! Quizpilot - session coordinator for an automated quiz-answering client
//!
//! Authenticates via a polling QR-code login flow, runs a background task
//! that fetches questions, forwards them to a pluggable answer provider and
//! submits the answers, and pauses through a typed hand-off gate whenever
//! the upstream demands synchronous human input (captcha or category
//! selection). The whole session stays externally stoppable at any point.
//!
//! Concrete HTTP clients and LLM integrations plug in through the
//! [`QuizTransport`], [`LoginTransport`], and [`AnswerProvider`] traits;
//! UIs observe sessions through the [`SessionEvent`] stream.

pub use quizpilot_auth::{
    AuthCredential, AuthError, AuthStore, LoginPoller, LoginTicket, LoginTransport, PollOutcome,
    StoreError, CREDENTIAL_TTL, MAX_POLL_ATTEMPTS, POLL_INTERVAL,
};
pub use quizpilot_core::{
    Category, ConfigError, ModelChoice, ModelConfig, SessionEvent, SessionOutcome, SessionState,
    VerificationRequest, VerificationResponse,
};
pub use quizpilot_session::{
    AnswerProvider, Captcha, ControllerError, FetchOutcome, GateError, GateOutcome,
    InteractionGate, ProviderError, Question, QuizTransport, SessionController, SessionRunner,
    TransportError, VERIFICATION_TIMEOUT,
};
