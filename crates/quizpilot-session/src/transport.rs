//! Ports to the upstream quiz service and the answer provider
//!
//! The session crate never talks HTTP itself; concrete clients implement
//! these traits and receive an immutable credential snapshot per call.

use async_trait::async_trait;
use quizpilot_auth::AuthCredential;
use quizpilot_core::Category;
use thiserror::Error;

/// Transport-level errors for the quiz endpoints.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Transient; retried within component-defined bounds.
    #[error("Network error: {0}")]
    Network(String),
    /// Malformed or unexpected upstream response; not retried.
    #[error("Malformed upstream response: {0}")]
    Protocol(String),
}

/// Answer provider failure; retried once, then fatal for that question.
#[derive(Debug, Error)]
#[error("Answer provider error: {0}")]
pub struct ProviderError(pub String);

/// One quiz question as fetched from the upstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    pub id: u64,
    pub text: String,
}

/// A captcha image plus the token that must accompany its solution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Captcha {
    pub image_url: String,
    pub token: String,
}

/// What the next fetch produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Question(Question),
    /// The upstream has no further questions; the session completes.
    NoMoreQuestions,
    /// The upstream demands a verification episode before continuing.
    VerificationRequired,
}

/// Authenticated quiz/question endpoints.
#[async_trait]
pub trait QuizTransport: Send + Sync {
    async fn fetch_next(&self, credential: &AuthCredential)
        -> Result<FetchOutcome, TransportError>;

    async fn submit_answer(
        &self,
        credential: &AuthCredential,
        question: &Question,
        answer: &str,
    ) -> Result<(), TransportError>;

    async fn get_categories(
        &self,
        credential: &AuthCredential,
    ) -> Result<Vec<Category>, TransportError>;

    async fn get_captcha(&self, credential: &AuthCredential) -> Result<Captcha, TransportError>;

    /// Submit a captcha solution together with the selected category ids.
    /// `Ok(false)` means the upstream rejected the solution.
    async fn submit_verification(
        &self,
        credential: &AuthCredential,
        code: &str,
        token: &str,
        ids: &[u64],
    ) -> Result<bool, TransportError>;
}

/// The pluggable answer provider (an LLM in the shipped integrations).
#[async_trait]
pub trait AnswerProvider: Send + Sync {
    async fn ask(&self, question: &str) -> Result<String, ProviderError>;
}
