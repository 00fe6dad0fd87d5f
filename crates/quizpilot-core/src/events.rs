//! Session states, terminal outcomes, and the event stream vocabulary

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle states of one quiz session.
///
/// `Stopped` is terminal and reachable from every other state. A controller
/// never runs two sessions in `Running`/`AwaitingVerification` at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionState {
    /// Implicit state before the first start and between sessions; never
    /// sent as a `StateChanged` event.
    Idle,
    Authenticating,
    Running,
    AwaitingVerification,
    Stopped,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionState::Idle => "idle",
            SessionState::Authenticating => "authenticating",
            SessionState::Running => "running",
            SessionState::AwaitingVerification => "awaiting-verification",
            SessionState::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

/// Why a session reached `Stopped`.
///
/// Every terminal transition produces exactly one of these, reported through
/// the event stream rather than thrown across the worker boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    /// The upstream reported no more questions.
    Completed,
    /// Ticket acquisition failed or the login poller gave up.
    AuthenticationFailed,
    /// A verification wait timed out, was dismissed, or exhausted its retries.
    VerificationAbandoned,
    /// An external stop request won.
    StoppedByUser,
    /// An unrecoverable error outside the bounded-retry paths.
    FatalError(String),
}

impl fmt::Display for SessionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionOutcome::Completed => write!(f, "all questions answered"),
            SessionOutcome::AuthenticationFailed => write!(f, "authentication failed"),
            SessionOutcome::VerificationAbandoned => write!(f, "verification abandoned"),
            SessionOutcome::StoppedByUser => write!(f, "stopped by user"),
            SessionOutcome::FatalError(detail) => write!(f, "fatal error: {}", detail),
        }
    }
}

/// One selectable verification category, as reported by the upstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: u64,
    pub label: String,
}

/// A challenge the worker cannot answer on its own.
///
/// The protocol is strictly sequential: at most one request is outstanding
/// per session, and within one verification episode the category selection
/// is always requested before the captcha.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationRequest {
    /// Free-text captcha; `image_url` points at the image to show the user.
    CaptchaChallenge { image_url: String },
    /// Pick one or more categories from the candidate list.
    CategorySelection { candidates: Vec<Category> },
}

impl VerificationRequest {
    /// Short tag for log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            VerificationRequest::CaptchaChallenge { .. } => "captcha",
            VerificationRequest::CategorySelection { .. } => "category-selection",
        }
    }
}

/// The answerer's reply to a [`VerificationRequest`].
///
/// An empty captcha text or empty id set is a legitimate (likely wrong)
/// attempt; `Cancelled` is distinct and means the session must stop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationResponse {
    Captcha(String),
    Categories(Vec<u64>),
    Cancelled,
}

/// Events emitted by the session side for observers (UI, CLI, tests).
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Human-readable progress line.
    Log(String),
    /// A login ticket URL is ready to be rendered as a QR code.
    QrReady { url: String },
    /// The runner is blocked on a verification challenge.
    VerificationNeeded(VerificationRequest),
    /// The session moved to a new state.
    StateChanged(SessionState),
    /// The session reached its terminal state.
    Finished(SessionOutcome),
}
