//! Quizpilot Session - Cancellable session orchestration
//!
//! Composes the login poller, the verification hand-off gate, and the
//! fetch/answer/submit loop into one externally stoppable session.
//!
//! The worker runs on its own tokio task; observers subscribe to a
//! broadcast event stream; verification challenges are handed across the
//! task boundary through the single-slot [`InteractionGate`], which
//! guarantees that every wait ends in exactly one of resolved, timed out,
//! or cancelled.

pub mod controller;
pub mod gate;
pub mod runner;
pub mod transport;

pub use controller::{ControllerError, SessionController};
pub use gate::{GateError, GateOutcome, InteractionGate, VERIFICATION_TIMEOUT};
pub use runner::SessionRunner;
pub use transport::{
    AnswerProvider, Captcha, FetchOutcome, ProviderError, Question, QuizTransport, TransportError,
};
