//! Quizpilot Core - Shared types for the session coordinator
//!
//! This crate provides the session state machine vocabulary (states, events,
//! terminal outcomes, verification challenges) and the answer-model
//! configuration used across all quizpilot components.

pub mod config;
pub mod events;

pub use config::{ConfigError, ModelChoice, ModelConfig};
pub use events::{
    Category, SessionEvent, SessionOutcome, SessionState, VerificationRequest,
    VerificationResponse,
};
