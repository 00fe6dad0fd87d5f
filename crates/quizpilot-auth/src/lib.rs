//! Quizpilot Auth - Credential cache and QR-code login polling
//!
//! Provides the cached credential bundle with its freshness rule and the
//! poller that drives the QR-code login protocol.
//!
//! # Login Flow
//!
//! 1. `AuthStore::load()` returns a cached credential if one exists and is
//!    younger than the freshness window (7 days by file mtime)
//! 2. Otherwise `LoginPoller::begin()` obtains a fresh [`LoginTicket`]
//! 3. The ticket URL is handed to the caller once (QR rendering is the
//!    caller's concern), then the poller polls the status endpoint on a
//!    1-second interval, up to 60 attempts
//! 4. On success the credential is returned for the caller to persist
//!
//! # Example
//!
//! ```no_run
//! use quizpilot_auth::{AuthStore, LoginPoller, LoginTransport};
//! use std::sync::Arc;
//! use tokio::sync::watch;
//!
//! async fn example(transport: Arc<dyn LoginTransport>) {
//!     let store = AuthStore::new().unwrap();
//!     if store.load().unwrap().is_some() {
//!         return; // still logged in
//!     }
//!     let (_stop_tx, stop_rx) = watch::channel(false);
//!     let poller = LoginPoller::new(transport);
//!     let ticket = poller.begin().await.unwrap();
//!     let cred = poller
//!         .poll_until_resolved(&ticket, |url| println!("scan: {url}"), stop_rx)
//!         .await
//!         .unwrap();
//!     store.save(&cred).unwrap();
//! }
//! ```

pub mod credential;
pub mod poller;
pub mod store;

pub use credential::{AuthCredential, LoginTicket, PollOutcome};
pub use poller::{AuthError, AuthResult, LoginPoller, LoginTransport, MAX_POLL_ATTEMPTS, POLL_INTERVAL};
pub use store::{AuthStore, StoreError, StoreResult, CREDENTIAL_TTL};
