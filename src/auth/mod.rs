//! Client-side authorization flow.
//!
//! One authorization attempt runs through four stages:
//! 1. `config::resolve` fetches the auth method, field specs, and templated
//!    authorization URL from the remote service
//! 2. `launcher::launch` validates form input and opens a popup or hidden
//!    frame on the final URL via an injected [`surface::AuthSurface`]
//! 3. a completion detector (`detector`) observes the outcome through one of
//!    three strategies: message classification, status polling, or surface
//!    closure
//! 4. on success the connection cache is patched and invalidated
//!
//! At most one attempt is active per integration; starting a second attempt
//! cancels the first (see [`attempt::AttemptRegistry`]).

pub mod attempt;
pub mod config;
pub mod detector;
pub mod launcher;
pub mod message;
pub mod surface;

pub use attempt::{AttemptOutcome, AttemptParams, AttemptRegistry, AuthAttempt};
pub use config::{resolve, AuthConfig, AuthMethod, FieldSpec};
pub use detector::DetectionStrategy;
pub use launcher::{launch, FormData};
pub use message::InboundMessage;
pub use surface::{AuthHandle, AuthSurface, PopupOptions, SurfaceHandle};

use std::collections::BTreeMap;
use thiserror::Error;

/// Errors terminal for the current authorization attempt. None are retried
/// automatically; the user must re-initiate.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The remote call for the auth config failed, returned non-success, or
    /// produced an unusable authorization URL.
    #[error("failed to resolve authorization config: {reason}")]
    ConfigFetch { reason: String },

    /// Required fields missing or blank. Recovered locally: the per-field
    /// messages are shown inline and no surface is opened.
    #[error("validation failed for {} field(s)", fields.len())]
    Validation { fields: BTreeMap<String, String> },

    /// The embedder refused to open the popup window.
    #[error("popup blocked or failed to open")]
    PopupBlocked,

    /// Transport failure while polling the status endpoint.
    #[error("status polling failed: {reason}")]
    PollTransport { reason: String },

    /// The remote service reported the authorization as failed.
    #[error("authorization failed: {message}")]
    AuthRemote { message: String },

    /// The attempt exceeded its maximum wait.
    #[error("authorization timed out after {seconds}s")]
    Timeout { seconds: u64 },

    /// The attempt was cancelled by its owner (modal closed, or replaced by
    /// a newer attempt for the same integration).
    #[error("authorization attempt was cancelled")]
    Cancelled,
}

impl AuthError {
    /// Per-field messages for validation failures.
    pub fn field_errors(&self) -> Option<&BTreeMap<String, String>> {
        match self {
            AuthError::Validation { fields } => Some(fields),
            _ => None,
        }
    }
}
