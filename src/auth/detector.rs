//! Completion detection strategies.
//!
//! An attempt finishes in exactly one of two terminal states; three
//! interchangeable strategies observe it. The strategy is selected once by
//! configuration, never branched per call site. Each function returns once
//! with the terminal result; cancellation and timeout are applied by the
//! owning attempt task, which also guarantees teardown.

use crate::auth::message::{classify, AuthMessage, InboundMessage, OriginPolicy};
use crate::auth::surface::SurfaceHandle;
use crate::auth::AuthError;
use crate::client::types::{AuthPhase, ConnectionState};
use crate::client::ApiClient;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Which completion signal an attempt watches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionStrategy {
    /// Classify cross-window completion messages.
    Message,
    /// Poll the remote status endpoint by request id.
    Poll,
    /// Watch the popup for closure; closure alone counts as success.
    Closure,
}

impl std::fmt::Display for DetectionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DetectionStrategy::Message => "message",
            DetectionStrategy::Poll => "poll",
            DetectionStrategy::Closure => "closure",
        };
        f.write_str(s)
    }
}

/// Waits for the first classified completion message from an allowed origin.
///
/// Messages from origins outside the allow-list and payloads that do not
/// classify are dropped. The first classification is terminal; the caller
/// stops consuming afterwards, so duplicates are inherently ignored.
pub(crate) async fn detect_message(
    rx: &mut mpsc::Receiver<InboundMessage>,
    policy: &OriginPolicy,
) -> Result<(), AuthError> {
    loop {
        let Some(message) = rx.recv().await else {
            // Sender dropped: the owning view is gone
            return Err(AuthError::Cancelled);
        };

        if !policy.permits(&message.origin) {
            warn!(origin = %message.origin, "Dropping message from untrusted origin");
            continue;
        }

        match classify(&message.payload) {
            Some(AuthMessage::Platform { state }) => {
                debug!(state = %state, "Platform completion message received");
                return if state == ConnectionState::Ready {
                    Ok(())
                } else {
                    Err(AuthError::AuthRemote {
                        message: format!("connection entered state {}", state),
                    })
                };
            }
            Some(AuthMessage::Legacy {
                success,
                error_message,
            }) => {
                debug!(success, "Legacy completion message received");
                return if success {
                    Ok(())
                } else {
                    Err(AuthError::AuthRemote {
                        message: error_message
                            .unwrap_or_else(|| "authorization failed".to_string()),
                    })
                };
            }
            None => continue,
        }
    }
}

/// Polls the status endpoint on a fixed interval until the flow is terminal.
///
/// Transport failure during polling is itself terminal; the error surfaces
/// instead of retrying indefinitely.
pub(crate) async fn detect_poll(
    client: &ApiClient,
    integration_key: &str,
    request_id: &str,
    interval: Duration,
) -> Result<(), AuthError> {
    let mut ticker = tokio::time::interval(interval);
    ticker.tick().await; // consume the immediate first tick

    loop {
        ticker.tick().await;

        let status = client
            .auth_status(integration_key, request_id)
            .await
            .map_err(|e| AuthError::PollTransport {
                reason: e.to_string(),
            })?;

        match status.status {
            AuthPhase::Pending => {
                debug!(
                    integration = %integration_key,
                    request_id = %request_id,
                    "Authorization still pending"
                );
            }
            AuthPhase::Success => return Ok(()),
            AuthPhase::Error => {
                return Err(AuthError::AuthRemote {
                    message: status
                        .error_message
                        .unwrap_or_else(|| "authorization failed".to_string()),
                })
            }
        }
    }
}

/// Samples the surface handle until it reports closed.
///
/// Closure is an ambiguous signal; it is treated as success unless a
/// separate message said otherwise first.
pub(crate) async fn detect_closure(
    handle: Arc<dyn SurfaceHandle>,
    interval: Duration,
) -> Result<(), AuthError> {
    let mut ticker = tokio::time::interval(interval);
    ticker.tick().await;

    loop {
        ticker.tick().await;
        if handle.is_closed() {
            debug!("Authorization surface closed, assuming success");
            return Ok(());
        }
    }
}
