//! Cross-window message classification.
//!
//! The auth page posts completion messages back to the opener. Two payload
//! generations are in the wild:
//! - platform: `{"connection": {"state": "READY", ...}}`
//! - legacy:   `{"status": "success" | "error", "error_message": ...}`
//!
//! Payloads are dispatched as a tagged union by [`classify`], never by ad hoc
//! field sniffing at call sites. Message origins are checked against an
//! allow-list before any payload is trusted.

use crate::client::types::ConnectionState;
use serde::Deserialize;
use serde_json::Value;

/// A message delivered by the embedder's cross-window transport, with the
/// sender origin it arrived from.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub origin: String,
    pub payload: Value,
}

impl InboundMessage {
    pub fn new(origin: impl Into<String>, payload: Value) -> Self {
        Self {
            origin: origin.into(),
            payload,
        }
    }
}

/// Classified completion payload.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthMessage {
    /// Platform shape: carries the resulting connection state.
    Platform { state: ConnectionState },
    /// Legacy shape: explicit success flag plus an optional error message.
    Legacy {
        success: bool,
        error_message: Option<String>,
    },
}

#[derive(Deserialize)]
struct PlatformPayload {
    connection: PlatformConnection,
}

#[derive(Deserialize)]
struct PlatformConnection {
    state: ConnectionState,
}

#[derive(Deserialize)]
struct LegacyPayload {
    status: String,
    #[serde(default)]
    error_message: Option<String>,
}

/// Classifies a payload, or `None` when it is not a completion message
/// (unrelated messages on the same transport are common and ignored).
pub fn classify(payload: &Value) -> Option<AuthMessage> {
    if payload.get("connection").is_some() {
        let platform: PlatformPayload = serde_json::from_value(payload.clone()).ok()?;
        return Some(AuthMessage::Platform {
            state: platform.connection.state,
        });
    }

    if payload.get("status").is_some() {
        let legacy: LegacyPayload = serde_json::from_value(payload.clone()).ok()?;
        return match legacy.status.as_str() {
            "success" => Some(AuthMessage::Legacy {
                success: true,
                error_message: None,
            }),
            "error" => Some(AuthMessage::Legacy {
                success: false,
                error_message: legacy.error_message,
            }),
            _ => None,
        };
    }

    None
}

/// Origin allow-list for inbound messages.
///
/// With no explicit entries, only the authorization URL's own origin is
/// trusted.
#[derive(Debug, Clone)]
pub struct OriginPolicy {
    allowed: Vec<String>,
}

impl OriginPolicy {
    /// Builds the policy from configured origins, falling back to the auth
    /// URL's origin when the configuration is empty.
    pub fn new(configured: &[String], auth_origin: String) -> Self {
        let allowed = if configured.is_empty() {
            vec![auth_origin]
        } else {
            configured.to_vec()
        };
        Self { allowed }
    }

    pub fn permits(&self, origin: &str) -> bool {
        self.allowed.iter().any(|a| a == origin)
    }
}
