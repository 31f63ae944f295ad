//! In-flight authorization attempts.
//!
//! One [`AuthAttempt`] per flow: it owns the surface handle, the completion
//! detector task, and a cancellation token. The task delivers exactly one
//! terminal outcome, then tears itself down (frame closed, timers and
//! channels dropped) whatever the path — success, failure, cancellation, or
//! timeout.
//!
//! [`AttemptRegistry`] enforces the one-attempt-per-integration invariant
//! with cancel-and-replace semantics: beginning a new attempt for a key
//! cancels the previous one before the new detector starts.

use crate::auth::config::AuthConfig;
use crate::auth::detector::{detect_closure, detect_message, detect_poll, DetectionStrategy};
use crate::auth::message::{InboundMessage, OriginPolicy};
use crate::auth::surface::AuthHandle;
use crate::auth::AuthError;
use crate::cache::{ConnectionCache, ConnectionPatch};
use crate::client::types::ConnectionState;
use crate::client::ApiClient;
use dashmap::DashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Detector tuning for one attempt, derived from configuration.
#[derive(Debug, Clone)]
pub struct AttemptParams {
    pub strategy: DetectionStrategy,
    pub poll_interval: Duration,
    pub closure_interval: Duration,
    pub timeout: Duration,
    /// Origins trusted for inbound messages; empty means "the auth URL's
    /// own origin only".
    pub allowed_origins: Vec<String>,
}

impl Default for AttemptParams {
    fn default() -> Self {
        Self {
            strategy: DetectionStrategy::Message,
            poll_interval: Duration::from_millis(2000),
            closure_interval: Duration::from_millis(500),
            timeout: Duration::from_secs(300),
            allowed_origins: Vec::new(),
        }
    }
}

/// Terminal result of an attempt.
#[derive(Debug)]
pub enum AttemptOutcome {
    Success,
    Failed(AuthError),
}

impl AttemptOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, AttemptOutcome::Success)
    }
}

/// Observable status of an attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptStatus {
    Pending,
    Success,
    Error(String),
}

/// Handle to one in-flight authorization flow.
#[derive(Debug)]
pub struct AuthAttempt {
    id: Uuid,
    integration_key: String,
    request_id: Option<String>,
    handle: AuthHandle,
    cancel: CancellationToken,
    status: Arc<Mutex<AttemptStatus>>,
    outcome_rx: oneshot::Receiver<AttemptOutcome>,
    message_tx: Option<mpsc::Sender<InboundMessage>>,
}

impl AuthAttempt {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn integration_key(&self) -> &str {
        &self.integration_key
    }

    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    /// Surface opened for this attempt.
    pub fn handle(&self) -> &AuthHandle {
        &self.handle
    }

    /// Current status snapshot. `wait` is the reliable way to observe the
    /// terminal outcome; this exists for progress display.
    pub fn status(&self) -> AttemptStatus {
        self.status.lock().unwrap().clone()
    }

    /// Sender for injecting cross-window messages into the detector.
    /// `None` unless the attempt uses the message strategy.
    pub fn message_sender(&self) -> Option<mpsc::Sender<InboundMessage>> {
        self.message_tx.clone()
    }

    /// Cancels the attempt (modal closed by user). Idempotent; the detector
    /// task tears down and reports [`AuthError::Cancelled`].
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Waits for the terminal outcome. Exactly one outcome is delivered per
    /// attempt; if the task was replaced before reporting, the outcome is
    /// [`AuthError::Cancelled`].
    pub async fn wait(self) -> AttemptOutcome {
        match self.outcome_rx.await {
            Ok(outcome) => outcome,
            Err(_) => AttemptOutcome::Failed(AuthError::Cancelled),
        }
    }
}

struct ActiveEntry {
    attempt_id: Uuid,
    cancel: CancellationToken,
}

/// Tracks the single active attempt per integration key.
pub struct AttemptRegistry {
    active: DashMap<String, ActiveEntry>,
}

impl AttemptRegistry {
    pub fn new() -> Self {
        Self {
            active: DashMap::new(),
        }
    }

    /// Number of attempts currently in flight.
    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Cancels the active attempt for `integration_key`, if any.
    pub fn cancel(&self, integration_key: &str) -> bool {
        match self.active.remove(integration_key) {
            Some((_, entry)) => {
                entry.cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Starts the completion detector for a launched flow and registers the
    /// attempt, cancelling any previous attempt for the same integration.
    pub fn begin(
        self: &Arc<Self>,
        client: ApiClient,
        cache: ConnectionCache,
        config: AuthConfig,
        handle: AuthHandle,
        params: &AttemptParams,
    ) -> AuthAttempt {
        let attempt_id = Uuid::new_v4();
        let integration_key = config.integration_key.clone();
        let request_id = config.request_id.clone();
        let cancel = CancellationToken::new();
        let status = Arc::new(Mutex::new(AttemptStatus::Pending));
        let (outcome_tx, outcome_rx) = oneshot::channel();

        let (message_tx, message_rx) = if params.strategy == DetectionStrategy::Message {
            let (tx, rx) = mpsc::channel(16);
            (Some(tx), Some(rx))
        } else {
            (None, None)
        };

        // Cancel-and-replace: at most one attempt per integration
        if let Some(previous) = self.active.insert(
            integration_key.clone(),
            ActiveEntry {
                attempt_id,
                cancel: cancel.clone(),
            },
        ) {
            warn!(
                integration = %integration_key,
                "Cancelling previous authorization attempt before starting a new one"
            );
            previous.cancel.cancel();
        }

        info!(
            integration = %integration_key,
            attempt_id = %attempt_id,
            strategy = %params.strategy,
            "Authorization attempt started"
        );

        tokio::spawn(run_attempt(AttemptContext {
            attempt_id,
            client,
            cache,
            config,
            handle: handle.clone(),
            params: params.clone(),
            cancel: cancel.clone(),
            status: Arc::clone(&status),
            registry: Arc::clone(self),
            message_rx,
            outcome_tx,
        }));

        AuthAttempt {
            id: attempt_id,
            integration_key,
            request_id,
            handle,
            cancel,
            status,
            outcome_rx,
            message_tx,
        }
    }
}

impl Default for AttemptRegistry {
    fn default() -> Self {
        Self::new()
    }
}

struct AttemptContext {
    attempt_id: Uuid,
    client: ApiClient,
    cache: ConnectionCache,
    config: AuthConfig,
    handle: AuthHandle,
    params: AttemptParams,
    cancel: CancellationToken,
    status: Arc<Mutex<AttemptStatus>>,
    registry: Arc<AttemptRegistry>,
    message_rx: Option<mpsc::Receiver<InboundMessage>>,
    outcome_tx: oneshot::Sender<AttemptOutcome>,
}

async fn run_attempt(ctx: AttemptContext) {
    let AttemptContext {
        attempt_id,
        client,
        cache,
        config,
        handle,
        params,
        cancel,
        status,
        registry,
        mut message_rx,
        outcome_tx,
    } = ctx;

    let integration_key = config.integration_key.clone();

    let detect = async {
        match params.strategy {
            DetectionStrategy::Message => {
                let policy = OriginPolicy::new(&params.allowed_origins, config.auth_origin());
                let rx = message_rx
                    .as_mut()
                    .expect("message strategy always has a receiver");
                detect_message(rx, &policy).await
            }
            DetectionStrategy::Poll => match config.request_id.as_deref() {
                Some(request_id) => {
                    detect_poll(&client, &integration_key, request_id, params.poll_interval).await
                }
                None => Err(AuthError::ConfigFetch {
                    reason: "auth url carries no requestId; status polling is unavailable"
                        .to_string(),
                }),
            },
            DetectionStrategy::Closure => {
                detect_closure(Arc::clone(handle.surface()), params.closure_interval).await
            }
        }
    };

    let result = tokio::select! {
        _ = cancel.cancelled() => Err(AuthError::Cancelled),
        outcome = tokio::time::timeout(params.timeout, detect) => match outcome {
            Ok(terminal) => terminal,
            // Rounded up so a sub-second timeout never reports "0s"
            Err(_) => Err(AuthError::Timeout {
                seconds: params.timeout.as_millis().div_ceil(1000) as u64,
            }),
        },
    };

    // Teardown: hidden frames are always removed; popups are closed when the
    // flow ended without the remote page finishing on its own.
    match &handle {
        AuthHandle::Frame(h) => h.close(),
        AuthHandle::Popup(h) => {
            if matches!(
                result,
                Err(AuthError::Cancelled) | Err(AuthError::Timeout { .. })
            ) {
                h.close();
            }
        }
    }

    match &result {
        Ok(()) => {
            info!(
                integration = %integration_key,
                attempt_id = %attempt_id,
                "Authorization completed successfully"
            );
            // Optimistically reflect the new connection, then force a
            // re-fetch so the next read sees the authoritative state
            cache.patch(
                &integration_key,
                ConnectionPatch {
                    state: Some(ConnectionState::Ready),
                    disconnected: Some(false),
                    ..ConnectionPatch::default()
                },
            );
            cache.invalidate(&integration_key);
            *status.lock().unwrap() = AttemptStatus::Success;
        }
        Err(e) => {
            warn!(
                integration = %integration_key,
                attempt_id = %attempt_id,
                error = %e,
                "Authorization attempt ended without success"
            );
            *status.lock().unwrap() = AttemptStatus::Error(e.to_string());
        }
    }

    // Deregister only if this attempt is still the active one; a replacement
    // may already own the slot
    registry
        .active
        .remove_if(&integration_key, |_, entry| entry.attempt_id == attempt_id);

    let outcome = match result {
        Ok(()) => AttemptOutcome::Success,
        Err(e) => AttemptOutcome::Failed(e),
    };

    if outcome_tx.send(outcome).is_err() {
        debug!(
            integration = %integration_key,
            attempt_id = %attempt_id,
            "No caller waiting on attempt outcome"
        );
    }
}
