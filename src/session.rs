//! Application session.
//!
//! One `Session` per running console: it owns the API client, the connection
//! cache, and the attempt registry, and is passed by reference to whatever
//! needs them. There is no global state.

use crate::auth::attempt::{AttemptRegistry, AuthAttempt};
use crate::auth::launcher::{launch, FormData};
use crate::auth::surface::AuthSurface;
use crate::auth::{config as auth_config, AuthError};
use crate::cache::ConnectionCache;
use crate::client::types::ConnectionSummary;
use crate::client::{ApiClient, ApiError};
use crate::config::ConsoleConfig;
use std::sync::Arc;
use tracing::info;

pub struct Session {
    client: ApiClient,
    cache: ConnectionCache,
    attempts: Arc<AttemptRegistry>,
    surface: Arc<dyn AuthSurface>,
    config: ConsoleConfig,
}

impl Session {
    pub fn new(config: ConsoleConfig, surface: Arc<dyn AuthSurface>) -> Self {
        let client = ApiClient::new(config.api.base_url.clone());
        Self {
            client,
            cache: ConnectionCache::new(),
            attempts: Arc::new(AttemptRegistry::new()),
            surface,
            config,
        }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub fn cache(&self) -> &ConnectionCache {
        &self.cache
    }

    pub fn attempts(&self) -> &AttemptRegistry {
        &self.attempts
    }

    /// Runs the full authorization flow for an integration: resolve config,
    /// validate and launch, start the completion detector. Returns the
    /// in-flight attempt; await [`AuthAttempt::wait`] for the outcome.
    ///
    /// A previous attempt for the same integration is cancelled first.
    pub async fn connect(
        &self,
        integration_key: &str,
        form_data: FormData,
    ) -> Result<AuthAttempt, AuthError> {
        let config = auth_config::resolve(&self.client, integration_key).await?;
        let handle = launch(self.surface.as_ref(), &config, &form_data)?;

        let attempt = self.attempts.begin(
            self.client.clone(),
            self.cache.clone(),
            config,
            handle,
            &self.config.auth.attempt_params(),
        );
        Ok(attempt)
    }

    /// Cancels any in-flight attempt for an integration (modal closed).
    pub fn cancel_connect(&self, integration_key: &str) -> bool {
        self.attempts.cancel(integration_key)
    }

    /// Archives the connection on the remote and invalidates the cached
    /// state so the next read re-fetches.
    pub async fn disconnect(
        &self,
        integration_key: &str,
        connection_id: &str,
    ) -> Result<(), ApiError> {
        self.client.archive_connection(connection_id).await?;
        self.cache.invalidate(integration_key);
        info!(
            integration = %integration_key,
            connection_id = %connection_id,
            "Connection archived"
        );
        Ok(())
    }

    /// Connection state for an integration, served from cache unless
    /// invalidated.
    pub async fn connection_state(
        &self,
        integration_key: &str,
    ) -> Result<Option<ConnectionSummary>, ApiError> {
        self.cache.get_or_fetch(&self.client, integration_key).await
    }
}
