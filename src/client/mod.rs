//! Typed HTTP client for the remote integration API.
//!
//! One method per remote endpoint. The client owns no state beyond the base
//! URL and a pooled `reqwest::Client`; all real work (auth issuance, schema
//! resolution, record storage) happens on the remote service.

pub mod types;

pub use types::{
    AuthPhase, AuthStatus, ConnectionState, ConnectionSummary, EntityDescriptor, EntitySchema,
    Integration, ObjectRecord,
};

use crate::auth::config::RawAuthConfig;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;
use types::{EntityList, EntitySchemaEnvelope, ListEnvelope, RecordEnvelope};
use urlencoding::encode;

/// Errors from the remote API boundary.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} returned status {status}")]
    Status { url: String, status: u16 },
    #[error("failed to decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

impl ApiError {
    /// Status code of the remote response, when the error carries one.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Client for the remote integration platform.
#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    http: reqwest::Client,
}

impl ApiClient {
    /// Creates a client against the given base URL (trailing slash tolerated).
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            http: reqwest::Client::new(),
        }
    }

    /// Base URL this client talks to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ApiError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(url = %url, "GET");

        let mut request = self.http.get(&url);
        if !query.is_empty() {
            request = request.query(query);
        }

        let response = request.send().await.map_err(|source| ApiError::Transport {
            url: url.clone(),
            source,
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status {
                url,
                status: status.as_u16(),
            });
        }

        response
            .json()
            .await
            .map_err(|source| ApiError::Decode { url, source })
    }

    /// GET `/list-connections`
    pub async fn list_connections(&self) -> Result<Vec<ConnectionSummary>, ApiError> {
        let envelope: ListEnvelope<ConnectionSummary> =
            self.get_json("/list-connections", &[]).await?;
        Ok(envelope.response.items)
    }

    /// GET `/list-integrations`
    pub async fn list_integrations(&self) -> Result<Vec<Integration>, ApiError> {
        let envelope: ListEnvelope<Integration> = self.get_json("/list-integrations", &[]).await?;
        Ok(envelope.response.items)
    }

    /// GET `/archive-connection/{connectionId}` — disconnects a connection.
    pub async fn archive_connection(&self, connection_id: &str) -> Result<(), ApiError> {
        let path = format!("/archive-connection/{}", encode(connection_id));
        let _: serde_json::Value = self.get_json(&path, &[]).await?;
        Ok(())
    }

    /// GET `/entity/{integrationKey}`
    pub async fn list_entities(
        &self,
        integration_key: &str,
    ) -> Result<Vec<EntityDescriptor>, ApiError> {
        let path = format!("/entity/{}", encode(integration_key));
        let list: EntityList = self.get_json(&path, &[]).await?;
        Ok(list.entities)
    }

    /// GET `/entity/{integrationKey}/{entityKey}`
    pub async fn entity_schema(
        &self,
        integration_key: &str,
        entity_key: &str,
    ) -> Result<EntitySchema, ApiError> {
        let path = format!("/entity/{}/{}", encode(integration_key), encode(entity_key));
        let envelope: EntitySchemaEnvelope = self.get_json(&path, &[]).await?;
        Ok(envelope.entity_schema)
    }

    /// GET `/object/{integrationKey}/{entityKey}?q=` — lists or searches objects.
    ///
    /// An empty query lists without filtering.
    pub async fn search_objects(
        &self,
        integration_key: &str,
        entity_key: &str,
        query: Option<&str>,
    ) -> Result<Vec<ObjectRecord>, ApiError> {
        let path = format!("/object/{}/{}", encode(integration_key), encode(entity_key));
        let params: Vec<(&str, &str)> = match query {
            Some(q) if !q.is_empty() => vec![("q", q)],
            _ => vec![],
        };
        let envelope: RecordEnvelope = self.get_json(&path, &params).await?;
        Ok(envelope.response.records)
    }

    /// GET `/object/{integrationKey}/{entityKey}/{objectKey}`
    pub async fn get_object(
        &self,
        integration_key: &str,
        entity_key: &str,
        object_key: &str,
    ) -> Result<ObjectRecord, ApiError> {
        let path = format!(
            "/object/{}/{}/{}",
            encode(integration_key),
            encode(entity_key),
            encode(object_key)
        );
        self.get_json(&path, &[]).await
    }

    /// GET `/auth/{integrationKey}/begin` — fetches the authorization config.
    pub async fn begin_auth(&self, integration_key: &str) -> Result<RawAuthConfig, ApiError> {
        let path = format!("/auth/{}/begin", encode(integration_key));
        self.get_json(&path, &[]).await
    }

    /// GET `/auth/{integrationKey}/status/{requestId}` — polls an in-flight
    /// authorization.
    pub async fn auth_status(
        &self,
        integration_key: &str,
        request_id: &str,
    ) -> Result<AuthStatus, ApiError> {
        let path = format!(
            "/auth/{}/status/{}",
            encode(integration_key),
            encode(request_id)
        );
        self.get_json(&path, &[]).await
    }

    /// GET `/info/{integrationKey}` — integration details.
    pub async fn integration_info(&self, integration_key: &str) -> Result<Integration, ApiError> {
        let path = format!("/info/{}", encode(integration_key));
        self.get_json(&path, &[]).await
    }

    /// GET `/auth/{integrationKey}/connection` — current connection for an
    /// integration. A 404 from the remote means "not connected".
    pub async fn integration_connection(
        &self,
        integration_key: &str,
    ) -> Result<Option<ConnectionSummary>, ApiError> {
        let path = format!("/auth/{}/connection", encode(integration_key));
        match self.get_json(&path, &[]).await {
            Ok(summary) => Ok(Some(summary)),
            Err(ApiError::Status { status: 404, .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
