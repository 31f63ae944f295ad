//! Authorization config resolution.
//!
//! Fetches the auth method, required fields, and templated authorization URL
//! for an integration, and extracts the `requestId` the status-polling
//! strategy needs from the URL's query string.

use crate::auth::AuthError;
use crate::client::ApiClient;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

/// How the remote service expects the user to authorize.
///
/// The set is open: the platform ships methods this client has never seen
/// (e.g. `api_key`), and they behave like `oauth2+fields` for URL
/// construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AuthMethod {
    OAuth2,
    OAuth2WithFields,
    Credentials,
    Other(String),
}

impl From<String> for AuthMethod {
    fn from(s: String) -> Self {
        match s.as_str() {
            "oauth2" => AuthMethod::OAuth2,
            "oauth2+fields" => AuthMethod::OAuth2WithFields,
            "credentials" => AuthMethod::Credentials,
            _ => AuthMethod::Other(s),
        }
    }
}

impl From<AuthMethod> for String {
    fn from(m: AuthMethod) -> Self {
        m.as_str().to_string()
    }
}

impl AuthMethod {
    pub fn as_str(&self) -> &str {
        match self {
            AuthMethod::OAuth2 => "oauth2",
            AuthMethod::OAuth2WithFields => "oauth2+fields",
            AuthMethod::Credentials => "credentials",
            AuthMethod::Other(s) => s,
        }
    }

    /// Whether collected field values are appended to the authorization URL
    /// as a `connectionParameters` query parameter. Everything except pure
    /// OAuth does this.
    pub fn appends_connection_parameters(&self) -> bool {
        !matches!(self, AuthMethod::OAuth2)
    }

    /// Whether the flow runs silently in a hidden frame instead of a popup.
    pub fn uses_hidden_frame(&self) -> bool {
        matches!(self, AuthMethod::Credentials)
    }
}

impl std::fmt::Display for AuthMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One credential field the user must fill in before launching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Unique within `auth_params`; key into the submitted form data.
    pub id: String,
    #[serde(default)]
    pub label: String,
    #[serde(rename = "type", default = "default_field_type")]
    pub field_type: String,
    #[serde(default)]
    pub required: bool,
    /// Pre-filled value, when the platform provides one.
    #[serde(default)]
    pub default: Option<serde_json::Value>,
}

fn default_field_type() -> String {
    "string".to_string()
}

impl FieldSpec {
    /// Label to show in messages; falls back to the field id.
    pub fn display_label(&self) -> &str {
        if self.label.is_empty() {
            &self.id
        } else {
            &self.label
        }
    }
}

/// Auth config exactly as the begin-auth endpoint returns it.
///
/// Older deployments named the URL field `base_connection_url`.
#[derive(Debug, Clone, Deserialize)]
pub struct RawAuthConfig {
    pub auth_method: AuthMethod,
    #[serde(default)]
    pub auth_params: Vec<FieldSpec>,
    #[serde(alias = "base_connection_url")]
    pub auth_url: String,
}

/// Resolved authorization config for one attempt. Immutable once built.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub integration_key: String,
    pub auth_method: AuthMethod,
    pub auth_params: Vec<FieldSpec>,
    pub auth_url: Url,
    /// Extracted from the auth URL's `requestId` query parameter. Absent for
    /// flows detected via messages or surface closure.
    pub request_id: Option<String>,
}

impl AuthConfig {
    /// Parses a raw config, extracting the request id from the URL.
    pub fn from_raw(integration_key: &str, raw: RawAuthConfig) -> Result<Self, AuthError> {
        let auth_url = Url::parse(&raw.auth_url).map_err(|e| AuthError::ConfigFetch {
            reason: format!("invalid auth url '{}': {}", raw.auth_url, e),
        })?;

        let request_id = auth_url
            .query_pairs()
            .find(|(k, _)| k == "requestId")
            .map(|(_, v)| v.into_owned());

        Ok(AuthConfig {
            integration_key: integration_key.to_string(),
            auth_method: raw.auth_method,
            auth_params: raw.auth_params,
            auth_url,
            request_id,
        })
    }

    /// Origin of the authorization URL (e.g. `https://api.example.com`).
    /// Default message-origin allow-list when none is configured.
    pub fn auth_origin(&self) -> String {
        self.auth_url.origin().ascii_serialization()
    }
}

/// Fetches and parses the authorization config for an integration.
pub async fn resolve(client: &ApiClient, integration_key: &str) -> Result<AuthConfig, AuthError> {
    let raw = client
        .begin_auth(integration_key)
        .await
        .map_err(|e| AuthError::ConfigFetch {
            reason: e.to_string(),
        })?;

    let config = AuthConfig::from_raw(integration_key, raw)?;

    debug!(
        integration = %config.integration_key,
        auth_method = %config.auth_method,
        request_id = ?config.request_id,
        param_count = config.auth_params.len(),
        "Resolved authorization config"
    );

    Ok(config)
}
