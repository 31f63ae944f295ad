//! Wire types for the remote integration API.
//!
//! Field names follow the remote service's camelCase JSON; list endpoints
//! wrap their payload as `{"response": {"items": [...]}}`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Connection lifecycle state as reported by the remote platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectionState {
    Ready,
    Error,
    Pending,
    Disconnected,
    /// States introduced by the platform that this client does not know about.
    #[serde(other)]
    Unknown,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ConnectionState::Ready => "READY",
            ConnectionState::Error => "ERROR",
            ConnectionState::Pending => "PENDING",
            ConnectionState::Disconnected => "DISCONNECTED",
            ConnectionState::Unknown => "UNKNOWN",
        };
        f.write_str(s)
    }
}

/// An authorized instance of an integration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionSummary {
    pub id: String,
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub name: String,
    pub state: ConnectionState,
    #[serde(default)]
    pub last_active_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub disconnected: bool,
}

/// A connector definition exposed by the remote platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Integration {
    pub id: String,
    pub key: String,
    pub name: String,
    #[serde(default)]
    pub state: Option<ConnectionState>,
    #[serde(default)]
    pub logo_uri: Option<String>,
    #[serde(default)]
    pub auth_type: Option<String>,
    #[serde(default)]
    pub connector_version: Option<String>,
    #[serde(default)]
    pub data_collections_count: u64,
    #[serde(default)]
    pub operations_count: u64,
    #[serde(default)]
    pub events_count: u64,
    #[serde(default)]
    pub has_documentation: bool,
    #[serde(default)]
    pub has_udm: bool,
    #[serde(default)]
    pub has_events: bool,
    #[serde(default)]
    pub has_global_webhooks: bool,
    /// Present when the integration has an active connection.
    #[serde(default)]
    pub connection: Option<ConnectionSummary>,
}

/// Entity list item (e.g. "Deal", "Contact").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityDescriptor {
    pub key: String,
    #[serde(default)]
    pub name: String,
}

/// Schema for a single entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntitySchema {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub fields_schema: Option<FieldsSchema>,
    #[serde(default)]
    pub create: Option<CreateSpec>,
    #[serde(default)]
    pub update: Option<UpdateSpec>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FieldsSchema {
    #[serde(default)]
    pub properties: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSpec {
    #[serde(default)]
    pub required_fields: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct UpdateSpec {
    #[serde(default)]
    pub fields: Vec<String>,
}

/// A concrete record instance of an entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectRecord {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

/// Terminal/non-terminal phase of an in-flight authorization, from the
/// status endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthPhase {
    Pending,
    Success,
    Error,
}

/// Response from `/auth/{integrationKey}/status/{requestId}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthStatus {
    pub status: AuthPhase,
    #[serde(default)]
    pub error_message: Option<String>,
}

/// `{"response": {"items": [...]}}` wrapper used by list endpoints.
#[derive(Debug, Deserialize)]
pub(crate) struct ListEnvelope<T> {
    pub response: ListItems<T>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ListItems<T> {
    pub items: Vec<T>,
}

/// `{"entities": [...]}` wrapper used by the entity list endpoint.
#[derive(Debug, Deserialize)]
pub(crate) struct EntityList {
    pub entities: Vec<EntityDescriptor>,
}

/// `{"entity_schema": {...}}` wrapper used by the entity schema endpoint.
#[derive(Debug, Deserialize)]
pub(crate) struct EntitySchemaEnvelope {
    pub entity_schema: EntitySchema,
}

/// `{"response": {"records": [...]}}` wrapper used by the object search endpoint.
#[derive(Debug, Deserialize)]
pub(crate) struct RecordEnvelope {
    pub response: RecordSet,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RecordSet {
    #[serde(default)]
    pub records: Vec<ObjectRecord>,
}
