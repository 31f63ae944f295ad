//! Authorization launcher.
//!
//! Validates collected form values, builds the final authorization URL, and
//! opens the right presentation surface. No detector is started here; the
//! caller wires the returned handle into an attempt.

use crate::auth::config::{AuthConfig, FieldSpec};
use crate::auth::surface::{AuthHandle, AuthSurface, PopupOptions};
use crate::auth::AuthError;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, warn};
use url::Url;

/// User-entered values keyed by [`FieldSpec::id`]. Discarded after
/// submission or cancellation.
pub type FormData = BTreeMap<String, Value>;

/// A value counts as missing when it is null or a blank string. Booleans and
/// numbers are never blank.
fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

/// Checks every required field has a non-blank value. Returns per-field
/// messages, empty when the form is valid.
pub fn validate(params: &[FieldSpec], form: &FormData) -> BTreeMap<String, String> {
    let mut errors = BTreeMap::new();
    for spec in params.iter().filter(|s| s.required) {
        let missing = form.get(&spec.id).map_or(true, is_blank);
        if missing {
            errors.insert(
                spec.id.clone(),
                format!("{} is required", spec.display_label()),
            );
        }
    }
    errors
}

/// Builds the final authorization URL.
///
/// For any method other than pure OAuth, the subset of the form keyed by
/// declared `auth_params` ids (nulls skipped) is serialized to JSON and
/// appended as a `connectionParameters` query parameter. An empty subset
/// appends nothing.
pub fn build_connection_url(config: &AuthConfig, form: &FormData) -> Url {
    let mut url = config.auth_url.clone();

    if config.auth_method.appends_connection_parameters() {
        let mut parameters = serde_json::Map::new();
        for spec in &config.auth_params {
            if let Some(value) = form.get(&spec.id) {
                if !value.is_null() {
                    parameters.insert(spec.id.clone(), value.clone());
                }
            }
        }

        if !parameters.is_empty() {
            url.query_pairs_mut()
                .append_pair("connectionParameters", &Value::Object(parameters).to_string());
        }
    }

    url
}

/// Validates the form and opens the presentation surface.
///
/// `credentials` flows load silently in a hidden frame; every other method
/// opens a centered 500x600 popup. A blocked popup fails with
/// [`AuthError::PopupBlocked`] and nothing else is started.
pub fn launch(
    surface: &dyn AuthSurface,
    config: &AuthConfig,
    form: &FormData,
) -> Result<AuthHandle, AuthError> {
    let errors = validate(&config.auth_params, form);
    if !errors.is_empty() {
        debug!(
            integration = %config.integration_key,
            field_count = errors.len(),
            "Form validation failed, not launching"
        );
        return Err(AuthError::Validation { fields: errors });
    }

    let url = build_connection_url(config, form);

    if config.auth_method.uses_hidden_frame() {
        let handle = surface.open_hidden_frame(&url);
        debug!(
            integration = %config.integration_key,
            "Authorization started in hidden frame"
        );
        return Ok(AuthHandle::Frame(handle));
    }

    match surface.open_popup(&url, &PopupOptions::default()) {
        Some(handle) if !handle.is_closed() => {
            debug!(
                integration = %config.integration_key,
                "Authorization popup opened"
            );
            Ok(AuthHandle::Popup(handle))
        }
        _ => {
            warn!(
                integration = %config.integration_key,
                "Popup blocked or closed immediately"
            );
            Err(AuthError::PopupBlocked)
        }
    }
}
