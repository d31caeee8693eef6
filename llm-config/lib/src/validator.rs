//! Credential validation against an OpenAI-compatible `/models` endpoint.
//!
//! A single GET doubles as the authentication check and as model discovery:
//! if the service lists its models for the given key, the key works.

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde_json::Value;
use tracing::{debug, info};

use crate::error::{TransportError, ValidationError};
use crate::transport::Transport;

/// Models reported by the service for a validated credential pair.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ValidationResult {
    /// Model ids in service order, empty ids removed.
    pub models: Vec<String>,
}

/// Returns `true` when `url` has an `http://` or `https://` scheme.
pub fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

/// Builds the probe URL: `base_url` without one trailing slash, plus `/models`.
pub fn models_url(base_url: &str) -> String {
    let base = base_url.strip_suffix('/').unwrap_or(base_url);
    format!("{base}/models")
}

/// Builds the probe headers. No `Authorization` header is sent for an empty key.
fn build_auth_headers(api_key: &str) -> Result<HeaderMap, TransportError> {
    let mut headers = HeaderMap::new();
    if !api_key.is_empty() {
        let mut value = HeaderValue::from_str(&format!("Bearer {api_key}")).map_err(|_| {
            TransportError::InvalidHeader {
                name: AUTHORIZATION.to_string(),
            }
        })?;
        value.set_sensitive(true);
        headers.insert(AUTHORIZATION, value);
    }
    Ok(headers)
}

/// Extracts model ids from a `/models` response body.
///
/// Entries may be plain strings or objects with an `id`; anything else, and
/// any empty id, is skipped. Order is preserved.
pub fn parse_models(body: &[u8]) -> Result<Vec<String>, ValidationError> {
    let value: Value =
        serde_json::from_slice(body).map_err(|e| ValidationError::MalformedResponse {
            reason: e.to_string(),
        })?;

    let Some(Value::Array(entries)) = value.get("data") else {
        return Err(ValidationError::MalformedResponse {
            reason: "missing `data` array".to_string(),
        });
    };

    let models = entries
        .iter()
        .filter_map(|entry| match entry {
            Value::String(id) => Some(id.as_str()),
            Value::Object(fields) => fields.get("id").and_then(Value::as_str),
            _ => None,
        })
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect();

    Ok(models)
}

/// Probes a service for the models a credential pair can see.
///
/// Stateless apart from the transport; failures are never retried.
#[derive(Debug, Clone, Default)]
pub struct Validator<T> {
    transport: T,
}

impl<T: Transport> Validator<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Validates `base_url` / `api_key` and returns the listed models.
    ///
    /// ## Errors
    ///
    /// - `ValidationError::InvalidUrl` - not an http(s) URL; nothing was sent
    /// - `ValidationError::Unauthorized` - the service answered with a non-2xx status
    /// - `ValidationError::MalformedResponse` - 2xx without a `data` array
    /// - `ValidationError::Transport` - no response at all
    #[tracing::instrument(skip(self, api_key), fields(has_key = !api_key.is_empty()))]
    pub async fn validate(
        &self,
        base_url: &str,
        api_key: &str,
    ) -> Result<ValidationResult, ValidationError> {
        if !is_http_url(base_url) {
            return Err(ValidationError::InvalidUrl {
                url: base_url.to_string(),
            });
        }

        let url = models_url(base_url);
        let headers = build_auth_headers(api_key)?;

        debug!("Probing {}", url);
        let response = self.transport.get(&url, headers).await?;

        if !response.is_success() {
            return Err(ValidationError::Unauthorized {
                status: response.status,
            });
        }

        let models = parse_models(&response.body)?;
        info!("Validated {} with {} models", base_url, models.len());

        Ok(ValidationResult { models })
    }
}
