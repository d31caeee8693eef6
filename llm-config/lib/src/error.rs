//! Error types for the credential flow.
//!
//! - [`ValidationError`] - the probe rejected a base URL / API key pair
//! - [`FlowError`] - terminal failures of a flow invocation
//! - [`StoreError`] - credential storage failures
//! - [`ConfigError`] - flow option loading and normalization failures
//! - [`TransportError`] - the HTTP request itself could not be made

use std::path::PathBuf;

use thiserror::Error;

/// Errors produced by the [`Validator`](crate::Validator).
#[derive(Debug, Error)]
pub enum ValidationError {
    /// The base URL does not start with `http://` or `https://`.
    ///
    /// Raised before any network access.
    #[error("invalid URL: {url:?}")]
    InvalidUrl { url: String },

    /// The service answered the probe with a non-success status.
    ///
    /// Services don't reliably distinguish a bad key from a bad path, so both
    /// land here.
    #[error("invalid API key or URL (HTTP {status})")]
    Unauthorized { status: u16 },

    /// The service answered with success but the body was not a model listing.
    #[error("invalid response: {reason}")]
    MalformedResponse { reason: String },

    /// The request never produced a response.
    #[error("request failed: {0}")]
    Transport(#[from] TransportError),
}

/// Errors that terminate a flow invocation.
#[derive(Debug, Error)]
pub enum FlowError {
    /// Validation of the saved (fast path) or submitted credentials failed.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The validated credentials could not be written.
    #[error("failed to save credentials: {0}")]
    Storage(#[from] StoreError),

    /// The user dismissed the prompt.
    #[error("cancelled")]
    Cancelled,

    /// A newer flow for the same storage key replaced this prompt.
    #[error("prompt for {key:?} was replaced by a newer flow")]
    Superseded { key: String },
}

impl FlowError {
    /// Returns `true` when the user dismissed the prompt.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Errors that can occur when reading or writing stored credentials.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Failed to read or write the credential file.
    #[error("credential store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// The credential file is not a JSON object of strings.
    #[error("failed to parse credential store: {0}")]
    Parse(#[from] serde_json::Error),

    /// Failed to acquire a file lock.
    #[error("failed to acquire lock on {0}")]
    Lock(PathBuf),
}

/// Errors raised while loading or normalizing [`FlowOptions`](crate::FlowOptions).
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The storage key was empty after trimming.
    #[error("storage key must not be empty")]
    EmptyKey,

    /// The options file could not be read.
    #[error("failed to read options file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The options file is not valid JSON.
    #[error("failed to parse options: {0}")]
    Json(#[from] serde_json::Error),

    /// The options file is not valid YAML.
    #[error("failed to parse options: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Errors raised by a [`Transport`](crate::Transport) before a response exists.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The HTTP client failed to send the request or read the body.
    #[error(transparent)]
    Request(#[from] reqwest::Error),

    /// A header could not be encoded (e.g. an API key with a newline in it).
    #[error("invalid header value for {name}")]
    InvalidHeader { name: String },

    /// Any other transport-specific failure.
    #[error("{0}")]
    Other(String),
}
