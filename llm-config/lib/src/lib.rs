//! Credential acquisition for OpenAI-compatible services.
//!
//! Obtains a base URL / API key pair from a saved record or from the user,
//! validates it against the service's `/models` endpoint, saves it, and
//! returns it together with the models the service reports.
//!
//! ## Flow
//!
//! - [`CredentialFlow`] - the state machine: fast path or prompt, validate, save
//! - [`Prompt`] - handle to an open prompt; accepts submissions and cancellation
//! - [`PromptPresenter`] - the presentation layer seam used by [`CredentialFlow::run`]
//! - [`PromptRegistry`] - at most one open prompt per storage key
//!
//! ## Validation
//!
//! - [`Validator`] - one probe per call, classified errors, no retries
//! - [`Transport`] / [`HttpTransport`] - the HTTP capability the probe uses
//!
//! ## Storage and configuration
//!
//! - [`CredentialStore`] - string key-value capability
//! - [`MemoryStore`], [`JsonFileStore`] - provided backends
//! - [`FlowOptions`] → [`FlowConfig`] - loose caller options normalized into an immutable config

mod config;
mod error;
mod flow;
mod record;
mod registry;
mod store;
mod transport;
mod validator;

pub use config::{
    BaseUrlInput, DEFAULT_BASE_URL, DEFAULT_STORAGE_KEY, Endpoint, FlowConfig, FlowOptions, Labels,
};
pub use error::{ConfigError, FlowError, StoreError, TransportError, ValidationError};
pub use flow::{
    CredentialFlow, FlowStart, FlowState, INVALID_URL_MESSAGE, Prompt, PromptEvent, PromptPresenter,
    PromptView, Submission,
};
pub use record::{CredentialRecord, ResolvedCredentials};
pub use registry::{PromptLease, PromptRegistry};
pub use store::{CredentialStore, JsonFileStore, MemoryStore};
pub use transport::{HttpTransport, HttpTransportBuilder, ProbeResponse, Transport};
pub use validator::{ValidationResult, Validator, is_http_url, models_url, parse_models};
