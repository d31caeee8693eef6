//! The credential flow state machine.
//!
//! ```text
//! Idle ──saved & !forced──▶ FastPath ──ok──▶ Resolved
//!   │                          └──err──▶ (flow rejected)
//!   └──otherwise──▶ Prompting ◀──error── Validating ──ok──▶ Resolved
//!                     │  └──submit────────▶─┘
//!                     └──cancel──▶ Cancelled
//! ```
//!
//! A prompt can also end up `Superseded` when a newer flow opens a prompt for
//! the same storage key.

use tracing::{debug, info, warn};

use crate::config::{BaseUrlInput, FlowConfig, Labels};
use crate::error::{FlowError, ValidationError};
use crate::record::{CredentialRecord, ResolvedCredentials};
use crate::registry::{PromptLease, PromptRegistry};
use crate::store::CredentialStore;
use crate::transport::Transport;
use crate::validator::{Validator, is_http_url};

/// Message shown when a submitted base URL has no http(s) scheme.
pub const INVALID_URL_MESSAGE: &str = "Enter a valid URL";

/// Where a flow currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowState {
    Idle,
    FastPath,
    Prompting,
    Validating,
    Resolved,
    Cancelled,
    Superseded,
}

impl FlowState {
    /// Returns `true` for states no event can leave.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Resolved | Self::Cancelled | Self::Superseded)
    }
}

/// An event produced by the presentation layer while a prompt is open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptEvent {
    Submit { base_url: String, api_key: String },
    Cancel,
}

impl PromptEvent {
    pub fn submit(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self::Submit {
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }
}

/// Everything a presenter needs to render the prompt.
#[derive(Debug, Clone, Copy)]
pub struct PromptView<'a> {
    pub labels: &'a Labels,
    pub help: &'a str,
    pub base_url_input: BaseUrlInput<'a>,
    /// Current base URL value (pre-filled, or what the user last submitted).
    pub base_url: &'a str,
    /// Current API key value.
    pub api_key: &'a str,
    /// Message from the last failed submission.
    pub error: Option<&'a str>,
    /// `false` while a probe is in flight or once the prompt is closed.
    pub can_submit: bool,
}

/// The presentation layer: turns a [`PromptView`] into the user's next event.
pub trait PromptPresenter {
    /// Shows the prompt and blocks until the user submits or dismisses it.
    fn next_event(&mut self, view: &PromptView<'_>) -> PromptEvent;

    /// Called when a submission passed the URL check and the probe starts.
    fn validating(&mut self, _view: &PromptView<'_>) {}
}

/// Result of submitting a candidate pair to an open prompt.
#[derive(Debug)]
pub enum Submission {
    /// Validated and saved. The prompt is closed.
    Resolved(ResolvedCredentials),
    /// Rejected; the prompt is still open and shows the error.
    Retry(FlowError),
    /// The prompt was already closed (cancelled, resolved or superseded).
    Ignored,
}

/// How a flow starts: either done via the fast path, or waiting on a prompt.
#[derive(Debug)]
pub enum FlowStart<'a, S, T> {
    Resolved(ResolvedCredentials),
    Prompt(Prompt<'a, S, T>),
}

/// Orchestrates loading, prompting for, validating and saving credentials.
///
/// ## Examples
///
/// ```no_run
/// use llm_config_lib::{CredentialFlow, FlowConfig, FlowStart, HttpTransport, MemoryStore};
///
/// # async fn example() -> Result<(), llm_config_lib::FlowError> {
/// let flow = CredentialFlow::new(FlowConfig::new("my-app"), MemoryStore::new(), HttpTransport::new());
/// match flow.start().await? {
///     FlowStart::Resolved(creds) => println!("{} models", creds.models.len()),
///     FlowStart::Prompt(mut prompt) => {
///         prompt.submit("https://api.openai.com/v1", "sk-...").await;
///     }
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct CredentialFlow<S, T> {
    config: FlowConfig,
    store: S,
    validator: Validator<T>,
    registry: PromptRegistry,
}

impl<S: CredentialStore, T: Transport> CredentialFlow<S, T> {
    /// Creates a flow using the process-wide [`PromptRegistry`].
    pub fn new(config: FlowConfig, store: S, transport: T) -> Self {
        Self {
            config,
            store,
            validator: Validator::new(transport),
            registry: PromptRegistry::global(),
        }
    }

    /// Tracks open prompts in `registry` instead of the process-wide one.
    pub fn with_registry(mut self, registry: PromptRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn config(&self) -> &FlowConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Reads the saved record for the configured key.
    ///
    /// Missing, unreadable and unparsable values all count as "nothing saved".
    pub fn saved_record(&self) -> Option<CredentialRecord> {
        let key = self.config.key();
        match self.store.get(key) {
            Ok(Some(raw)) => {
                let record = CredentialRecord::parse(&raw);
                if record.is_none() {
                    debug!("Ignoring unparsable saved credentials for {:?}", key);
                }
                record
            }
            Ok(None) => None,
            Err(e) => {
                warn!("Could not read saved credentials for {:?}: {}", key, e);
                None
            }
        }
    }

    /// Starts the flow.
    ///
    /// With saved credentials and no forced prompt, validates them and
    /// resolves immediately. Otherwise opens a [`Prompt`].
    ///
    /// ## Errors
    ///
    /// Returns `FlowError::Validation` when the saved credentials fail
    /// validation. The flow does not fall back to prompting in that case.
    pub async fn start(&self) -> Result<FlowStart<'_, S, T>, FlowError> {
        debug!(state = ?FlowState::Idle, key = self.config.key(), "Starting credential flow");

        match self.saved_record() {
            Some(record) if !self.config.is_forced() => {
                debug!(state = ?FlowState::FastPath, "Using saved credentials");
                let result = self
                    .validator
                    .validate(&record.base_url, &record.api_key)
                    .await?;
                info!(state = ?FlowState::Resolved, "Saved credentials still valid");
                Ok(FlowStart::Resolved(ResolvedCredentials::from_record(
                    record,
                    result.models,
                )))
            }
            saved => Ok(FlowStart::Prompt(self.open_prompt(saved))),
        }
    }

    /// Runs the whole flow, driving any prompt through `presenter`.
    ///
    /// ## Errors
    ///
    /// - `FlowError::Validation` - saved credentials failed on the fast path
    /// - `FlowError::Cancelled` - the user dismissed the prompt
    /// - `FlowError::Superseded` - a newer flow took over this key's prompt
    pub async fn run<P: PromptPresenter>(
        &self,
        presenter: &mut P,
    ) -> Result<ResolvedCredentials, FlowError> {
        let mut prompt = match self.start().await? {
            FlowStart::Resolved(resolved) => return Ok(resolved),
            FlowStart::Prompt(prompt) => prompt,
        };

        loop {
            if !prompt.can_submit() {
                return Err(prompt.closed_error());
            }
            let event = presenter.next_event(&prompt.view());
            let (base_url, api_key) = match event {
                PromptEvent::Cancel => return Err(prompt.cancel()),
                PromptEvent::Submit { base_url, api_key } => (base_url, api_key),
            };

            match prompt
                .submit_with(&base_url, &api_key, |view| presenter.validating(view))
                .await
            {
                Submission::Resolved(resolved) => return Ok(resolved),
                Submission::Retry(err) => debug!("Submission rejected: {}", err),
                Submission::Ignored => return Err(prompt.closed_error()),
            }
        }
    }

    fn open_prompt(&self, saved: Option<CredentialRecord>) -> Prompt<'_, S, T> {
        let lease = self.registry.claim(self.config.key());

        let (base_url, api_key) = match saved {
            Some(record) => {
                let base_url = if record.base_url.is_empty() {
                    self.config.initial_base_url()
                } else {
                    record.base_url
                };
                (base_url, record.api_key)
            }
            None => (self.config.initial_base_url(), String::new()),
        };

        debug!(state = ?FlowState::Prompting, key = self.config.key(), "Opening prompt");

        Prompt {
            flow: self,
            lease,
            state: FlowState::Prompting,
            base_url,
            api_key,
            error: None,
        }
    }
}

/// Handle to an open prompt.
///
/// Holds the pending values for pre-filling and accepts submissions until it
/// resolves, is cancelled, or is superseded. Dropping it closes the prompt.
#[derive(Debug)]
pub struct Prompt<'a, S, T> {
    flow: &'a CredentialFlow<S, T>,
    lease: PromptLease,
    state: FlowState,
    base_url: String,
    api_key: String,
    error: Option<String>,
}

impl<S: CredentialStore, T: Transport> Prompt<'_, S, T> {
    /// Returns the prompt's state, noticing if a newer flow replaced it.
    pub fn state(&self) -> FlowState {
        if self.lease.is_disposed() && !self.state.is_terminal() {
            FlowState::Superseded
        } else {
            self.state
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Returns `true` if a submission would be processed right now.
    pub fn can_submit(&self) -> bool {
        self.state() == FlowState::Prompting
    }

    pub fn view(&self) -> PromptView<'_> {
        let config = &self.flow.config;
        PromptView {
            labels: config.labels(),
            help: config.help(),
            base_url_input: config.base_url_input(),
            base_url: &self.base_url,
            api_key: &self.api_key,
            error: self.error.as_deref(),
            can_submit: self.can_submit(),
        }
    }

    /// Submits a candidate pair. See [`Prompt::submit_with`].
    pub async fn submit(&mut self, base_url: &str, api_key: &str) -> Submission {
        self.submit_with(base_url, api_key, |_| {}).await
    }

    /// Submits a candidate pair, calling `on_validating` once the URL check
    /// passes and the probe is about to start.
    ///
    /// Both values are trimmed. On failure the prompt stays open with the
    /// error message and the submitted values, ready for another attempt.
    pub async fn submit_with<F>(&mut self, base_url: &str, api_key: &str, on_validating: F) -> Submission
    where
        F: FnOnce(&PromptView<'_>),
    {
        if !self.can_submit() {
            debug!(state = ?self.state(), "Ignoring submission to closed prompt");
            self.state = self.state();
            return Submission::Ignored;
        }

        self.base_url = base_url.trim().to_string();
        self.api_key = api_key.trim().to_string();
        self.error = None;

        if !is_http_url(&self.base_url) {
            let err = ValidationError::InvalidUrl {
                url: self.base_url.clone(),
            };
            return self.reopen(err.into(), INVALID_URL_MESSAGE.to_string());
        }

        self.state = FlowState::Validating;
        debug!(state = ?self.state, "Validating submitted credentials");
        on_validating(&self.view());

        let result = self
            .flow
            .validator
            .validate(&self.base_url, &self.api_key)
            .await;

        if self.lease.is_disposed() {
            warn!(
                "Prompt for {:?} was replaced while validating; discarding result",
                self.lease.key()
            );
            self.state = FlowState::Superseded;
            return Submission::Ignored;
        }

        let models = match result {
            Ok(result) => result.models,
            Err(err) => {
                let message = err.to_string();
                return self.reopen(err.into(), message);
            }
        };

        let record = CredentialRecord::new(self.base_url.clone(), self.api_key.clone());
        if let Err(err) = self.flow.store.set(self.flow.config.key(), &record.to_json()) {
            let err = FlowError::from(err);
            let message = err.to_string();
            return self.reopen(err, message);
        }

        self.state = FlowState::Resolved;
        self.lease.release();
        info!(state = ?self.state, models = models.len(), "Credentials saved");

        Submission::Resolved(ResolvedCredentials::from_record(record, models))
    }

    /// Dismisses the prompt and returns the error the flow rejects with.
    ///
    /// Only an open prompt transitions to `Cancelled`; nothing is saved.
    /// Submissions after this are ignored.
    pub fn cancel(&mut self) -> FlowError {
        if self.state == FlowState::Prompting {
            self.state = FlowState::Cancelled;
            self.lease.release();
            debug!(state = ?self.state, "Prompt cancelled");
        }
        FlowError::Cancelled
    }

    fn reopen(&mut self, err: FlowError, message: String) -> Submission {
        self.state = FlowState::Prompting;
        self.error = Some(message);
        debug!(state = ?self.state, "Re-prompting: {}", err);
        Submission::Retry(err)
    }

    fn closed_error(&self) -> FlowError {
        match self.state() {
            FlowState::Superseded => FlowError::Superseded {
                key: self.lease.key().to_string(),
            },
            _ => FlowError::Cancelled,
        }
    }
}
