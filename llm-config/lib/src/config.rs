//! Flow configuration.
//!
//! [`FlowOptions`] is the loose, all-optional input a caller (or an options
//! file) provides. [`FlowConfig::from_options`] normalizes it into the
//! immutable [`FlowConfig`] a flow runs with.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Storage key used when the caller doesn't pick one.
pub const DEFAULT_STORAGE_KEY: &str = "bootstrapLLMProvider_openaiConfig";

/// Base URL suggested when the caller doesn't provide any.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// A named endpoint offered as a fixed choice in the prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub url: String,
    pub name: String,
}

impl Endpoint {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            name: name.into(),
        }
    }
}

/// Text shown by the prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Labels {
    pub title: String,
    pub base_url_label: String,
    pub api_key_label: String,
    pub submit_label: String,
}

impl Default for Labels {
    fn default() -> Self {
        Self {
            title: "OpenAI API Configuration".to_string(),
            base_url_label: "API Base URL".to_string(),
            api_key_label: "API Key".to_string(),
            submit_label: "Save & Test".to_string(),
        }
    }
}

/// How the prompt collects the base URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseUrlInput<'a> {
    /// Free text, with these URLs offered as suggestions.
    FreeText { suggestions: &'a [String] },
    /// A fixed choice among these endpoints.
    Choice { endpoints: &'a [Endpoint] },
}

/// Immutable configuration for one credential flow.
///
/// ## Examples
///
/// ```
/// use llm_config_lib::{Endpoint, FlowConfig};
///
/// let config = FlowConfig::new("my-app")
///     .with_endpoints(vec![Endpoint::new("OpenRouter", "https://openrouter.ai/api/v1")])
///     .force_prompt(true);
/// assert_eq!(config.key(), "my-app");
/// assert!(config.is_forced());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowConfig {
    key: String,
    default_base_urls: Vec<String>,
    endpoints: Option<Vec<Endpoint>>,
    force_prompt: bool,
    help: String,
    labels: Labels,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self::new(DEFAULT_STORAGE_KEY)
    }
}

impl FlowConfig {
    /// Creates a configuration with defaults for everything but the key.
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            default_base_urls: vec![DEFAULT_BASE_URL.to_string()],
            endpoints: None,
            force_prompt: false,
            help: String::new(),
            labels: Labels::default(),
        }
    }

    /// Normalizes caller options into a configuration.
    ///
    /// ## Errors
    ///
    /// Returns [`ConfigError::EmptyKey`] if a key is given but blank.
    pub fn from_options(options: FlowOptions) -> Result<Self, ConfigError> {
        let mut config = match options.key {
            Some(key) => {
                let key = key.trim();
                if key.is_empty() {
                    return Err(ConfigError::EmptyKey);
                }
                Self::new(key)
            }
            None => Self::default(),
        };

        if let Some(urls) = options.default_base_urls {
            config = config.with_default_base_urls(urls);
        }
        if let Some(endpoints) = options.endpoints {
            config = config.with_endpoints(endpoints);
        }
        if let Some(force) = options.force_prompt {
            config.force_prompt = force;
        }
        if let Some(help) = options.help {
            config.help = help;
        }

        let labels = &mut config.labels;
        if let Some(title) = options.title {
            labels.title = title;
        }
        if let Some(label) = options.base_url_label {
            labels.base_url_label = label;
        }
        if let Some(label) = options.api_key_label {
            labels.api_key_label = label;
        }
        if let Some(label) = options.submit_label {
            labels.submit_label = label;
        }

        Ok(config)
    }

    /// Replaces the base URL suggestions. Blank entries are dropped; an empty
    /// list keeps the current suggestions.
    pub fn with_default_base_urls(mut self, urls: Vec<String>) -> Self {
        let urls: Vec<String> = urls
            .into_iter()
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty())
            .collect();
        if !urls.is_empty() {
            self.default_base_urls = urls;
        }
        self
    }

    /// Switches the base URL input to a fixed choice. An empty list keeps
    /// free-text input.
    pub fn with_endpoints(mut self, endpoints: Vec<Endpoint>) -> Self {
        self.endpoints = (!endpoints.is_empty()).then_some(endpoints);
        self
    }

    pub fn force_prompt(mut self, force: bool) -> Self {
        self.force_prompt = force;
        self
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = help.into();
        self
    }

    pub fn with_labels(mut self, labels: Labels) -> Self {
        self.labels = labels;
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn default_base_urls(&self) -> &[String] {
        &self.default_base_urls
    }

    pub fn endpoints(&self) -> Option<&[Endpoint]> {
        self.endpoints.as_deref()
    }

    pub fn is_forced(&self) -> bool {
        self.force_prompt
    }

    pub fn help(&self) -> &str {
        &self.help
    }

    pub fn labels(&self) -> &Labels {
        &self.labels
    }

    /// Returns how the prompt should collect the base URL.
    pub fn base_url_input(&self) -> BaseUrlInput<'_> {
        match &self.endpoints {
            Some(endpoints) => BaseUrlInput::Choice { endpoints },
            None => BaseUrlInput::FreeText {
                suggestions: &self.default_base_urls,
            },
        }
    }

    /// Base URL to pre-fill when nothing was saved: the first endpoint
    /// choice, else the first suggestion.
    pub(crate) fn initial_base_url(&self) -> String {
        self.endpoints
            .as_ref()
            .and_then(|e| e.first())
            .map(|e| e.url.clone())
            .or_else(|| self.default_base_urls.first().cloned())
            .unwrap_or_default()
    }
}

/// Caller-supplied flow options, every field optional.
///
/// Field names are camelCase. The older names `show`, `baseUrls`,
/// `buttonLabel` are accepted as aliases. Unknown fields are rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FlowOptions {
    pub key: Option<String>,
    pub default_base_urls: Option<Vec<String>>,
    #[serde(alias = "baseUrls")]
    pub endpoints: Option<Vec<Endpoint>>,
    #[serde(alias = "show")]
    pub force_prompt: Option<bool>,
    pub help: Option<String>,
    pub title: Option<String>,
    pub base_url_label: Option<String>,
    pub api_key_label: Option<String>,
    #[serde(alias = "buttonLabel")]
    pub submit_label: Option<String>,
}

impl FlowOptions {
    /// Loads options from a `.yaml`/`.yml` or JSON file.
    ///
    /// ## Errors
    ///
    /// Returns an error if the file can't be read or doesn't parse.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let is_yaml = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("yaml") || e.eq_ignore_ascii_case("yml"));

        if is_yaml {
            Ok(serde_yaml::from_str(&contents)?)
        } else {
            Ok(serde_json::from_str(&contents)?)
        }
    }
}
