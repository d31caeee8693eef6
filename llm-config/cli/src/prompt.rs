//! Terminal presentation of the credential prompt.

use std::fmt;

use inquire::autocompletion::{Autocomplete, Replacement};
use inquire::{
    Confirm, CustomUserError, InquireError, Password, PasswordDisplayMode, Select, Text,
};
use llm_config_lib::{BaseUrlInput, Endpoint, PromptEvent, PromptPresenter, PromptView};
use owo_colors::{OwoColorize, Stream};
use tracing::warn;

/// Renders the prompt with `inquire`.
///
/// Declining the submit question goes back to the fields. Esc and Ctrl-C
/// cancel the prompt. Any other terminal failure also cancels,
/// but is kept for [`TerminalPresenter::take_failure`] so the caller can report it.
#[derive(Debug, Default)]
pub struct TerminalPresenter {
    failure: Option<InquireError>,
}

impl TerminalPresenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes the terminal error that ended the prompt, if any.
    pub fn take_failure(&mut self) -> Option<InquireError> {
        self.failure.take()
    }

    fn read_event(&self, view: &PromptView<'_>) -> Result<PromptEvent, InquireError> {
        print_header(view);

        let labels = view.labels;
        let mut current_url = view.base_url.to_string();
        let mut current_key = view.api_key.to_string();

        loop {
            let base_url = match view.base_url_input {
                BaseUrlInput::FreeText { suggestions } => Text::new(&labels.base_url_label)
                    .with_initial_value(&current_url)
                    .with_autocomplete(UrlSuggestions::new(suggestions))
                    .prompt()?,
                BaseUrlInput::Choice { endpoints } => {
                    let cursor = endpoints
                        .iter()
                        .position(|e| e.url == current_url)
                        .unwrap_or(0);
                    let choices = endpoints.iter().map(EndpointChoice).collect();
                    Select::new(&labels.base_url_label, choices)
                        .with_starting_cursor(cursor)
                        .prompt()?
                        .0
                        .url
                        .clone()
                }
            };

            let mut password = Password::new(&labels.api_key_label)
                .without_confirmation()
                .with_display_toggle_enabled()
                .with_display_mode(PasswordDisplayMode::Masked);
            if !current_key.is_empty() {
                password = password.with_help_message("Leave blank to keep or clear the current key");
            }
            let mut api_key = password.prompt()?;
            if api_key.is_empty()
                && offers_current_key(&current_url, &current_key, &base_url)
                && Confirm::new("Keep the current key?")
                    .with_default(true)
                    .prompt()?
            {
                api_key = current_key.clone();
            }

            let confirmed = Confirm::new(&labels.submit_label)
                .with_default(true)
                .prompt()?;

            match after_confirmation(confirmed, base_url, api_key) {
                FormStep::Submit(event) => return Ok(event),
                FormStep::Edit { base_url, api_key } => {
                    current_url = base_url;
                    current_key = api_key;
                }
            }
        }
    }
}

/// What the form does once the submit question is answered.
#[derive(Debug, PartialEq, Eq)]
enum FormStep {
    Submit(PromptEvent),
    /// Ask again, starting from the values just entered.
    Edit { base_url: String, api_key: String },
}

fn after_confirmation(confirmed: bool, base_url: String, api_key: String) -> FormStep {
    if confirmed {
        FormStep::Submit(PromptEvent::submit(base_url, api_key))
    } else {
        FormStep::Edit { base_url, api_key }
    }
}

/// Returns `true` when a blank key entry may fall back to `current_key`.
///
/// Only offered for the same base URL, so a saved key is never sent to a
/// different service.
fn offers_current_key(current_url: &str, current_key: &str, submitted_url: &str) -> bool {
    !current_key.is_empty() && current_url.trim() == submitted_url.trim()
}

impl PromptPresenter for TerminalPresenter {
    fn next_event(&mut self, view: &PromptView<'_>) -> PromptEvent {
        match self.read_event(view) {
            Ok(event) => event,
            Err(InquireError::OperationCanceled | InquireError::OperationInterrupted) => {
                PromptEvent::Cancel
            }
            Err(e) => {
                warn!("Prompt failed: {}", e);
                self.failure = Some(e);
                PromptEvent::Cancel
            }
        }
    }

    fn validating(&mut self, _view: &PromptView<'_>) {
        eprintln!(
            "{}",
            "Checking…".if_supports_color(Stream::Stderr, |t| t.dimmed())
        );
    }
}

fn print_header(view: &PromptView<'_>) {
    eprintln!();
    eprintln!(
        "{}",
        view.labels
            .title
            .if_supports_color(Stream::Stderr, |t| t.bold())
    );
    if !view.help.is_empty() {
        eprintln!("{}", view.help);
    }
    if let Some(error) = view.error {
        eprintln!("{}", error.if_supports_color(Stream::Stderr, |t| t.red()));
    }
}

/// An endpoint as shown in the choice list.
struct EndpointChoice<'a>(&'a Endpoint);

impl fmt::Display for EndpointChoice<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.0.name, self.0.url)
    }
}

/// Offers the configured base URLs that start with what was typed so far.
#[derive(Debug, Clone)]
struct UrlSuggestions {
    urls: Vec<String>,
}

impl UrlSuggestions {
    fn new(urls: &[String]) -> Self {
        Self { urls: urls.to_vec() }
    }

    fn matching(&self, input: &str) -> Vec<String> {
        let input = input.trim();
        self.urls
            .iter()
            .filter(|url| url.starts_with(input) && url.as_str() != input)
            .cloned()
            .collect()
    }
}

impl Autocomplete for UrlSuggestions {
    fn get_suggestions(&mut self, input: &str) -> Result<Vec<String>, CustomUserError> {
        Ok(self.matching(input))
    }

    fn get_completion(
        &mut self,
        input: &str,
        highlighted_suggestion: Option<String>,
    ) -> Result<Replacement, CustomUserError> {
        Ok(highlighted_suggestion.or_else(|| self.matching(input).into_iter().next()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn suggestions() -> UrlSuggestions {
        UrlSuggestions::new(&[
            "https://api.openai.com/v1".to_string(),
            "http://localhost:11434/v1".to_string(),
        ])
    }

    #[test]
    fn empty_input_suggests_everything() {
        assert_eq!(suggestions().matching("").len(), 2);
    }

    #[test]
    fn suggestions_filter_by_prefix() {
        assert_eq!(
            suggestions().matching("http://"),
            ["http://localhost:11434/v1"]
        );
        assert!(suggestions().matching("ftp").is_empty());
    }

    #[test]
    fn exact_match_is_not_suggested_again() {
        assert!(suggestions().matching("https://api.openai.com/v1").is_empty());
    }

    #[test]
    fn completion_prefers_highlighted_suggestion() {
        let mut s = suggestions();
        let picked = s
            .get_completion("h", Some("http://localhost:11434/v1".to_string()))
            .unwrap();
        assert_eq!(picked.as_deref(), Some("http://localhost:11434/v1"));

        let first = s.get_completion("https", None).unwrap();
        assert_eq!(first.as_deref(), Some("https://api.openai.com/v1"));
    }

    #[test]
    fn current_key_is_offered_only_for_the_same_url() {
        assert!(offers_current_key(
            "https://api.openai.com/v1",
            "sk-old",
            " https://api.openai.com/v1 "
        ));
        assert!(!offers_current_key(
            "https://api.openai.com/v1",
            "sk-old",
            "http://localhost:11434/v1"
        ));
        assert!(!offers_current_key(
            "https://api.openai.com/v1",
            "",
            "https://api.openai.com/v1"
        ));
    }

    #[test]
    fn declining_submit_edits_instead_of_cancelling() {
        assert_eq!(
            after_confirmation(false, "https://x/v1".to_string(), "k".to_string()),
            FormStep::Edit {
                base_url: "https://x/v1".to_string(),
                api_key: "k".to_string(),
            }
        );
        assert_eq!(
            after_confirmation(true, "https://x/v1".to_string(), "k".to_string()),
            FormStep::Submit(PromptEvent::submit("https://x/v1", "k"))
        );
    }

    #[test]
    fn endpoint_choice_shows_name_and_url() {
        let endpoint = Endpoint::new("OpenRouter", "https://openrouter.ai/api/v1");
        assert_eq!(
            EndpointChoice(&endpoint).to_string(),
            "OpenRouter (https://openrouter.ai/api/v1)"
        );
    }
}
