//! Shared test doubles for the integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;

use llm_config_lib::{
    ProbeResponse, PromptEvent, PromptPresenter, PromptView, Transport, TransportError,
};
use reqwest::header::HeaderMap;
use serde_json::json;

/// One recorded probe request.
#[derive(Debug, Clone)]
pub struct ProbeCall {
    pub url: String,
    pub headers: HeaderMap,
}

/// Transport that replays queued responses and records every request.
///
/// A `None` entry, or an empty queue, fails like an unreachable server.
#[derive(Debug, Default)]
pub struct StubTransport {
    responses: Mutex<VecDeque<Option<ProbeResponse>>>,
    calls: Mutex<Vec<ProbeCall>>,
}

impl StubTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, response: ProbeResponse) -> Self {
        self.responses.lock().unwrap().push_back(Some(response));
        self
    }

    /// Queues a connection failure.
    pub fn fail(self) -> Self {
        self.responses.lock().unwrap().push_back(None);
        self
    }

    pub fn respond_models(self, ids: &[&str]) -> Self {
        self.respond(ProbeResponse::json(&json!({ "data": ids })))
    }

    pub fn calls(&self) -> Vec<ProbeCall> {
        self.calls.lock().unwrap().clone()
    }
}

impl Transport for StubTransport {
    async fn get(&self, url: &str, headers: HeaderMap) -> Result<ProbeResponse, TransportError> {
        self.calls.lock().unwrap().push(ProbeCall {
            url: url.to_string(),
            headers,
        });
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .flatten()
            .ok_or_else(|| TransportError::Other("connection refused".to_string()))
    }
}

/// What a presenter saw when asked for an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeenView {
    pub title: String,
    pub base_url: String,
    pub api_key: String,
    pub error: Option<String>,
}

/// Presenter that replays scripted events and records each view it was shown.
///
/// Cancels once the script runs out so a broken test can't loop forever.
#[derive(Debug, Default)]
pub struct ScriptedPresenter {
    events: VecDeque<PromptEvent>,
    pub seen: Vec<SeenView>,
    pub validating: usize,
}

impl ScriptedPresenter {
    pub fn new(events: impl IntoIterator<Item = PromptEvent>) -> Self {
        Self {
            events: events.into_iter().collect(),
            ..Default::default()
        }
    }

    /// Error messages shown, one per prompt render.
    pub fn errors(&self) -> Vec<Option<String>> {
        self.seen.iter().map(|v| v.error.clone()).collect()
    }
}

impl PromptPresenter for ScriptedPresenter {
    fn next_event(&mut self, view: &PromptView<'_>) -> PromptEvent {
        self.seen.push(SeenView {
            title: view.labels.title.clone(),
            base_url: view.base_url.to_string(),
            api_key: view.api_key.to_string(),
            error: view.error.map(str::to_string),
        });
        self.events.pop_front().unwrap_or(PromptEvent::Cancel)
    }

    fn validating(&mut self, view: &PromptView<'_>) {
        assert!(!view.can_submit, "submission must be disabled while validating");
        self.validating += 1;
    }
}
