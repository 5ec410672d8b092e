//! Test utilities shared across the workspace.
//! Only compiled when running tests or with the `testing` feature.

use async_trait::async_trait;
use std::sync::Mutex;

use crate::error::Error;
use crate::message::{Message, Usage};
use crate::provider::{CompletionRequest, CompletionResponse, FinishReason, Provider};

type Reply = Result<CompletionResponse, Error>;

/// A mock provider that returns pre-configured responses.
///
/// Responses queued with a marker are handed to the first request whose
/// system prompt contains that marker, which keeps concurrent agent runs
/// deterministic. Everything else is served FIFO.
pub struct MockProvider {
    responses: Mutex<Vec<Reply>>,
    routed: Mutex<Vec<(String, Reply)>>,
    /// Captured requests (for assertion).
    pub captured_requests: Mutex<Vec<CompletionRequest>>,
    pub name: String,
    pub default_model: Option<String>,
}

fn text_response(content: &str) -> CompletionResponse {
    CompletionResponse {
        message: Message::assistant(content),
        usage: Usage::new(0, 0),
        model: "mock-model".to_string(),
        finish_reason: FinishReason::Stop,
        sources: Vec::new(),
    }
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(Vec::new()),
            routed: Mutex::new(Vec::new()),
            captured_requests: Mutex::new(Vec::new()),
            name: "mock".to_string(),
            default_model: None,
        }
    }

    pub fn with_response(self, content: &str) -> Self {
        self.queue_response(content);
        self
    }

    /// Queue a response to be returned by the next complete() call.
    /// Responses are returned in FIFO order (first queued = first returned).
    pub fn queue_response(&self, content: &str) {
        self.responses
            .lock()
            .unwrap()
            .insert(0, Ok(text_response(content)));
    }

    /// Queue a response for the next request whose system prompt contains `marker`.
    pub fn queue_response_for(&self, marker: &str, content: &str) {
        self.routed
            .lock()
            .unwrap()
            .push((marker.to_string(), Ok(text_response(content))));
    }

    /// Queue an error for the next request whose system prompt contains `marker`.
    pub fn queue_error_for(&self, marker: &str, error: Error) {
        self.routed
            .lock()
            .unwrap()
            .push((marker.to_string(), Err(error)));
    }

    /// Get the number of captured requests.
    pub fn request_count(&self) -> usize {
        self.captured_requests.lock().unwrap().len()
    }

    /// Number of captured requests whose system prompt contains `marker`.
    pub fn requests_matching(&self, marker: &str) -> usize {
        self.captured_requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.system_prompt().is_some_and(|s| s.contains(marker)))
            .count()
    }

    /// Get the last captured request.
    pub fn last_request(&self) -> Option<CompletionRequest> {
        self.captured_requests.lock().unwrap().last().cloned()
    }

    fn next_reply(&self, request: &CompletionRequest) -> Option<Reply> {
        if let Some(system) = request.system_prompt() {
            let mut routed = self.routed.lock().unwrap();
            if let Some(idx) = routed.iter().position(|(m, _)| system.contains(m.as_str())) {
                return Some(routed.remove(idx).1);
            }
        }
        self.responses.lock().unwrap().pop()
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn default_model(&self) -> Option<&str> {
        self.default_model.as_deref()
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, Error> {
        let reply = self.next_reply(&request);
        self.captured_requests.lock().unwrap().push(request);
        reply.unwrap_or_else(|| Err(Error::Unknown("No mock response queued".to_string())))
    }
}
