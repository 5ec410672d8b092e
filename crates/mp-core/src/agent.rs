//! Single-shot LLM agents.
//!
//! An agent is a system-prompt template plus generation settings. Running it
//! renders the template against the session state, sends one completion
//! request and returns the reply text. Pipelines compose agents directly.

use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, warn};

use crate::error::Error;
use crate::message::Message;
use crate::provider::{BuiltinTool, CompletionRequest, Provider};
use crate::state::{render_instruction, SessionState};

/// Unique identifier for an agent.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AgentId(pub String);

impl AgentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AgentId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for AgentId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Configuration for an agent.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub id: AgentId,
    /// Model override; the provider default is used when unset.
    pub model: Option<String>,
    /// System prompt template, rendered against the session state.
    pub instruction: String,
    /// Let the provider ground the reply in web search results.
    pub google_search: bool,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    /// Session state key the reply is stored under by `run_into_state`.
    pub output_key: Option<String>,
}

impl AgentConfig {
    pub fn new(id: impl Into<AgentId>) -> Self {
        Self {
            id: id.into(),
            model: None,
            instruction: String::new(),
            google_search: false,
            temperature: None,
            max_tokens: None,
            output_key: None,
        }
    }

    pub fn with_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.instruction = instruction.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_google_search(mut self) -> Self {
        self.google_search = true;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_output_key(mut self, key: impl Into<String>) -> Self {
        self.output_key = Some(key.into());
        self
    }

    fn build_request(&self, state: &SessionState, context: Vec<Message>) -> Result<CompletionRequest, Error> {
        let mut messages = Vec::with_capacity(context.len() + 1);
        let system = render_instruction(&self.instruction, state)?;
        if !system.trim().is_empty() {
            messages.push(Message::system(system));
        }
        messages.extend(context);

        let mut request = CompletionRequest::new(messages);
        if let Some(model) = &self.model {
            request = request.with_model(model.as_str());
        }
        if let Some(temperature) = self.temperature {
            request = request.with_temperature(temperature);
        }
        if let Some(max_tokens) = self.max_tokens {
            request = request.with_max_tokens(max_tokens);
        }
        if self.google_search {
            request = request.with_builtin_tool(BuiltinTool::GoogleSearch);
        }
        Ok(request)
    }
}

/// An agent bound to a provider.
#[derive(Clone)]
pub struct Agent {
    pub config: AgentConfig,
    provider: Arc<dyn Provider>,
}

impl Agent {
    pub fn new(provider: Arc<dyn Provider>, config: AgentConfig) -> Self {
        Self { config, provider }
    }

    pub fn id(&self) -> &AgentId {
        &self.config.id
    }

    /// Run the agent once and return the reply text.
    pub async fn run(&self, state: &SessionState, context: Vec<Message>) -> Result<String, Error> {
        Self::run_once(Arc::clone(&self.provider), &self.config, state, context).await
    }

    /// Run the agent once and store the reply under its output key.
    pub async fn run_into_state(
        &self,
        state: &mut SessionState,
        context: Vec<Message>,
    ) -> Result<String, Error> {
        let reply = self.run(state, context).await?;
        match &self.config.output_key {
            Some(key) => state.insert(key.as_str(), reply.as_str()),
            None => warn!(agent = %self.config.id, "Agent has no output key, reply not stored"),
        }
        Ok(reply)
    }

    /// Run a one-shot completion for `config`.
    ///
    /// Fails with `Error::EmptyResponse` when the reply has no text.
    pub async fn run_once(
        provider: Arc<dyn Provider>,
        config: &AgentConfig,
        state: &SessionState,
        context: Vec<Message>,
    ) -> Result<String, Error> {
        let request = config.build_request(state, context)?;

        debug!(
            agent = %config.id,
            provider = provider.name(),
            model = request.model.as_deref().or(provider.default_model()).unwrap_or("default"),
            google_search = config.google_search,
            messages = request.messages.len(),
            "Agent run starting"
        );

        let response = provider.complete(request).await?;
        let text = response.message.content.to_string_lossy();

        debug!(
            agent = %config.id,
            prompt_tokens = response.usage.prompt_tokens,
            completion_tokens = response.usage.completion_tokens,
            sources = response.sources.len(),
            finish_reason = ?response.finish_reason,
            "Agent run finished"
        );

        if text.trim().is_empty() {
            return Err(Error::empty_response(config.id.0.clone()));
        }
        Ok(text)
    }
}

/// Run several agents at once against the same state.
///
/// Results come back in input order regardless of completion order.
pub async fn run_agents_concurrently(
    runs: Vec<(Agent, Vec<Message>)>,
    state: &SessionState,
) -> Vec<Result<String, Error>> {
    debug!(agents = runs.len(), "Running agents concurrently");
    let futures = runs
        .iter()
        .map(|(agent, context)| agent.run(state, context.clone()));
    join_all(futures).await
}
