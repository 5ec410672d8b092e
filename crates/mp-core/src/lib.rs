//! mp-core: Core types and traits for MetroPulse
//!
//! This crate provides the foundational types shared by the provider,
//! agent and server crates: messages and media, the provider trait,
//! single-shot agents, session-state templating and JSON extraction.

pub mod agent;
pub mod error;
pub mod json;
pub mod media;
pub mod message;
pub mod provider;
pub mod state;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use agent::{run_agents_concurrently, Agent, AgentConfig, AgentId};
pub use error::Error;
pub use json::{extract_json, parse_json, strip_code_fences};
pub use media::{MediaAttachment, MediaKind};
pub use message::{Content, ContentPart, Message, Role, Usage};
pub use provider::{BuiltinTool, CompletionRequest, CompletionResponse, FinishReason, Provider};
pub use state::{render_instruction, SessionState};

pub type Result<T> = std::result::Result<T, Error>;
