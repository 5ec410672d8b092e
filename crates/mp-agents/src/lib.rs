//! Agent definitions and pipelines for MetroPulse.
//!
//! This crate provides:
//! - `PipelineAgent` trait and the built-in agents (event, media, merger,
//!   movie, restaurant, concert, corrector)
//! - The typed schema the agents' JSON is validated against
//! - The event report and city info pipelines

use serde::{Deserialize, Serialize};

use mp_core::AgentConfig;

mod concert;
mod corrector;
mod error;
mod event_summary;
mod media_summary;
mod movie;
mod report_merger;
mod restaurant;

pub mod city_info;
pub mod event_report;
pub mod repair;
pub mod schema;

pub use city_info::{merge_city_parts, CityInfoOutcome, CityInfoPipeline};
pub use concert::ConcertAgent;
pub use corrector::CorrectorAgent;
pub use error::PipelineError;
pub use event_report::{EventReport, EventReportOutcome, EventReportPipeline, NO_MEDIA_SUMMARY};
pub use event_summary::EventSummaryAgent;
pub use media_summary::MediaSummaryAgent;
pub use movie::MovieAgent;
pub use repair::{validate_with_repair, MAX_VALIDATION_ATTEMPTS};
pub use report_merger::ReportMergerAgent;
pub use restaurant::RestaurantAgent;
pub use schema::{CityData, Concert, EventSummary, EventType, Movie, Restaurant};

pub const FAST_MODEL: &str = "gemini-2.0-flash";
pub const REASONING_MODEL: &str = "gemini-2.5-flash";

/// Trait for the agents the pipelines are built from.
///
/// Each agent is a system-prompt template plus a few generation settings.
/// Templates reference session state with `{key}` placeholders.
pub trait PipelineAgent: Send + Sync {
    /// Get the agent name (e.g., "movie_agent")
    fn name(&self) -> &str;

    /// Get the system prompt template for this agent
    fn instruction(&self) -> &str;

    /// Model used when configuration does not override it
    fn default_model(&self) -> &str {
        FAST_MODEL
    }

    /// Whether replies are grounded in Google Search results
    fn google_search(&self) -> bool {
        false
    }

    /// Session state key the reply is stored under
    fn output_key(&self) -> Option<&str> {
        None
    }

    fn temperature(&self) -> Option<f32> {
        None
    }

    /// Build the runnable configuration, optionally overriding the model.
    fn config(&self, model: Option<&str>) -> AgentConfig {
        let mut config = AgentConfig::new(self.name())
            .with_instruction(self.instruction())
            .with_model(model.unwrap_or(self.default_model()));
        if self.google_search() {
            config = config.with_google_search();
        }
        if let Some(key) = self.output_key() {
            config = config.with_output_key(key);
        }
        if let Some(temperature) = self.temperature() {
            config = config.with_temperature(temperature);
        }
        config
    }
}

/// All built-in agents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentKind {
    EventSummary,
    MediaSummary,
    ReportMerger,
    Movie,
    Restaurant,
    Concert,
    Corrector,
}

impl AgentKind {
    pub fn all() -> Vec<Self> {
        vec![
            Self::EventSummary,
            Self::MediaSummary,
            Self::ReportMerger,
            Self::Movie,
            Self::Restaurant,
            Self::Concert,
            Self::Corrector,
        ]
    }

    /// Create the agent instance.
    pub fn create(&self) -> Box<dyn PipelineAgent> {
        match self {
            Self::EventSummary => Box::new(EventSummaryAgent::new()),
            Self::MediaSummary => Box::new(MediaSummaryAgent::new()),
            Self::ReportMerger => Box::new(ReportMergerAgent::new()),
            Self::Movie => Box::new(MovieAgent::new()),
            Self::Restaurant => Box::new(RestaurantAgent::new()),
            Self::Concert => Box::new(ConcertAgent::new()),
            Self::Corrector => Box::new(CorrectorAgent::new()),
        }
    }
}

/// Per-agent model overrides. Unset entries use the agent's default model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentModels {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_merger: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub movie: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restaurant: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub concert: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub corrector: Option<String>,
}

impl AgentModels {
    pub fn get(&self, kind: AgentKind) -> Option<&str> {
        match kind {
            AgentKind::EventSummary => self.event_summary.as_deref(),
            AgentKind::MediaSummary => self.media_summary.as_deref(),
            AgentKind::ReportMerger => self.report_merger.as_deref(),
            AgentKind::Movie => self.movie.as_deref(),
            AgentKind::Restaurant => self.restaurant.as_deref(),
            AgentKind::Concert => self.concert.as_deref(),
            AgentKind::Corrector => self.corrector.as_deref(),
        }
    }

    /// Runnable configuration for `kind` with any override applied.
    pub fn config_for(&self, kind: AgentKind) -> AgentConfig {
        kind.create().config(self.get(kind))
    }
}
