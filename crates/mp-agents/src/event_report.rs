//! Event report pipeline.
//!
//! The event summary agent and the media summary agent run concurrently.
//! The merger agent then combines their output into an `EventSummary`,
//! with one retry when its reply does not parse.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use mp_core::{Agent, MediaAttachment, Message, Provider, SessionState};
use mp_storage::{artifact_key, save_json, ArtifactStore, SavedArtifact};

use crate::media_summary::ANALYSIS_REQUEST;
use crate::schema::EventSummary;
use crate::{AgentKind, AgentModels, PipelineError};

/// Media summary used when the report has no attachments.
pub const NO_MEDIA_SUMMARY: &str = "No media files provided.";

/// Merger calls made before the reply is declared unparseable.
const MERGER_ATTEMPTS: usize = 2;

const EVENT_ARTIFACT_PREFIX: &str = "event_summaries";

const MERGE_REQUEST: &str = "Produce the merged event summary JSON.";

/// A user-submitted report.
#[derive(Debug, Clone)]
pub struct EventReport {
    pub event_name: String,
    pub event_description: String,
    pub event_location: String,
    pub attachments: Vec<MediaAttachment>,
}

impl EventReport {
    pub fn new(
        event_name: impl Into<String>,
        event_description: impl Into<String>,
        event_location: impl Into<String>,
    ) -> Self {
        Self {
            event_name: event_name.into(),
            event_description: event_description.into(),
            event_location: event_location.into(),
            attachments: Vec::new(),
        }
    }

    pub fn with_attachments(mut self, attachments: Vec<MediaAttachment>) -> Self {
        self.attachments = attachments;
        self
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        for (field, value) in [
            ("event_name", &self.event_name),
            ("event_description", &self.event_description),
            ("event_location", &self.event_location),
        ] {
            if value.trim().is_empty() {
                return Err(PipelineError::invalid_input(format!("{} must not be blank", field)));
            }
        }
        Ok(())
    }

    fn session_state(&self) -> SessionState {
        SessionState::new()
            .with("event_name", self.event_name.trim())
            .with("event_description", self.event_description.trim())
            .with("event_location", self.event_location.trim())
    }

    fn request_text(&self) -> String {
        format!(
            "Event name: {}\nEvent description: {}\nEvent location: {}",
            self.event_name.trim(),
            self.event_description.trim(),
            self.event_location.trim()
        )
    }
}

/// Result of `summarize_and_store`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventReportOutcome {
    pub summary: EventSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact: Option<SavedArtifact>,
}

pub struct EventReportPipeline {
    provider: Arc<dyn Provider>,
    models: AgentModels,
    store: Option<Arc<dyn ArtifactStore>>,
}

impl EventReportPipeline {
    pub fn new(provider: Arc<dyn Provider>, models: AgentModels) -> Self {
        Self {
            provider,
            models,
            store: None,
        }
    }

    /// Persist summaries to `store` in `summarize_and_store`.
    pub fn with_store(mut self, store: Arc<dyn ArtifactStore>) -> Self {
        self.store = Some(store);
        self
    }

    fn agent(&self, kind: AgentKind) -> Agent {
        Agent::new(Arc::clone(&self.provider), self.models.config_for(kind))
    }

    /// Summarize and classify a report.
    pub async fn summarize(&self, report: &EventReport) -> Result<EventSummary, PipelineError> {
        report.validate()?;
        let mut state = report.session_state();

        info!(
            event = %report.event_name,
            attachments = report.attachments.len(),
            "Summarizing event report"
        );

        let event_agent = self.agent(AgentKind::EventSummary);
        let event_future = event_agent.run(&state, vec![Message::user(report.request_text())]);

        let media_agent = self.agent(AgentKind::MediaSummary);
        let media_future = async {
            if report.attachments.is_empty() {
                debug!("No attachments, skipping media agent");
                return Ok(NO_MEDIA_SUMMARY.to_string());
            }
            let message = Message::user_with_media(ANALYSIS_REQUEST, report.attachments.clone());
            media_agent.run(&state, vec![message]).await
        };

        let (event_summary, media_summary) = tokio::join!(event_future, media_future);
        state.insert("event_summary", event_summary?);
        state.insert("media_summary", media_summary?);

        let merger = self.agent(AgentKind::ReportMerger);
        let mut last_reply = String::new();
        let mut last_error = String::new();

        for attempt in 1..=MERGER_ATTEMPTS {
            let reply = match merger.run(&state, vec![Message::user(MERGE_REQUEST)]).await {
                Ok(reply) => reply,
                Err(mp_core::Error::EmptyResponse { .. }) => {
                    warn!(attempt, "Merger returned an empty reply");
                    last_reply = String::new();
                    last_error = "merger returned an empty reply".to_string();
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            match EventSummary::parse(&reply) {
                Ok(summary) => {
                    info!(
                        attempt,
                        event_type = %summary.event_type,
                        event_name = %summary.event_name,
                        "Event summary ready"
                    );
                    return Ok(summary);
                }
                Err(error) => {
                    warn!(attempt, error = %error, "Merger reply did not parse");
                    last_reply = reply;
                    last_error = error;
                }
            }
        }

        Err(PipelineError::Unparseable {
            agent: merger.id().to_string(),
            reason: last_error,
            raw_output: last_reply,
        })
    }

    /// Summarize a report and persist the result when a store is configured.
    pub async fn summarize_and_store(
        &self,
        report: &EventReport,
    ) -> Result<EventReportOutcome, PipelineError> {
        let summary = self.summarize(report).await?;

        let artifact = match &self.store {
            Some(store) => {
                let name = artifact_key(EVENT_ARTIFACT_PREFIX, &summary.event_name, Utc::now());
                let saved = save_json(store.as_ref(), &name, &summary).await?;
                info!(uri = %saved.uri, backend = store.backend(), "Event summary stored");
                Some(saved)
            }
            None => None,
        };

        Ok(EventReportOutcome { summary, artifact })
    }
}
