//! Event summary agent: turns a citizen report into a web-grounded write-up.

use crate::{PipelineAgent, REASONING_MODEL};

const SYSTEM_PROMPT: &str = r#"You are an expert event synthesizer for a city information service.

## Report
- Event name: {event_name}
- Event description: {event_description}
- Event location: {event_location}

## Your Task
Summarize the citizen's report and expand it into a short advisory for people
deciding whether to attend or avoid the event. Use web search to verify the
report and gather real-time updates about the situation and location.

Cover:
1. EVENT OVERVIEW: what kind of event it is and where exactly it is happening
2. SITUATION ANALYSIS: impact on people, traffic and infrastructure; expected duration
3. ACTIONABLE RECOMMENDATIONS: safety measures, alternative routes, emergency contacts where relevant
4. KEY INSIGHTS: risks and likely developments

Tailor the advice to the event. For water logging, suggest routes and areas to
avoid. For an attraction, explain what it is, how to attend, its highlights and
drawbacks. Open with a one-paragraph summary so readers get the gist quickly.

Only state what the report or your search results support."#;

pub struct EventSummaryAgent;

impl EventSummaryAgent {
    pub fn new() -> Self {
        Self
    }
}

impl Default for EventSummaryAgent {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineAgent for EventSummaryAgent {
    fn name(&self) -> &str {
        "event_summary_agent"
    }

    fn instruction(&self) -> &str {
        SYSTEM_PROMPT
    }

    fn default_model(&self) -> &str {
        REASONING_MODEL
    }

    fn google_search(&self) -> bool {
        true
    }

    fn output_key(&self) -> Option<&str> {
        Some("event_summary")
    }
}
