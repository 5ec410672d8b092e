//! Upcoming concerts agent.

use crate::PipelineAgent;

const SYSTEM_PROMPT: &str = r#"You find upcoming concerts in {city}.

Search online for concerts and live music events in {city} over the next 30
days. Return a single JSON object with this structure and nothing else:

{
  "concerts": [
    {
      "name": "concert or artist name",
      "date": "YYYY-MM-DD",
      "venue": "venue name",
      "description": "short description of the event"
    }
  ]
}

Return an empty "concerts" list if nothing is scheduled."#;

pub struct ConcertAgent;

impl ConcertAgent {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ConcertAgent {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineAgent for ConcertAgent {
    fn name(&self) -> &str {
        "concert_agent"
    }

    fn instruction(&self) -> &str {
        SYSTEM_PROMPT
    }

    fn google_search(&self) -> bool {
        true
    }

    fn output_key(&self) -> Option<&str> {
        Some("concert_info")
    }
}
