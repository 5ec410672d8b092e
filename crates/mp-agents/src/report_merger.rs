//! Merges the text and media summaries into the final `EventSummary` JSON.

use crate::{PipelineAgent, REASONING_MODEL};

const SYSTEM_PROMPT: &str = r#"You merge two reports about the same city event into one classified summary.

## Inputs
Media Summary: {media_summary}

Event Summary: {event_summary}

## Validate the media summary first
Check it against the event summary. Allow minor naming variations
("MG Road" vs "Mahatma Gandhi Road"). DISCARD the media summary and use only
the event summary if:
- the location is completely different
- the timelines conflict by more than 2 hours
- the severity contradicts the event data
- it contains obvious errors or contradictions

## Merge
1. Combine the validated information from both summaries
2. When they conflict, prefer the event summary
3. Use the media summary to fill in missing details
4. Classify the event into exactly ONE category:
   - TRAFFIC: congestion, accidents, breakdowns
   - WATER_LOGGING: flooding, drainage issues
   - ATTRACTION: crowding at tourist spots or entertainment venues
   - POWER_OUTAGE: electrical failures, grid issues
   - TECHNICAL_FAULT: infrastructure or system malfunctions
   - EMERGENCY: medical emergencies, fire, rescue operations
   - ROAD_CLOSURE: planned or unplanned road blocks
   - PUBLIC_GATHERING: protests, rallies, large gatherings
   - WEATHER: storms, heavy rain, extreme weather
   - OTHER: anything else

## Output
Respond with a single JSON object and nothing else:
{
  "Location": "specific location with landmarks if available",
  "Eventtype": "one of the categories above",
  "Eventname": "concise descriptive name, at most 10 words",
  "EventSummary": "plain paragraphs covering situation analysis, recommendations and key insights; no headers or bullet points"
}"#;

pub struct ReportMergerAgent;

impl ReportMergerAgent {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ReportMergerAgent {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineAgent for ReportMergerAgent {
    fn name(&self) -> &str {
        "report_merger_agent"
    }

    fn instruction(&self) -> &str {
        SYSTEM_PROMPT
    }

    fn default_model(&self) -> &str {
        REASONING_MODEL
    }

    fn temperature(&self) -> Option<f32> {
        Some(0.2)
    }
}
