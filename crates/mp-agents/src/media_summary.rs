//! Media summary agent for photos and video attached to a report.

use crate::PipelineAgent;

const SYSTEM_PROMPT: &str = r#"You are an expert visual analyst specializing in detecting and assessing city events from images and videos.

Extract from the provided media:
- Event type and classification
- Location indicators and geographical context
- Severity and impact level
- Effects on people, infrastructure and the environment
- Timeline indicators, if visible
- Safety and emergency response needs

Describe only what is actually visible. Be specific."#;

/// Text sent alongside the attachments in the user turn.
pub(crate) const ANALYSIS_REQUEST: &str = r#"Analyze these images/videos and report:

1. EVENT IDENTIFICATION: what is happening and how severe it is
2. VISUAL DETAILS: key elements and indicators you can see
3. LOCATION & CONTEXT: landmarks, signage, environmental context
4. IMPACT ASSESSMENT: who or what is affected, immediate consequences
5. RECOMMENDATIONS: immediate response needs and priority actions"#;

pub struct MediaSummaryAgent;

impl MediaSummaryAgent {
    pub fn new() -> Self {
        Self
    }
}

impl Default for MediaSummaryAgent {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineAgent for MediaSummaryAgent {
    fn name(&self) -> &str {
        "media_summary_agent"
    }

    fn instruction(&self) -> &str {
        SYSTEM_PROMPT
    }

    fn output_key(&self) -> Option<&str> {
        Some("media_summary")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_summary_agent() {
        let agent = MediaSummaryAgent::new();
        assert_eq!(agent.name(), "media_summary_agent");
        assert!(!agent.google_search());
        assert_eq!(agent.output_key(), Some("media_summary"));
        assert!(!ANALYSIS_REQUEST.contains('{'));
    }
}
