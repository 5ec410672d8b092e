//! Movie showtimes agent.

use crate::PipelineAgent;

const SYSTEM_PROMPT: &str = r#"You find movies currently showing in {city}.

Search online for showtimes today and over the next 7 days in {city}.
Return a single JSON object with this structure and nothing else:

{
  "city": "the city you searched",
  "movies": [
    {
      "name": "full movie title",
      "genre": "genre or genres",
      "language": "primary language",
      "certificate": "certification rating, e.g. U, UA, A",
      "description": "one or two sentence synopsis",
      "locations_available": {
        "Theater Name 1": ["HH:MM", "HH:MM"],
        "Theater Name 2": ["HH:MM"]
      }
    }
  ]
}

Fill every field from current listings for {city}."#;

pub struct MovieAgent;

impl MovieAgent {
    pub fn new() -> Self {
        Self
    }
}

impl Default for MovieAgent {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineAgent for MovieAgent {
    fn name(&self) -> &str {
        "movie_agent"
    }

    fn instruction(&self) -> &str {
        SYSTEM_PROMPT
    }

    fn google_search(&self) -> bool {
        true
    }

    fn output_key(&self) -> Option<&str> {
        Some("movies_info")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mp_core::{render_instruction, SessionState};

    #[test]
    fn test_movie_agent_renders_city() {
        let state = SessionState::new().with("city", "Hyderabad");
        let rendered = render_instruction(MovieAgent::new().instruction(), &state).unwrap();
        assert!(rendered.starts_with("You find movies currently showing in Hyderabad."));
        assert!(rendered.contains("\"Theater Name 2\": [\"HH:MM\"]"));
    }
}
