//! Restaurant recommendations agent.

use crate::PipelineAgent;

const SYSTEM_PROMPT: &str = r#"You find popular restaurants in {location}.

Search online for well-rated restaurants in {location} and split them into
vegetarian and non-vegetarian lists. Return a single JSON object with this
structure and nothing else:

{
  "veg_restaurants": [
    {"name": "restaurant name", "cuisine": "cuisine type", "rating": 4.3, "address": "street address"}
  ],
  "nonveg_restaurants": [
    {"name": "restaurant name", "cuisine": "cuisine type", "rating": 4.1, "address": "street address"}
  ]
}

Use a number between 0 and 5 for "rating", or null when no rating is published."#;

pub struct RestaurantAgent;

impl RestaurantAgent {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RestaurantAgent {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineAgent for RestaurantAgent {
    fn name(&self) -> &str {
        "restaurant_agent"
    }

    fn instruction(&self) -> &str {
        SYSTEM_PROMPT
    }

    fn google_search(&self) -> bool {
        true
    }

    fn output_key(&self) -> Option<&str> {
        Some("restaurant_info")
    }
}
