//! City info pipeline.
//!
//! Movie, restaurant and concert agents run concurrently. Their replies are
//! merged into one `CityData` document, repaired by the corrector agent until
//! it validates, and saved to the artifact store.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use mp_core::{extract_json, run_agents_concurrently, Agent, Message, Provider, SessionState};
use mp_storage::{artifact_key, save_json, ArtifactStore, SavedArtifact};

use crate::repair::{run_corrector, validate_with_repair, MAX_VALIDATION_ATTEMPTS};
use crate::schema::{CityData, NONVEG_RESTAURANTS, VEG_RESTAURANTS};
use crate::{AgentKind, AgentModels, PipelineError};

const CITY_ARTIFACT_PREFIX: &str = "city_data";

/// Result of a successful `gather`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CityInfoOutcome {
    pub data: CityData,
    pub artifact: SavedArtifact,
    pub message: String,
}

/// Combine the three raw agent replies into one candidate document.
///
/// A reply that is not JSON is placed in its slot as a string, so validation
/// fails and the corrector gets to see the raw text.
pub fn merge_city_parts(
    city: &str,
    movies_raw: &str,
    restaurants_raw: &str,
    concerts_raw: &str,
) -> Value {
    let movies = match extract_json(movies_raw) {
        Ok(value) => list_field(value, "movies"),
        Err(e) => {
            warn!(error = %e, "Movie reply is not JSON");
            Value::String(movies_raw.to_string())
        }
    };

    let restaurants = match extract_json(restaurants_raw) {
        Ok(value) => {
            let mut map = Map::new();
            for key in [VEG_RESTAURANTS, NONVEG_RESTAURANTS] {
                let list = value.get(key).cloned().unwrap_or_else(|| json!([]));
                map.insert(key.to_string(), list);
            }
            Value::Object(map)
        }
        Err(e) => {
            warn!(error = %e, "Restaurant reply is not JSON");
            Value::String(restaurants_raw.to_string())
        }
    };

    let concerts = match extract_json(concerts_raw) {
        Ok(value) => list_field(value, "concerts"),
        Err(e) => {
            warn!(error = %e, "Concert reply is not JSON");
            Value::String(concerts_raw.to_string())
        }
    };

    json!({
        "city": city,
        "movies": movies,
        "restaurants": restaurants,
        "concerts": concerts,
    })
}

/// `value[key]`, the value itself when it is already a list, else `[]`.
fn list_field(value: Value, key: &str) -> Value {
    match value {
        Value::Array(_) => value,
        Value::Object(mut map) => map.remove(key).unwrap_or_else(|| json!([])),
        _ => json!([]),
    }
}

pub struct CityInfoPipeline {
    provider: Arc<dyn Provider>,
    models: AgentModels,
    store: Arc<dyn ArtifactStore>,
    max_attempts: usize,
}

impl CityInfoPipeline {
    pub fn new(provider: Arc<dyn Provider>, models: AgentModels, store: Arc<dyn ArtifactStore>) -> Self {
        Self {
            provider,
            models,
            store,
            max_attempts: MAX_VALIDATION_ATTEMPTS,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    fn agent(&self, kind: AgentKind) -> Agent {
        Agent::new(Arc::clone(&self.provider), self.models.config_for(kind))
    }

    /// Gather, validate and store information about `city`.
    pub async fn gather(&self, city: &str) -> Result<CityInfoOutcome, PipelineError> {
        let city = city.trim();
        if city.is_empty() {
            return Err(PipelineError::invalid_input("city must not be blank"));
        }

        info!(city, "Gathering city info");
        let mut state = SessionState::new().with("city", city).with("location", city);

        let request = Message::user(format!("Gather the latest information for {}.", city));
        let agents = [AgentKind::Movie, AgentKind::Restaurant, AgentKind::Concert]
            .into_iter()
            .map(|kind| (self.agent(kind), vec![request.clone()]))
            .collect::<Vec<_>>();
        let output_keys: Vec<Option<String>> = agents
            .iter()
            .map(|(agent, _)| agent.config.output_key.clone())
            .collect();

        let results = run_agents_concurrently(agents, &state).await;
        let mut replies = Vec::with_capacity(results.len());
        for (result, key) in results.into_iter().zip(output_keys) {
            let reply = result?;
            if let Some(key) = key {
                state.insert(key, reply.as_str());
            }
            replies.push(reply);
        }

        let merged = merge_city_parts(city, &replies[0], &replies[1], &replies[2]);
        let candidate = serde_json::to_string_pretty(&merged)?;
        debug!(city, len = candidate.len(), "Merged city parts");

        let corrector = self.agent(AgentKind::Corrector);
        let data = validate_with_repair(
            candidate,
            CityData::parse,
            |flawed, error| run_corrector(&corrector, flawed, error),
            self.max_attempts,
        )
        .await?;

        let name = artifact_key(CITY_ARTIFACT_PREFIX, city, Utc::now());
        let artifact = save_json(self.store.as_ref(), &name, &data).await?;
        let message = format!("Successfully validated and saved data to {}", artifact.uri);

        info!(
            city,
            movies = data.movies.len(),
            restaurants = data.restaurant_count(),
            concerts = data.concerts.len(),
            uri = %artifact.uri,
            "City info saved"
        );

        Ok(CityInfoOutcome {
            data,
            artifact,
            message,
        })
    }
}
