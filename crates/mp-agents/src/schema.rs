//! Typed documents produced by the agents.
//!
//! Deserialization is lenient where models are predictably sloppy (key
//! spelling, rating formats, single showtimes) and strict everywhere else,
//! so that validation errors are specific enough for the corrector agent.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use mp_core::extract_json;

// ---------------------------------------------------------------------------
// Event summaries
// ---------------------------------------------------------------------------

/// Classification assigned to a reported event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    Traffic,
    WaterLogging,
    Attraction,
    PowerOutage,
    TechnicalFault,
    Emergency,
    RoadClosure,
    PublicGathering,
    Weather,
    #[default]
    Other,
}

impl EventType {
    pub fn all() -> [EventType; 10] {
        [
            EventType::Traffic,
            EventType::WaterLogging,
            EventType::Attraction,
            EventType::PowerOutage,
            EventType::TechnicalFault,
            EventType::Emergency,
            EventType::RoadClosure,
            EventType::PublicGathering,
            EventType::Weather,
            EventType::Other,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Traffic => "TRAFFIC",
            EventType::WaterLogging => "WATER_LOGGING",
            EventType::Attraction => "ATTRACTION",
            EventType::PowerOutage => "POWER_OUTAGE",
            EventType::TechnicalFault => "TECHNICAL_FAULT",
            EventType::Emergency => "EMERGENCY",
            EventType::RoadClosure => "ROAD_CLOSURE",
            EventType::PublicGathering => "PUBLIC_GATHERING",
            EventType::Weather => "WEATHER",
            EventType::Other => "OTHER",
        }
    }

    /// Case-insensitive match with spaces and hyphens read as underscores.
    /// Anything unrecognised is `Other`.
    pub fn parse_lenient(s: &str) -> Self {
        let normalized: String = s
            .trim()
            .chars()
            .map(|c| match c {
                ' ' | '-' => '_',
                c => c.to_ascii_uppercase(),
            })
            .collect();

        EventType::all()
            .into_iter()
            .find(|t| t.as_str() == normalized)
            .unwrap_or(EventType::Other)
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(EventType::parse_lenient(s))
    }
}

impl<'de> Deserialize<'de> for EventType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Option::<String>::deserialize(deserializer)?;
        Ok(value
            .as_deref()
            .map(EventType::parse_lenient)
            .unwrap_or_default())
    }
}

/// Final, classified summary of a citizen report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventSummary {
    #[serde(rename = "Location", alias = "location")]
    pub location: String,

    #[serde(
        rename = "Eventtype",
        alias = "Event type",
        alias = "event_type",
        alias = "EventType",
        default
    )]
    pub event_type: EventType,

    #[serde(
        rename = "Eventname",
        alias = "Event name",
        alias = "event_name",
        alias = "EventName"
    )]
    pub event_name: String,

    #[serde(
        rename = "EventSummary",
        alias = "EventSummarize",
        alias = "Event summary",
        alias = "event_summary",
        alias = "summary"
    )]
    pub summary: String,
}

impl EventSummary {
    /// Parse a model reply, rejecting summaries with blank fields.
    pub fn parse(text: &str) -> Result<Self, String> {
        let value = extract_json(text).map_err(|e| e.to_string())?;
        let summary: EventSummary = serde_json::from_value(value).map_err(|e| e.to_string())?;
        summary.validate()?;
        Ok(summary)
    }

    pub fn validate(&self) -> Result<(), String> {
        for (field, value) in [
            ("Location", &self.location),
            ("Eventname", &self.event_name),
            ("EventSummary", &self.summary),
        ] {
            if value.trim().is_empty() {
                return Err(format!("field `{}` is blank", field));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// City data
// ---------------------------------------------------------------------------

pub const VEG_RESTAURANTS: &str = "veg_restaurants";
pub const NONVEG_RESTAURANTS: &str = "nonveg_restaurants";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Movie {
    pub name: String,
    pub genre: String,
    pub language: String,
    pub certificate: String,
    pub description: String,
    /// Theater name to showtimes.
    #[serde(deserialize_with = "showtimes")]
    pub locations_available: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Restaurant {
    pub name: String,
    pub cuisine: String,
    #[serde(default, deserialize_with = "lenient_rating")]
    pub rating: Option<f32>,
    pub address: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Concert {
    pub name: String,
    /// Expected as `YYYY-MM-DD`; not enforced.
    pub date: String,
    pub venue: String,
    pub description: String,
}

/// Everything gathered for one city.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CityData {
    pub city: String,
    pub movies: Vec<Movie>,
    /// Keyed by `veg_restaurants` and `nonveg_restaurants`.
    pub restaurants: BTreeMap<String, Vec<Restaurant>>,
    pub concerts: Vec<Concert>,
}

impl CityData {
    /// Parse and validate a candidate document.
    ///
    /// The error string is what the corrector agent is asked to fix.
    pub fn parse(text: &str) -> Result<Self, String> {
        let value = extract_json(text).map_err(|e| format!("document is not valid JSON: {}", e))?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self, String> {
        let data: CityData = serde_json::from_value(value).map_err(|e| e.to_string())?;
        data.validate()?;
        Ok(data)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.city.trim().is_empty() {
            return Err("field `city` is blank".to_string());
        }
        for key in [VEG_RESTAURANTS, NONVEG_RESTAURANTS] {
            if !self.restaurants.contains_key(key) {
                return Err(format!("restaurants: missing key `{}`", key));
            }
        }
        Ok(())
    }

    pub fn restaurant_count(&self) -> usize {
        self.restaurants.values().map(Vec::len).sum()
    }
}

fn showtimes<'de, D>(deserializer: D) -> Result<BTreeMap<String, Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Showtimes {
        Many(Vec<String>),
        One(String),
    }

    let raw = BTreeMap::<String, Showtimes>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|(theater, times)| {
            let times = match times {
                Showtimes::Many(times) => times,
                Showtimes::One(time) => vec![time],
            };
            (theater, times)
        })
        .collect())
}

fn lenient_rating<'de, D>(deserializer: D) -> Result<Option<f32>, D::Error>
where
    D: Deserializer<'de>,
{
    let rating = match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Number(n)) => n.as_f64().map(|f| f as f32),
        Some(Value::String(s)) => {
            let numeric = s.split('/').next().unwrap_or_default().trim();
            if numeric.is_empty() {
                return Ok(None);
            }
            let parsed = numeric
                .parse::<f32>()
                .map_err(|_| de::Error::custom(format!("rating '{}' is not a number", s)))?;
            Some(parsed)
        }
        Some(other) => {
            return Err(de::Error::custom(format!(
                "rating must be a number or null, got {}",
                other
            )))
        }
    };

    rating
        .filter(|r| r.is_finite())
        .map(Some)
        .ok_or_else(|| de::Error::custom("rating is not a finite number"))
}
