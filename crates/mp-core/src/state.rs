//! Per-run session state and instruction templating.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// String values shared between the agents of a single pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    values: HashMap<String, String>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for SessionState {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)(\?)?\}").expect("placeholder pattern is valid")
});

/// Substitute `{key}` placeholders in `template` from `state`.
///
/// `{key?}` renders empty when the key is absent. Anything between braces
/// that is not an identifier is copied through unchanged.
pub fn render_instruction(template: &str, state: &SessionState) -> Result<String, Error> {
    let mut missing = None;

    let rendered = PLACEHOLDER.replace_all(template, |caps: &Captures| {
        let key = &caps[1];
        match state.get(key) {
            Some(value) => value.to_string(),
            None => {
                if caps.get(2).is_none() && missing.is_none() {
                    missing = Some(key.to_string());
                }
                String::new()
            }
        }
    });

    match missing {
        Some(key) => Err(Error::MissingStateKey(key)),
        None => Ok(rendered.into_owned()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_substitutes_known_keys() {
        let state = SessionState::new().with("city", "Bengaluru");
        let rendered = render_instruction("Find movies playing in {city} today.", &state).unwrap();
        assert_eq!(rendered, "Find movies playing in Bengaluru today.");
    }

    #[test]
    fn test_leaves_json_braces_alone() {
        let state = SessionState::new().with("city", "Pune");
        let template = r#"Return {"movies": [{"name": "..."}]} for {city}. Empty: {}"#;
        let rendered = render_instruction(template, &state).unwrap();
        assert_eq!(
            rendered,
            r#"Return {"movies": [{"name": "..."}]} for Pune. Empty: {}"#
        );
    }

    #[test]
    fn test_values_are_not_rendered_again() {
        let state = SessionState::new()
            .with("flawed_data", r#"{"city": "{city}"}"#)
            .with("city", "Pune");
        let rendered = render_instruction("Fix {flawed_data} for {city}", &state).unwrap();
        assert_eq!(rendered, r#"Fix {"city": "{city}"} for Pune"#);
    }

    #[test]
    fn test_missing_required_key_errors() {
        let err = render_instruction("Fix {flawed_data}", &SessionState::new()).unwrap_err();
        assert!(matches!(err, Error::MissingStateKey(key) if key == "flawed_data"));
    }

    #[test]
    fn test_optional_key_renders_empty() {
        let rendered = render_instruction("Notes:{notes?}.", &SessionState::new()).unwrap();
        assert_eq!(rendered, "Notes:.");
    }

    #[test]
    fn test_state_from_iter() {
        let state: SessionState = [("city", "Delhi"), ("location", "Delhi")].into_iter().collect();
        assert_eq!(state.len(), 2);
        assert_eq!(state.get("location"), Some("Delhi"));
    }
}
