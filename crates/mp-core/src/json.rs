//! Pulling JSON out of model replies.
//!
//! Models tend to wrap JSON in markdown fences or surround it with a sentence
//! of prose. These helpers undo both before handing the text to serde.

use std::sync::LazyLock;

use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::trace;

use crate::error::Error;

static FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s*```(?:json)?\s*").expect("fence pattern is valid"));

/// Remove markdown code fences and trim the result.
///
/// Opening fences may carry a `json` language tag. Whitespace adjoining a
/// fence is dropped along with it.
pub fn strip_code_fences(text: &str) -> String {
    FENCE.replace_all(text, "").trim().to_string()
}

/// Parse the JSON value carried by a model reply.
pub fn extract_json(text: &str) -> Result<Value, Error> {
    let stripped = strip_code_fences(text);

    match serde_json::from_str::<Value>(&stripped) {
        Ok(value) => Ok(value),
        Err(err) => {
            trace!(error = %err, "Reply is not bare JSON, scanning for an embedded value");
            let span = first_balanced_span(&stripped).ok_or_else(|| {
                Error::serialization(format!("No JSON value found in reply: {}", err))
            })?;
            serde_json::from_str(span).map_err(Error::from)
        }
    }
}

/// Extract and deserialize a model reply into `T`.
pub fn parse_json<T: DeserializeOwned>(text: &str) -> Result<T, Error> {
    let value = extract_json(text)?;
    serde_json::from_value(value).map_err(Error::from)
}

/// The embedded object or array, ignoring brackets inside string literals.
///
/// Objects win over an earlier array unless that array encloses the object,
/// so `Found [3] movies: {...}` yields the object and `[{...}]` the array.
fn first_balanced_span(text: &str) -> Option<&str> {
    let object = text.find('{').and_then(|start| balanced_end(text, start).map(|end| (start, end)));
    let array = text.find('[').and_then(|start| balanced_end(text, start).map(|end| (start, end)));

    let (start, end) = match (object, array) {
        (Some(obj), Some(arr)) if arr.0 < obj.0 && arr.1 > obj.0 => arr,
        (Some(obj), _) => obj,
        (None, arr) => arr?,
    };
    Some(&text[start..end])
}

/// Byte offset just past the bracket closing the one at `start`.
fn balanced_end(text: &str, start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' | '[' => depth += 1,
            '}' | ']' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(start + offset + ch.len_utf8());
                }
            }
            _ => {}
        }
    }

    None
}
