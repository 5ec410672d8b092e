//! Corrector agent: patches a JSON document so it passes validation.

use crate::PipelineAgent;

const SYSTEM_PROMPT: &str = r#"You repair JSON documents that failed schema validation.

You will be given a flawed JSON string and the validation error it produced.
Your ONLY task is to fix the JSON so that the error goes away.
Do not add, remove or invent information. Only correct the structure and the
data types the error points at.
Return ONLY the corrected raw JSON, without markdown or commentary.

Flawed JSON: {flawed_data}

Validation Error to Fix: {validation_error}"#;

/// User turn sent with every correction request.
pub(crate) const CORRECTION_REQUEST: &str = "Return the corrected JSON document.";

pub struct CorrectorAgent;

impl CorrectorAgent {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CorrectorAgent {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineAgent for CorrectorAgent {
    fn name(&self) -> &str {
        "corrector_agent"
    }

    fn instruction(&self) -> &str {
        SYSTEM_PROMPT
    }

    fn output_key(&self) -> Option<&str> {
        Some("corrected_data")
    }

    fn temperature(&self) -> Option<f32> {
        Some(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mp_core::{render_instruction, SessionState};

    #[test]
    fn test_corrector_prompt_contract() {
        let state = SessionState::new()
            .with("flawed_data", "{\"city\": \"Pune\"}")
            .with("validation_error", "missing field `movies`");
        let rendered = render_instruction(CorrectorAgent::new().instruction(), &state).unwrap();

        assert!(rendered.contains("Flawed JSON: {\"city\": \"Pune\"}"));
        assert!(rendered.contains("Validation Error to Fix: missing field `movies`"));
    }
}
