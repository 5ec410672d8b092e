//! Bounded validate/repair loop.

use std::future::Future;

use tracing::{debug, warn};

use mp_core::{strip_code_fences, Agent, Message, SessionState};

use crate::corrector::CORRECTION_REQUEST;
use crate::PipelineError;

/// Validations attempted before giving up, counting the first.
pub const MAX_VALIDATION_ATTEMPTS: usize = 3;

/// Validate `candidate`, asking `correct` to repair it after each failure.
///
/// `validate` runs at most `max_attempts` times. The corrector receives the
/// failing candidate and its validation error and returns a new candidate,
/// which is fence-stripped before the next validation. When the final
/// validation fails the last candidate is returned in `Exhausted`.
pub async fn validate_with_repair<T, V, C, Fut>(
    candidate: String,
    validate: V,
    mut correct: C,
    max_attempts: usize,
) -> Result<T, PipelineError>
where
    V: Fn(&str) -> Result<T, String>,
    C: FnMut(String, String) -> Fut,
    Fut: Future<Output = Result<String, PipelineError>>,
{
    let max_attempts = max_attempts.max(1);
    let mut candidate = candidate;

    for attempt in 1..=max_attempts {
        match validate(&candidate) {
            Ok(value) => {
                debug!(attempt, "Candidate passed validation");
                return Ok(value);
            }
            Err(error) if attempt == max_attempts => {
                warn!(attempts = attempt, error = %error, "Validation attempts exhausted");
                return Err(PipelineError::Exhausted {
                    attempts: attempt,
                    last_error: error,
                    raw_output: candidate,
                });
            }
            Err(error) => {
                warn!(attempt, error = %error, "Candidate failed validation, requesting correction");
                let corrected = correct(candidate, error).await?;
                candidate = strip_code_fences(&corrected);
            }
        }
    }

    unreachable!("loop returns on the final attempt")
}

/// Ask the corrector agent to fix `flawed` given `error`.
pub async fn run_corrector(
    corrector: &Agent,
    flawed: String,
    error: String,
) -> Result<String, PipelineError> {
    let mut state = SessionState::new()
        .with("flawed_data", flawed)
        .with("validation_error", error);
    let reply = corrector
        .run_into_state(&mut state, vec![Message::user(CORRECTION_REQUEST)])
        .await?;
    Ok(reply)
}
