use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use mp_agents::PipelineError;

/// Error body returned by the JSON endpoints.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_output: Option<String>,
}

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    pub raw_output: Option<String>,
}

impl ApiError {
    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            error: self.message.clone(),
            raw_output: self.raw_output.clone(),
        }
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        let status = if err.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };

        if status.is_server_error() {
            tracing::error!(error = %err, "Pipeline failed");
        }

        Self {
            status,
            message: err.to_string(),
            raw_output: err.raw_output().map(str::to_string),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        tracing::warn!(
            status = rejection.status().as_u16(),
            error = %rejection.body_text(),
            "Rejected request body"
        );
        Self {
            status: StatusCode::BAD_REQUEST,
            message: rejection.body_text(),
            raw_output: None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_error_maps_to_400() {
        let err = ApiError::from(PipelineError::invalid_input("city must not be blank"));
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert!(err.raw_output.is_none());
    }

    #[test]
    fn test_exhausted_keeps_raw_output() {
        let err = ApiError::from(PipelineError::Exhausted {
            attempts: 3,
            last_error: "missing field `movies`".to_string(),
            raw_output: r#"{"city": "Pune"}"#.to_string(),
        });
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);

        let body = serde_json::to_value(err.body()).unwrap();
        assert_eq!(body["raw_output"], r#"{"city": "Pune"}"#);
        assert!(body["error"].as_str().unwrap().contains("3 attempts"));
    }

    #[test]
    fn test_provider_error_has_no_raw_output() {
        let err = ApiError::from(PipelineError::Provider(mp_core::Error::network("reset")));
        let body = serde_json::to_value(err.body()).unwrap();
        assert!(body.get("raw_output").is_none());
    }
}
