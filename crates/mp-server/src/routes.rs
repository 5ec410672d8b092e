//! HTTP routes.

use axum::extract::multipart::MultipartError;
use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use mp_agents::{EventReport, EventSummary};
use mp_core::MediaAttachment;

use crate::error::ApiError;
use crate::state::AppState;

const SERVICE_NAME: &str = "MetroPulse API";

pub fn router(state: AppState, body_limit: usize) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/event_summary/", post(event_summary))
        .route("/event_summary", post(event_summary))
        .route("/process-event", post(process_event))
        .route("/get-city-info", post(get_city_info))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy", "service": SERVICE_NAME }))
}

/// Inline media in a JSON event request.
#[derive(Debug, Deserialize)]
pub struct MediaFile {
    #[serde(rename = "mimeType", alias = "mime_type", default)]
    pub mime_type: Option<String>,
    #[serde(alias = "data")]
    pub bytes: Vec<u8>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct EventRequest {
    pub event_name: String,
    pub event_description: String,
    pub event_location: String,
    pub media_file: Vec<MediaFile>,
}

impl EventRequest {
    fn into_report(self) -> EventReport {
        let attachments = self
            .media_file
            .into_iter()
            .filter(|m| !m.bytes.is_empty())
            .map(|m| MediaAttachment::new(m.bytes, m.mime_type.as_deref(), None))
            .collect();
        EventReport::new(self.event_name, self.event_description, self.event_location)
            .with_attachments(attachments)
    }
}

pub async fn event_summary(
    State(state): State<AppState>,
    payload: Result<Json<EventRequest>, JsonRejection>,
) -> Result<Json<EventSummary>, ApiError> {
    let Json(request) = payload?;
    let report = request.into_report();
    info!(
        event = %report.event_name,
        attachments = report.attachments.len(),
        "POST /event_summary"
    );
    let outcome = state.events.summarize_and_store(&report).await?;
    Ok(Json(outcome.summary))
}

#[derive(Debug, Serialize)]
pub struct ProcessEventResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<EventSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProcessEventResponse {
    fn failure(status: StatusCode, error: impl Into<String>) -> Response {
        let body = Self {
            success: false,
            summary: None,
            error: Some(error.into()),
        };
        (status, Json(body)).into_response()
    }
}

/// Multipart variant of `/event_summary` used by the web form.
pub async fn process_event(State(state): State<AppState>, multipart: Multipart) -> Response {
    let report = match read_event_form(multipart).await {
        Ok(report) => report,
        Err(e) => {
            warn!(error = %e, "Malformed event form");
            return ProcessEventResponse::failure(e.status(), e.body_text());
        }
    };
    info!(
        event = %report.event_name,
        attachments = report.attachments.len(),
        "POST /process-event"
    );

    match state.events.summarize_and_store(&report).await {
        Ok(outcome) => Json(ProcessEventResponse {
            success: true,
            summary: Some(outcome.summary),
            error: None,
        })
        .into_response(),
        Err(e) => {
            let err = ApiError::from(e);
            ProcessEventResponse::failure(err.status, err.message)
        }
    }
}

async fn read_event_form(mut multipart: Multipart) -> Result<EventReport, MultipartError> {
    let mut name = String::new();
    let mut description = String::new();
    let mut location = String::new();
    let mut attachments = Vec::new();

    while let Some(field) = multipart.next_field().await? {
        let field_name = field.name().unwrap_or_default().to_string();
        match field_name.as_str() {
            "event_name" => name = field.text().await?,
            "event_description" => description = field.text().await?,
            "event_location" => location = field.text().await?,
            "media_files" => {
                let file_name = field.file_name().map(str::to_string);
                let content_type = field.content_type().map(str::to_string);
                let data = field.bytes().await?;
                if data.is_empty() {
                    continue;
                }
                attachments.push(MediaAttachment::new(
                    data.to_vec(),
                    content_type.as_deref(),
                    file_name.as_deref(),
                ));
            }
            other => warn!(field = other, "Ignoring unknown form field"),
        }
    }

    Ok(EventReport::new(name, description, location).with_attachments(attachments))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CityRequest {
    pub city: String,
}

#[derive(Debug, Serialize)]
pub struct CityResponse {
    pub response: String,
    pub artifact_uri: String,
}

pub async fn get_city_info(
    State(state): State<AppState>,
    payload: Result<Json<CityRequest>, JsonRejection>,
) -> Result<Json<CityResponse>, ApiError> {
    let Json(request) = payload?;
    info!(city = %request.city, "POST /get-city-info");
    let outcome = state.city.gather(&request.city).await?;
    Ok(Json(CityResponse {
        response: outcome.message,
        artifact_uri: outcome.artifact.uri,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::body::Body;
    use axum::extract::FromRequest;
    use axum::http::{header, Request};
    use serde::de::DeserializeOwned;

    use mp_agents::EventType;
    use mp_core::testing::MockProvider;
    use mp_core::Provider;
    use mp_storage::{ArtifactStore, MemoryArtifactStore};

    use crate::config::Config;

    const EVENT_MARKER: &str = "expert event synthesizer";
    const MEDIA_MARKER: &str = "expert visual analyst";
    const MERGER_MARKER: &str = "You merge two reports";
    const CORRECTOR_MARKER: &str = "You repair JSON";

    const MERGED: &str = r#"{"Location": "Koramangala 80 Feet Road", "Eventtype": "traffic", "Eventname": "Two-wheeler collision", "EventSummary": "Two bikes collided near the signal."}"#;

    fn app(mock: &Arc<MockProvider>) -> (AppState, Arc<MemoryArtifactStore>) {
        let store = Arc::new(MemoryArtifactStore::new());
        let provider: Arc<dyn Provider> = mock.clone();
        let artifacts: Arc<dyn ArtifactStore> = store.clone();
        (AppState::new(provider, artifacts, &Config::default()), store)
    }

    async fn json_payload<T: DeserializeOwned>(
        body: &str,
        content_type: Option<&str>,
    ) -> Result<Json<T>, JsonRejection> {
        let mut builder = Request::builder().method("POST").uri("/");
        if let Some(content_type) = content_type {
            builder = builder.header(header::CONTENT_TYPE, content_type);
        }
        Json::<T>::from_request(builder.body(Body::from(body.to_string())).unwrap(), &()).await
    }

    fn valid_event_request() -> EventRequest {
        EventRequest {
            event_name: "Accident".to_string(),
            event_description: "Two bikes collided".to_string(),
            event_location: "Koramangala".to_string(),
            media_file: Vec::new(),
        }
    }

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let Json(body) = health().await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["service"], "MetroPulse API");
    }

    #[test]
    fn test_event_request_accepts_byte_arrays() {
        let request: EventRequest = serde_json::from_value(json!({
            "event_name": "Accident",
            "event_description": "Collision",
            "event_location": "Koramangala",
            "media_file": [
                {"mimeType": "image/png", "bytes": [137, 80, 78, 71]},
                {"mimeType": "image/png", "bytes": []}
            ]
        }))
        .unwrap();

        let report = request.into_report();
        assert_eq!(report.attachments.len(), 1);
        assert_eq!(report.attachments[0].mime_type, "image/png");
        assert_eq!(report.attachments[0].data, vec![137, 80, 78, 71]);
    }

    #[tokio::test]
    async fn test_event_summary_endpoint() {
        let mock = Arc::new(MockProvider::new());
        mock.queue_response_for(EVENT_MARKER, "Collision reported at the signal.");
        mock.queue_response_for(MERGER_MARKER, MERGED);
        let (state, store) = app(&mock);

        let request = EventRequest {
            event_name: "Accident".to_string(),
            event_description: "Two bikes collided".to_string(),
            event_location: "Koramangala".to_string(),
            media_file: Vec::new(),
        };
        let Json(summary) = event_summary(State(state), Ok(Json(request))).await.unwrap();

        assert_eq!(summary.event_type, EventType::Traffic);
        assert_eq!(summary.event_name, "Two-wheeler collision");
        // Event summaries are not persisted unless configured
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_event_summary_blank_fields_400() {
        let mock = Arc::new(MockProvider::new());
        let (state, _store) = app(&mock);

        let err = event_summary(State(state), Ok(Json(EventRequest::default())))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(mock.request_count(), 0);
    }

    #[tokio::test]
    async fn test_unparseable_merger_output_500_with_raw_output() {
        let mock = Arc::new(MockProvider::new());
        mock.queue_response_for(EVENT_MARKER, "Event text.");
        mock.queue_response_for(MERGER_MARKER, "not json");
        mock.queue_response_for(MERGER_MARKER, "still not json");
        let (state, _store) = app(&mock);

        let request = EventRequest {
            event_name: "Accident".to_string(),
            event_description: "Two bikes collided".to_string(),
            event_location: "Koramangala".to_string(),
            media_file: Vec::new(),
        };
        let response = event_summary(State(state), Ok(Json(request)))
            .await
            .unwrap_err()
            .into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["raw_output"], "still not json");
    }

    #[tokio::test]
    async fn test_event_summary_malformed_body_is_json_400() {
        let mock = Arc::new(MockProvider::new());
        let (state, _store) = app(&mock);

        let payload = json_payload::<EventRequest>(
            r#"{"event_name": "Accident", "media_file": [{"bytes": [999]}]}"#,
            Some("application/json"),
        )
        .await;
        assert!(payload.is_err());

        let response = event_summary(State(state), payload)
            .await
            .unwrap_err()
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");

        let body = body_json(response).await;
        assert!(!body["error"].as_str().unwrap().is_empty());
        assert!(body.get("raw_output").is_none());
        assert_eq!(mock.request_count(), 0);
    }

    #[tokio::test]
    async fn test_event_summary_provider_error_500_without_raw_output() {
        let mock = Arc::new(MockProvider::new());
        mock.queue_error_for(EVENT_MARKER, mp_core::Error::network("connection reset"));
        let (state, _store) = app(&mock);

        let response = event_summary(State(state), Ok(Json(valid_event_request())))
            .await
            .unwrap_err()
            .into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert!(body["error"].as_str().unwrap().contains("connection reset"));
        assert!(body.get("raw_output").is_none());
        assert_eq!(mock.requests_matching(MERGER_MARKER), 0);
    }

    fn multipart_request(parts: &[(&str, Option<(&str, &str)>, &[u8])]) -> Request<Body> {
        const BOUNDARY: &str = "metropulse-boundary";
        let mut body = Vec::new();
        for (name, file, data) in parts {
            body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
            match file {
                Some((file_name, content_type)) => body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                        name, file_name, content_type
                    )
                    .as_bytes(),
                ),
                None => body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
                ),
            }
            body.extend_from_slice(data);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

        Request::builder()
            .method("POST")
            .uri("/process-event")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn test_process_event_multipart() {
        let mock = Arc::new(MockProvider::new());
        mock.queue_response_for(EVENT_MARKER, "Collision reported.");
        mock.queue_response_for(MEDIA_MARKER, "Photo shows two damaged bikes.");
        mock.queue_response_for(MERGER_MARKER, MERGED);
        let (state, _store) = app(&mock);

        let request = multipart_request(&[
            ("event_name", None, b"Accident".as_slice()),
            ("event_description", None, b"Two bikes collided".as_slice()),
            ("event_location", None, b"Koramangala".as_slice()),
            ("media_files", Some(("bikes.jpg", "image/jpeg")), [0xFF, 0xD8, 0xFF, 0xE0].as_slice()),
            ("media_files", Some(("empty.jpg", "image/jpeg")), b"".as_slice()),
        ]);
        let multipart = Multipart::from_request(request, &()).await.unwrap();

        let response = process_event(State(state), multipart).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["summary"]["Eventtype"], "TRAFFIC");
        assert_eq!(mock.requests_matching(MEDIA_MARKER), 1);
    }

    #[tokio::test]
    async fn test_process_event_missing_fields() {
        let mock = Arc::new(MockProvider::new());
        let (state, _store) = app(&mock);

        let request = multipart_request(&[("event_name", None, b"Accident".as_slice())]);
        let multipart = Multipart::from_request(request, &()).await.unwrap();

        let response = process_event(State(state), multipart).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_json(response).await;
        assert_eq!(body["success"], false);
        assert!(body["error"].as_str().unwrap().contains("must not be blank"));
    }

    #[tokio::test]
    async fn test_process_event_oversized_upload_413() {
        let mock = Arc::new(MockProvider::new());
        let (state, _store) = app(&mock);

        let video = vec![0u8; 3 * 1024 * 1024];
        let request = multipart_request(&[
            ("event_name", None, b"Accident".as_slice()),
            ("media_files", Some(("clip.mp4", "video/mp4")), video.as_slice()),
        ]);
        let multipart = Multipart::from_request(request, &()).await.unwrap();

        let response = process_event(State(state), multipart).await;
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);

        let body = body_json(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(mock.request_count(), 0);
    }

    #[tokio::test]
    async fn test_get_city_info() {
        let mock = Arc::new(MockProvider::new());
        mock.queue_response_for("You find movies", r#"{"movies": []}"#);
        mock.queue_response_for(
            "You find popular restaurants",
            r#"{"veg_restaurants": [], "nonveg_restaurants": []}"#,
        );
        mock.queue_response_for("You find upcoming concerts", r#"{"concerts": []}"#);
        let (state, store) = app(&mock);

        let Json(response) = get_city_info(
            State(state),
            Ok(Json(CityRequest {
                city: "Pune".to_string(),
            })),
        )
        .await
        .unwrap();

        assert!(response.artifact_uri.starts_with("memory://city_data/pune_"));
        assert_eq!(
            response.response,
            format!("Successfully validated and saved data to {}", response.artifact_uri)
        );
        assert_eq!(mock.requests_matching(CORRECTOR_MARKER), 0);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_get_city_info_blank_city_400() {
        let mock = Arc::new(MockProvider::new());
        let (state, _store) = app(&mock);

        let err = get_city_info(State(state), Ok(Json(CityRequest::default())))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_get_city_info_without_content_type_is_json_400() {
        let mock = Arc::new(MockProvider::new());
        let (state, _store) = app(&mock);

        let payload = json_payload::<CityRequest>(r#"{"city": "Pune"}"#, None).await;
        let response = get_city_info(State(state), payload)
            .await
            .unwrap_err()
            .into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert!(body["error"].as_str().unwrap().contains("Content-Type"));
        assert_eq!(mock.request_count(), 0);
    }
}
