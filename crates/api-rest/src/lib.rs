//! # API REST
//!
//! HTTP surface of the form relay.
//!
//! Handles:
//! - `POST /api/sync-form`: forwards one JSON payload to the broker, unchanged
//! - `GET /health`
//! - OpenAPI/Swagger documentation
//! - CORS, so a form served from another origin can post
//!
//! The handlers hold no mutable state: every request is one broker call.

#![warn(rust_2018_idioms)]

use api_shared::{HealthRes, HealthService, SyncRes};
use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use relay_broker::Broker;
use relay_core::{constants::SYNC_FORM_PATH, SyncEnvelope, SyncStatus, Topic};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Shared state for the request handlers.
#[derive(Clone)]
pub struct AppState {
    broker: Arc<dyn Broker>,
    topic: Topic,
}

impl AppState {
    pub fn new(broker: Arc<dyn Broker>, topic: Topic) -> Self {
        Self { broker, topic }
    }

    pub fn topic(&self) -> &Topic {
        &self.topic
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(health, sync_form),
    components(schemas(HealthRes, SyncRes, SyncEnvelope, SyncStatus, relay_core::PatientForm))
)]
pub struct ApiDoc;

/// Builds the relay router with documentation and CORS.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(SYNC_FORM_PATH, post(sync_form))
        .merge(
            SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", ApiDoc::openapi()),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
/// Health check endpoint for monitoring and load balancers.
#[axum::debug_handler]
async fn health(State(_state): State<AppState>) -> Json<HealthRes> {
    Json(HealthService::check_health())
}

#[utoipa::path(
    post,
    path = "/api/sync-form",
    request_body = SyncEnvelope,
    responses(
        (status = 200, description = "Broker accepted the payload", body = SyncRes),
        (status = 400, description = "Body is not JSON"),
        (status = 500, description = "Broker call failed", body = SyncRes)
    )
)]
/// Relay one payload to the dashboard channel
///
/// The body is forwarded verbatim as a single broker event. Nothing is validated, stored or
/// retried: `typing` and `reset` envelopes are partial by nature, and the caller decides what a
/// failure means.
///
/// # Returns
/// * `200 {"success": true}` once the broker has accepted the publish
/// * `500 {"success": false, "error": ...}` if the broker call failed
#[axum::debug_handler]
async fn sync_form(
    State(state): State<AppState>,
    Json(payload): Json<serde_json::Value>,
) -> (StatusCode, Json<SyncRes>) {
    match state.broker.trigger(&state.topic, &payload).await {
        Ok(()) => {
            tracing::debug!(
                "relayed {} to {}",
                payload.get("status").and_then(|s| s.as_str()).unwrap_or("payload"),
                state.topic.channel()
            );
            (StatusCode::OK, Json(SyncRes::ok()))
        }
        Err(e) => {
            tracing::error!("Broker trigger error: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(SyncRes::failed(format!("Failed to sync: {e}"))),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{header, Request};
    use http_body_util::BodyExt;
    use relay_broker::{BrokerError, BrokerResult, InMemoryBroker};
    use serde_json::json;
    use tower::ServiceExt;

    struct DownBroker;

    #[async_trait]
    impl Broker for DownBroker {
        async fn trigger(&self, _topic: &Topic, _payload: &serde_json::Value) -> BrokerResult<()> {
            Err(BrokerError::rejected(401, "Invalid key"))
        }
    }

    fn post_json(body: impl Into<Body>) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(SYNC_FORM_PATH)
            .header(header::CONTENT_TYPE, "application/json")
            .body(body.into())
            .expect("request")
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("body")
            .to_bytes();
        serde_json::from_slice(&bytes).expect("json body")
    }

    #[tokio::test]
    async fn forwards_payload_verbatim() {
        let broker = InMemoryBroker::new();
        let app = router(AppState::new(Arc::new(broker.clone()), Topic::default()));
        let payload = json!({
            "firstName": "Elon",
            "status": "typing",
            "timestamp": "2024-01-01T00:00:00Z",
            "extra": { "kept": [1, 2, 3] }
        });

        let response = app
            .oneshot(post_json(payload.to_string()))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({ "success": true }));

        let published = broker.published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].channel, "hospital-form");
        assert_eq!(published[0].event, "patient-update");
        assert_eq!(published[0].payload, payload);
    }

    #[tokio::test]
    async fn broker_failure_is_reported() {
        let app = router(AppState::new(Arc::new(DownBroker), Topic::default()));

        let response = app
            .oneshot(post_json(json!({ "status": "reset" }).to_string()))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = body_json(response).await;
        assert_eq!(body["success"], false);
        let error = body["error"].as_str().expect("error string");
        assert!(error.starts_with("Failed to sync: "));
        assert!(error.contains("Invalid key"));
    }

    #[tokio::test]
    async fn non_json_body_never_reaches_broker() {
        let broker = InMemoryBroker::new();
        let app = router(AppState::new(Arc::new(broker.clone()), Topic::default()));

        let response = app.oneshot(post_json("not json")).await.expect("response");
        assert!(response.status().is_client_error());
        assert!(broker.published().is_empty());
    }

    #[tokio::test]
    async fn health_reports_alive() {
        let app = router(AppState::new(Arc::new(InMemoryBroker::new()), Topic::default()));
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            json!({ "ok": true, "message": "Form relay is alive" })
        );
    }

    #[tokio::test]
    async fn serves_openapi_document() {
        let app = router(AppState::new(Arc::new(InMemoryBroker::new()), Topic::default()));
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api-docs/openapi.json")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let doc = body_json(response).await;
        assert!(doc["paths"].get("/api/sync-form").is_some());
        assert!(doc["paths"].get("/health").is_some());
    }
}
