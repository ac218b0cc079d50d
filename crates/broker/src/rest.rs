//! Publishing through the broker's REST API.

use crate::signing::signed_query;
use crate::{Broker, BrokerError, BrokerResult};
use async_trait::async_trait;
use relay_core::{BrokerCredentials, Topic};
use reqwest::header::CONTENT_TYPE;
use serde::Serialize;
use std::time::Duration;

/// Default timeout for publish requests.
const DEFAULT_TIMEOUT_SECS: u64 = 10;

#[derive(Serialize)]
struct TriggerBody<'a> {
    name: &'a str,
    channels: [&'a str; 1],
    /// The payload travels as a JSON string inside the request body.
    data: &'a str,
}

/// Publisher for the hosted broker.
///
/// Stateless apart from the pooled HTTP client, so one instance is shared by every request
/// handler.
#[derive(Clone)]
pub struct PusherBroker {
    client: reqwest::Client,
    credentials: BrokerCredentials,
}

impl PusherBroker {
    pub fn new(credentials: BrokerCredentials) -> BrokerResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            client,
            credentials,
        })
    }

    fn events_path(&self) -> String {
        format!("/apps/{}/events", self.credentials.app_id())
    }
}

#[async_trait]
impl Broker for PusherBroker {
    async fn trigger(&self, topic: &Topic, payload: &serde_json::Value) -> BrokerResult<()> {
        let data = serde_json::to_string(payload)?;
        let body = serde_json::to_string(&TriggerBody {
            name: topic.event(),
            channels: [topic.channel()],
            data: &data,
        })?;

        let path = self.events_path();
        let query = signed_query(
            self.credentials.key(),
            self.credentials.secret(),
            &path,
            &body,
            chrono::Utc::now().timestamp(),
        )?;
        let url = format!("{}{}", self.credentials.endpoint().rest_base_url(), path);

        let response = self
            .client
            .post(url)
            .query(&query)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            tracing::debug!(
                "published {} on {} ({} bytes)",
                topic.event(),
                topic.channel(),
                data.len()
            );
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(BrokerError::rejected(status.as_u16(), body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signing::hmac_sha256_hex;
    use axum::{
        extract::{Path, Query, State},
        http::StatusCode,
        routing::post,
        Router,
    };
    use relay_core::BrokerEndpoint;
    use std::collections::HashMap;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    #[derive(Clone, Default)]
    struct Captured {
        requests: Arc<Mutex<Vec<(String, HashMap<String, String>, String)>>>,
    }

    async fn accept(
        State(captured): State<Captured>,
        Path(app_id): Path<String>,
        Query(query): Query<HashMap<String, String>>,
        body: String,
    ) -> StatusCode {
        captured.requests.lock().await.push((app_id, query, body));
        StatusCode::OK
    }

    async fn refuse() -> (StatusCode, &'static str) {
        (StatusCode::FORBIDDEN, "Invalid signature")
    }

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("serve");
        });
        addr.to_string()
    }

    fn broker_for(host: String) -> PusherBroker {
        let endpoint = BrokerEndpoint::new("test").with_host(host).with_tls(false);
        let creds = BrokerCredentials::new("42", "app-key", "app-secret", endpoint).expect("creds");
        PusherBroker::new(creds).expect("client")
    }

    #[tokio::test]
    async fn trigger_posts_signed_event() {
        let captured = Captured::default();
        let app = Router::new()
            .route("/apps/:app_id/events", post(accept))
            .with_state(captured.clone());
        let broker = broker_for(serve(app).await);

        let payload = serde_json::json!({
            "firstName": "Elon",
            "status": "typing",
            "timestamp": "2024-01-01T00:00:00Z"
        });
        broker
            .trigger(&Topic::default(), &payload)
            .await
            .expect("accepted");

        let requests = captured.requests.lock().await;
        assert_eq!(requests.len(), 1);
        let (app_id, query, body) = &requests[0];
        assert_eq!(app_id, "42");
        assert_eq!(query.get("auth_key").map(String::as_str), Some("app-key"));
        assert_eq!(query.get("auth_version").map(String::as_str), Some("1.0"));

        let sent: serde_json::Value = serde_json::from_str(body).expect("json body");
        assert_eq!(sent["name"], "patient-update");
        assert_eq!(sent["channels"], serde_json::json!(["hospital-form"]));
        let data: serde_json::Value =
            serde_json::from_str(sent["data"].as_str().expect("data is a string"))
                .expect("data is json");
        assert_eq!(data, payload);

        let to_sign = format!(
            "POST\n/apps/42/events\nauth_key=app-key&auth_timestamp={}&auth_version=1.0&body_md5={}",
            query["auth_timestamp"], query["body_md5"]
        );
        assert_eq!(
            query.get("auth_signature"),
            Some(&hmac_sha256_hex("app-secret", &to_sign).expect("signature"))
        );
    }

    #[tokio::test]
    async fn non_success_status_is_reported_with_body() {
        let app = Router::new().route("/apps/:app_id/events", post(refuse));
        let broker = broker_for(serve(app).await);

        let err = broker
            .trigger(&Topic::default(), &serde_json::json!({}))
            .await
            .expect_err("rejected");
        match err {
            BrokerError::Rejected { status, body } => {
                assert_eq!(status, 403);
                assert_eq!(body, "Invalid signature");
            }
            other => panic!("expected Rejected, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unreachable_broker_is_an_http_error() {
        // Bind then drop so the port is very likely closed.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("addr").to_string();
        drop(listener);

        let err = broker_for(addr)
            .trigger(&Topic::default(), &serde_json::json!({}))
            .await
            .expect_err("unreachable");
        assert!(matches!(err, BrokerError::Http(_)));
    }
}
