//! Webhook client over reqwest.

use std::time::Duration;

use serde_json::Value;

use kadernim_app::ports::{HttpResponse, WebhookClient, WebhookError};

/// Deadline for a single webhook request.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Posts JSON bodies to arbitrary URLs.
#[derive(Debug, Clone)]
pub struct HttpWebhookClient {
    client: reqwest::Client,
}

impl HttpWebhookClient {
    /// Create a client with the default [`REQUEST_TIMEOUT`].
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialised.
    pub fn new() -> Result<Self, reqwest::Error> {
        Self::with_timeout(REQUEST_TIMEOUT)
    }

    /// Create a client that gives up after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialised.
    pub fn with_timeout(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

impl WebhookClient for HttpWebhookClient {
    async fn post_json(&self, url: &str, body: &Value) -> Result<HttpResponse, WebhookError> {
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(classify)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(classify)?;
        tracing::debug!(url, status, "webhook answered");
        Ok(HttpResponse { status, body })
    }
}

fn classify(err: reqwest::Error) -> WebhookError {
    if err.is_timeout() {
        WebhookError::Timeout
    } else {
        WebhookError::Transport(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_server;
    use axum::Json;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::Router;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    #[tokio::test]
    async fn should_post_json_envelope_and_return_status() {
        let seen: Arc<Mutex<Option<(String, Value)>>> = Arc::default();
        let sink = Arc::clone(&seen);
        let router = Router::new().route(
            "/hook",
            post(move |headers: HeaderMap, Json(body): Json<Value>| {
                let sink = Arc::clone(&sink);
                async move {
                    let content_type = headers
                        .get("content-type")
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or_default()
                        .to_string();
                    *sink.lock().unwrap() = Some((content_type, body));
                    StatusCode::NO_CONTENT
                }
            }),
        );
        let base = test_server::spawn(router).await;
        let client = HttpWebhookClient::new().unwrap();
        let envelope = json!({"event": "user.signup", "timestamp": "t", "data": {"a": 1}});

        let response = client
            .post_json(&format!("{base}/hook"), &envelope)
            .await
            .unwrap();

        assert_eq!(response.status, 204);
        assert!(response.is_success());
        let (content_type, body) = seen.lock().unwrap().clone().unwrap();
        assert_eq!(content_type, "application/json");
        assert_eq!(body, envelope);
    }

    #[tokio::test]
    async fn should_return_error_status_and_body() {
        let router = Router::new().route(
            "/hook",
            post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
        );
        let base = test_server::spawn(router).await;
        let client = HttpWebhookClient::new().unwrap();

        let response = client
            .post_json(&format!("{base}/hook"), &json!({}))
            .await
            .unwrap();

        assert_eq!(response.status, 500);
        assert_eq!(response.body, "boom");
    }

    #[tokio::test]
    async fn should_report_timeout_when_endpoint_hangs() {
        let router = Router::new().route(
            "/hook",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                StatusCode::OK
            }),
        );
        let base = test_server::spawn(router).await;
        let client = HttpWebhookClient::with_timeout(Duration::from_millis(200)).unwrap();

        let err = client
            .post_json(&format!("{base}/hook"), &json!({}))
            .await
            .unwrap_err();

        assert!(matches!(err, WebhookError::Timeout));
    }

    #[tokio::test]
    async fn should_report_transport_error_for_unreachable_host() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let client = HttpWebhookClient::new().unwrap();

        let err = client
            .post_json(&format!("http://{addr}/hook"), &json!({}))
            .await
            .unwrap_err();

        assert!(matches!(err, WebhookError::Transport(_)));
    }
}
