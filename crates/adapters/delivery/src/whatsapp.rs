//! WhatsApp delivery through an HTTP gateway.
//!
//! The gateway accepts `POST {url}` with `{"phone", "message"}` and answers
//! `{"status": bool, "error"?: string}`.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use kadernim_app::ports::{ChatSender, DeliveryReport};
use kadernim_domain::error::KadernimError;

use crate::error::GatewayError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Gateway location and credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WhatsAppConfig {
    pub url: String,
    /// Sent as a bearer token when present.
    pub token: Option<String>,
}

#[derive(Serialize)]
struct SendRequest<'a> {
    phone: &'a str,
    message: &'a str,
}

#[derive(Deserialize)]
struct SendResponse {
    status: bool,
    #[serde(default)]
    error: Option<String>,
}

pub struct WhatsAppGateway {
    client: reqwest::Client,
    config: WhatsAppConfig,
}

impl WhatsAppGateway {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: WhatsAppConfig) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self { client, config })
    }
}

impl ChatSender for WhatsAppGateway {
    #[tracing::instrument(skip_all)]
    async fn send(&self, phone: &str, message: &str) -> Result<DeliveryReport, KadernimError> {
        let mut request = self
            .client
            .post(&self.config.url)
            .json(&SendRequest { phone, message });
        if let Some(token) = &self.config.token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await.map_err(GatewayError::from)?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), "whatsapp gateway refused message");
            return Ok(DeliveryReport::failed(format!(
                "Gateway de WhatsApp respondeu HTTP {}",
                status.as_u16()
            )));
        }
        let bytes = response.bytes().await.map_err(GatewayError::from)?;
        let answer: SendResponse = serde_json::from_slice(&bytes).map_err(GatewayError::Decode)?;
        if answer.status {
            Ok(DeliveryReport::delivered())
        } else {
            Ok(DeliveryReport::failed(
                answer
                    .error
                    .unwrap_or_else(|| "Falha ao enviar WhatsApp".to_string()),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_server;
    use axum::Json;
    use axum::Router;
    use axum::http::{HeaderMap, StatusCode};
    use axum::response::IntoResponse;
    use axum::routing::post;
    use serde_json::{Value, json};
    use std::sync::{Arc, Mutex};

    type Seen = Arc<Mutex<Vec<(Option<String>, Value)>>>;

    async fn gateway(answer: Value) -> (WhatsAppGateway, Seen) {
        let seen: Seen = Arc::default();
        let sink = Arc::clone(&seen);
        let router = Router::new().route(
            "/send",
            post(move |headers: HeaderMap, Json(body): Json<Value>| {
                let sink = Arc::clone(&sink);
                let answer = answer.clone();
                async move {
                    let auth = headers
                        .get("authorization")
                        .and_then(|v| v.to_str().ok())
                        .map(str::to_string);
                    sink.lock().unwrap().push((auth, body));
                    Json(answer)
                }
            }),
        );
        let base = test_server::spawn(router).await;
        let gateway = WhatsAppGateway::new(WhatsAppConfig {
            url: format!("{base}/send"),
            token: Some("secret".to_string()),
        })
        .unwrap();
        (gateway, seen)
    }

    #[tokio::test]
    async fn should_send_phone_and_message_with_bearer_token() {
        let (gateway, seen) = gateway(json!({"status": true})).await;

        let report = gateway.send("+5511999990000", "Olá Ana").await.unwrap();

        assert_eq!(report, DeliveryReport::delivered());
        let seen = seen.lock().unwrap();
        assert_eq!(seen[0].0.as_deref(), Some("Bearer secret"));
        assert_eq!(
            seen[0].1,
            json!({"phone": "+5511999990000", "message": "Olá Ana"})
        );
    }

    #[tokio::test]
    async fn should_pass_through_gateway_failure_reason() {
        let (gateway, _) = gateway(json!({"status": false, "error": "número inválido"})).await;

        let report = gateway.send("+55", "oi").await.unwrap();

        assert_eq!(report, DeliveryReport::failed("número inválido"));
    }

    #[tokio::test]
    async fn should_report_http_error_status_as_failed_delivery() {
        let router = Router::new().route(
            "/send",
            post(|| async { (StatusCode::BAD_GATEWAY, "upstream down").into_response() }),
        );
        let base = test_server::spawn(router).await;
        let gateway = WhatsAppGateway::new(WhatsAppConfig {
            url: format!("{base}/send"),
            token: None,
        })
        .unwrap();

        let report = gateway.send("+55", "oi").await.unwrap();

        assert!(!report.success);
        assert_eq!(
            report.error.as_deref(),
            Some("Gateway de WhatsApp respondeu HTTP 502")
        );
    }

    #[tokio::test]
    async fn should_fail_with_retryable_error_on_unreadable_answer() {
        let router = Router::new().route("/send", post(|| async { "not json" }));
        let base = test_server::spawn(router).await;
        let gateway = WhatsAppGateway::new(WhatsAppConfig {
            url: format!("{base}/send"),
            token: None,
        })
        .unwrap();

        let err = gateway.send("+55", "oi").await.unwrap_err();

        assert!(err.is_retryable());
    }
}
