//! Event intake.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use serde_json::Value;

use kadernim_app::ports::{EventPublisher, ExecutionLogRepository, RuleRepository};
use kadernim_domain::error::ValidationError;
use kadernim_domain::event::DomainEvent;

use super::Accepted;
use crate::error::ApiError;
use crate::state::AppState;

/// Request body for publishing an event.
#[derive(Debug, Deserialize)]
pub struct PublishEventRequest {
    pub name: String,
    #[serde(default)]
    pub data: Value,
}

pub enum PublishResponse {
    Accepted(Json<Accepted>),
}

impl IntoResponse for PublishResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Accepted(json) => (StatusCode::ACCEPTED, json).into_response(),
        }
    }
}

/// `POST /api/events`: put an event on the bus.
pub async fn publish<P, L, R>(
    State(state): State<AppState<P, L, R>>,
    Json(request): Json<PublishEventRequest>,
) -> Result<PublishResponse, ApiError>
where
    P: EventPublisher + 'static,
    L: ExecutionLogRepository + 'static,
    R: RuleRepository + 'static,
{
    let name = request.name.trim();
    if name.is_empty() {
        return Err(ValidationError::EmptyEventType.into());
    }
    let event = DomainEvent::new(name, request.data);
    let id = event.id;
    state.publisher.publish(event).await?;
    tracing::info!(event_id = %id, event = name, "event accepted");
    Ok(PublishResponse::Accepted(Json(Accepted { id })))
}
