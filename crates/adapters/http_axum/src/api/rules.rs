//! Active rules for an event type.

use axum::Json;
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use kadernim_app::ports::{EventPublisher, ExecutionLogRepository, RuleRepository};
use kadernim_domain::automation::AutomationRule;
use kadernim_domain::error::ValidationError;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub event: Option<String>,
}

pub enum ListResponse {
    Ok(Json<Vec<AutomationRule>>),
}

impl IntoResponse for ListResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Ok(json) => json.into_response(),
        }
    }
}

/// `GET /api/rules?event=...`: rules in the order they would run.
pub async fn list<P, L, R>(
    State(state): State<AppState<P, L, R>>,
    Query(query): Query<ListQuery>,
) -> Result<ListResponse, ApiError>
where
    P: EventPublisher + 'static,
    L: ExecutionLogRepository + 'static,
    R: RuleRepository + 'static,
{
    let event = query
        .event
        .as_deref()
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .ok_or(ValidationError::EmptyEventType)?;
    let rules = state.rules.find_active_by_event(event).await?;
    Ok(ListResponse::Ok(Json(rules)))
}
