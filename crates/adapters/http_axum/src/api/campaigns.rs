//! Campaign triggers.

use std::str::FromStr;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use serde_json::json;

use kadernim_app::ports::{EventPublisher, ExecutionLogRepository, RuleRepository};
use kadernim_domain::error::ValidationError;
use kadernim_domain::event::{DomainEvent, names};
use kadernim_domain::id::CampaignId;
use kadernim_domain::time::Timestamp;

use super::Accepted;
use crate::error::ApiError;
use crate::state::AppState;

/// Optional request body; without it the campaign's own schedule applies.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleRequest {
    pub scheduled_at: Option<Timestamp>,
}

pub enum ScheduleResponse {
    Accepted(Json<Accepted>),
}

impl IntoResponse for ScheduleResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Accepted(json) => (StatusCode::ACCEPTED, json).into_response(),
        }
    }
}

/// `POST /api/campaigns/:id/schedule`: publish `campaign.scheduled`.
///
/// The campaign is not looked up here; a missing or already sent campaign
/// fails its run.
pub async fn schedule<P, L, R>(
    State(state): State<AppState<P, L, R>>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<ScheduleResponse, ApiError>
where
    P: EventPublisher + 'static,
    L: ExecutionLogRepository + 'static,
    R: RuleRepository + 'static,
{
    let campaign_id = CampaignId::from_str(&id).map_err(|_| ValidationError::UnknownValue {
        kind: "campaign id",
        value: id,
    })?;
    let request: ScheduleRequest = if body.is_empty() {
        ScheduleRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|_| ValidationError::MalformedPayload(names::CAMPAIGN_SCHEDULED))?
    };

    let event = DomainEvent::new(
        names::CAMPAIGN_SCHEDULED,
        json!({
            "campaignId": campaign_id,
            "scheduledAt": request.scheduled_at,
        }),
    );
    let event_id = event.id;
    state.publisher.publish(event).await?;
    tracing::info!(%campaign_id, %event_id, "campaign scheduled");
    Ok(ScheduleResponse::Accepted(Json(Accepted { id: event_id })))
}
