//! Execution log listing.

use std::str::FromStr;

use axum::Json;
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use kadernim_app::ports::{EventPublisher, ExecutionLogRepository, RuleRepository};
use kadernim_domain::error::ValidationError;
use kadernim_domain::execution_log::ExecutionLog;
use kadernim_domain::id::RuleId;

use crate::error::ApiError;
use crate::state::AppState;

pub const DEFAULT_LIMIT: u32 = 50;
pub const MAX_LIMIT: u32 = 500;

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub limit: Option<u32>,
    /// Only rows written for this rule.
    pub rule: Option<String>,
}

pub enum ListResponse {
    Ok(Json<Vec<ExecutionLog>>),
}

impl IntoResponse for ListResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Ok(json) => json.into_response(),
        }
    }
}

/// `GET /api/executions`: newest execution log rows first.
pub async fn list<P, L, R>(
    State(state): State<AppState<P, L, R>>,
    Query(query): Query<ListQuery>,
) -> Result<ListResponse, ApiError>
where
    P: EventPublisher + 'static,
    L: ExecutionLogRepository + 'static,
    R: RuleRepository + 'static,
{
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let logs = match query.rule {
        Some(raw) => {
            let rule_id = RuleId::from_str(&raw).map_err(|_| ValidationError::UnknownValue {
                kind: "rule id",
                value: raw,
            })?;
            state.execution_logs.for_rule(rule_id, limit).await?
        }
        None => state.execution_logs.recent(limit).await?,
    };
    Ok(ListResponse::Ok(Json(logs)))
}
