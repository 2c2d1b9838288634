//! JSON API handler modules.

#[allow(clippy::missing_errors_doc)]
pub mod campaigns;
#[allow(clippy::missing_errors_doc)]
pub mod events;
#[allow(clippy::missing_errors_doc)]
pub mod executions;
#[allow(clippy::missing_errors_doc)]
pub mod rules;

use axum::Router;
use axum::routing::{get, post};
use serde::Serialize;

use kadernim_app::ports::{EventPublisher, ExecutionLogRepository, RuleRepository};
use kadernim_domain::id::EventId;

use crate::state::AppState;

/// Body of a `202 Accepted` intake response.
#[derive(Debug, Serialize)]
pub struct Accepted {
    /// Id of the event put on the bus; also the id of its durable run.
    pub id: EventId,
}

/// Build the `/api` sub-router.
pub fn routes<P, L, R>() -> Router<AppState<P, L, R>>
where
    P: EventPublisher + 'static,
    L: ExecutionLogRepository + 'static,
    R: RuleRepository + 'static,
{
    Router::new()
        .route("/events", post(events::publish::<P, L, R>))
        .route(
            "/campaigns/{id}/schedule",
            post(campaigns::schedule::<P, L, R>),
        )
        .route("/executions", get(executions::list::<P, L, R>))
        .route("/rules", get(rules::list::<P, L, R>))
}
