//! Domain events: named occurrences with a structured payload.
//!
//! Events are immutable. They are produced elsewhere in the product (signups,
//! community requests, lesson plans, scheduled campaigns, OTP requests) and
//! fed into the automation engine, which never persists them itself.

use serde::{Deserialize, Serialize};

use crate::id::EventId;
use crate::time::{Timestamp, now};

/// Well-known event names.
///
/// The list is not exhaustive: rules may bind to any event name, these are
/// the ones the engine ships templates and special handling for.
pub mod names {
    pub const OTP_REQUESTED: &str = "auth.otp.requested";
    pub const CAMPAIGN_SCHEDULED: &str = "campaign.scheduled";

    pub const COMMUNITY_REQUEST_CREATED: &str = "community.request.created";
    pub const COMMUNITY_REQUEST_VOTED: &str = "community.request.voted";
    pub const COMMUNITY_REQUEST_SELECTED: &str = "community.request.selected";
    pub const COMMUNITY_REQUEST_COMPLETED: &str = "community.request.completed";
    pub const COMMUNITY_REQUEST_UNFEASIBLE: &str = "community.request.unfeasible";
    pub const COMMUNITY_CLEANUP_DELETED: &str = "community.cleanup.deleted";

    pub const USER_SIGNUP: &str = "user.signup";
    pub const USER_LOGIN: &str = "user.login";
    pub const USER_SUBSCRIPTION_CREATED: &str = "user.subscription.created";
    pub const USER_TRIAL_ENDING: &str = "user.trial_ending";
    pub const USER_RESOURCE_ACCESS_GRANTED: &str = "user.resource.access_granted";

    pub const RESOURCE_CREATED: &str = "resource.created";
    pub const RESOURCE_PUBLISHED: &str = "resource.published";

    pub const LESSON_PLAN_CREATED: &str = "lesson-plan.created";
}

/// How the engine routes an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventRoute {
    /// One-time password delivery, handled outside the rule table.
    Otp,
    /// Start the campaign scheduler for the referenced campaign.
    Campaign,
    /// Match against configured automation rules.
    Rules,
}

/// A named occurrence with a structured payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainEvent {
    pub id: EventId,
    pub name: String,
    #[serde(default)]
    pub data: serde_json::Value,
    pub occurred_at: Timestamp,
}

impl DomainEvent {
    /// Create an event that occurred now.
    #[must_use]
    pub fn new(name: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            id: EventId::new(),
            name: name.into(),
            data,
            occurred_at: now(),
        }
    }

    /// Decide which pipeline handles this event.
    #[must_use]
    pub fn route(&self) -> EventRoute {
        match self.name.as_str() {
            names::OTP_REQUESTED => EventRoute::Otp,
            names::CAMPAIGN_SCHEDULED => EventRoute::Campaign,
            _ => EventRoute::Rules,
        }
    }

    /// Read a top-level string field from the payload.
    #[must_use]
    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(serde_json::Value::as_str)
    }
}
