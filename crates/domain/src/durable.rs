//! Durable runs: the persisted record of one event being processed.
//!
//! A run owns a journal of named steps. A step whose output is journaled is
//! never executed again for that run; retries and restarts resume at the
//! first step without an entry.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::event::{DomainEvent, EventRoute};
use crate::id::{EventId, RunId};
use crate::time::{Timestamp, now};

/// Upper bound for any retry budget.
pub const MAX_RETRIES: u32 = 10;

impl From<EventId> for RunId {
    fn from(id: EventId) -> Self {
        Self::from_uuid(id.as_uuid())
    }
}

/// The function a run executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DurableFunction {
    SendOtp,
    ScheduleCampaign,
    DispatchEvent,
}

impl DurableFunction {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SendOtp => "send-otp",
            Self::ScheduleCampaign => "schedule-campaign",
            Self::DispatchEvent => "dispatch-event",
        }
    }

    #[must_use]
    pub fn for_route(route: EventRoute) -> Self {
        match route {
            EventRoute::Otp => Self::SendOtp,
            EventRoute::Campaign => Self::ScheduleCampaign,
            EventRoute::Rules => Self::DispatchEvent,
        }
    }
}

impl fmt::Display for DurableFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DurableFunction {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "send-otp" => Ok(Self::SendOtp),
            "schedule-campaign" => Ok(Self::ScheduleCampaign),
            "dispatch-event" => Ok(Self::DispatchEvent),
            other => Err(ValidationError::UnknownValue {
                kind: "durable function",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    #[must_use]
    pub fn is_finished(self) -> bool {
        !matches!(self, Self::Running)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(ValidationError::UnknownValue {
                kind: "run status",
                value: other.to_string(),
            }),
        }
    }
}

/// A persisted run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub id: RunId,
    pub function: DurableFunction,
    pub event: DomainEvent,
    pub status: RunStatus,
    pub attempts: u32,
    pub error: Option<String>,
    pub started_at: Timestamp,
    pub finished_at: Option<Timestamp>,
}

impl RunRecord {
    /// A fresh run for `event`, keyed by the event id.
    #[must_use]
    pub fn for_event(event: DomainEvent) -> Self {
        Self {
            id: event.id.into(),
            function: DurableFunction::for_route(event.route()),
            event,
            status: RunStatus::Running,
            attempts: 0,
            error: None,
            started_at: now(),
            finished_at: None,
        }
    }
}

/// Bounded retry policy applied to a whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
    backoff: Duration,
}

impl RetryPolicy {
    /// # Errors
    ///
    /// [`ValidationError::RetryBudget`] when `max_retries` exceeds [`MAX_RETRIES`].
    pub fn new(max_retries: u32, backoff: Duration) -> Result<Self, ValidationError> {
        if max_retries > MAX_RETRIES {
            return Err(ValidationError::RetryBudget(max_retries));
        }
        Ok(Self {
            max_retries,
            backoff,
        })
    }

    /// Like [`RetryPolicy::new`], with `max_retries` clamped to [`MAX_RETRIES`].
    #[must_use]
    pub fn capped(max_retries: u32, backoff: Duration) -> Self {
        Self {
            max_retries: max_retries.min(MAX_RETRIES),
            backoff,
        }
    }

    /// A policy that never retries.
    #[must_use]
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            backoff: Duration::ZERO,
        }
    }

    #[must_use]
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Total attempts allowed, the first one included.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }

    /// Delay before retry number `retry` (1-based), growing linearly.
    #[must_use]
    pub fn delay_before(&self, retry: u32) -> Duration {
        self.backoff.saturating_mul(retry.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::names;

    #[test]
    fn should_key_run_by_event_id() {
        let event = DomainEvent::new(names::USER_SIGNUP, serde_json::json!({}));
        let run = RunRecord::for_event(event.clone());
        assert_eq!(run.id.as_uuid(), event.id.as_uuid());
        assert_eq!(run.function, DurableFunction::DispatchEvent);
        assert_eq!(run.status, RunStatus::Running);
    }

    #[test]
    fn should_pick_function_from_event_route() {
        let otp = RunRecord::for_event(DomainEvent::new(
            names::OTP_REQUESTED,
            serde_json::json!({}),
        ));
        let campaign = RunRecord::for_event(DomainEvent::new(
            names::CAMPAIGN_SCHEDULED,
            serde_json::json!({}),
        ));
        assert_eq!(otp.function, DurableFunction::SendOtp);
        assert_eq!(campaign.function, DurableFunction::ScheduleCampaign);
    }

    #[test]
    fn should_reject_retry_budget_over_maximum() {
        assert_eq!(
            RetryPolicy::new(MAX_RETRIES + 1, Duration::ZERO),
            Err(ValidationError::RetryBudget(MAX_RETRIES + 1))
        );
        assert!(RetryPolicy::new(MAX_RETRIES, Duration::ZERO).is_ok());
        assert_eq!(RetryPolicy::capped(50, Duration::ZERO).max_retries(), MAX_RETRIES);
    }

    #[test]
    fn should_grow_delay_linearly() {
        let policy = RetryPolicy::new(3, Duration::from_secs(2)).unwrap();
        assert_eq!(policy.max_attempts(), 4);
        assert_eq!(policy.delay_before(1), Duration::from_secs(2));
        assert_eq!(policy.delay_before(3), Duration::from_secs(6));
    }

    #[test]
    fn should_parse_persisted_names() {
        assert_eq!("send-otp".parse(), Ok(DurableFunction::SendOtp));
        assert_eq!("completed".parse(), Ok(RunStatus::Completed));
        assert!(RunStatus::Failed.is_finished());
        assert!(!RunStatus::Running.is_finished());
        assert!("paused".parse::<RunStatus>().is_err());
    }
}
