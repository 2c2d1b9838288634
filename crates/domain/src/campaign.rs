//! Push campaigns: a segmented, possibly scheduled, one-shot broadcast.
//!
//! Lifecycle: `DRAFT → SENDING → SENT`. Campaigns are created as drafts by
//! the admin UI; only the campaign scheduler moves them forward, and `SENT`
//! is terminal.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::audience::AudienceFilter;
use crate::error::{TransitionError, ValidationError};
use crate::id::CampaignId;
use crate::push::PushPayload;
use crate::time::Timestamp;

/// Campaign lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CampaignStatus {
    Draft,
    Sending,
    Sent,
}

impl CampaignStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "DRAFT",
            Self::Sending => "SENDING",
            Self::Sent => "SENT",
        }
    }

    /// Whether moving from `self` to `next` is a legal step.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Draft, Self::Sending) | (Self::Sending, Self::Sent)
        )
    }
}

impl fmt::Display for CampaignStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CampaignStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DRAFT" => Ok(Self::Draft),
            "SENDING" => Ok(Self::Sending),
            "SENT" => Ok(Self::Sent),
            other => Err(ValidationError::UnknownValue {
                kind: "campaign status",
                value: other.to_string(),
            }),
        }
    }
}

/// A push campaign.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushCampaign {
    pub id: CampaignId,
    pub title: String,
    pub body: String,
    pub url: Option<String>,
    pub icon: Option<String>,
    pub image_url: Option<String>,
    pub audience: AudienceFilter,
    pub status: CampaignStatus,
    pub scheduled_at: Option<Timestamp>,
    pub sent_at: Option<Timestamp>,
    pub total_sent: u64,
}

impl PushCampaign {
    /// A fresh draft.
    #[must_use]
    pub fn draft(
        title: impl Into<String>,
        body: impl Into<String>,
        audience: AudienceFilter,
    ) -> Self {
        Self {
            id: CampaignId::new(),
            title: title.into(),
            body: body.into(),
            url: None,
            icon: None,
            image_url: None,
            audience,
            status: CampaignStatus::Draft,
            scheduled_at: None,
            sent_at: None,
            total_sent: 0,
        }
    }

    /// Refuse to (re)start a campaign that already left `DRAFT`.
    ///
    /// # Errors
    ///
    /// [`TransitionError::AlreadySent`] for `SENT`,
    /// [`TransitionError::AlreadyInProgress`] for `SENDING`.
    pub fn ensure_startable(&self) -> Result<(), TransitionError> {
        match self.status {
            CampaignStatus::Draft => Ok(()),
            CampaignStatus::Sending => {
                Err(TransitionError::AlreadyInProgress(self.id.to_string()))
            }
            CampaignStatus::Sent => Err(TransitionError::AlreadySent(self.id.to_string())),
        }
    }

    /// Move to `next`, enforcing the lifecycle.
    ///
    /// # Errors
    ///
    /// [`TransitionError::Illegal`] when the step is not allowed.
    pub fn transition(&mut self, next: CampaignStatus) -> Result<(), TransitionError> {
        if !self.status.can_transition_to(next) {
            return Err(TransitionError::Illegal {
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        self.status = next;
        Ok(())
    }

    /// Record the terminal `SENT` state.
    ///
    /// # Errors
    ///
    /// [`TransitionError::Illegal`] unless the campaign is `SENDING`.
    pub fn mark_sent(&mut self, total_sent: u64, at: Timestamp) -> Result<(), TransitionError> {
        self.transition(CampaignStatus::Sent)?;
        self.total_sent = total_sent;
        self.sent_at = Some(at);
        Ok(())
    }

    /// The instant to sleep until, when the schedule lies after `now`.
    #[must_use]
    pub fn wake_at(&self, now: Timestamp) -> Option<Timestamp> {
        self.scheduled_at.filter(|at| *at > now)
    }

    /// The push payload every recipient receives.
    #[must_use]
    pub fn payload(&self) -> PushPayload {
        PushPayload {
            title: self.title.clone(),
            body: self.body.clone(),
            url: self.url.clone().unwrap_or_else(|| "/".to_string()),
            icon: self.icon.clone(),
            badge: None,
            image: self.image_url.clone(),
            tag: Some(format!("campaign-{}", self.id)),
        }
    }
}

/// The payload of a `campaign.scheduled` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignTrigger {
    pub campaign_id: CampaignId,
    #[serde(default)]
    pub scheduled_at: Option<Timestamp>,
}
