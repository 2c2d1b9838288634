//! Campaign scheduler: delivers one push campaign to its audience.
//!
//! The run is split into journaled steps (`begin-sending`, `fan-out`,
//! `mark-sent`). The fan-out reads the campaign again, so edits made while
//! it waited for its schedule are what gets sent. The fan-out tally is
//! journaled before the terminal status write, so a run interrupted between
//! the two resumes at `mark-sent` and never pushes twice.

use serde::{Deserialize, Serialize};

use kadernim_domain::campaign::{CampaignTrigger, PushCampaign};
use kadernim_domain::error::{KadernimError, NotFoundError, TransitionError, ValidationError};
use kadernim_domain::event::{DomainEvent, names};
use kadernim_domain::id::CampaignId;
use kadernim_domain::time::now;

use crate::durable::{RunHandler, Steps};
use crate::ports::{CampaignRepository, PushSender, StepJournal, SubscriptionRepository};
use crate::segmentation::AudienceSegmenter;

/// Deliveries of one campaign fan-out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignTally {
    /// Successful per-subscription deliveries.
    pub total_sent: u64,
    /// Distinct subscription owners reached at least once.
    pub unique_users: u64,
    pub failed: u64,
}

pub struct CampaignScheduler<C, S, P> {
    campaigns: C,
    segmenter: AudienceSegmenter<S>,
    push: P,
}

impl<C, S, P> CampaignScheduler<C, S, P>
where
    C: CampaignRepository,
    S: SubscriptionRepository,
    P: PushSender,
{
    pub fn new(campaigns: C, subscriptions: S, push: P) -> Self {
        Self {
            campaigns,
            segmenter: AudienceSegmenter::new(subscriptions),
            push,
        }
    }

    /// Deliver the campaign named by `trigger`.
    ///
    /// # Errors
    ///
    /// - [`TransitionError::AlreadySent`] when the campaign is `SENT`
    /// - [`TransitionError::AlreadyInProgress`] when another run started it
    /// - [`NotFoundError`] when the campaign does not exist
    /// - storage and delivery errors, for the run's retry policy
    #[tracing::instrument(skip_all, fields(campaign_id = %trigger.campaign_id))]
    pub async fn schedule<J: StepJournal>(
        &self,
        trigger: &CampaignTrigger,
        steps: &Steps<'_, J>,
    ) -> Result<CampaignTally, KadernimError> {
        let id = trigger.campaign_id;
        let scheduled_at = trigger.scheduled_at.or(self.load(id).await?.scheduled_at);

        if let Some(at) = scheduled_at.filter(|at| *at > now()) {
            steps.sleep_until("wait-for-schedule", at).await?;
        }

        steps
            .run("begin-sending", || async {
                let current = self.load(id).await?;
                current.ensure_startable()?;
                if !self.campaigns.begin_sending(id).await? {
                    return Err(TransitionError::AlreadyInProgress(id.to_string()).into());
                }
                tracing::info!("campaign sending");
                Ok::<_, KadernimError>(())
            })
            .await?;

        let tally: CampaignTally = steps
            .run("fan-out", || async { self.fan_out(&self.load(id).await?).await })
            .await?;

        steps
            .run("mark-sent", || async {
                if !self.campaigns.mark_sent(id, tally.total_sent, now()).await? {
                    return Err(TransitionError::AlreadySent(id.to_string()).into());
                }
                Ok::<_, KadernimError>(())
            })
            .await?;

        tracing::info!(
            total_sent = tally.total_sent,
            unique_users = tally.unique_users,
            failed = tally.failed,
            "campaign sent"
        );
        Ok(tally)
    }

    async fn load(&self, id: CampaignId) -> Result<PushCampaign, KadernimError> {
        self.campaigns
            .get(id)
            .await?
            .ok_or_else(|| {
                NotFoundError {
                    entity: "campaign",
                    id: id.to_string(),
                }
                .into()
            })
    }

    async fn fan_out(&self, campaign: &PushCampaign) -> Result<CampaignTally, KadernimError> {
        let targets = self.segmenter.resolve(&campaign.audience).await?;
        if targets.is_empty() {
            tracing::warn!("campaign audience is empty");
            return Ok(CampaignTally::default());
        }
        let report = self
            .push
            .send_to_subscriptions(&targets, &campaign.payload())
            .await?;
        Ok(CampaignTally {
            total_sent: report.success,
            unique_users: report.unique_users_reached(),
            failed: report.failed,
        })
    }
}

impl<C, S, P, J> RunHandler<J> for CampaignScheduler<C, S, P>
where
    C: CampaignRepository,
    S: SubscriptionRepository,
    P: PushSender,
    J: StepJournal,
{
    async fn handle(&self, event: &DomainEvent, steps: &Steps<'_, J>) -> Result<(), KadernimError> {
        let trigger: CampaignTrigger = serde_json::from_value(event.data.clone())
            .map_err(|_| ValidationError::MalformedPayload(names::CAMPAIGN_SCHEDULED))?;
        self.schedule(&trigger, steps).await.map(|_| ())
    }
}
