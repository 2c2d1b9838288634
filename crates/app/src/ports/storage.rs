//! Storage ports: repository traits for persistence.
//!
//! The engine only reads rules, templates, users and subscriptions. It
//! writes execution logs and campaign status transitions.

use std::future::Future;

use kadernim_domain::audience::AudienceFilter;
use kadernim_domain::automation::AutomationRule;
use kadernim_domain::campaign::PushCampaign;
use kadernim_domain::error::KadernimError;
use kadernim_domain::execution_log::ExecutionLog;
use kadernim_domain::id::{CampaignId, RuleId, TemplateId, UserId};
use kadernim_domain::push::PushTarget;
use kadernim_domain::template::{NotificationTemplate, TemplateChannel};
use kadernim_domain::time::Timestamp;
use kadernim_domain::user::User;

/// Read access to automation rules.
pub trait RuleRepository: Send + Sync {
    /// Active rules bound to `event_type`, each with its actions loaded.
    ///
    /// Implementations return rules by ascending priority (ties by name,
    /// then id) and actions by ascending position.
    fn find_active_by_event(
        &self,
        event_type: &str,
    ) -> impl Future<Output = Result<Vec<AutomationRule>, KadernimError>> + Send;
}

/// Read access to notification templates.
pub trait TemplateRepository: Send + Sync {
    fn get_by_id(
        &self,
        id: TemplateId,
    ) -> impl Future<Output = Result<Option<NotificationTemplate>, KadernimError>> + Send;

    /// The active template registered for `channel` and `event_type`, if any.
    fn find_active(
        &self,
        channel: TemplateChannel,
        event_type: &str,
    ) -> impl Future<Output = Result<Option<NotificationTemplate>, KadernimError>> + Send;
}

/// Append-only audit trail.
pub trait ExecutionLogRepository: Send + Sync {
    fn append(&self, log: ExecutionLog) -> impl Future<Output = Result<(), KadernimError>> + Send;

    /// Newest rows first.
    fn recent(
        &self,
        limit: u32,
    ) -> impl Future<Output = Result<Vec<ExecutionLog>, KadernimError>> + Send;

    /// Newest rows first, for one rule.
    fn for_rule(
        &self,
        rule_id: RuleId,
        limit: u32,
    ) -> impl Future<Output = Result<Vec<ExecutionLog>, KadernimError>> + Send;
}

/// User accounts owned by the authentication system.
pub trait UserDirectory: Send + Sync {
    fn find_by_email(
        &self,
        email: &str,
    ) -> impl Future<Output = Result<Option<User>, KadernimError>> + Send;

    fn find_by_id(
        &self,
        id: &UserId,
    ) -> impl Future<Output = Result<Option<User>, KadernimError>> + Send;
}

/// Push subscriptions and the audience segmentation query.
pub trait SubscriptionRepository: Send + Sync {
    /// Every active subscription.
    fn active_targets(&self) -> impl Future<Output = Result<Vec<PushTarget>, KadernimError>> + Send;

    /// Active subscriptions whose owner satisfies every criterion of `filter`.
    fn segment(
        &self,
        filter: &AudienceFilter,
    ) -> impl Future<Output = Result<Vec<PushTarget>, KadernimError>> + Send;
}

/// Push campaign persistence.
pub trait CampaignRepository: Send + Sync {
    fn get(
        &self,
        id: CampaignId,
    ) -> impl Future<Output = Result<Option<PushCampaign>, KadernimError>> + Send;

    /// Move `id` from `DRAFT` to `SENDING`.
    ///
    /// Returns `false` without writing anything when the campaign is not a
    /// draft any more, so two triggers can never both start a send.
    fn begin_sending(
        &self,
        id: CampaignId,
    ) -> impl Future<Output = Result<bool, KadernimError>> + Send;

    /// Move `id` from `SENDING` to `SENT`, recording the tally.
    fn mark_sent(
        &self,
        id: CampaignId,
        total_sent: u64,
        sent_at: Timestamp,
    ) -> impl Future<Output = Result<bool, KadernimError>> + Send;
}
