//! Audience segmentation for push campaigns.

use kadernim_domain::audience::AudienceFilter;
use kadernim_domain::error::KadernimError;
use kadernim_domain::push::PushTarget;

use crate::ports::SubscriptionRepository;

pub struct AudienceSegmenter<S> {
    subscriptions: S,
}

impl<S: SubscriptionRepository> AudienceSegmenter<S> {
    pub fn new(subscriptions: S) -> Self {
        Self { subscriptions }
    }

    /// Subscriptions selected by `filter`.
    ///
    /// An unfiltered audience is every active subscription and skips the
    /// compound segmentation query.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    #[tracing::instrument(skip(self))]
    pub async fn resolve(&self, filter: &AudienceFilter) -> Result<Vec<PushTarget>, KadernimError> {
        let targets = if filter.is_unfiltered() {
            self.subscriptions.active_targets().await?
        } else {
            self.subscriptions.segment(filter).await?
        };
        tracing::debug!(targets = targets.len(), "audience resolved");
        Ok(targets)
    }
}
