//! Rule resolver: the active rules an event triggers, in execution order.

use kadernim_domain::automation::{AutomationRule, sort_for_execution};
use kadernim_domain::error::KadernimError;

use crate::ports::RuleRepository;

/// Loads the active rules for an event type.
///
/// The order is explicit: ascending `priority`, then name, then id; within a
/// rule, actions by ascending `position`. The resolver re-applies it (and the
/// active/event filter) whatever the repository returns.
pub struct RuleResolver<R> {
    repo: R,
}

impl<R: RuleRepository> RuleResolver<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    #[tracing::instrument(skip(self))]
    pub async fn resolve(&self, event_type: &str) -> Result<Vec<AutomationRule>, KadernimError> {
        let mut rules = self.repo.find_active_by_event(event_type).await?;
        rules.retain(|rule| rule.matches(event_type));
        sort_for_execution(&mut rules);
        tracing::debug!(count = rules.len(), "resolved rules");
        Ok(rules)
    }
}
