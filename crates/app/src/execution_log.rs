//! Execution log writer: one audit row per action attempt.

use serde_json::Value;

use kadernim_domain::error::KadernimError;
use kadernim_domain::execution_log::ExecutionLog;
use kadernim_domain::id::{ActionId, ExecutionLogId, RuleId};

use crate::executor::ActionOutcome;
use crate::ports::ExecutionLogRepository;

/// Default page size for log listings.
pub const DEFAULT_LIMIT: u32 = 50;

/// Upper bound for log listings.
pub const MAX_LIMIT: u32 = 500;

pub struct ExecutionLogWriter<L> {
    repo: L,
}

impl<L: ExecutionLogRepository> ExecutionLogWriter<L> {
    pub fn new(repo: L) -> Self {
        Self { repo }
    }

    /// Append the row for one attempt.
    ///
    /// `payload` is the original event payload, never the rendered content.
    ///
    /// # Errors
    ///
    /// Storage errors propagate: they mean the audit trail is unavailable
    /// and the run should be retried.
    pub async fn write(
        &self,
        rule_id: RuleId,
        action_id: ActionId,
        outcome: &ActionOutcome,
        payload: &Value,
    ) -> Result<ExecutionLogId, KadernimError> {
        let log = ExecutionLog::record(
            rule_id,
            action_id,
            outcome.success,
            payload.clone(),
            outcome.error.clone(),
        );
        let id = log.id;
        self.repo.append(log).await?;
        tracing::debug!(%rule_id, %action_id, success = outcome.success, "execution logged");
        Ok(id)
    }

    /// Newest rows first, at most `limit` (clamped to [`MAX_LIMIT`]).
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    pub async fn recent(
        &self,
        rule_id: Option<RuleId>,
        limit: Option<u32>,
    ) -> Result<Vec<ExecutionLog>, KadernimError> {
        let limit = limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
        match rule_id {
            Some(rule_id) => self.repo.for_rule(rule_id, limit).await,
            None => self.repo.recent(limit).await,
        }
    }
}
