//! Event dispatcher: runs every matching rule's actions for one event.
//!
//! Rules run one after the other and, within a rule, actions run one after
//! the other; each action's execution and its log write are separate
//! journaled steps, so a resumed run neither re-delivers a completed action
//! nor loses its audit row.

use serde::{Deserialize, Serialize};

use kadernim_domain::automation::ActionKind;
use kadernim_domain::error::KadernimError;
use kadernim_domain::event::DomainEvent;
use kadernim_domain::id::{ActionId, ExecutionLogId, RuleId};

use crate::durable::{RunHandler, Steps};
use crate::execution_log::ExecutionLogWriter;
use crate::executor::{ActionOutcome, Executor};
use crate::ports::{ExecutionLogRepository, RuleRepository, StepJournal};
use crate::rules::RuleResolver;

/// One executed (rule, action) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionExecution {
    pub rule_id: RuleId,
    pub action_id: ActionId,
    pub kind: ActionKind,
    pub outcome: ActionOutcome,
}

/// What processing one event amounted to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// No active rule listens to the event; nothing ran, nothing was logged.
    Skipped { event: String },
    Executed { executions: Vec<ActionExecution> },
}

pub struct RuleDispatcher<R, L, X> {
    resolver: RuleResolver<R>,
    logs: ExecutionLogWriter<L>,
    executor: X,
}

impl<R, L, X> RuleDispatcher<R, L, X>
where
    R: RuleRepository,
    L: ExecutionLogRepository,
    X: Executor,
{
    pub fn new(rules: R, logs: L, executor: X) -> Self {
        Self {
            resolver: RuleResolver::new(rules),
            logs: ExecutionLogWriter::new(logs),
            executor,
        }
    }

    /// Process `event` against its active rules.
    ///
    /// # Errors
    ///
    /// Failed actions are recorded, not returned. Errors come from the rule
    /// store, the execution log or the journal, and are meant for the
    /// run's retry policy.
    #[tracing::instrument(skip_all, fields(event = %event.name, event_id = %event.id))]
    pub async fn dispatch<J: StepJournal>(
        &self,
        event: &DomainEvent,
        steps: &Steps<'_, J>,
    ) -> Result<DispatchOutcome, KadernimError> {
        let rules = self.resolver.resolve(&event.name).await?;
        if rules.is_empty() {
            tracing::debug!("no active rule, skipping");
            return Ok(DispatchOutcome::Skipped {
                event: event.name.clone(),
            });
        }

        let mut executions = Vec::new();
        for rule in &rules {
            for action in &rule.actions {
                let key = format!("{}/{}", rule.id, action.id);
                let outcome: ActionOutcome = steps
                    .run(&format!("execute:{key}"), || async {
                        Ok(self
                            .executor
                            .execute(&action.kind, &action.config, &event.data, &event.name)
                            .await)
                    })
                    .await?;
                let _: ExecutionLogId = steps
                    .run(&format!("log:{key}"), || {
                        self.logs.write(rule.id, action.id, &outcome, &event.data)
                    })
                    .await?;
                if !outcome.success {
                    tracing::warn!(
                        rule = %rule.name,
                        action = %action,
                        error = outcome.error.as_deref().unwrap_or_default(),
                        "action failed"
                    );
                }
                executions.push(ActionExecution {
                    rule_id: rule.id,
                    action_id: action.id,
                    kind: action.kind.clone(),
                    outcome,
                });
            }
        }
        tracing::info!(executed = executions.len(), "event dispatched");
        Ok(DispatchOutcome::Executed { executions })
    }
}

impl<R, L, X, J> RunHandler<J> for RuleDispatcher<R, L, X>
where
    R: RuleRepository,
    L: ExecutionLogRepository,
    X: Executor,
    J: StepJournal,
{
    async fn handle(&self, event: &DomainEvent, steps: &Steps<'_, J>) -> Result<(), KadernimError> {
        self.dispatch(event, steps).await.map(|_| ())
    }
}
