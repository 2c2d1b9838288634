//! Automation rules: stored bindings of one event type to ordered actions.
//!
//! A rule reacts to every [`DomainEvent`](crate::event::DomainEvent) whose
//! name equals its `event_type`, executing its [`Action`]s one after the
//! other. There is no branching: actions are a flat, ordered list.
//!
//! Ordering is explicit. Rules sort by ascending `priority`, ties broken by
//! name and then id; actions sort by ascending `position`.

mod action;

pub use action::{
    Action, ActionConfig, ActionKind, ConfigError, EmailActionConfig, PushActionConfig,
    WebhookActionConfig, WhatsAppActionConfig,
};

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::error::{KadernimError, ValidationError};
use crate::id::RuleId;

/// A rule that reacts to events of one type by executing actions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutomationRule {
    pub id: RuleId,
    pub name: String,
    pub event_type: String,
    pub is_active: bool,
    /// Lower values run first.
    #[serde(default)]
    pub priority: i32,
    pub actions: Vec<Action>,
}

impl AutomationRule {
    /// Create a builder for constructing an [`AutomationRule`].
    #[must_use]
    pub fn builder() -> AutomationRuleBuilder {
        AutomationRuleBuilder::default()
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`KadernimError::Validation`] when:
    /// - `name` is empty ([`ValidationError::EmptyName`])
    /// - `event_type` is empty ([`ValidationError::EmptyEventType`])
    /// - `actions` is empty ([`ValidationError::NoActions`])
    pub fn validate(&self) -> Result<(), KadernimError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyName.into());
        }
        if self.event_type.trim().is_empty() {
            return Err(ValidationError::EmptyEventType.into());
        }
        if self.actions.is_empty() {
            return Err(ValidationError::NoActions.into());
        }
        Ok(())
    }

    /// Whether this rule should fire for `event_name`.
    #[must_use]
    pub fn matches(&self, event_name: &str) -> bool {
        self.is_active && self.event_type == event_name
    }

    /// Total execution order between rules.
    #[must_use]
    pub fn execution_order(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| self.name.cmp(&other.name))
            .then_with(|| self.id.as_uuid().cmp(&other.id.as_uuid()))
    }

    /// Put the actions in execution order.
    pub fn sort_actions(&mut self) {
        self.actions.sort_by(|a, b| {
            a.position
                .cmp(&b.position)
                .then_with(|| a.id.as_uuid().cmp(&b.id.as_uuid()))
        });
    }
}

/// Sort rules (and each rule's actions) into execution order.
pub fn sort_for_execution(rules: &mut [AutomationRule]) {
    rules.sort_by(AutomationRule::execution_order);
    for rule in rules.iter_mut() {
        rule.sort_actions();
    }
}

/// Step-by-step builder for [`AutomationRule`].
#[derive(Debug, Default)]
pub struct AutomationRuleBuilder {
    id: Option<RuleId>,
    name: Option<String>,
    event_type: Option<String>,
    is_active: Option<bool>,
    priority: i32,
    actions: Vec<Action>,
}

impl AutomationRuleBuilder {
    #[must_use]
    pub fn id(mut self, id: RuleId) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_type = Some(event_type.into());
        self
    }

    #[must_use]
    pub fn active(mut self, is_active: bool) -> Self {
        self.is_active = Some(is_active);
        self
    }

    #[must_use]
    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Append an action; its position is its index in the builder.
    #[must_use]
    pub fn action(mut self, mut action: Action) -> Self {
        action.position = u32::try_from(self.actions.len()).unwrap_or(u32::MAX);
        self.actions.push(action);
        self
    }

    /// Consume the builder, validate, and return an [`AutomationRule`].
    ///
    /// # Errors
    ///
    /// Returns [`KadernimError::Validation`] if required fields are missing or empty.
    pub fn build(self) -> Result<AutomationRule, KadernimError> {
        let rule = AutomationRule {
            id: self.id.unwrap_or_default(),
            name: self.name.unwrap_or_default(),
            event_type: self.event_type.unwrap_or_default(),
            is_active: self.is_active.unwrap_or(true),
            priority: self.priority,
            actions: self.actions,
        };
        rule.validate()?;
        Ok(rule)
    }
}
