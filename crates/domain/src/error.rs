//! Common error types used across the workspace.
//!
//! Each layer defines its own typed errors and converts into
//! [`KadernimError`] via `#[from]` (or a manual `From` for boxed sources).

/// Top-level error for everything that is allowed to unwind a use-case.
///
/// Action delivery failures are *not* represented here: the action executor
/// turns them into result values. This type covers storage outages, invalid
/// input and illegal state transitions.
#[derive(Debug, thiserror::Error)]
pub enum KadernimError {
    #[error("validation error")]
    Validation(#[from] ValidationError),

    #[error("not found")]
    NotFound(#[from] NotFoundError),

    #[error("invalid state transition")]
    Transition(#[from] TransitionError),

    #[error("storage error")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("delivery error")]
    Delivery(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl KadernimError {
    /// Whether running the same work again may succeed.
    ///
    /// Storage and delivery faults are transient; invalid input, missing
    /// records and refused transitions will fail the same way every time.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage(_) | Self::Delivery(_))
    }
}

/// Render an error and its whole source chain as `outer: inner: root`.
#[must_use]
pub fn describe(err: &(dyn std::error::Error + 'static)) -> String {
    let mut text = err.to_string();
    let mut source = err.source();
    while let Some(inner) = source {
        text.push_str(": ");
        text.push_str(&inner.to_string());
        source = inner.source();
    }
    text
}

/// Domain invariant violations.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("name must not be empty")]
    EmptyName,

    #[error("event type must not be empty")]
    EmptyEventType,

    #[error("template body must not be empty")]
    EmptyBody,

    #[error("a rule needs at least one action")]
    NoActions,

    #[error("{0} payload is missing required fields")]
    MalformedPayload(&'static str),

    #[error("unknown {kind} {value:?}")]
    UnknownValue { kind: &'static str, value: String },

    #[error("retry budget {0} exceeds the maximum of {max}", max = crate::durable::MAX_RETRIES)]
    RetryBudget(u32),
}

/// A lookup that was expected to succeed found nothing.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
#[error("{entity} {id} not found")]
pub struct NotFoundError {
    pub entity: &'static str,
    pub id: String,
}

/// An illegal lifecycle transition (campaigns, durable runs).
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("campaign {0} was already sent")]
    AlreadySent(String),

    #[error("campaign {0} is already being sent")]
    AlreadyInProgress(String),

    #[error("cannot move from {from} to {to}")]
    Illegal { from: String, to: String },
}
