//! Execution logs: the append-only audit trail of action attempts.
//!
//! Exactly one row is written per action execution attempt. Rows are never
//! updated or deleted by the engine.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::id::{ActionId, ExecutionLogId, RuleId};
use crate::time::{Timestamp, now};

/// Outcome recorded for one action attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Success,
    Failed,
}

impl ExecutionStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }

    #[must_use]
    pub fn from_success(success: bool) -> Self {
        if success { Self::Success } else { Self::Failed }
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExecutionStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(Self::Success),
            "failed" => Ok(Self::Failed),
            other => Err(ValidationError::UnknownValue {
                kind: "execution status",
                value: other.to_string(),
            }),
        }
    }
}

/// One audit row.
///
/// `payload` is the original, unrendered event payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionLog {
    pub id: ExecutionLogId,
    pub rule_id: RuleId,
    pub action_id: ActionId,
    pub status: ExecutionStatus,
    pub payload: serde_json::Value,
    pub error: Option<String>,
    pub created_at: Timestamp,
}

impl ExecutionLog {
    /// Record an attempt that just finished.
    #[must_use]
    pub fn record(
        rule_id: RuleId,
        action_id: ActionId,
        success: bool,
        payload: serde_json::Value,
        error: Option<String>,
    ) -> Self {
        Self {
            id: ExecutionLogId::new(),
            rule_id,
            action_id,
            status: ExecutionStatus::from_success(success),
            payload,
            error,
            created_at: now(),
        }
    }
}
