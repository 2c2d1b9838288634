//! Step journal port: persistence for durable runs.

use std::future::Future;

use serde_json::Value;

use kadernim_domain::durable::{RunRecord, RunStatus};
use kadernim_domain::error::KadernimError;
use kadernim_domain::id::RunId;

/// Persists runs and the outputs of their completed steps.
pub trait StepJournal: Send + Sync {
    /// Store `run` unless a run with the same id exists; return the stored run.
    fn begin_run(
        &self,
        run: RunRecord,
    ) -> impl Future<Output = Result<RunRecord, KadernimError>> + Send;

    /// The journaled output of `step`, when it already completed.
    fn load_step(
        &self,
        run_id: RunId,
        step: &str,
    ) -> impl Future<Output = Result<Option<Value>, KadernimError>> + Send;

    fn save_step(
        &self,
        run_id: RunId,
        step: &str,
        output: Value,
    ) -> impl Future<Output = Result<(), KadernimError>> + Send;

    fn finish_run(
        &self,
        run_id: RunId,
        status: RunStatus,
        attempts: u32,
        error: Option<String>,
    ) -> impl Future<Output = Result<(), KadernimError>> + Send;

    /// Runs still `running`, oldest first.
    fn unfinished_runs(&self) -> impl Future<Output = Result<Vec<RunRecord>, KadernimError>> + Send;
}
