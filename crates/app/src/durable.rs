//! Durable execution: journaled steps, bounded retries and resumable runs.
//!
//! A run is one event being processed by one [`RunHandler`]. The handler
//! wraps every side effect in [`Steps::run`]; the output of a completed step
//! is written to the [`StepJournal`] and replayed instead of re-executed on
//! the next attempt, so a retry or a restart resumes at the first step that
//! has no journal entry. A step interrupted mid-way runs again (at least
//! once), every other step runs exactly once per run.

use std::future::Future;

use serde::Serialize;
use serde::de::DeserializeOwned;

use kadernim_domain::durable::{RetryPolicy, RunRecord, RunStatus};
use kadernim_domain::error::{KadernimError, describe};
use kadernim_domain::event::DomainEvent;
use kadernim_domain::id::RunId;
use kadernim_domain::time::{Timestamp, now};

use crate::ports::StepJournal;

/// Handle a run's function uses to execute journaled steps.
pub struct Steps<'a, J> {
    journal: &'a J,
    run_id: RunId,
}

impl<'a, J: StepJournal> Steps<'a, J> {
    #[must_use]
    pub fn new(journal: &'a J, run_id: RunId) -> Self {
        Self { journal, run_id }
    }

    #[must_use]
    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    /// Execute `work` once per run.
    ///
    /// If `name` already has a journal entry, its output is returned and
    /// `work` is not called.
    ///
    /// # Errors
    ///
    /// Propagates errors from `work` (nothing is journaled then), from the
    /// journal, and from (de)serializing the output.
    pub async fn run<T, F, Fut>(&self, name: &str, work: F) -> Result<T, KadernimError>
    where
        T: Serialize + DeserializeOwned + Send,
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<T, KadernimError>> + Send,
    {
        if let Some(saved) = self.journal.load_step(self.run_id, name).await? {
            tracing::debug!(step = name, "replaying journaled step");
            return serde_json::from_value(saved).map_err(|e| KadernimError::Storage(Box::new(e)));
        }
        let output = work().await?;
        let value = serde_json::to_value(&output).map_err(|e| KadernimError::Storage(Box::new(e)))?;
        self.journal.save_step(self.run_id, name, value).await?;
        tracing::debug!(step = name, "step completed");
        Ok(output)
    }

    /// Sleep until `at`.
    ///
    /// The wake instant is journaled first, so a run resumed after a
    /// restart only sleeps for whatever is left, or not at all.
    ///
    /// # Errors
    ///
    /// Propagates journal errors.
    pub async fn sleep_until(&self, name: &str, at: Timestamp) -> Result<(), KadernimError> {
        let wake_at: Timestamp = self.run(name, || async move { Ok(at) }).await?;
        if let Ok(remaining) = (wake_at - now()).to_std() {
            tracing::info!(step = name, %wake_at, "sleeping until scheduled time");
            tokio::time::sleep(remaining).await;
        }
        Ok(())
    }
}

/// The function a run executes.
pub trait RunHandler<J: StepJournal>: Send + Sync {
    fn handle(
        &self,
        event: &DomainEvent,
        steps: &Steps<'_, J>,
    ) -> impl Future<Output = Result<(), KadernimError>> + Send;
}

/// Drives runs to completion under a [`RetryPolicy`].
pub struct DurableRunner<J> {
    journal: J,
}

impl<J: StepJournal> DurableRunner<J> {
    pub fn new(journal: J) -> Self {
        Self { journal }
    }

    pub fn journal(&self) -> &J {
        &self.journal
    }

    /// Execute `run` with `handler`, retrying transient failures.
    ///
    /// A run that is already finished in the journal is not executed again.
    /// Returns the final status; a run that exhausts its retries is stored
    /// as [`RunStatus::Failed`] with the last error.
    ///
    /// # Errors
    ///
    /// Returns a storage error when the journal itself is unavailable.
    #[tracing::instrument(
        skip_all,
        fields(run_id = %run.id, function = %run.function, event = %run.event.name)
    )]
    pub async fn drive<H: RunHandler<J>>(
        &self,
        run: RunRecord,
        policy: RetryPolicy,
        handler: &H,
    ) -> Result<RunStatus, KadernimError> {
        let run = self.journal.begin_run(run).await?;
        if run.status.is_finished() {
            tracing::debug!(status = %run.status, "run already finished");
            return Ok(run.status);
        }

        let steps = Steps::new(&self.journal, run.id);
        let mut attempts = run.attempts;
        let mut last_error = None;
        for retry in 0..policy.max_attempts() {
            if retry > 0 {
                tokio::time::sleep(policy.delay_before(retry)).await;
            }
            attempts += 1;
            match handler.handle(&run.event, &steps).await {
                Ok(()) => {
                    self.journal
                        .finish_run(run.id, RunStatus::Completed, attempts, None)
                        .await?;
                    tracing::info!(attempts, "run completed");
                    return Ok(RunStatus::Completed);
                }
                Err(err) => {
                    let retryable = err.is_retryable();
                    tracing::warn!(
                        attempt = attempts,
                        retryable,
                        error = %describe(&err),
                        "run attempt failed"
                    );
                    last_error = Some(err);
                    if !retryable {
                        break;
                    }
                }
            }
        }

        let error = last_error.as_ref().map(|e| describe(e));
        self.journal
            .finish_run(run.id, RunStatus::Failed, attempts, error.clone())
            .await?;
        tracing::error!(
            attempts,
            error = error.as_deref().unwrap_or_default(),
            "run failed permanently"
        );
        Ok(RunStatus::Failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{InMemoryJournal, storage_down};
    use kadernim_domain::error::TransitionError;
    use kadernim_domain::event::names;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    /// Two steps; the second fails `failures` times with `error`.
    struct Flaky {
        failures: AtomicU32,
        first_step_calls: AtomicU32,
        second_step_calls: AtomicU32,
        error: fn() -> KadernimError,
    }

    impl Flaky {
        fn new(failures: u32, error: fn() -> KadernimError) -> Self {
            Self {
                failures: AtomicU32::new(failures),
                first_step_calls: AtomicU32::new(0),
                second_step_calls: AtomicU32::new(0),
                error,
            }
        }
    }

    impl RunHandler<InMemoryJournal> for Flaky {
        async fn handle(
            &self,
            _event: &DomainEvent,
            steps: &Steps<'_, InMemoryJournal>,
        ) -> Result<(), KadernimError> {
            let first: u32 = steps
                .run("first", || async {
                    Ok(self.first_step_calls.fetch_add(1, Ordering::SeqCst) + 1)
                })
                .await?;
            steps
                .run("second", || async {
                    self.second_step_calls.fetch_add(1, Ordering::SeqCst);
                    let left = self.failures.load(Ordering::SeqCst);
                    if left > 0 {
                        self.failures.store(left - 1, Ordering::SeqCst);
                        return Err((self.error)());
                    }
                    Ok(first)
                })
                .await?;
            Ok(())
        }
    }

    fn run_record() -> RunRecord {
        RunRecord::for_event(DomainEvent::new(names::USER_SIGNUP, serde_json::json!({})))
    }

    fn policy(retries: u32) -> RetryPolicy {
        RetryPolicy::new(retries, Duration::ZERO).unwrap()
    }

    #[tokio::test]
    async fn should_complete_run_and_journal_every_step() {
        let journal = InMemoryJournal::default();
        let runner = DurableRunner::new(journal.clone());
        let handler = Flaky::new(0, storage_down);
        let run = run_record();
        let id = run.id;

        let status = runner.drive(run, policy(3), &handler).await.unwrap();

        assert_eq!(status, RunStatus::Completed);
        let stored = journal.run(id).unwrap();
        assert_eq!(stored.status, RunStatus::Completed);
        assert_eq!(stored.attempts, 1);
        assert_eq!(journal.step(id, "second"), Some(serde_json::json!(1)));
    }

    #[tokio::test]
    async fn should_skip_completed_steps_when_retrying() {
        let journal = InMemoryJournal::default();
        let runner = DurableRunner::new(journal.clone());
        let handler = Flaky::new(2, storage_down);
        let run = run_record();
        let id = run.id;

        let status = runner.drive(run, policy(3), &handler).await.unwrap();

        assert_eq!(status, RunStatus::Completed);
        assert_eq!(handler.first_step_calls.load(Ordering::SeqCst), 1);
        assert_eq!(handler.second_step_calls.load(Ordering::SeqCst), 3);
        assert_eq!(journal.run(id).unwrap().attempts, 3);
    }

    #[tokio::test]
    async fn should_mark_run_failed_when_budget_is_exhausted() {
        let journal = InMemoryJournal::default();
        let runner = DurableRunner::new(journal.clone());
        let handler = Flaky::new(10, storage_down);
        let run = run_record();
        let id = run.id;

        let status = runner.drive(run, policy(1), &handler).await.unwrap();

        assert_eq!(status, RunStatus::Failed);
        let stored = journal.run(id).unwrap();
        assert_eq!(stored.attempts, 2);
        assert_eq!(
            stored.error.as_deref(),
            Some("storage error: database unavailable")
        );
        assert!(journal.step(id, "second").is_none());
    }

    #[tokio::test]
    async fn should_not_retry_permanent_failures() {
        let runner = DurableRunner::new(InMemoryJournal::default());
        let handler = Flaky::new(10, || TransitionError::AlreadySent("c1".to_string()).into());

        let status = runner.drive(run_record(), policy(5), &handler).await.unwrap();

        assert_eq!(status, RunStatus::Failed);
        assert_eq!(handler.second_step_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn should_not_execute_finished_run_again() {
        let runner = DurableRunner::new(InMemoryJournal::default());
        let handler = Flaky::new(0, storage_down);
        let run = run_record();

        runner.drive(run.clone(), policy(0), &handler).await.unwrap();
        let replay = runner.drive(run, policy(0), &handler).await.unwrap();

        assert_eq!(replay, RunStatus::Completed);
        assert_eq!(handler.second_step_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn should_resume_from_journaled_step_output() {
        let journal = InMemoryJournal::default();
        let run = run_record();
        journal.preload_step(run.id, "first", serde_json::json!(41));
        let runner = DurableRunner::new(journal.clone());
        let handler = Flaky::new(0, storage_down);
        let id = run.id;

        runner.drive(run, policy(0), &handler).await.unwrap();

        assert_eq!(handler.first_step_calls.load(Ordering::SeqCst), 0);
        assert_eq!(journal.step(id, "second"), Some(serde_json::json!(41)));
    }

    #[tokio::test(start_paused = true)]
    async fn should_sleep_until_future_instant() {
        let journal = InMemoryJournal::default();
        let steps = Steps::new(&journal, RunId::new());
        let started = tokio::time::Instant::now();

        steps
            .sleep_until("wait", now() + chrono::Duration::minutes(30))
            .await
            .unwrap();

        assert!(started.elapsed() >= Duration::from_secs(29 * 60));
        assert!(journal.step(steps.run_id(), "wait").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn should_not_sleep_when_journaled_wake_time_has_passed() {
        let journal = InMemoryJournal::default();
        let run_id = RunId::new();
        let past = now() - chrono::Duration::hours(1);
        journal.preload_step(run_id, "wait", serde_json::to_value(past).unwrap());
        let steps = Steps::new(&journal, run_id);
        let started = tokio::time::Instant::now();

        steps
            .sleep_until("wait", now() + chrono::Duration::hours(5))
            .await
            .unwrap();

        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
