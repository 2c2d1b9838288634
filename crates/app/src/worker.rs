//! Background worker: turns bus events into durable runs.
//!
//! Each event becomes one run keyed by the event id and is driven on its
//! own task; runs for different events proceed concurrently. The journal is
//! the source of truth: on start, and whenever the bus reports that events
//! were skipped, the worker drives every run the journal still lists as
//! running. A run is never driven by two tasks at once.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::broadcast::{self, error::RecvError};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use kadernim_domain::durable::{DurableFunction, RetryPolicy, RunRecord, RunStatus};
use kadernim_domain::error::{KadernimError, describe};
use kadernim_domain::event::DomainEvent;
use kadernim_domain::id::RunId;

use crate::durable::{DurableRunner, RunHandler};
use crate::ports::StepJournal;

/// Retry budget per durable function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicies {
    pub otp: RetryPolicy,
    pub campaign: RetryPolicy,
    pub events: RetryPolicy,
}

impl Default for RetryPolicies {
    fn default() -> Self {
        let backoff = Duration::from_secs(1);
        Self {
            otp: RetryPolicy::capped(1, backoff),
            campaign: RetryPolicy::capped(3, backoff),
            events: RetryPolicy::capped(3, backoff),
        }
    }
}

impl RetryPolicies {
    #[must_use]
    pub fn for_function(&self, function: DurableFunction) -> RetryPolicy {
        match function {
            DurableFunction::SendOtp => self.otp,
            DurableFunction::ScheduleCampaign => self.campaign,
            DurableFunction::DispatchEvent => self.events,
        }
    }
}

/// Routes runs to the OTP service, the campaign scheduler or the rule
/// dispatcher.
pub struct Worker<J, O, C, D> {
    runner: DurableRunner<J>,
    otp: O,
    campaigns: C,
    dispatcher: D,
    policies: RetryPolicies,
    in_flight: Mutex<HashSet<RunId>>,
}

impl<J, O, C, D> Worker<J, O, C, D>
where
    J: StepJournal,
    O: RunHandler<J>,
    C: RunHandler<J>,
    D: RunHandler<J>,
{
    pub fn new(journal: J, otp: O, campaigns: C, dispatcher: D, policies: RetryPolicies) -> Self {
        Self {
            runner: DurableRunner::new(journal),
            otp,
            campaigns,
            dispatcher,
            policies,
            in_flight: Mutex::default(),
        }
    }

    /// Process one event to completion on the current task.
    ///
    /// # Errors
    ///
    /// Returns a storage error when the journal is unavailable. Failures
    /// of the run itself are recorded in the journal, not returned.
    pub async fn process(&self, event: DomainEvent) -> Result<RunStatus, KadernimError> {
        self.drive(RunRecord::for_event(event)).await
    }

    async fn drive(&self, run: RunRecord) -> Result<RunStatus, KadernimError> {
        let policy = self.policies.for_function(run.function);
        match run.function {
            DurableFunction::SendOtp => self.runner.drive(run, policy, &self.otp).await,
            DurableFunction::ScheduleCampaign => {
                self.runner.drive(run, policy, &self.campaigns).await
            }
            DurableFunction::DispatchEvent => {
                self.runner.drive(run, policy, &self.dispatcher).await
            }
        }
    }
}

impl<J, O, C, D> Worker<J, O, C, D>
where
    J: StepJournal + 'static,
    O: RunHandler<J> + 'static,
    C: RunHandler<J> + 'static,
    D: RunHandler<J> + 'static,
{
    /// Resume unfinished runs, then process `events` until `shutdown`.
    ///
    /// Runs still in flight at shutdown are abandoned mid-step and stay
    /// `running` in the journal, so the next start resumes them.
    ///
    /// # Errors
    ///
    /// Returns a storage error when unfinished runs cannot be listed on start.
    pub async fn run(
        self: Arc<Self>,
        mut events: broadcast::Receiver<DomainEvent>,
        shutdown: CancellationToken,
    ) -> Result<(), KadernimError> {
        let tracker = TaskTracker::new();

        Self::resume_unfinished(&self, &tracker, &shutdown).await?;

        loop {
            tokio::select! {
                () = shutdown.cancelled() => break,
                received = events.recv() => match received {
                    Ok(event) => {
                        tracing::debug!(
                            event_id = %event.id,
                            event = %event.name,
                            "event received"
                        );
                        Self::spawn_run(
                            Arc::clone(&self),
                            &tracker,
                            &shutdown,
                            RunRecord::for_event(event),
                        );
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "worker lagged behind the event bus");
                        let rescan = Self::resume_unfinished(&self, &tracker, &shutdown).await;
                        if let Err(err) = rescan {
                            tracing::error!(
                                error = %describe(&err),
                                "could not rescan unfinished runs"
                            );
                        }
                    }
                    Err(RecvError::Closed) => break,
                },
            }
        }

        tracker.close();
        tracker.wait().await;
        tracing::info!("worker stopped");
        Ok(())
    }

    async fn resume_unfinished(
        worker: &Arc<Self>,
        tracker: &TaskTracker,
        shutdown: &CancellationToken,
    ) -> Result<(), KadernimError> {
        let pending = worker.runner.journal().unfinished_runs().await?;
        if !pending.is_empty() {
            tracing::info!(count = pending.len(), "resuming unfinished runs");
        }
        for run in pending {
            Self::spawn_run(Arc::clone(worker), tracker, shutdown, run);
        }
        Ok(())
    }

    /// Drive `run` on its own task unless a task already drives it.
    fn spawn_run(
        worker: Arc<Self>,
        tracker: &TaskTracker,
        shutdown: &CancellationToken,
        run: RunRecord,
    ) {
        let run_id = run.id;
        if !worker.claim(run_id) {
            tracing::debug!(%run_id, "run already in flight");
            return;
        }
        let shutdown = shutdown.clone();
        tracker.spawn(async move {
            tokio::select! {
                () = shutdown.cancelled() => {
                    tracing::info!(%run_id, "run interrupted by shutdown");
                }
                result = worker.drive(run) => {
                    if let Err(err) = result {
                        tracing::error!(
                            %run_id,
                            error = %describe(&err),
                            "run could not be recorded"
                        );
                    }
                }
            }
            worker.release(run_id);
        });
    }

    fn claim(&self, run_id: RunId) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(run_id)
    }

    fn release(&self, run_id: RunId) {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&run_id);
    }
}
