//! In-process event bus backed by a tokio broadcast channel, and the
//! journaled publisher that makes accepted events durable.

use std::future::Future;

use tokio::sync::broadcast;

use kadernim_domain::durable::RunRecord;
use kadernim_domain::error::KadernimError;
use kadernim_domain::event::DomainEvent;

use crate::ports::{EventPublisher, StepJournal};

/// Default channel capacity; a lagging receiver loses the oldest events.
pub const DEFAULT_CAPACITY: usize = 256;

/// In-process event bus using a tokio [`broadcast`] channel.
///
/// Publishing succeeds even when nobody listens; the event is dropped with
/// a warning.
#[derive(Clone)]
pub struct InProcessEventBus {
    sender: broadcast::Sender<DomainEvent>,
}

impl Default for InProcessEventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl InProcessEventBus {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Receive every event published *after* this call.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<DomainEvent> {
        self.sender.subscribe()
    }
}

impl EventPublisher for InProcessEventBus {
    fn publish(
        &self,
        event: DomainEvent,
    ) -> impl Future<Output = Result<(), KadernimError>> + Send {
        let (id, name) = (event.id, event.name.clone());
        if self.sender.send(event).is_err() {
            tracing::warn!(event_id = %id, event = %name, "no subscriber, event dropped");
        }
        async { Ok(()) }
    }
}

/// Records a run for every event before announcing it on `bus`.
///
/// Once `publish` returns the event survives a lagging bus and a restart:
/// the worker picks up every unfinished run from the journal.
#[derive(Clone)]
pub struct JournaledPublisher<J, P> {
    journal: J,
    bus: P,
}

impl<J, P> JournaledPublisher<J, P> {
    pub fn new(journal: J, bus: P) -> Self {
        Self { journal, bus }
    }
}

impl<J, P> EventPublisher for JournaledPublisher<J, P>
where
    J: StepJournal,
    P: EventPublisher,
{
    async fn publish(&self, event: DomainEvent) -> Result<(), KadernimError> {
        self.journal
            .begin_run(RunRecord::for_event(event.clone()))
            .await?;
        self.bus.publish(event).await
    }
}
